//! Dump (snapshot-to-sink) and load (restore-from-source) protocol.
//!
//! The file-backed sink/source use the teacher's dump-file framing
//! (`[len:u32][crc32:u32][bytes]`, little-endian) from `storage/dumper.rs`, stripped of
//! the gzip/chrono/tokio machinery that file doesn't need here.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::sync::Mutex;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

/// One dumped record: key, payload, and the original expiry it had in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpRecord {
    pub key: Vec<u8>,
    pub payload: Vec<u8>,
    pub expire: u32,
}

/// Sink a shard's live entries are forwarded to during dump. The cache may hold a
/// shard's write lock while calling `write`, so implementations must not block on
/// anything that could be held up by the cache itself.
pub trait DumpSink: Send + Sync {
    fn write(&self, key: &[u8], payload: &[u8], expire: u32) -> io::Result<usize>;
    fn flush(&self) -> io::Result<()>;
}

/// Source records are read from during load.
pub trait DumpSource: Send + Sync {
    /// Returns the next record, or an `UnexpectedEof` io error at end of stream.
    fn read(&self) -> io::Result<DumpRecord>;
}

/// In-memory sink, primarily for tests: records are appended under a mutex.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<DumpRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_records(self) -> Vec<DumpRecord> {
        self.records.into_inner().unwrap()
    }

    pub fn records(&self) -> Vec<DumpRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl DumpSink for MemorySink {
    fn write(&self, key: &[u8], payload: &[u8], expire: u32) -> io::Result<usize> {
        let mut recs = self.records.lock().unwrap();
        recs.push(DumpRecord {
            key: key.to_vec(),
            payload: payload.to_vec(),
            expire,
        });
        Ok(key.len() + payload.len())
    }

    fn flush(&self) -> io::Result<()> {
        Ok(())
    }
}

/// In-memory source that replays a fixed list of records.
pub struct MemorySource {
    records: Mutex<std::vec::IntoIter<DumpRecord>>,
}

impl MemorySource {
    pub fn new(records: Vec<DumpRecord>) -> Self {
        Self {
            records: Mutex::new(records.into_iter()),
        }
    }
}

impl DumpSource for MemorySource {
    fn read(&self) -> io::Result<DumpRecord> {
        self.records
            .lock()
            .unwrap()
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "end of dump stream"))
    }
}

fn encode_record(key: &[u8], payload: &[u8], expire: u32) -> Vec<u8> {
    let mut body = Vec::with_capacity(4 + 4 + key.len() + payload.len());
    body.write_u32::<LittleEndian>(key.len() as u32).unwrap();
    body.extend_from_slice(key);
    body.write_u32::<LittleEndian>(expire).unwrap();
    body.extend_from_slice(payload);
    body
}

fn decode_record(body: &[u8]) -> io::Result<DumpRecord> {
    let mut cursor = &body[..];
    let key_len = cursor.read_u32::<LittleEndian>()? as usize;
    if cursor.len() < key_len + 4 {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "truncated dump record"));
    }
    let key = cursor[..key_len].to_vec();
    cursor = &cursor[key_len..];
    let expire = cursor.read_u32::<LittleEndian>()?;
    let payload = cursor.to_vec();
    Ok(DumpRecord { key, payload, expire })
}

/// File-backed sink framing each record as `[len:u32][crc32:u32][body]`, little-endian.
pub struct FileSink {
    writer: Mutex<BufWriter<File>>,
}

impl FileSink {
    pub fn create(path: &std::path::Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }
}

impl DumpSink for FileSink {
    fn write(&self, key: &[u8], payload: &[u8], expire: u32) -> io::Result<usize> {
        let body = encode_record(key, payload, expire);
        let crc = crc32fast::hash(&body);
        let mut w = self.writer.lock().unwrap();
        w.write_u32::<LittleEndian>(body.len() as u32)?;
        w.write_u32::<LittleEndian>(crc)?;
        w.write_all(&body)?;
        Ok(body.len())
    }

    fn flush(&self) -> io::Result<()> {
        self.writer.lock().unwrap().flush()
    }
}

/// File-backed source reading the framing `FileSink` writes, validating the CRC32 of
/// each record before handing it back.
pub struct FileSource {
    reader: Mutex<BufReader<File>>,
}

impl FileSource {
    pub fn open(path: &std::path::Path) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: Mutex::new(BufReader::new(file)),
        })
    }
}

impl DumpSource for FileSource {
    fn read(&self) -> io::Result<DumpRecord> {
        let mut r = self.reader.lock().unwrap();
        let len = match r.read_u32::<LittleEndian>() {
            Ok(v) => v,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "end of dump stream"))
            }
            Err(e) => return Err(e),
        };
        let crc = r.read_u32::<LittleEndian>()?;
        let mut body = vec![0u8; len as usize];
        r.read_exact(&mut body)?;
        if crc32fast::hash(&body) != crc {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "dump record failed crc32 check"));
        }
        decode_record(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_source_round_trip() {
        let sink = MemorySink::new();
        sink.write(b"k1", b"v1", 100).unwrap();
        sink.write(b"k2", b"v2", 200).unwrap();
        sink.flush().unwrap();
        let recs = sink.into_records();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].key, b"k1");
        assert_eq!(recs[1].expire, 200);
    }

    #[test]
    fn file_sink_source_round_trip() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("cbytecache-dump-test-{}.bin", std::process::id()));
        {
            let sink = FileSink::create(&path).unwrap();
            sink.write(b"foo", b"bar", 42).unwrap();
            sink.flush().unwrap();
        }
        let source = FileSource::open(&path).unwrap();
        let rec = source.read().unwrap();
        assert_eq!(rec.key, b"foo");
        assert_eq!(rec.payload, b"bar");
        assert_eq!(rec.expire, 42);
        assert!(source.read().is_err());
        std::fs::remove_file(&path).ok();
    }
}
