//! Blocking wait.

use super::{PendingReply, ReplyState};
use crate::core::error::{BridgeError, BridgeResult};
use std::time::{Duration, Instant};

/// Park the calling thread until `pending` leaves `Pending` or `timeout`
/// elapses.
///
/// On timeout the reply moves to `TimedOut`, its cancel hook runs, and any
/// later completion is discarded. A zero timeout checks once without
/// parking. Never retries.
pub fn await_or_cancel<T>(pending: PendingReply<T>, timeout: Duration) -> BridgeResult<T> {
    let PendingReply {
        shared, convert, ..
    } = pending;

    let deadline = Instant::now().checked_add(timeout);
    let mut slot = shared.slot.lock();

    while slot.state == ReplyState::Pending {
        match deadline {
            Some(deadline) => {
                if Instant::now() >= deadline {
                    break;
                }
                let _ = shared.ready.wait_until(&mut slot, deadline);
            }
            None => shared.ready.wait(&mut slot),
        }
    }

    if slot.state == ReplyState::Pending {
        let (hook, watcher) = slot.time_out();
        drop(slot);
        if let Some(hook) = hook {
            hook();
        }
        if let Some(watcher) = watcher {
            watcher.signal();
        }
        return Err(BridgeError::Timeout { timeout });
    }

    let outcome = slot.outcome.take();
    drop(slot);

    match outcome {
        Some(Ok(value)) => convert(value),
        Some(Err(e)) => Err(e),
        None => Err(BridgeError::cancelled("reply already taken")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pending::{reply_pair, ReplyState};
    use crate::protocol::{Command, RedisValue};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_wakes_on_completion() {
        let (completer, pending) = reply_pair(&Command::new("GET").arg("k"));
        let worker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            completer.resolve(RedisValue::bulk_string("v"))
        });

        let start = Instant::now();
        let value = pending.wait(Duration::from_secs(5)).unwrap();
        assert_eq!(value, RedisValue::bulk_string("v"));
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(worker.join().unwrap());
    }

    #[test]
    fn test_timeout_runs_hook_and_drops_late_reply() {
        let (completer, pending) = reply_pair(&Command::new("BLPOP"));
        let aborted = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&aborted);
        completer.on_cancel(move || flag.store(true, Ordering::SeqCst));
        let handle = pending.cancel_handle();

        let start = Instant::now();
        let err = pending.wait(Duration::from_millis(50)).unwrap_err();
        assert!(err.is_timeout());
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert!(aborted.load(Ordering::SeqCst));

        assert!(handle.is_done());
        assert!(completer.is_cancelled());
        assert!(!completer.resolve(RedisValue::ok()));
    }

    #[test]
    fn test_zero_timeout_checks_once() {
        let (_completer, pending) = reply_pair(&Command::new("GET"));
        let start = Instant::now();
        let err = await_or_cancel(pending, Duration::ZERO).unwrap_err();
        assert!(matches!(err, BridgeError::Timeout { timeout } if timeout.is_zero()));
        assert!(start.elapsed() < Duration::from_millis(50));

        let (completer, pending) = reply_pair(&Command::new("GET"));
        completer.resolve(RedisValue::Null);
        assert_eq!(await_or_cancel(pending, Duration::ZERO).unwrap(), RedisValue::Null);
    }

    #[test]
    fn test_cancel_from_other_thread() {
        let (_completer, pending) = reply_pair(&Command::new("GET"));
        let handle = pending.cancel_handle();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            handle.cancel("caller gave up")
        });

        let err = pending.wait(Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, BridgeError::Cancelled { ref reason } if reason == "caller gave up"));
        assert!(canceller.join().unwrap());
    }

    #[test]
    fn test_timed_out_state_is_observable() {
        let (completer, pending) = reply_pair(&Command::new("GET"));
        let handle = pending.cancel_handle();
        let _ = pending.wait(Duration::from_millis(1));
        assert!(handle.is_done());
        assert!(!handle.cancel("late"));
        assert_eq!(completer.shared.state(), ReplyState::TimedOut);
    }
}
