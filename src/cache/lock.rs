use std::sync::{Mutex, MutexGuard};

use tracing::warn;

/// Take `lock`, recovering the guard if a previous holder panicked.
///
/// The store only holds plain maps behind the lock, so a poisoned guard is still structurally
/// sound; at worst it misses the write that was in flight.
pub(crate) fn lock_or_recover<'a, T>(
    lock: &'a Mutex<T>,
    target: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    lock.lock().unwrap_or_else(|poisoned| {
        warn!(
            op,
            target_module = target,
            result = "poisoned_recovered",
            "Recovered from poisoned cache lock"
        );
        poisoned.into_inner()
    })
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;

    #[test]
    fn recovers_after_panic_while_held() {
        let lock = Mutex::new(vec![1]);

        let result = catch_unwind(AssertUnwindSafe(|| {
            let mut guard = lock.lock().expect("first lock");
            guard.push(2);
            panic!("poison the lock");
        }));
        assert!(result.is_err());
        assert!(lock.is_poisoned());

        let guard = lock_or_recover(&lock, "cache::lock::tests", "read");
        assert_eq!(*guard, vec![1, 2]);
    }
}
