use std::sync::{Mutex, MutexGuard};

use tracing::warn;

/// Lock a namespace cache's state, taking the guard back from a poisoned lock.
pub(crate) fn lock_state<'a, T>(
    state: &'a Mutex<T>,
    namespace: &str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    state.lock().unwrap_or_else(|poisoned| {
        warn!(
            namespace,
            op,
            result = "poisoned_recovered",
            hint = "entries may be stale after panic in another thread",
            "Recovered from poisoned namespace cache lock"
        );
        poisoned.into_inner()
    })
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;

    #[test]
    fn poisoned_state_is_recovered() {
        let state = Mutex::new(vec![1_u32]);
        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = state.lock().expect("first lock");
            panic!("poison");
        }));
        assert!(state.is_poisoned());

        let mut guard = lock_state(&state, "UserMapper", "recover");
        guard.push(2);
        assert_eq!(*guard, vec![1, 2]);
    }
}
