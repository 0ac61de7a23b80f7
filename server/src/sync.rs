use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the guard if another thread panicked while holding it.
/// Everything guarded in this crate is plain data that stays valid across a panic.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
