use crate::keep_alive::keep_alive;

/// Keeps its value alive when dropped, on every exit path.
struct KeepAliveOnExit<'a, T>(&'a T);

impl<T> Drop for KeepAliveOnExit<'_, T> {
    fn drop(&mut self) {
        keep_alive(self.0);
    }
}

/// Evaluates `f()` and returns its result, ensuring that `value` is not
/// destroyed before `f` returns.
///
/// `value` is kept alive after `f` has finished, also when `f` panics, and
/// dropped only after that.
///
/// ```
/// use keepalive::with_extended_lifetime;
/// use std::{
///     ffi::{CStr, CString},
///     rc::Rc,
/// };
///
/// let shared: Rc<CStr> = CString::new("hello").unwrap().into();
/// let ptr = shared.as_ptr();
/// let len = with_extended_lifetime(shared, || {
///     // SAFETY: `shared` is alive until the closure returns.
///     unsafe { CStr::from_ptr(ptr) }.to_bytes().len()
/// });
/// assert_eq!(len, 5);
/// ```
pub fn with_extended_lifetime<T, R>(value: T, f: impl FnOnce() -> R) -> R {
    let fix = KeepAliveOnExit(&value);
    let result = f();
    drop(fix);
    result
}

/// Evaluates `f(&value)` and returns its result, ensuring that `value` is not
/// destroyed before `f` returns.
///
/// Same guarantees as [`with_extended_lifetime`].
pub fn with_extended_lifetime_of<T, R>(value: T, f: impl FnOnce(&T) -> R) -> R {
    let fix = KeepAliveOnExit(&value);
    let result = f(&value);
    drop(fix);
    result
}
