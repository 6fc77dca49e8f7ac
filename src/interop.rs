//! Marshaling of strings into nul-terminated raw pointers for foreign calls.

use crate::{scope::with_extended_lifetime_of, LifetimeGuard};
use std::{
    ffi::{c_char, CString, NulError},
    mem::ManuallyDrop,
    ops::{Deref, DerefMut},
};

/// Discharges its guard when dropped, on every exit path.
struct DischargeOnExit<'a>(ManuallyDrop<LifetimeGuard<'a>>);

impl<'a> Deref for DischargeOnExit<'a> {
    type Target = LifetimeGuard<'a>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for DischargeOnExit<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl Drop for DischargeOnExit<'_> {
    fn drop(&mut self) {
        // SAFETY: Taken only here, and self isn't used afterwards.
        unsafe { ManuallyDrop::take(&mut self.0) }.discharge();
    }
}

/// Invokes `f` on `s` as a nul-terminated array of chars, ensuring that the
/// array's lifetime extends through the execution of `f`.
///
/// Fails if `s` contains an interior nul.
pub fn with_c_str<R>(s: &str, f: impl FnOnce(*const c_char) -> R) -> Result<R, NulError> {
    let c_string = CString::new(s)?;
    Ok(with_extended_lifetime_of(c_string, |c_string| f(c_string.as_ptr())))
}

/// Invokes `f` on all of `strs` as nul-terminated arrays of chars, in the same
/// order, ensuring that all of them are alive through the execution of `f`.
///
/// Fails on the first string that contains an interior nul, before `f` is called.
pub fn with_c_strs<S: AsRef<str>, R>(
    strs: &[S],
    f: impl FnOnce(&[*const c_char]) -> R,
) -> Result<R, NulError> {
    let mut guard = DischargeOnExit(ManuallyDrop::new(LifetimeGuard::new()));
    let mut ptrs = Vec::with_capacity(strs.len());
    for s in strs {
        // Retained as Vec, moving a CString would invalidate the pointer.
        let bytes = CString::new(s.as_ref())?.into_bytes_with_nul();
        ptrs.push(guard.add_ptr(bytes).cast::<c_char>());
    }
    Ok(f(&ptrs))
}
