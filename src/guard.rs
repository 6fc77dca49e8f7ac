use crate::{
    keep_alive::keep_alive,
    misuse::{self, DischargeViolation},
};
use log::*;
use std::{fmt, ops::Deref, panic::Location, rc::Rc, sync::Arc};

/// Handle whose `Deref` target doesn't move when the handle itself is moved.
///
/// # Safety
/// Moving the handle must neither move nor free its target, nor assert unique
/// ownership over it. The latter rules out `Box` and anything built on it,
/// such as `CString`. Use `CString::into_bytes_with_nul` to retain a C string.
pub unsafe trait StableDeref: Deref {}

unsafe impl<T: ?Sized> StableDeref for Rc<T> {}
unsafe impl<T: ?Sized> StableDeref for Arc<T> {}
unsafe impl<T> StableDeref for Vec<T> {}
unsafe impl StableDeref for String {}

/// Anything that can be retained.
trait Handle {}

impl<T: ?Sized> Handle for T {}

/// Keeps the handles added to it alive until [`discharge`](Self::discharge).
///
/// Intended for marshaling several values into raw pointers for a foreign call,
/// when the set of values is discovered one at a time.
///
/// It's absolutely necessary to call `discharge`. Forgetting to do so won't
/// leak the handles, instead they will be released earlier than expected, which
/// is why dropping an undischarged guard goes through the fatal
/// [misuse path](crate::misuse).
///
/// ```
/// use keepalive::LifetimeGuard;
/// use std::rc::Rc;
///
/// let mut guard = LifetimeGuard::new();
/// let a = guard.add_ptr(Rc::new(1u32));
/// let b = guard.add_ptr(String::from("two"));
/// // SAFETY: Both are retained by the guard.
/// unsafe {
///     assert_eq!(*a, 1);
///     assert_eq!(&*b, "two");
/// }
/// guard.discharge();
/// ```
///
/// Discharge consumes the guard so it can't be discharged twice,
///
/// ```compile_fail
/// let mut guard = keepalive::LifetimeGuard::new();
/// guard.add(1u32);
/// guard.discharge();
/// guard.discharge();
/// ```
///
/// nor extended once discharged.
///
/// ```compile_fail
/// let mut guard = keepalive::LifetimeGuard::new();
/// guard.discharge();
/// guard.add(1u32);
/// ```
///
/// Guards belong to the thread that created them.
///
/// ```compile_fail
/// fn send<T: Send>(_: T) {}
/// send(keepalive::LifetimeGuard::new());
/// ```
#[must_use = "LifetimeGuard must be discharged"]
pub struct LifetimeGuard<'a> {
    managed: Vec<Box<dyn Handle + 'a>>,
    discharged: bool,
    location: &'static Location<'static>,
}

impl<'a> LifetimeGuard<'a> {
    #[track_caller]
    pub fn new() -> Self {
        Self {
            managed: Vec::new(),
            discharged: false,
            location: Location::caller(),
        }
    }

    /// Retains `handle` until discharge.
    pub fn add<T: 'a>(&mut self, handle: T) {
        self.managed.push(Box::new(handle));
    }

    /// Retains `handle` until discharge and returns pointer to its target.
    ///
    /// The pointer is valid until `discharge` is called.
    pub fn add_ptr<P: StableDeref + 'a>(&mut self, handle: P) -> *const P::Target {
        let ptr: *const P::Target = &*handle;
        self.add(handle);
        ptr
    }

    /// Number of retained handles.
    pub fn len(&self) -> usize {
        self.managed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.managed.is_empty()
    }

    /// Ends the forced lifetime extension.
    ///
    /// All of the retained handles are alive up to this call and released right after it.
    pub fn discharge(mut self) {
        keep_alive(self.managed.as_slice());
        self.discharged = true;
        trace!(
            "Discharged LifetimeGuard from {} with {} handle(s)",
            self.location,
            self.managed.len()
        );
    }
}

impl Default for LifetimeGuard<'_> {
    #[track_caller]
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T: 'a> Extend<T> for LifetimeGuard<'a> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for handle in iter {
            self.add(handle);
        }
    }
}

impl fmt::Debug for LifetimeGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifetimeGuard")
            .field("managed", &self.managed.len())
            .field("discharged", &self.discharged)
            .field("location", &self.location)
            .finish()
    }
}

impl Drop for LifetimeGuard<'_> {
    fn drop(&mut self) {
        if !self.discharged {
            misuse::report(DischargeViolation::new(self.location, self.managed.len()));
        }
    }
}
