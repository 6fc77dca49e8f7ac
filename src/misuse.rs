//! Detection of a broken discharge obligation.
//!
//! A [`LifetimeGuard`](crate::LifetimeGuard) that is dropped without being
//! discharged has already released its handles too early, so the default
//! reaction is fatal: the diagnostic is logged and the process is aborted.
//! Tests and embedders can intercept the violation with a per-thread hook.

use getset::CopyGetters;
use log::*;
use std::{cell::RefCell, fmt, panic::Location, rc::Rc};

/// Receives discharge violations raised on the current thread.
pub type MisuseHook = Rc<dyn Fn(&DischargeViolation)>;

thread_local! {
    static HOOK: RefCell<Option<MisuseHook>> = const { RefCell::new(None) };
}

/// A lifetime guard was dropped without `discharge`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct DischargeViolation {
    /// Where the guard was created.
    location: &'static Location<'static>,
    /// Number of handles the guard was holding.
    managed: usize,
}

impl DischargeViolation {
    pub(crate) fn new(location: &'static Location<'static>, managed: usize) -> Self {
        Self { location, managed }
    }
}

impl fmt::Display for DischargeViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LifetimeGuard created at {} was dropped without discharge() while holding {} handle(s)",
            self.location, self.managed
        )
    }
}

impl std::error::Error for DischargeViolation {}

/// Installs `hook` for the current thread, returns previous one.
pub fn set_misuse_hook(hook: MisuseHook) -> Option<MisuseHook> {
    replace_hook(Some(hook))
}

/// Removes the hook of the current thread, restoring the fatal default.
pub fn take_misuse_hook() -> Option<MisuseHook> {
    replace_hook(None)
}

/// Runs `f` with `hook` installed on the current thread.
///
/// The previous hook is restored on every exit path of `f`, unwinding included.
pub fn with_misuse_hook<R>(
    hook: impl Fn(&DischargeViolation) + 'static,
    f: impl FnOnce() -> R,
) -> R {
    struct Restore(Option<MisuseHook>);

    impl Drop for Restore {
        fn drop(&mut self) {
            replace_hook(self.0.take());
        }
    }

    let _restore = Restore(set_misuse_hook(Rc::new(hook)));
    f()
}

fn replace_hook(hook: Option<MisuseHook>) -> Option<MisuseHook> {
    HOOK.try_with(|slot| std::mem::replace(&mut *slot.borrow_mut(), hook))
        .ok()
        .flatten()
}

/// Routes `violation` to the hook of this thread or, if there is none, to the fatal default.
pub(crate) fn report(violation: DischargeViolation) {
    // Cloned out so the hook is free to replace itself.
    let hook = HOOK
        .try_with(|slot| slot.borrow().clone())
        .ok()
        .flatten();
    match hook {
        Some(hook) => hook(&violation),
        None => fatal(&violation),
    }
}

fn fatal(violation: &DischargeViolation) -> ! {
    error!("{}", violation);
    if cfg!(feature = "panic-on-misuse") && !std::thread::panicking() {
        panic!("{}", violation);
    }
    std::process::abort()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[track_caller]
    fn violation(managed: usize) -> DischargeViolation {
        DischargeViolation::new(Location::caller(), managed)
    }

    #[test]
    fn display_names_location() {
        let violation = violation(3);
        let text = violation.to_string();
        assert!(text.contains(file!()), "{}", text);
        assert!(text.contains("3 handle(s)"), "{}", text);
        assert_eq!(violation.managed(), 3);
        assert_eq!(violation.location().file(), file!());
    }

    #[test]
    fn hook_receives_violation() {
        let seen = Rc::new(Cell::new(0));
        let counter = seen.clone();
        with_misuse_hook(
            move |violation| counter.set(counter.get() + violation.managed()),
            || {
                report(violation(2));
                report(violation(5));
            },
        );
        assert_eq!(seen.get(), 7);
    }

    #[test]
    fn hook_is_restored() {
        let outer = Rc::new(Cell::new(0));
        let inner = Rc::new(Cell::new(0));
        let (o, i) = (outer.clone(), inner.clone());
        with_misuse_hook(
            move |_| o.set(o.get() + 1),
            || {
                with_misuse_hook(move |_| i.set(i.get() + 1), || report(violation(0)));
                report(violation(0));
            },
        );
        assert_eq!(outer.get(), 1);
        assert_eq!(inner.get(), 1);
        assert!(take_misuse_hook().is_none());
    }

    #[test]
    fn hook_is_restored_on_panic() {
        let result = std::panic::catch_unwind(|| {
            with_misuse_hook(|_| (), || panic!("operation failed"));
        });
        assert!(result.is_err());
        assert!(take_misuse_hook().is_none());
    }

    #[test]
    fn set_returns_previous() {
        let first: MisuseHook = Rc::new(|_: &DischargeViolation| ());
        assert!(set_misuse_hook(first.clone()).is_none());
        let previous =
            set_misuse_hook(Rc::new(|_: &DischargeViolation| ())).expect("hook was set");
        assert!(Rc::ptr_eq(&previous, &first));
        assert!(take_misuse_hook().is_some());
        assert!(take_misuse_hook().is_none());
    }

    #[cfg(feature = "panic-on-misuse")]
    #[test]
    #[should_panic(expected = "dropped without discharge")]
    fn default_panics_after_take() {
        set_misuse_hook(Rc::new(|_: &DischargeViolation| ()));
        assert!(take_misuse_hook().is_some());
        report(violation(1));
    }

    #[cfg(feature = "panic-on-misuse")]
    #[test]
    fn default_panic_names_location() {
        let payload = std::panic::catch_unwind(|| report(violation(4))).unwrap_err();
        let message = payload
            .downcast_ref::<String>()
            .expect("formatted panic message");
        assert!(message.contains(file!()), "{}", message);
        assert!(message.contains("4 handle(s)"), "{}", message);
    }
}
