use std::sync::atomic::{compiler_fence, Ordering};

/// Uses `value` right here.
///
/// Everything sequenced before this call, including accesses through raw
/// pointers derived from `value`, happens while `value` is still alive.
/// Not inlined so the use survives into the caller as a real call.
#[inline(never)]
pub(crate) fn keep_alive<T: ?Sized>(value: &T) {
    compiler_fence(Ordering::SeqCst);
    std::hint::black_box(value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn does_not_release() {
        let value = Rc::new(7u32);
        let weak = Rc::downgrade(&value);
        keep_alive(&value);
        assert_eq!(Rc::strong_count(&value), 1);
        assert_eq!(weak.upgrade().as_deref(), Some(&7));
    }

    #[test]
    fn unsized_values() {
        let slice: &[u8] = b"abc";
        keep_alive(slice);
        keep_alive("str");
        keep_alive(&[Rc::new(1), Rc::new(2)][..]);
    }
}
