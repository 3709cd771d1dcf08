//! Per-thread stack of active targets.
//!
//! Code that needs "the target currently being compiled for" reads the top
//! of this stack with [`Target::current`]. Scopes are entered with
//! [`Target::enter_scope`], whose guard pops the target again when dropped,
//! or with the closure form [`with_target`]. Each thread has its own stack.
//!
//! ```
//! use kiln_target::Target;
//!
//! let cuda = Target::parse("cuda").unwrap();
//! {
//!     let _scope = cuda.enter_scope();
//!     assert!(Target::current(false).unwrap().same_as(&cuda));
//! }
//! assert!(Target::current(true).is_none());
//! ```

use std::cell::RefCell;

use crate::target::Target;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Target>> = const { RefCell::new(Vec::new()) };
}

/// Push `target` onto this thread's stack.
pub fn enter(target: &Target) {
    CONTEXT_STACK.with(|stack| stack.borrow_mut().push(target.clone()));
}

/// Pop `target` off this thread's stack.
///
/// # Panics
///
/// Panics if the stack is empty or its top is not the same object as
/// `target`. Structural equality is not enough.
pub fn exit(target: &Target) {
    CONTEXT_STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        let Some(top) = stack.last() else {
            panic!("Cannot exit target scope {target}: the target context stack is empty");
        };
        assert!(
            top.same_as(target),
            "Cannot exit target scope {target}: the innermost scope is {top}"
        );
        stack.pop();
    });
}

/// Pop `target` if it is on top; used while unwinding.
fn try_exit(target: &Target) -> bool {
    CONTEXT_STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        if stack.last().is_some_and(|top| top.same_as(target)) {
            stack.pop();
            true
        } else {
            false
        }
    })
}

/// Number of targets on this thread's stack.
pub fn depth() -> usize {
    CONTEXT_STACK.with(|stack| stack.borrow().len())
}

/// Run `f` with `target` as the current target.
pub fn with_target<R>(target: &Target, f: impl FnOnce() -> R) -> R {
    let _scope = target.enter_scope();
    f()
}

/// Guard returned by [`Target::enter_scope`]; exits the scope on drop.
#[must_use = "the scope is exited as soon as the guard is dropped"]
#[derive(Debug)]
pub struct TargetScope {
    target: Target,
}

impl TargetScope {
    pub fn target(&self) -> &Target {
        &self.target
    }
}

impl Drop for TargetScope {
    fn drop(&mut self) {
        if std::thread::panicking() {
            try_exit(&self.target);
        } else {
            exit(&self.target);
        }
    }
}

impl Target {
    /// Make this target current until the returned guard is dropped.
    pub fn enter_scope(&self) -> TargetScope {
        enter(self);
        TargetScope {
            target: self.clone(),
        }
    }

    /// The innermost target entered on this thread.
    ///
    /// Returns `None` on an empty stack when `allow_undefined` is set.
    ///
    /// # Panics
    ///
    /// Panics on an empty stack when `allow_undefined` is false.
    pub fn current(allow_undefined: bool) -> Option<Target> {
        let top = CONTEXT_STACK.with(|stack| stack.borrow().last().cloned());
        assert!(
            top.is_some() || allow_undefined,
            "Target context required. Enter a target scope first"
        );
        top
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_scopes() {
        let a = Target::parse("llvm").unwrap();
        let b = Target::parse("cuda").unwrap();
        assert!(Target::current(true).is_none());
        {
            let outer = a.enter_scope();
            assert!(outer.target().same_as(&a));
            {
                let inner = b.enter_scope();
                assert!(Target::current(false).unwrap().same_as(inner.target()));
                assert_eq!(depth(), 2);
            }
            assert!(Target::current(false).unwrap().same_as(&a));
        }
        assert_eq!(depth(), 0);
    }

    #[test]
    fn closure_scope_returns_value() {
        let t = Target::parse("c").unwrap();
        let kind = with_target(&t, || Target::current(false).unwrap().kind().name().to_string());
        assert_eq!(kind, "c");
        assert!(Target::current(true).is_none());
    }

    #[test]
    fn same_target_entered_twice() {
        let t = Target::parse("c").unwrap();
        enter(&t);
        enter(&t);
        exit(&t);
        exit(&t);
        assert_eq!(depth(), 0);
    }

    #[test]
    #[should_panic(expected = "the innermost scope is")]
    fn exit_requires_identity() {
        let a = Target::parse("c").unwrap();
        let a_copy = Target::parse("c").unwrap();
        assert_eq!(a, a_copy);
        enter(&a);
        exit(&a_copy);
    }

    #[test]
    #[should_panic(expected = "the innermost scope is")]
    fn exit_out_of_order() {
        let a = Target::parse("llvm").unwrap();
        let b = Target::parse("cuda").unwrap();
        enter(&a);
        enter(&b);
        exit(&a);
    }

    #[test]
    #[should_panic(expected = "stack is empty")]
    fn exit_on_empty_stack() {
        exit(&Target::parse("c").unwrap());
    }

    #[test]
    #[should_panic(expected = "Target context required")]
    fn current_requires_scope() {
        Target::current(false);
    }

    #[test]
    fn unwinding_pops_scope() {
        let t = Target::parse("c").unwrap();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _scope = t.enter_scope();
            panic!("boom");
        }));
        assert!(result.is_err());
        assert_eq!(depth(), 0);
    }

    #[test]
    fn stacks_are_per_thread() {
        let t = Target::parse("c").unwrap();
        let _scope = t.enter_scope();
        let seen = std::thread::spawn(|| Target::current(true).is_none())
            .join()
            .unwrap();
        assert!(seen);
        assert!(Target::current(false).is_some());
    }
}
