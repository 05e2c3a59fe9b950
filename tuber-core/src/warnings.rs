//! Scoped warning capture.
//!
//! Host methods report warnings with [`warn`]; the dispatcher installs a
//! [`WarningScope`] around each invocation so that the warnings land on
//! that call's response record and nowhere else. Scopes are thread-local
//! and nest like a stack, so concurrent dispatches on different threads
//! never observe each other's warnings, and dropping a scope always
//! restores the previous capture state.

use std::cell::RefCell;

thread_local! {
    static SCOPES: RefCell<Vec<Vec<String>>> = const { RefCell::new(Vec::new()) };
}

/// Report a warning from inside a host method.
///
/// Outside any capture scope the message goes to the log instead of being
/// silently dropped.
pub fn warn(message: impl Into<String>) {
    let message = message.into();
    let captured = SCOPES.with(|scopes| {
        if let Some(top) = scopes.borrow_mut().last_mut() {
            top.push(message.clone());
            true
        } else {
            false
        }
    });
    if !captured {
        log::warn!("{message}");
    }
}

/// A scoped warning buffer. Created before a method invocation; consumed
/// with [`WarningScope::take`] afterwards. Dropping the scope without
/// taking it discards its warnings and restores the outer scope.
#[derive(Debug)]
pub struct WarningScope {
    taken: bool,
}

impl WarningScope {
    #[allow(clippy::new_without_default)]
    pub fn new() -> WarningScope {
        SCOPES.with(|scopes| scopes.borrow_mut().push(Vec::new()));
        WarningScope { taken: false }
    }

    /// End the scope and return the warnings captured inside it.
    pub fn take(mut self) -> Vec<String> {
        self.taken = true;
        SCOPES.with(|scopes| scopes.borrow_mut().pop()).unwrap_or_default()
    }
}

impl Drop for WarningScope {
    fn drop(&mut self) {
        if !self.taken {
            SCOPES.with(|scopes| {
                scopes.borrow_mut().pop();
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_within_scope() {
        let scope = WarningScope::new();
        warn("first");
        warn("second");
        assert_eq!(scope.take(), vec!["first", "second"]);
    }

    #[test]
    fn scopes_are_isolated() {
        let outer = WarningScope::new();
        warn("outer");
        {
            let inner = WarningScope::new();
            warn("inner");
            assert_eq!(inner.take(), vec!["inner"]);
        }
        assert_eq!(outer.take(), vec!["outer"]);
    }

    #[test]
    fn drop_restores_previous_scope() {
        let outer = WarningScope::new();
        {
            let _inner = WarningScope::new();
            warn("discarded");
        }
        warn("kept");
        assert_eq!(outer.take(), vec!["kept"]);
    }

    #[test]
    fn threads_do_not_share_scopes() {
        let scope = WarningScope::new();
        std::thread::spawn(|| {
            // no scope on this thread; goes to the log
            warn("elsewhere");
        })
        .join()
        .expect("thread panicked");
        assert!(scope.take().is_empty());
    }
}
