//! Owning-thread enforcement for render-thread-only state

use std::thread::{self, ThreadId};

/// Remembers the thread that created a value and rejects use from any other
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ThreadRestricted {
    owner: ThreadId,
}

impl ThreadRestricted {
    /// Bind to the calling thread
    pub(crate) fn current() -> Self {
        Self { owner: thread::current().id() }
    }

    /// Panic unless called on the owning thread
    #[track_caller]
    pub(crate) fn assert_owner(&self, operation: &str) {
        let current = thread::current().id();
        assert!(
            current == self.owner,
            "{} called from thread {:?}, but the scene graph belongs to thread {:?}",
            operation,
            current,
            self.owner
        );
    }

    /// Whether the calling thread is the owner
    pub(crate) fn is_owner(&self) -> bool {
        thread::current().id() == self.owner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_thread_passes() {
        let restricted = ThreadRestricted::current();
        assert!(restricted.is_owner());
        restricted.assert_owner("test");
    }

    #[test]
    fn test_other_thread_panics() {
        let restricted = ThreadRestricted::current();
        let result = thread::spawn(move || restricted.assert_owner("test")).join();
        assert!(result.is_err());
    }
}
