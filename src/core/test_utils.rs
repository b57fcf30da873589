//! Test utilities for arena-based testing.
//!
//! Tests that build dependence graphs need an arena that outlives the
//! session; [`TestContext`](test::TestContext) owns one.

#[cfg(test)]
pub mod test {
    use super::super::session::PacketizerSession;
    use bumpalo::Bump;

    /// Test context that manages arena lifetime for tests.
    pub struct TestContext {
        arena: Bump,
    }

    impl TestContext {
        pub fn new() -> Self {
            Self { arena: Bump::new() }
        }

        /// Create a session using this context's arena.
        ///
        /// The returned session borrows from the TestContext, so the
        /// TestContext must outlive the session.
        pub fn create_session(&self) -> PacketizerSession<'_> {
            PacketizerSession::new(&self.arena)
        }
    }

    impl Default for TestContext {
        fn default() -> Self {
            Self::new()
        }
    }
}
