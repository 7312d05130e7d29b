//! Core traits
//!
//! Keep them simple. The publisher only needs to know how important a message
//! is; everything else about the message stays opaque to the core crate.

/// Scores a message for the outbound buffer
///
/// Higher scores are more important: they are delivered first and evicted
/// last. Implementations must be pure and deterministic; the same message
/// must always produce the same score.
pub trait Prioritizer<M: ?Sized>: Send + Sync {
    /// Priority score for `message`
    fn score(&self, message: &M) -> i64;
}

/// Closures work as prioritizers, handy for tests and one-off policies
impl<M: ?Sized, F> Prioritizer<M> for F
where
    F: Fn(&M) -> i64 + Send + Sync,
{
    fn score(&self, message: &M) -> i64 {
        self(message)
    }
}

/// Every message is equally important; the buffer degrades to LIFO by insertion
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatPrioritizer;

impl<M: ?Sized> Prioritizer<M> for FlatPrioritizer {
    fn score(&self, _message: &M) -> i64 {
        0
    }
}
