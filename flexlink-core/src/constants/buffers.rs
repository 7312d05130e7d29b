//! Buffer Sizes
//!
//! Capacity limits for the in-memory outbound message buffer.

// ===== OUTBOUND BUFFER =====

/// Default number of messages held while waiting for delivery.
///
/// Sized for a gateway that may lose its uplink for several minutes:
/// - 10,000 messages × ~200 bytes/message JSON = ~2MB
/// - At 10 readings/second that covers roughly 16 minutes of outage
/// - Beyond this, the lowest-priority messages are evicted first
///
/// Source: field deployments of the device SDK
pub const DEFAULT_BUFFER_CAPACITY: usize = 10_000;

/// Smallest usable capacity.
pub const MIN_BUFFER_CAPACITY: usize = 1;
