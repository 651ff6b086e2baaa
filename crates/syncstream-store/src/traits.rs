//! Store trait definitions

use crate::{AuditEvent, StoreResult};

/// Main store trait.
///
/// Offers basic durability per operation; there are no transactions across
/// calls, so check-then-write sequences built on top are not atomic.
pub trait Store: Send + Sync {
    // Scalar keys

    /// Read a scalar value
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Write (or overwrite) a scalar value
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    // Hashes

    /// Read one field of a hash
    fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>>;

    /// Write (or overwrite) one field of a hash
    fn hset(&self, key: &str, field: &str, value: &str) -> StoreResult<()>;

    /// Read every field of a hash, in storage order
    fn hgetall(&self, key: &str) -> StoreResult<Vec<(String, String)>>;

    // Audit log

    /// Append an audit event
    fn append_audit(&self, event: AuditEvent) -> StoreResult<()>;

    /// Get recent audit events, newest first
    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>>;

    // Health

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}
