mod pending;
mod store;

pub use pending::{OperationKind, PendingOperation, PendingOperations};
pub use store::{Notification, Snapshot, StateStore};

/*
 * Published client state
 * 
 * A single snapshot store shared by the sync coordinator (full replaces)
 * and the trust components (single-connection updates after the node
 * confirms), plus the pending operation counter that suppresses membership
 * overwrites.
 */
