mod coordinator;
mod merge;
mod notifications;

pub use coordinator::{RefreshReport, RefreshStatus, Stage, StageFailure, SyncCoordinator, SyncError};
pub use merge::merge_connections;
pub use notifications::{derive_notifications, DEFAULT_RECOVERY_THRESHOLD};

/*
 * Reconciliation of local state with the node
 * 
 * One refresh cycle fetches verifications, memberships (unless local
 * operations are pending), both connection directions and the profile,
 * merges the connection views and publishes each result to the state
 * store. Failures are logged and reported, never raised.
 */
