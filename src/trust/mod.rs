//! Trust mutations on single connections.
//!
//! Both [`TrustLevelStateMachine`] and [`FlaggingEngine`] submit a signed
//! operation first and only touch the local connection once the node has
//! accepted it. [`compute_overlap`] is the read-only view used before
//! deciding how far to trust a peer.

mod flagging;
mod level;
mod overlap;

pub use flagging::{FlagError, FlagOutcome, FlaggingConfig, FlaggingEngine};
pub use level::{TrustError, TrustLevelStateMachine, TrustTransition};
pub use overlap::{compute_overlap, fetch_overlap, MutualOverlap};
