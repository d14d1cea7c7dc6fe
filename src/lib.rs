//! Client core of a BrightID-style trust graph.
//!
//! Keeps the local user's view of verifications, group memberships and
//! connections in step with a remote identity node, and applies trust level
//! changes and flags to single connections.

pub mod apps;
pub mod cli;
pub mod crypto;
pub mod identity;
pub mod node;
pub mod state;
pub mod storage;
pub mod sync;
pub mod trust;
pub mod utils;
