pub mod user;
mod connection;
mod group;
mod trust;
mod verification;

pub use user::{User, UserError, UserId};
pub use connection::{Connection, Direction, FlagDisposition};
pub use group::{GroupId, Membership};
pub use trust::{TrustLevel, TrustLevelError};
pub use verification::{Verification, BRIGHTID_VERIFICATION};

/*
 * Identity data model for the BrightID client core
 * 
 * The local user, the peers it is connected to, the groups it belongs to
 * and the verifications the node has issued. Everything here is plain
 * data; reconciliation lives in `sync` and trust changes in `trust`.
 */
