use crate::identity::{Connection, TrustLevel, UserId};
use std::collections::HashMap;

/// Merges the two directional connection lists into the local peer view.
///
/// The result has exactly the outbound entries in outbound order. Each entry
/// gets `incoming_level` from the inbound entry with the same id, or none if
/// that peer has not connected back. Inbound-only peers are dropped.
pub fn merge_connections(outbound: Vec<Connection>, inbound: &[Connection]) -> Vec<Connection> {
    let incoming: HashMap<&UserId, TrustLevel> = inbound
        .iter()
        .map(|conn| (&conn.id, conn.level))
        .collect();

    outbound
        .into_iter()
        .map(|mut conn| {
            conn.incoming_level = incoming.get(&conn.id).copied();
            conn
        })
        .collect()
}
