use crate::crypto::{hash_message, PublicKey};
use crate::identity::Verification;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum UserError {
    #[error("Display name must not be empty")]
    EmptyName,
}

/// Identifier of a BrightID identity, as used by the node
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Derives a user ID from a public key
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        let digest = hash_message(public_key.as_bytes());
        Self(hex::encode(&digest[..20]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The local user of this client.
///
/// Verifications and sponsorship mirror what the node reports and are only
/// written by the sync coordinator. Name and photo are user edits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// The user's ID
    pub id: UserId,

    /// The user's display name
    pub name: String,

    /// Reference to the stored profile photo (file name)
    pub photo: Option<String>,

    /// Legacy backup password reference
    pub password: Option<String>,

    /// Verifications held by the user, keyed by verification name
    pub verifications: HashMap<String, Verification>,

    /// Whether the node reports this user as sponsored
    pub sponsored: bool,
}

impl User {
    /// Creates a new local user
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            photo: None,
            password: None,
            verifications: HashMap::new(),
            sponsored: false,
        }
    }

    /// Changes the display name. Surrounding whitespace is dropped.
    pub fn set_name(&mut self, name: &str) -> Result<(), UserError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(UserError::EmptyName);
        }
        self.name = name.to_string();
        Ok(())
    }

    /// Points the profile at a new photo file
    pub fn set_photo(&mut self, filename: impl Into<String>) {
        self.photo = Some(filename.into());
    }

    /// Replaces the verification set with the node's view
    pub fn set_verifications(&mut self, verifications: Vec<Verification>) {
        self.verifications = verifications
            .into_iter()
            .map(|v| (v.name.clone(), v))
            .collect();
    }

    pub fn has_verification(&self, name: &str) -> bool {
        self.verifications.contains_key(name)
    }

    /// Verification names in lexical order
    pub fn verification_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.verifications.keys().cloned().collect();
        names.sort();
        names
    }
}
