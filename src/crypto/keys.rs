use ed25519_dalek::{PublicKey as EdPublicKey, SecretKey as EdSecretKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Key generation failed: {0}")]
    GenerationFailed(String),

    #[error("Key decoding failed: {0}")]
    DecodingFailed(String),
}

/// Ed25519 public key of a BrightID identity.
#[derive(Clone, Copy)]
pub struct PublicKey {
    key: EdPublicKey,
}

impl PublicKey {
    /// Returns the underlying ed25519 verifying key
    pub fn signing_key(&self) -> &EdPublicKey {
        &self.key
    }

    /// Raw 32 byte representation
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.key.as_bytes()
    }

    /// Lowercase hex form, as sent to the node
    pub fn to_hex(&self) -> String {
        hex::encode(self.key.as_bytes())
    }

    /// Parses a public key from a byte slice
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let key = EdPublicKey::from_bytes(bytes)
            .map_err(|e| KeyError::DecodingFailed(e.to_string()))?;
        Ok(Self { key })
    }

    /// Parses a public key from its hex form
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s).map_err(|e| KeyError::DecodingFailed(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}...)", hex::encode(&self.key.as_bytes()[0..4]))
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.key.as_bytes() == other.key.as_bytes()
    }
}

impl Eq for PublicKey {}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Ed25519 secret key. Held for the local user and, for connections created
/// through the debug tooling, for the fake peer as well.
pub struct SecretKey {
    key: EdSecretKey,
}

// ed25519_dalek::SecretKey 不实现 Clone，从字节重建
impl Clone for SecretKey {
    fn clone(&self) -> Self {
        let key = EdSecretKey::from_bytes(self.key.as_bytes())
            .expect("32 byte secret key is always valid");
        Self { key }
    }
}

impl SecretKey {
    /// Returns the underlying ed25519 secret key
    pub fn signing_key(&self) -> &EdSecretKey {
        &self.key
    }

    /// Derives the matching public key
    pub fn public_key(&self) -> PublicKey {
        PublicKey { key: EdPublicKey::from(&self.key) }
    }

    /// Parses a secret key from a byte slice
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let key = EdSecretKey::from_bytes(bytes)
            .map_err(|e| KeyError::DecodingFailed(e.to_string()))?;
        Ok(Self { key })
    }

    fn to_hex(&self) -> String {
        hex::encode(self.key.as_bytes())
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey {{ <redacted> }}")
    }
}

impl PartialEq for SecretKey {
    fn eq(&self, other: &Self) -> bool {
        self.key.as_bytes() == other.key.as_bytes()
    }
}

// 私钥按十六进制字符串序列化，仅用于本地持久化
impl Serialize for SecretKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for SecretKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        Self::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

/// Public/secret key pair of an identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyPair {
    pub public: PublicKey,
    pub secret: SecretKey,
}

impl KeyPair {
    /// Generates a new random key pair
    pub fn generate() -> Result<Self, KeyError> {
        // ed25519-dalek 1.x 依赖旧版 rand_core，这里直接生成种子
        let mut seed = [0u8; 32];
        rand::Rng::fill(&mut rand::thread_rng(), &mut seed);

        let secret = SecretKey::from_bytes(&seed)
            .map_err(|e| KeyError::GenerationFailed(e.to_string()))?;

        Ok(Self::from_secret(secret))
    }

    /// Creates a key pair from an existing secret key
    pub fn from_secret(secret: SecretKey) -> Self {
        Self {
            public: secret.public_key(),
            secret,
        }
    }
}
