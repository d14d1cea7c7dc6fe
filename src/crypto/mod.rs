mod keys;
mod signing;

pub use keys::{KeyPair, PublicKey, SecretKey, KeyError};
pub use signing::{sign, sign_hex, verify, verify_hex, hash_message, SignatureError};

/*
 * Cryptography module for the BrightID client core
 * 
 * Ed25519 keys identify the local user (and debug-created fake peers);
 * every operation sent to the node carries a detached signature over its
 * canonical JSON body.
 */
