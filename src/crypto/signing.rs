use crate::crypto::{PublicKey, SecretKey};
use ed25519_dalek::{ExpandedSecretKey, Signature, Verifier};
use std::convert::TryFrom;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SignatureError {
    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    #[error("Invalid signature encoding: {0}")]
    InvalidEncoding(String),
}

/// 使用私钥签名消息
pub fn sign(secret_key: &SecretKey, message: &[u8]) -> Vec<u8> {
    let expanded_key = ExpandedSecretKey::from(secret_key.signing_key());
    let public_key = secret_key.public_key();

    expanded_key.sign(message, public_key.signing_key()).to_bytes().to_vec()
}

/// 签名并返回十六进制编码，节点接口使用此格式
pub fn sign_hex(secret_key: &SecretKey, message: &[u8]) -> String {
    hex::encode(sign(secret_key, message))
}

/// 使用公钥验证签名
pub fn verify(public_key: &PublicKey, message: &[u8], signature: &[u8]) -> Result<(), SignatureError> {
    if signature.len() != 64 {
        return Err(SignatureError::VerificationFailed("Invalid signature length".to_string()));
    }

    let sig = Signature::try_from(signature)
        .map_err(|e| SignatureError::InvalidEncoding(e.to_string()))?;

    public_key.signing_key().verify(message, &sig)
        .map_err(|e| SignatureError::VerificationFailed(e.to_string()))
}

/// 验证十六进制编码的签名
pub fn verify_hex(public_key: &PublicKey, message: &[u8], signature: &str) -> Result<(), SignatureError> {
    let bytes = hex::decode(signature)
        .map_err(|e| SignatureError::InvalidEncoding(e.to_string()))?;
    verify(public_key, message, &bytes)
}

/// 生成消息摘要（哈希）
pub fn hash_message(message: &[u8]) -> Vec<u8> {
    let digest = ring::digest::digest(&ring::digest::SHA256, message);
    digest.as_ref().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    #[test]
    fn test_sign_verify() {
        let keypair = KeyPair::generate().unwrap();
        let message = b"Connect alice bob just met";

        let signature = sign(&keypair.secret, message);
        assert!(verify(&keypair.public, message, &signature).is_ok());

        // 更改消息应导致验证失败
        let altered = b"Connect alice bob recovery";
        assert!(verify(&keypair.public, altered, &signature).is_err());
    }

    #[test]
    fn test_sign_verify_hex() {
        let keypair = KeyPair::generate().unwrap();
        let other = KeyPair::generate().unwrap();
        let message = b"payload";

        let signature = sign_hex(&keypair.secret, message);
        assert!(verify_hex(&keypair.public, message, &signature).is_ok());
        assert!(verify_hex(&other.public, message, &signature).is_err());
        assert!(verify_hex(&keypair.public, message, "abcd").is_err());
    }

    #[test]
    fn test_hash_is_sha256() {
        assert_eq!(
            hex::encode(hash_message(b"")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
