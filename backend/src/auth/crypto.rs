//! Stellar signature verification
//!
//! Verifies ed25519 signatures from Stellar wallets.

use base32::Alphabet;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use thiserror::Error;

/// Version byte of an ed25519 account id (renders as 'G').
const ACCOUNT_ID_VERSION: u8 = 6 << 3;

/// Errors that can occur during signature verification
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Invalid Stellar address format: {0}")]
    InvalidAddressFormat(String),

    #[error("Invalid address checksum")]
    InvalidChecksum,

    #[error("Invalid signature format: {0}")]
    InvalidSignatureFormat(String),

    #[error("Signature verification failed")]
    VerificationFailed,

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),
}

/// Verify a Stellar wallet signature
///
/// # Arguments
/// * `public_key` - Stellar G-address (e.g., "GABC...")
/// * `message` - The message that was signed
/// * `signature_base64` - Base64-encoded signature (standard or URL-safe)
pub fn verify_stellar_signature(
    public_key: &str,
    message: &str,
    signature_base64: &str,
) -> Result<(), CryptoError> {
    let public_key_bytes = decode_stellar_public_key(public_key)?;

    let signature_bytes = decode_signature(signature_base64)?;

    // Parse the ed25519 signature (64 bytes)
    let signature = Signature::from_slice(&signature_bytes)
        .map_err(|e| CryptoError::InvalidSignatureFormat(e.to_string()))?;

    let verifying_key = VerifyingKey::from_bytes(&public_key_bytes)
        .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;

    verifying_key
        .verify(message.as_bytes(), &signature)
        .map_err(|_| CryptoError::VerificationFailed)
}

/// Whether `address` is a well-formed Stellar account id
pub fn is_stellar_address(address: &str) -> bool {
    decode_stellar_public_key(address).is_ok()
}

/// Decode a Stellar public key from G-address format
///
/// Stellar addresses are base32-encoded with a version byte prefix
/// and a 2-byte CRC16 checksum at the end.
pub fn decode_stellar_public_key(address: &str) -> Result<[u8; 32], CryptoError> {
    if !address.starts_with('G') {
        return Err(CryptoError::InvalidAddressFormat(
            "Stellar public keys must start with 'G'".to_string(),
        ));
    }

    // Stellar uses RFC 4648 base32 without padding
    let decoded = base32::decode(Alphabet::Rfc4648 { padding: false }, address)
        .ok_or_else(|| CryptoError::InvalidAddressFormat("Invalid base32 encoding".to_string()))?;

    // 1 version byte + 32 key bytes + 2 checksum bytes
    if decoded.len() != 35 {
        return Err(CryptoError::InvalidAddressFormat(format!(
            "Expected 35 bytes, got {}",
            decoded.len()
        )));
    }
    if decoded[0] != ACCOUNT_ID_VERSION {
        return Err(CryptoError::InvalidAddressFormat(
            "Not an account id".to_string(),
        ));
    }

    let payload = &decoded[..33];
    let checksum = &decoded[33..35];
    if checksum != crc16_xmodem(payload) {
        return Err(CryptoError::InvalidChecksum);
    }

    let mut public_key = [0u8; 32];
    public_key.copy_from_slice(&decoded[1..33]);

    Ok(public_key)
}

/// Encode an ed25519 public key as a Stellar G-address
pub fn encode_stellar_public_key(public_key: &[u8; 32]) -> String {
    let mut payload = Vec::with_capacity(35);
    payload.push(ACCOUNT_ID_VERSION);
    payload.extend_from_slice(public_key);
    let checksum = crc16_xmodem(&payload);
    payload.extend_from_slice(&checksum);

    base32::encode(Alphabet::Rfc4648 { padding: false }, &payload)
}

/// Calculate CRC16-XModem checksum (used by Stellar)
fn crc16_xmodem(data: &[u8]) -> [u8; 2] {
    let mut crc: u16 = 0;

    for byte in data {
        crc ^= (*byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }

    // Little-endian byte order
    crc.to_le_bytes()
}

/// Wallets differ in which base64 alphabet they emit
fn decode_signature(encoded: &str) -> Result<Vec<u8>, CryptoError> {
    let encoded = encoded.trim();
    STANDARD
        .decode(encoded)
        .or_else(|_| URL_SAFE_NO_PAD.decode(encoded.trim_end_matches('=')))
        .map_err(|e| CryptoError::InvalidSignatureFormat(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    fn keypair() -> (SigningKey, String) {
        let signing_key = SigningKey::from_bytes(&[7u8; 32]);
        let address = encode_stellar_public_key(&signing_key.verifying_key().to_bytes());
        (signing_key, address)
    }

    #[test]
    fn test_encoded_address_round_trips() {
        let (signing_key, address) = keypair();
        assert!(address.starts_with('G'));
        assert_eq!(address.len(), 56);
        assert_eq!(
            decode_stellar_public_key(&address).unwrap(),
            signing_key.verifying_key().to_bytes()
        );
    }

    #[test]
    fn test_invalid_address_format() {
        let (_, address) = keypair();
        let secret_like = format!("S{}", &address[1..]);
        assert!(matches!(
            decode_stellar_public_key(&secret_like),
            Err(CryptoError::InvalidAddressFormat(_))
        ));
        assert!(!is_stellar_address("GABC"));
    }

    #[test]
    fn test_corrupted_checksum_rejected() {
        let (_, address) = keypair();
        let mut chars: Vec<char> = address.chars().collect();
        let last = chars.len() - 2;
        chars[last] = if chars[last] == 'A' { 'B' } else { 'A' };
        let corrupted: String = chars.into_iter().collect();

        assert!(decode_stellar_public_key(&corrupted).is_err());
    }

    #[test]
    fn test_verify_signature() {
        let (signing_key, address) = keypair();
        let message = "Sign this message to authenticate with Homeward";
        let signature = signing_key.sign(message.as_bytes());

        let standard = STANDARD.encode(signature.to_bytes());
        assert!(verify_stellar_signature(&address, message, &standard).is_ok());

        let url_safe = URL_SAFE_NO_PAD.encode(signature.to_bytes());
        assert!(verify_stellar_signature(&address, message, &url_safe).is_ok());

        assert!(matches!(
            verify_stellar_signature(&address, "another message", &standard),
            Err(CryptoError::VerificationFailed)
        ));
    }

    #[test]
    fn test_crc16_xmodem() {
        // Reference value for the ASCII digits 1..9
        assert_eq!(crc16_xmodem(b"123456789"), 0x31c3u16.to_le_bytes());
    }
}
