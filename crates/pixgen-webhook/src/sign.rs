//! Webhook payload signing
//!
//! The signature is an HMAC-SHA256 over the exact request body bytes,
//! hex-encoded. Signing the bytes that go on the wire means the
//! verifier never has to reproduce our JSON serialization.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the payload signature
pub const SIGNATURE_HEADER: &str = "x-pixgen-signature";

/// Hex-encoded HMAC-SHA256 of `body` under `secret`
pub fn sign(secret: &[u8], body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time comparison of a received signature against the body.
///
/// The worker only ever signs; verification happens in the backend
/// receiving the callbacks. This is the reference implementation of
/// that check, kept here so integration tests and Rust-side receivers
/// agree with [`sign`] on the contract.
pub fn verify(secret: &[u8], body: &[u8], signature: &str) -> bool {
    let Ok(received) = hex::decode(signature) else {
        return false;
    };
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(body);
    mac.verify_slice(&received).is_ok()
}
