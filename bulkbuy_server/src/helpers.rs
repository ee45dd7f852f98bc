use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Calculate the base64-encoded HMAC-SHA256 signature for `data` using `secret`.
/// This matches the signature scheme PayGate uses for webhook payloads, and is also
/// used to sign WebSocket access tokens.
pub fn calculate_hmac(secret: &str, data: &[u8]) -> String {
    // HMAC can take a key of any size, so new_from_slice never fails
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap_or_else(|_| unreachable!());
    mac.update(data);
    base64::encode(mac.finalize().into_bytes())
}
