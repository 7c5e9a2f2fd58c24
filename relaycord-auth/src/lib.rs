//! Bearer token parsing and HMAC verification.
//!
//! A token is `base64(user_id) + "." + payload + "." + signature`. Verifying
//! one is a two-step process split across this crate's two public
//! functions, because step 2 (looking up the password hash used as the
//! HMAC key) requires a round trip to the store adapter that this crate has
//! no business knowing about:
//!
//! 1. [`decode_token`] — pure, no I/O. Splits the token and parses the
//!    user id out of its segment.
//! 2. [`verify_signature`] — given the password hash the caller looked up
//!    for that user id, recomputes the HMAC and compares it to the token's
//!    signature segment in constant time.
#![deny(unsafe_code)]

mod error;

pub use error::AuthError;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use relaycord_model::Snowflake;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// A token split into its three segments, with the user id already parsed
/// out of the first one. `signed_message` is segments 0 and 1 rejoined
/// with a `.`, i.e. exactly the bytes the signature was computed over.
#[derive(Debug, Clone)]
pub struct DecodedToken {
    pub user_id: Snowflake,
    signed_message: String,
    signature: Vec<u8>,
}

impl DecodedToken {
    pub fn user_id(&self) -> Snowflake {
        self.user_id
    }
}

/// Split `token` into its three dot-separated segments and parse the user
/// id out of the first one. Does not touch the store or verify anything.
pub fn decode_token(token: &str) -> Result<DecodedToken, AuthError> {
    let mut parts = token.splitn(3, '.');
    let id_segment = parts.next().ok_or(AuthError::Malformed)?;
    let payload = parts.next().ok_or(AuthError::Malformed)?;
    let signature_segment = parts.next().ok_or(AuthError::Malformed)?;
    if parts.next().is_some() {
        return Err(AuthError::Malformed);
    }

    let id_bytes = URL_SAFE_NO_PAD
        .decode(id_segment)
        .map_err(|_| AuthError::BadUserIdEncoding)?;
    let id_str = std::str::from_utf8(&id_bytes).map_err(|_| AuthError::BadUserIdEncoding)?;
    let user_id = id_str
        .parse::<u64>()
        .map_err(|_| AuthError::BadUserIdEncoding)?;

    let signature = URL_SAFE_NO_PAD
        .decode(signature_segment)
        .map_err(|_| AuthError::BadSignatureEncoding)?;

    Ok(DecodedToken {
        user_id: Snowflake::new(user_id),
        signed_message: format!("{id_segment}.{payload}"),
        signature,
    })
}

/// Recompute `HMAC-SHA256(key = password_hash, message = id_segment + "." + payload)`
/// and compare it against `token`'s signature segment in constant time.
/// `password_hash` is whatever opaque secret the store adapter returns for
/// the token's user id — the gateway never derives or stores passwords
/// itself, it only uses the hash as a MAC key.
pub fn verify_signature(token: &DecodedToken, password_hash: &[u8]) -> Result<(), AuthError> {
    let mut mac =
        HmacSha256::new_from_slice(password_hash).expect("HMAC accepts keys of any length");
    mac.update(token.signed_message.as_bytes());
    let expected = mac.finalize().into_bytes();

    if bool::from(expected.ct_eq(&token.signature)) {
        Ok(())
    } else {
        Err(AuthError::BadSignature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(user_id: u64, payload: &str, password_hash: &[u8]) -> String {
        let id_segment = URL_SAFE_NO_PAD.encode(user_id.to_string());
        let mut mac = HmacSha256::new_from_slice(password_hash).unwrap();
        mac.update(format!("{id_segment}.{payload}").as_bytes());
        let sig = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("{id_segment}.{payload}.{sig}")
    }

    #[test]
    fn valid_token_round_trips() {
        let password_hash = b"super-secret-hash";
        let token = sign(12345, "payload-blob", password_hash);

        let decoded = decode_token(&token).unwrap();
        assert_eq!(decoded.user_id(), Snowflake::new(12345));
        verify_signature(&decoded, password_hash).unwrap();
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let password_hash = b"super-secret-hash";
        let mut token = sign(12345, "payload-blob", password_hash);
        token.push('x');

        // either decode fails (bad base64) or the signature plainly mismatches
        match decode_token(&token) {
            Ok(decoded) => {
                assert_eq!(verify_signature(&decoded, password_hash), Err(AuthError::BadSignature))
            }
            Err(_) => {}
        }
    }

    #[test]
    fn wrong_key_is_rejected() {
        let token = sign(12345, "payload-blob", b"correct-hash");
        let decoded = decode_token(&token).unwrap();
        assert_eq!(
            verify_signature(&decoded, b"wrong-hash"),
            Err(AuthError::BadSignature)
        );
    }

    #[test]
    fn malformed_token_missing_segments_is_rejected() {
        assert_eq!(decode_token("only-one-segment"), Err(AuthError::Malformed));
        assert_eq!(decode_token("two.segments"), Err(AuthError::Malformed));
    }

    #[test]
    fn non_numeric_user_id_is_rejected() {
        let id_segment = URL_SAFE_NO_PAD.encode("not-a-number");
        let token = format!("{id_segment}.payload.{}", URL_SAFE_NO_PAD.encode("sig"));
        assert_eq!(decode_token(&token), Err(AuthError::BadUserIdEncoding));
    }
}
