//! Keyed payload signing.
//!
//! A [`PayloadSigner`] holds one server secret and derives independent MACs per
//! [`SigningDomain`]. The domain tag and every field are length-prefixed before
//! they enter the MAC, so `("ab", "c")` and `("a", "bc")` never collide and a
//! MAC minted for one domain never verifies in another.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

type HmacSha256 = Hmac<Sha256>;

/// Minimum accepted secret length in bytes
pub const MIN_SECRET_LEN: usize = 16;

/// Errors that can occur during signing operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SigningError {
    #[error("Secret too short: {got} bytes (minimum {min})")]
    SecretTooShort { got: usize, min: usize },

    #[error("MAC encoding invalid: {reason}")]
    InvalidEncoding { reason: String },

    #[error("MAC mismatch")]
    Mismatch,
}

/// Domain separation tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningDomain {
    /// Mission QR payload (`missionId`, `collectionId`, `timestamp`)
    MissionProof,
    /// Reporter-side collection confirmation (`collectionId`, `userId`, `timestamp`)
    CollectionConfirmation,
}

impl SigningDomain {
    /// Stable tag bound into every MAC for this domain
    pub fn tag(&self) -> &'static str {
        match self {
            SigningDomain::MissionProof => "binroute/mission-proof/v1",
            SigningDomain::CollectionConfirmation => "binroute/collection-confirmation/v1",
        }
    }
}

/// HMAC-SHA256 signer over length-prefixed fields.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PayloadSigner {
    secret: Vec<u8>,
}

impl std::fmt::Debug for PayloadSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadSigner")
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl PayloadSigner {
    /// Create a signer from raw secret bytes
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Self, SigningError> {
        let secret = secret.into();
        if secret.len() < MIN_SECRET_LEN {
            return Err(SigningError::SecretTooShort {
                got: secret.len(),
                min: MIN_SECRET_LEN,
            });
        }
        Ok(Self { secret })
    }

    fn mac_for(&self, domain: SigningDomain, fields: &[&[u8]]) -> HmacSha256 {
        // HMAC accepts keys of any length, so this cannot fail
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.secret)
            .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
        let tag = domain.tag().as_bytes();
        mac.update(&(tag.len() as u64).to_be_bytes());
        mac.update(tag);
        for field in fields {
            mac.update(&(field.len() as u64).to_be_bytes());
            mac.update(field);
        }
        mac
    }

    /// Compute the MAC over `fields` in `domain`
    pub fn sign(&self, domain: SigningDomain, fields: &[&[u8]]) -> [u8; 32] {
        self.mac_for(domain, fields).finalize().into_bytes().into()
    }

    /// Compute the MAC and hex-encode it
    pub fn sign_hex(&self, domain: SigningDomain, fields: &[&[u8]]) -> String {
        hex::encode(self.sign(domain, fields))
    }

    /// Verify a lowercase hex MAC in constant time
    pub fn verify_hex(
        &self,
        domain: SigningDomain,
        fields: &[&[u8]],
        mac_hex: &str,
    ) -> Result<(), SigningError> {
        // Only the canonical encoding is accepted
        if mac_hex.bytes().any(|b| b.is_ascii_uppercase()) {
            return Err(SigningError::InvalidEncoding {
                reason: "MAC must be lowercase hex".to_string(),
            });
        }
        let expected = hex::decode(mac_hex).map_err(|e| SigningError::InvalidEncoding {
            reason: e.to_string(),
        })?;
        self.mac_for(domain, fields)
            .verify_slice(&expected)
            .map_err(|_| SigningError::Mismatch)
    }
}

/// Sign a webhook body with a subscription secret.
///
/// Returns the header value `sha256=<hex>`.
pub fn sign_webhook_body(secret: &[u8], body: &[u8]) -> String {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret)
        .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> PayloadSigner {
        PayloadSigner::new(b"0123456789abcdef-test-secret".to_vec()).unwrap()
    }

    #[test]
    fn test_short_secret_rejected() {
        let err = PayloadSigner::new(b"short".to_vec()).unwrap_err();
        assert_eq!(err, SigningError::SecretTooShort { got: 5, min: 16 });
    }

    #[test]
    fn test_sign_verify() {
        let s = signer();
        let mac = s.sign_hex(SigningDomain::MissionProof, &[b"m-1", b"c-1"]);
        assert_eq!(mac.len(), 64);
        assert!(s
            .verify_hex(SigningDomain::MissionProof, &[b"m-1", b"c-1"], &mac)
            .is_ok());
    }

    #[test]
    fn test_field_boundaries_bound() {
        let s = signer();
        let a = s.sign(SigningDomain::MissionProof, &[b"ab", b"c"]);
        let b = s.sign(SigningDomain::MissionProof, &[b"a", b"bc"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_domain_separation() {
        let s = signer();
        let mac = s.sign_hex(SigningDomain::MissionProof, &[b"x", b"y"]);
        assert_eq!(
            s.verify_hex(SigningDomain::CollectionConfirmation, &[b"x", b"y"], &mac),
            Err(SigningError::Mismatch)
        );
    }

    #[test]
    fn test_different_secret_mismatch() {
        let other = PayloadSigner::new(b"another-secret-of-length".to_vec()).unwrap();
        let mac = signer().sign_hex(SigningDomain::MissionProof, &[b"m"]);
        assert_eq!(
            other.verify_hex(SigningDomain::MissionProof, &[b"m"], &mac),
            Err(SigningError::Mismatch)
        );
    }

    #[test]
    fn test_bad_hex() {
        let err = signer()
            .verify_hex(SigningDomain::MissionProof, &[b"m"], "zz")
            .unwrap_err();
        assert!(matches!(err, SigningError::InvalidEncoding { .. }));
    }

    #[test]
    fn test_uppercase_hex_rejected() {
        let s = signer();
        let mac = s.sign_hex(SigningDomain::MissionProof, &[b"m"]);
        let err = s
            .verify_hex(SigningDomain::MissionProof, &[b"m"], &mac.to_uppercase())
            .unwrap_err();
        assert!(matches!(err, SigningError::InvalidEncoding { .. }));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let dbg = format!("{:?}", signer());
        assert!(!dbg.contains("test-secret"));
    }

    #[test]
    fn test_webhook_signature_format() {
        let sig = sign_webhook_body(b"whsec", b"{\"a\":1}");
        assert!(sig.starts_with("sha256="));
        assert_eq!(sig.len(), "sha256=".len() + 64);
        assert_eq!(sig, sign_webhook_body(b"whsec", b"{\"a\":1}"));
        assert_ne!(sig, sign_webhook_body(b"other", b"{\"a\":1}"));
    }
}
