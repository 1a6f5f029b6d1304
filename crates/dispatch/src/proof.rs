//! Proof-of-collection QR payloads
//!
//! Two payload types share one signing scheme under separate domains:
//!
//! - [`MissionQrPayload`] binds `missionId` and `collectionId`; the assigned
//!   collector scans it at the before/after checkpoints.
//! - [`ConfirmationQrPayload`] binds `collectionId` and `userId`; the reporter
//!   shows it to confirm the pickup happened.
//!
//! Tokens are the JSON payload, base64url-encoded without padding. Verification
//! is stateless. Any decoding failure or MAC mismatch is `tamper`; an authentic
//! payload older than the TTL is `expired`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use binroute_crypto::{PayloadSigner, SigningDomain};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// QR verification failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProofError {
    /// Signature mismatch or undecodable payload
    #[error("QR payload failed verification")]
    Tamper,

    /// Authentic but older than the TTL
    #[error("QR payload expired (issued at {issued_at}, now {now})")]
    Expired { issued_at: u64, now: u64 },
}

/// Signed mission checkpoint payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionQrPayload {
    pub mission_id: String,
    pub collection_id: String,
    /// Issue time (Unix epoch milliseconds)
    pub timestamp: u64,
    /// Lowercase hex HMAC-SHA256
    pub hash: String,
}

/// Signed reporter confirmation payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationQrPayload {
    pub collection_id: String,
    pub user_id: String,
    /// Issue time (Unix epoch milliseconds)
    pub timestamp: u64,
    /// Lowercase hex HMAC-SHA256
    pub hash: String,
}

impl MissionQrPayload {
    fn signed_fields<'a>(&'a self, ts: &'a [u8; 8]) -> [&'a [u8]; 3] {
        [self.mission_id.as_bytes(), self.collection_id.as_bytes(), &ts[..]]
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "missionId": self.mission_id,
            "collectionId": self.collection_id,
            "timestamp": self.timestamp,
            "hash": self.hash,
        })
    }
}

impl ConfirmationQrPayload {
    fn signed_fields<'a>(&'a self, ts: &'a [u8; 8]) -> [&'a [u8]; 3] {
        [self.collection_id.as_bytes(), self.user_id.as_bytes(), &ts[..]]
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "collectionId": self.collection_id,
            "userId": self.user_id,
            "timestamp": self.timestamp,
            "hash": self.hash,
        })
    }
}

fn encode_token(payload: serde_json::Value) -> String {
    URL_SAFE_NO_PAD.encode(payload.to_string())
}

fn decode_token<T: DeserializeOwned>(token: &str) -> Result<T, ProofError> {
    let raw = URL_SAFE_NO_PAD
        .decode(token.trim())
        .map_err(|_| ProofError::Tamper)?;
    serde_json::from_slice(&raw).map_err(|_| ProofError::Tamper)
}

/// Issues and verifies signed, time-boxed QR payloads
#[derive(Debug, Clone)]
pub struct ProofOfCollectionVerifier {
    signer: PayloadSigner,
    ttl_ms: u64,
}

impl ProofOfCollectionVerifier {
    /// Create a verifier with a server secret and payload lifetime
    pub fn new(signer: PayloadSigner, ttl_ms: u64) -> Self {
        Self { signer, ttl_ms }
    }

    /// Payload lifetime in milliseconds
    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms
    }

    fn check_age(&self, issued_at: u64, now: u64) -> Result<(), ProofError> {
        if now.saturating_sub(issued_at) > self.ttl_ms {
            return Err(ProofError::Expired { issued_at, now });
        }
        Ok(())
    }

    /// Sign a mission payload at `now`
    pub fn issue(&self, mission_id: &str, collection_id: &str, now: u64) -> MissionQrPayload {
        let mut payload = MissionQrPayload {
            mission_id: mission_id.to_string(),
            collection_id: collection_id.to_string(),
            timestamp: now,
            hash: String::new(),
        };
        let ts = now.to_be_bytes();
        payload.hash = self
            .signer
            .sign_hex(SigningDomain::MissionProof, &payload.signed_fields(&ts));
        payload
    }

    /// Sign a mission payload and render it as a token
    pub fn issue_token(&self, mission_id: &str, collection_id: &str, now: u64) -> String {
        encode_token(self.issue(mission_id, collection_id, now).to_json())
    }

    /// Check signature then age
    pub fn verify(&self, payload: &MissionQrPayload, now: u64) -> Result<(), ProofError> {
        let ts = payload.timestamp.to_be_bytes();
        self.signer
            .verify_hex(
                SigningDomain::MissionProof,
                &payload.signed_fields(&ts),
                &payload.hash,
            )
            .map_err(|e| {
                debug!(mission_id = %payload.mission_id, error = %e, "mission QR rejected");
                ProofError::Tamper
            })?;
        self.check_age(payload.timestamp, now)
    }

    /// Decode and verify a mission token
    pub fn verify_token(&self, token: &str, now: u64) -> Result<MissionQrPayload, ProofError> {
        let payload: MissionQrPayload = decode_token(token)?;
        self.verify(&payload, now)?;
        Ok(payload)
    }

    /// Sign a reporter confirmation payload at `now`
    pub fn issue_confirmation(
        &self,
        collection_id: &str,
        user_id: &str,
        now: u64,
    ) -> ConfirmationQrPayload {
        let mut payload = ConfirmationQrPayload {
            collection_id: collection_id.to_string(),
            user_id: user_id.to_string(),
            timestamp: now,
            hash: String::new(),
        };
        let ts = now.to_be_bytes();
        payload.hash = self.signer.sign_hex(
            SigningDomain::CollectionConfirmation,
            &payload.signed_fields(&ts),
        );
        payload
    }

    /// Sign a confirmation payload and render it as a token
    pub fn issue_confirmation_token(&self, collection_id: &str, user_id: &str, now: u64) -> String {
        encode_token(self.issue_confirmation(collection_id, user_id, now).to_json())
    }

    /// Check signature then age
    pub fn verify_confirmation(
        &self,
        payload: &ConfirmationQrPayload,
        now: u64,
    ) -> Result<(), ProofError> {
        let ts = payload.timestamp.to_be_bytes();
        self.signer
            .verify_hex(
                SigningDomain::CollectionConfirmation,
                &payload.signed_fields(&ts),
                &payload.hash,
            )
            .map_err(|_| ProofError::Tamper)?;
        self.check_age(payload.timestamp, now)
    }

    /// Decode and verify a confirmation token
    pub fn verify_confirmation_token(
        &self,
        token: &str,
        now: u64,
    ) -> Result<ConfirmationQrPayload, ProofError> {
        let payload: ConfirmationQrPayload = decode_token(token)?;
        self.verify_confirmation(&payload, now)?;
        Ok(payload)
    }
}
