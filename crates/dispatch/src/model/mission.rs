//! Mission model
//!
//! A mission tracks one collection from assignment to completion. Lifecycle
//! fields are crate-private: they change only through
//! [`crate::mission::MissionStateMachine`] and
//! [`crate::reassignment::ReassignmentAuditor`].

use binroute_core::GeoPoint;
use binroute_crypto::{compute_link_hash, verify_links, Blake3Hash, ChainError, ChainLink, GENESIS_HASH};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Mission lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissionStatus {
    /// Created, no collector
    Planned,
    /// Collector selected
    Assigned,
    /// Collector working the pickup
    InProgress,
    /// Stopped with a reason, may resume
    Blocked,
    /// Done (terminal)
    Completed,
    /// Abandoned (terminal)
    Cancelled,
}

impl MissionStatus {
    /// All states, for exhaustive checks
    pub const ALL: [MissionStatus; 6] = [
        MissionStatus::Planned,
        MissionStatus::Assigned,
        MissionStatus::InProgress,
        MissionStatus::Blocked,
        MissionStatus::Completed,
        MissionStatus::Cancelled,
    ];

    /// Check if state is terminal (completed or cancelled)
    pub fn is_terminal(&self) -> bool {
        matches!(self, MissionStatus::Completed | MissionStatus::Cancelled)
    }

    /// Non-terminal missions count toward a collector's load, blocked included
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Check if transition to new state is valid
    pub fn can_transition_to(&self, next: MissionStatus) -> bool {
        use MissionStatus::*;
        match (self, next) {
            (Planned, Assigned) => true,
            (Assigned, InProgress) => true,
            (InProgress, Blocked) => true,
            (Blocked, InProgress) => true,
            (InProgress, Completed) => true,
            // Terminal states cannot transition
            (Completed, _) | (Cancelled, _) => false,
            (_, Cancelled) => true,
            _ => false,
        }
    }

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            MissionStatus::Planned => "planned",
            MissionStatus::Assigned => "assigned",
            MissionStatus::InProgress => "in-progress",
            MissionStatus::Blocked => "blocked",
            MissionStatus::Completed => "completed",
            MissionStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for MissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed block reasons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockReasonCode {
    VehicleBreakdown,
    AccessDenied,
    CollectorUnavailable,
    Other,
}

/// Why a mission is blocked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockReason {
    /// Reason code
    pub reason: BlockReasonCode,
    /// Free text, capped by configuration
    pub description: String,
    /// When the mission was blocked
    pub timestamp: u64,
}

/// Proof checkpoint stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProofStage {
    /// At pickup, before loading
    Before,
    /// After the pickup is cleared
    After,
}

impl ProofStage {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            ProofStage::Before => "before",
            ProofStage::After => "after",
        }
    }
}

/// One verified presence record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofCheckpoint {
    /// Reference to the uploaded photo
    pub photo_ref: String,
    /// Capture time
    pub timestamp: u64,
    /// Position of the verifying device at capture
    pub location: GeoPoint,
    /// User who scanned the code
    pub verified_by: String,
}

/// Before/after checkpoints
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Proofs {
    /// Checkpoint at pickup
    pub before: Option<ProofCheckpoint>,
    /// Checkpoint after clearing
    pub after: Option<ProofCheckpoint>,
}

/// When each transition happened
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MissionTimestamps {
    /// Creation
    pub created: u64,
    /// Last `planned → assigned`
    pub assigned: Option<u64>,
    /// First `assigned → in-progress`
    pub started: Option<u64>,
    /// `in-progress → completed`
    pub completed: Option<u64>,
    /// `→ cancelled`
    pub cancelled: Option<u64>,
}

/// One collector change after initial assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReassignmentEntry {
    /// Previous collector
    pub from_collector_id: String,
    /// New collector
    pub to_collector_id: String,
    /// Operator-supplied reason
    pub reason: Option<String>,
    /// Who made the change
    pub actor_id: String,
    /// When
    pub created_at: u64,
}

/// Append-only reassignment trail.
///
/// There is no API to edit or remove an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReassignmentHistory(Vec<ReassignmentEntry>);

impl ReassignmentHistory {
    pub(crate) fn push(&mut self, entry: ReassignmentEntry) {
        self.0.push(entry);
    }

    /// Entries, oldest first
    pub fn entries(&self) -> &[ReassignmentEntry] {
        &self.0
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// No reassignment happened yet
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `self` keeps every entry of `older` unchanged, in order
    pub fn extends(&self, older: &ReassignmentHistory) -> bool {
        self.0.len() >= older.0.len() && self.0[..older.0.len()] == older.0[..]
    }
}

mod hash_hex {
    use binroute_crypto::Blake3Hash;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(hash: &Blake3Hash, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(hash))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Blake3Hash, D::Error> {
        let raw = String::deserialize(d)?;
        let bytes = hex::decode(&raw).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32-byte hash"))
    }
}

/// Mission state transition linked into a BLAKE3 chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionTransition {
    /// Mission this transition belongs to
    pub mission_id: String,
    /// Previous state
    pub from: MissionStatus,
    /// New state
    pub to: MissionStatus,
    /// Acting user
    pub actor_id: String,
    /// Transition timestamp (Unix epoch milliseconds)
    pub timestamp: u64,
    /// Hash of the previous transition
    #[serde(with = "hash_hex")]
    pub prev_hash: Blake3Hash,
    /// Hash of this transition
    #[serde(with = "hash_hex")]
    pub hash: Blake3Hash,
}

impl MissionTransition {
    /// Create a transition linked to `prev_hash`
    pub fn new(
        mission_id: &str,
        from: MissionStatus,
        to: MissionStatus,
        actor_id: &str,
        timestamp: u64,
        prev_hash: Blake3Hash,
    ) -> Self {
        let mut transition = Self {
            mission_id: mission_id.to_string(),
            from,
            to,
            actor_id: actor_id.to_string(),
            timestamp,
            prev_hash,
            hash: GENESIS_HASH,
        };
        transition.hash = transition.recompute_hash();
        transition
    }
}

impl ChainLink for MissionTransition {
    fn stored_hash(&self) -> Blake3Hash {
        self.hash
    }

    fn prev_hash(&self) -> Blake3Hash {
        self.prev_hash
    }

    fn recompute_hash(&self) -> Blake3Hash {
        compute_link_hash(
            &[
                self.mission_id.as_bytes(),
                self.from.as_str().as_bytes(),
                self.to.as_str().as_bytes(),
                self.actor_id.as_bytes(),
                &self.timestamp.to_le_bytes(),
            ],
            &self.prev_hash,
        )
    }
}

/// The unit the dispatch engine manages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mission {
    /// Mission identifier
    pub mission_id: String,
    /// Collection being dispatched
    pub collection_id: String,
    /// Owning organization; never changes after creation
    pub organization_id: String,
    pub(crate) collector_id: Option<String>,
    pub(crate) vehicle_id: Option<String>,
    pub(crate) status: MissionStatus,
    pub(crate) qr_token: Option<String>,
    pub(crate) proofs: Proofs,
    pub(crate) block_reason: Option<BlockReason>,
    #[serde(rename = "timestamp")]
    pub(crate) timestamps: MissionTimestamps,
    pub(crate) reassignment_history: ReassignmentHistory,
    pub(crate) transitions: Vec<MissionTransition>,
    pub(crate) version: u64,
    pub(crate) updated_at: u64,
}

impl Mission {
    /// Create a planned mission
    pub fn new(
        mission_id: impl Into<String>,
        collection_id: impl Into<String>,
        organization_id: impl Into<String>,
        now: u64,
    ) -> Self {
        Self {
            mission_id: mission_id.into(),
            collection_id: collection_id.into(),
            organization_id: organization_id.into(),
            collector_id: None,
            vehicle_id: None,
            status: MissionStatus::Planned,
            qr_token: None,
            proofs: Proofs::default(),
            block_reason: None,
            timestamps: MissionTimestamps {
                created: now,
                ..MissionTimestamps::default()
            },
            reassignment_history: ReassignmentHistory::default(),
            transitions: Vec::new(),
            version: 0,
            updated_at: now,
        }
    }

    /// Current status
    pub fn status(&self) -> MissionStatus {
        self.status
    }

    /// Assigned collector
    pub fn collector_id(&self) -> Option<&str> {
        self.collector_id.as_deref()
    }

    /// Assigned vehicle
    pub fn vehicle_id(&self) -> Option<&str> {
        self.vehicle_id.as_deref()
    }

    /// Signed QR token for proof checkpoints
    pub fn qr_token(&self) -> Option<&str> {
        self.qr_token.as_deref()
    }

    /// Proof checkpoints
    pub fn proofs(&self) -> &Proofs {
        &self.proofs
    }

    /// Current block reason, if blocked
    pub fn block_reason(&self) -> Option<&BlockReason> {
        self.block_reason.as_ref()
    }

    /// Transition timestamps
    pub fn timestamps(&self) -> &MissionTimestamps {
        &self.timestamps
    }

    /// Reassignment trail
    pub fn reassignment_history(&self) -> &ReassignmentHistory {
        &self.reassignment_history
    }

    /// Status transition ledger
    pub fn transitions(&self) -> &[MissionTransition] {
        &self.transitions
    }

    /// Store revision, bumped on every committed write
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Last update timestamp
    pub fn updated_at(&self) -> u64 {
        self.updated_at
    }

    /// Whether `user_id` is the assigned collector
    pub fn is_assigned_to(&self, user_id: &str) -> bool {
        self.collector_id.as_deref() == Some(user_id)
    }

    /// Hash of the latest transition, or genesis
    pub fn ledger_head(&self) -> Blake3Hash {
        self.transitions
            .last()
            .map(|t| t.hash)
            .unwrap_or(GENESIS_HASH)
    }

    /// Verify the transition ledger end to end
    pub fn verify_ledger(&self) -> Result<(), ChainError> {
        verify_links(&self.transitions)
    }

    pub(crate) fn set_qr_token(&mut self, token: String) {
        self.qr_token = Some(token);
    }
}
