//! Mission lifecycle
//!
//! The state machine is the only writer of mission status, timestamps, block
//! reasons, proofs and the transition ledger.

pub mod state_machine;

pub use state_machine::{BlockReasonInput, MissionStateMachine, StatusChange, StatusUpdate};
