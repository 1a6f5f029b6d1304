//! End-to-end tests for the Binroute dispatch service
//!
//! This test suite validates:
//! - the REST surface driven through the axum router
//! - error mapping (validation, access, not-found, conflict, proof, throttling)
//! - webhook fan-out, signatures and the delivery log against a live receiver

pub mod test_utils;

#[cfg(test)]
mod http_api_tests;

#[cfg(test)]
mod webhook_delivery_tests;
