//! CAN setup orchestration
//!
//! This module provides:
//! - State machine for one setup lifecycle
//! - Read -> rewrite -> provision -> persist sequencing
//! - Single retry with a fresh nonce on host-side failures
//! - Cleanup of exactly the channels this process created

mod orchestrator;
pub mod state;

// Re-exports
pub use orchestrator::{CanSetup, SetupReport};
pub use state::SetupState;
