//! Setup state machine
//!
//! Type-safe state machine for the CAN setup lifecycle using state-machines crate.
//! Uses dynamic dispatch mode so the orchestrator can drive it from runtime results.

use state_machines::state_machine;

state_machine! {
    name: SetupMachine,
    dynamic: true,
    initial: Idle,
    states: [Idle, Reading, Provisioning, Provisioned, Failed],
    events {
        load {
            transition: { from: Idle, to: Reading }
        }
        provision {
            transition: { from: Reading, to: Provisioning }
        }
        complete {
            transition: { from: Provisioning, to: Provisioned }
        }
        retry {
            transition: { from: Provisioning, to: Reading }
        }
        fail {
            transition: { from: [Reading, Provisioning], to: Failed }
        }
    }
}

/// Simple state enum for external use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupState {
    Idle,
    Reading,
    Provisioning,
    Provisioned,
    Failed,
}

impl SetupState {
    /// Parse state from string representation
    pub fn from_str(s: &str) -> Self {
        match s {
            "Idle" => SetupState::Idle,
            "Reading" => SetupState::Reading,
            "Provisioning" => SetupState::Provisioning,
            "Provisioned" => SetupState::Provisioned,
            _ => SetupState::Failed,
        }
    }
}

/// Create a fresh machine in `Idle`
pub fn new_machine() -> DynamicSetupMachine<()> {
    SetupMachine::new(()).into_dynamic()
}
