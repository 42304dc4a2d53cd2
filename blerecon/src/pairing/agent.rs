//! Pairing agent state machine and the I/O contract it drives. The D-Bus `org.bluez.Agent1`
//! object that BlueZ actually calls into lives outside this crate (it needs an exported object on
//! the bus); what's here is the logic that object delegates to, kept independently testable.

use async_trait::async_trait;
use bluez_async::DeviceId;
use std::collections::HashMap;
use std::sync::Mutex;

/// State of one in-flight pairing negotiation for a device. Distinct `*Requested`/`Displaying*`
/// states mirror the distinct `org.bluez.Agent1` methods BlueZ calls depending on the two
/// devices' I/O capabilities, rather than collapsing them into one generic "waiting on the user"
/// state, since a caller driving a UI needs to know which prompt to show.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PairingState {
    Idle,
    Initiated,
    PinRequested,
    PasskeyRequested,
    DisplayingPasskey,
    ConfirmationRequested,
    AuthorizationRequested,
    ServiceAuthorization,
    Bonding,
    Complete,
    Failed,
    Cancelled,
}

impl PairingState {
    /// Whether `self -> next` is a transition the state machine allows.
    pub fn can_transition_to(self, next: PairingState) -> bool {
        use PairingState::*;
        matches!(
            (self, next),
            (Idle, Initiated)
                | (Initiated, PinRequested)
                | (Initiated, PasskeyRequested)
                | (Initiated, DisplayingPasskey)
                | (Initiated, ConfirmationRequested)
                | (Initiated, AuthorizationRequested)
                | (Initiated, ServiceAuthorization)
                | (Initiated, Bonding)
                | (PinRequested, Bonding)
                | (PinRequested, Cancelled)
                | (PinRequested, Failed)
                | (PasskeyRequested, Bonding)
                | (PasskeyRequested, Cancelled)
                | (PasskeyRequested, Failed)
                | (DisplayingPasskey, Bonding)
                | (DisplayingPasskey, Cancelled)
                | (DisplayingPasskey, Failed)
                | (ConfirmationRequested, Bonding)
                | (ConfirmationRequested, Cancelled)
                | (ConfirmationRequested, Failed)
                | (AuthorizationRequested, Bonding)
                | (AuthorizationRequested, Cancelled)
                | (AuthorizationRequested, Failed)
                | (ServiceAuthorization, Bonding)
                | (ServiceAuthorization, Complete)
                | (ServiceAuthorization, Cancelled)
                | (ServiceAuthorization, Failed)
                | (Bonding, Complete)
                | (Bonding, Failed)
                | (Complete, ServiceAuthorization)
                | (Complete, Idle)
                | (Failed, Idle)
                | (Cancelled, Idle)
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PairingStateError {
    #[error("invalid pairing state transition {from:?} -> {to:?}")]
    InvalidTransition { from: PairingState, to: PairingState },
}

/// Tracks pairing state per device, enforcing the transition matrix above.
#[derive(Default)]
pub struct PairingStateMachine {
    states: Mutex<HashMap<DeviceId, PairingState>>,
}

impl PairingStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, device: &DeviceId) -> PairingState {
        self.states
            .lock()
            .unwrap()
            .get(device)
            .copied()
            .unwrap_or(PairingState::Idle)
    }

    pub fn transition(&self, device: &DeviceId, next: PairingState) -> Result<(), PairingStateError> {
        let mut states = self.states.lock().unwrap();
        let current = states.get(device).copied().unwrap_or(PairingState::Idle);
        if !current.can_transition_to(next) {
            return Err(PairingStateError::InvalidTransition { from: current, to: next });
        }
        states.insert(device.clone(), next);
        Ok(())
    }
}

/// What a pairing agent asks the operator (or an automated policy) to decide. Mirrors the
/// `org.bluez.Agent1` method set.
#[async_trait]
pub trait AgentIoHandler: Send + Sync {
    async fn request_pin_code(&self, device: &DeviceId) -> Option<String>;
    async fn request_passkey(&self, device: &DeviceId) -> Option<u32>;
    async fn display_passkey(&self, device: &DeviceId, passkey: u32, entered: u16);
    async fn request_confirmation(&self, device: &DeviceId, passkey: u32) -> bool;
    async fn request_authorization(&self, device: &DeviceId) -> bool;
    async fn authorize_service(&self, device: &DeviceId, uuid: &str) -> bool;
    async fn cancel(&self, device: &DeviceId);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> DeviceId {
        DeviceId::new("/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF")
    }

    #[test]
    fn valid_transitions_succeed() {
        let machine = PairingStateMachine::new();
        machine.transition(&device(), PairingState::Initiated).unwrap();
        machine.transition(&device(), PairingState::ConfirmationRequested).unwrap();
        machine.transition(&device(), PairingState::Bonding).unwrap();
        machine.transition(&device(), PairingState::Complete).unwrap();
        assert_eq!(machine.state(&device()), PairingState::Complete);
    }

    #[test]
    fn invalid_transition_is_rejected() {
        let machine = PairingStateMachine::new();
        let err = machine.transition(&device(), PairingState::Complete).unwrap_err();
        assert!(matches!(
            err,
            PairingStateError::InvalidTransition {
                from: PairingState::Idle,
                to: PairingState::Complete
            }
        ));
    }

    #[test]
    fn service_authorization_reachable_after_bonding_completes() {
        let machine = PairingStateMachine::new();
        machine.transition(&device(), PairingState::Initiated).unwrap();
        machine.transition(&device(), PairingState::Bonding).unwrap();
        machine.transition(&device(), PairingState::Complete).unwrap();
        machine.transition(&device(), PairingState::ServiceAuthorization).unwrap();
        assert_eq!(machine.state(&device()), PairingState::ServiceAuthorization);
    }
}
