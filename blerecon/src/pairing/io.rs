//! Concrete [`AgentIoHandler`] implementations: an interactive CLI prompt, a programmatic one
//! driven by pre-supplied answers (for scripted/non-interactive runs), and one that accepts
//! everything (for lab environments where prompting a human isn't an option).

use async_trait::async_trait;
use bluez_async::DeviceId;
use std::io::Write;

use super::agent::AgentIoHandler;

/// Prompts on stdin/stdout. Used when running as an interactive CLI tool.
pub struct CliIoHandler;

#[async_trait]
impl AgentIoHandler for CliIoHandler {
    async fn request_pin_code(&self, device: &DeviceId) -> Option<String> {
        prompt_line(&format!("PIN code for {}: ", device))
    }

    async fn request_passkey(&self, device: &DeviceId) -> Option<u32> {
        prompt_line(&format!("Passkey for {}: ", device)).and_then(|s| s.parse().ok())
    }

    async fn display_passkey(&self, device: &DeviceId, passkey: u32, entered: u16) {
        println!("{}: passkey {:06} ({} digits entered)", device, passkey, entered);
    }

    async fn request_confirmation(&self, device: &DeviceId, passkey: u32) -> bool {
        confirm(&format!("Confirm passkey {:06} for {}? [y/N] ", passkey, device))
    }

    async fn request_authorization(&self, device: &DeviceId) -> bool {
        confirm(&format!("Authorize pairing with {}? [y/N] ", device))
    }

    async fn authorize_service(&self, device: &DeviceId, uuid: &str) -> bool {
        confirm(&format!("Authorize service {} on {}? [y/N] ", uuid, device))
    }

    async fn cancel(&self, device: &DeviceId) {
        println!("Pairing with {} cancelled by remote.", device);
    }
}

fn prompt_line(prompt: &str) -> Option<String> {
    print!("{}", prompt);
    std::io::stdout().flush().ok()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line).ok()?;
    let trimmed = line.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn confirm(prompt: &str) -> bool {
    matches!(prompt_line(prompt), Some(answer) if answer.eq_ignore_ascii_case("y"))
}

/// Answers pulled from a fixed table rather than a human, for non-interactive or scripted runs.
#[derive(Clone, Debug, Default)]
pub struct ProgrammaticIoHandler {
    pub pin_code: Option<String>,
    pub passkey: Option<u32>,
    pub confirm_pairing: bool,
    pub authorize_connection: bool,
    pub authorize_services: bool,
}

#[async_trait]
impl AgentIoHandler for ProgrammaticIoHandler {
    async fn request_pin_code(&self, _device: &DeviceId) -> Option<String> {
        self.pin_code.clone()
    }

    async fn request_passkey(&self, _device: &DeviceId) -> Option<u32> {
        self.passkey
    }

    async fn display_passkey(&self, _device: &DeviceId, _passkey: u32, _entered: u16) {}

    async fn request_confirmation(&self, _device: &DeviceId, _passkey: u32) -> bool {
        self.confirm_pairing
    }

    async fn request_authorization(&self, _device: &DeviceId) -> bool {
        self.authorize_connection
    }

    async fn authorize_service(&self, _device: &DeviceId, _uuid: &str) -> bool {
        self.authorize_services
    }

    async fn cancel(&self, _device: &DeviceId) {}
}

/// Accepts every request unconditionally. Intended for controlled lab rigs only.
pub struct AutoAcceptIoHandler;

#[async_trait]
impl AgentIoHandler for AutoAcceptIoHandler {
    async fn request_pin_code(&self, _device: &DeviceId) -> Option<String> {
        Some("0000".to_string())
    }

    async fn request_passkey(&self, _device: &DeviceId) -> Option<u32> {
        Some(0)
    }

    async fn display_passkey(&self, _device: &DeviceId, _passkey: u32, _entered: u16) {}

    async fn request_confirmation(&self, _device: &DeviceId, _passkey: u32) -> bool {
        true
    }

    async fn request_authorization(&self, _device: &DeviceId) -> bool {
        true
    }

    async fn authorize_service(&self, _device: &DeviceId, _uuid: &str) -> bool {
        true
    }

    async fn cancel(&self, _device: &DeviceId) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> DeviceId {
        DeviceId::new("/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF")
    }

    #[tokio::test]
    async fn programmatic_handler_returns_configured_answers() {
        let handler = ProgrammaticIoHandler {
            pin_code: Some("1234".to_string()),
            confirm_pairing: true,
            ..Default::default()
        };
        assert_eq!(handler.request_pin_code(&device()).await, Some("1234".to_string()));
        assert!(handler.request_confirmation(&device(), 123456).await);
        assert!(!handler.request_authorization(&device()).await);
    }

    #[tokio::test]
    async fn auto_accept_handler_accepts_everything() {
        let handler = AutoAcceptIoHandler;
        assert!(handler.request_confirmation(&device(), 1).await);
        assert!(handler.request_authorization(&device()).await);
        assert!(handler.authorize_service(&device(), "180d").await);
    }
}
