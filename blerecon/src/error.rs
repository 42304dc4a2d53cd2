use bluez_async::BluetoothError;
use thiserror::Error;

/// Errors surfaced to callers of this crate's public API. Lower-level [`crate::taxonomy::ResultCode`]
/// values are what feed the Classification Engine; `CoreError` is the coarser, user-facing set.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("No device found for {0}")]
    DeviceNotFound(String),
    #[error("Failed to connect to {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },
    #[error("Adapter is not powered on")]
    NotReady,
    #[error("{operation} on {address} timed out after {seconds}s")]
    Timeout {
        address: String,
        operation: String,
        seconds: u64,
    },
    #[error("Operation already in progress")]
    OperationInProgress,
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Not authorized; device may require pairing")]
    NotAuthorized,
    #[error("Operation not supported")]
    NotSupported,
    #[error("Service not found: {0}")]
    ServiceNotFound(String),
    #[error("Services have not been resolved for this device yet")]
    ServicesNotResolved,
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Remote device disconnected")]
    RemoteDisconnected,
    #[error("Unknown D-Bus object")]
    UnknownObject,
    #[error("Operation cancelled")]
    Cancelled,
    #[error(transparent)]
    Bluetooth(#[from] BluetoothError),
    #[error("Internal error: {0}")]
    Internal(String),
}
