//! A GATT enumeration and reconnaissance engine built on top of `bluez-async`: connection
//! lifecycle management, staged recovery from a wedged controller, signal correlation across
//! wire and synthetic events, deterministic GATT-tree walking, and a two-axis error taxonomy that
//! turns "this read failed" into "this attribute requires authentication" or "this attribute is a
//! landmine".
//!
//! Start with [`scan::scan_and_connect`].

pub mod config;
pub mod device;
pub mod error;
pub mod gatt;
pub mod handle;
pub mod lifecycle;
pub mod pairing;
pub mod recovery;
pub mod scan;
pub mod signals;
mod taxonomy;

#[cfg(feature = "testing")]
pub mod testing;

pub use config::{CoreConfig, RecoveryConfig};
pub use device::{CharacteristicSafety, Device};
pub use error::CoreError;
pub use gatt::classify_walk_errors;
pub use gatt::map::{AttributeMap, LandmineMap, ObjectKind, PermissionMap};
pub use handle::{handle_hex_to_int, handle_int_to_hex};
pub use lifecycle::{DeviceLifecycle, LifecycleEvent, LifecycleState};
pub use recovery::{RecoveryActions, RecoveryEvent, RecoveryManager, RecoveryStage};
pub use scan::{
    scan_and_connect, scan_and_connect_with_pairing_agent, PairingAgentConfig, ScanEnvelope,
    ScanMode, ScanResult,
};
pub use signals::{RegistrationId, SignalCapture, SignalCorrelator, SignalHub, SignalSource};
pub use taxonomy::{ResultCode, TaxonomyConfig};
