//! Enumerate installed applications, open them by bundle identifier and
//! fetch their icons.
//!
//! [`DeviceApps`] is the entry point. It asks a [`Platform`] backend on
//! every call; [`NativePlatform`] talks to the host operating system.

pub mod apps;
pub mod config;
pub mod icons;
pub mod logs;

pub use apps::{AppDescriptor, BundleId, DeviceApps, InvalidBundleId, NativePlatform, Platform};
pub use config::Config;
pub use icons::IconImage;
