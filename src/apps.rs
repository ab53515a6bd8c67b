use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::path::PathBuf;

use crate::config::Config;
use crate::icons::IconImage;
use crate::logs;

#[path = "platforms/windows.rs"]
#[cfg(windows)]
mod windows;

#[path = "platforms/macos.rs"]
#[cfg(target_os = "macos")]
mod macos;

#[path = "platforms/linux.rs"]
#[cfg(target_os = "linux")]
mod linux;

/// Platform-assigned identifier naming one installed application.
///
/// Never empty: construction trims surrounding whitespace and rejects what
/// is left if nothing is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BundleId(String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidBundleId;

impl fmt::Display for InvalidBundleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("bundle identifier must not be empty")
    }
}

impl Error for InvalidBundleId {}

impl BundleId {
    pub fn new(raw: impl Into<String>) -> Result<Self, InvalidBundleId> {
        let raw = raw.into();
        match raw.trim() {
            "" => Err(InvalidBundleId),
            trimmed if trimmed.len() == raw.len() => Ok(Self(raw)),
            trimmed => Ok(Self(trimmed.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BundleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for BundleId {
    type Error = InvalidBundleId;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl From<BundleId> for String {
    fn from(id: BundleId) -> Self {
        id.0
    }
}

/// One installed application, as seen at enumeration time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppDescriptor {
    /// Display name of the application
    pub name: String,
    #[serde(rename = "bundleID")]
    pub bundle_id: BundleId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Executable, bundle or desktop entry the platform launches
    pub launch_target: PathBuf,
    /// Optional path to icon file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_path: Option<PathBuf>,
}

/// The seam between [`DeviceApps`] and the operating system.
pub trait Platform {
    fn discover(&self) -> Result<Vec<AppDescriptor>, Box<dyn Error>>;
    fn launch(&self, app: &AppDescriptor) -> Result<(), Box<dyn Error>>;
    fn load_icon(&self, app: &AppDescriptor) -> Result<Option<IconImage>, Box<dyn Error>>;
}

impl<T: Platform + ?Sized> Platform for &T {
    fn discover(&self) -> Result<Vec<AppDescriptor>, Box<dyn Error>> {
        (**self).discover()
    }

    fn launch(&self, app: &AppDescriptor) -> Result<(), Box<dyn Error>> {
        (**self).launch(app)
    }

    fn load_icon(&self, app: &AppDescriptor) -> Result<Option<IconImage>, Box<dyn Error>> {
        (**self).load_icon(app)
    }
}

/// The host's own application registry.
#[derive(Debug, Clone, Default)]
pub struct NativePlatform {
    config: Config,
}

impl NativePlatform {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl Platform for NativePlatform {
    fn discover(&self) -> Result<Vec<AppDescriptor>, Box<dyn Error>> {
        #[cfg(windows)]
        {
            windows::discover_applications(&self.config)
        }

        #[cfg(target_os = "macos")]
        {
            macos::discover_applications(&self.config)
        }

        #[cfg(target_os = "linux")]
        {
            linux::discover_applications(&self.config)
        }

        #[cfg(not(any(windows, target_os = "macos", target_os = "linux")))]
        {
            Ok(Vec::new())
        }
    }

    fn launch(&self, app: &AppDescriptor) -> Result<(), Box<dyn Error>> {
        #[cfg(windows)]
        {
            windows::launch(app)
        }

        #[cfg(target_os = "macos")]
        {
            macos::launch(app)
        }

        #[cfg(target_os = "linux")]
        {
            linux::launch(app)
        }

        #[cfg(not(any(windows, target_os = "macos", target_os = "linux")))]
        {
            Err(format!("Launching {} is not supported on this platform", app.bundle_id).into())
        }
    }

    fn load_icon(&self, app: &AppDescriptor) -> Result<Option<IconImage>, Box<dyn Error>> {
        #[cfg(windows)]
        {
            windows::extract_icon(app, self.config.icon_size)
        }

        #[cfg(target_os = "macos")]
        {
            macos::extract_icon(app, self.config.icon_size)
        }

        #[cfg(target_os = "linux")]
        {
            linux::extract_icon(app, self.config.icon_size)
        }

        #[cfg(not(any(windows, target_os = "macos", target_os = "linux")))]
        {
            Err(format!("Icons for {} are not supported on this platform", app.bundle_id).into())
        }
    }
}

/// Stateless facade over a [`Platform`].
///
/// Every call asks the platform afresh; nothing is cached between calls.
/// Failures never escape: they are logged and reported as `false`, `None`
/// or an empty list.
#[derive(Debug, Clone)]
pub struct DeviceApps<P = NativePlatform> {
    platform: P,
}

impl DeviceApps<NativePlatform> {
    /// Native platform configured from the environment.
    pub fn new() -> Self {
        Self::with_platform(NativePlatform::new(Config::from_env()))
    }
}

impl Default for DeviceApps<NativePlatform> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Platform> DeviceApps<P> {
    pub fn with_platform(platform: P) -> Self {
        Self { platform }
    }

    /// Installed applications, sorted by name.
    pub fn apps(&self) -> Vec<AppDescriptor> {
        match self.platform.discover() {
            Ok(apps) => sort_and_dedup(apps),
            Err(e) => {
                logs::log_error(&format!("Application discovery failed: {}", e));
                Vec::new()
            }
        }
    }

    pub fn find_app(&self, bundle_id: &str) -> Option<AppDescriptor> {
        let id = BundleId::new(bundle_id).ok()?;
        self.apps().into_iter().find(|app| app.bundle_id == id)
    }

    /// Returns whether the launch was dispatched.
    pub fn open_app(&self, bundle_id: &str) -> bool {
        let Some(app) = self.find_app(bundle_id) else {
            logs::log_warn(&format!("Cannot open unknown application '{}'", bundle_id));
            return false;
        };

        logs::log_info(&format!("Launching: {} ({})", app.name, app.bundle_id));
        match self.platform.launch(&app) {
            Ok(()) => true,
            Err(e) => {
                logs::log_error(&format!("Failed to launch {}: {}", app.bundle_id, e));
                false
            }
        }
    }

    pub fn icon_for_app(&self, bundle_id: &str) -> Option<IconImage> {
        let app = self.find_app(bundle_id)?;

        match self.platform.load_icon(&app) {
            Ok(icon) => icon,
            Err(e) => {
                logs::log_error(&format!("Failed to load icon for {}: {}", app.bundle_id, e));
                None
            }
        }
    }

    /// Apps with a name word starting with `query`, or a description
    /// containing it. Case-insensitive; an empty query matches nothing.
    pub fn search(&self, query: &str) -> Vec<AppDescriptor> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }

        self.apps()
            .into_iter()
            .filter(|app| matches_query(app, &query))
            .collect()
    }
}

fn matches_query(app: &AppDescriptor, query: &str) -> bool {
    app.name
        .to_lowercase()
        .split_whitespace()
        .any(|word| word.starts_with(query))
        || app
            .description
            .as_ref()
            .map(|desc| desc.to_lowercase().contains(query))
            .unwrap_or(false)
}

/// Orders by name and drops repeated bundle ids, keeping whichever the
/// platform reported first.
fn sort_and_dedup(apps: Vec<AppDescriptor>) -> Vec<AppDescriptor> {
    let mut seen = std::collections::HashSet::new();
    let mut unique: Vec<AppDescriptor> = apps
        .into_iter()
        .filter(|app| seen.insert(app.bundle_id.clone()))
        .collect();

    unique.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.bundle_id.cmp(&b.bundle_id))
    });
    unique
}
