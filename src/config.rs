use std::env;
use std::error::Error;
use std::path::PathBuf;

use crate::logs;

pub const APP_NAME: &str = "devicelaunch";

pub const APP_DIRS_VAR: &str = "DEVICELAUNCH_APP_DIRS";
pub const ICON_SIZE_VAR: &str = "DEVICELAUNCH_ICON_SIZE";
pub const LOG_FILE_VAR: &str = "DEVICELAUNCH_LOG_FILE";

pub const DEFAULT_ICON_SIZE: u32 = 128;
const MIN_ICON_SIZE: u32 = 16;
const MAX_ICON_SIZE: u32 = 1024;

/// Runtime settings, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Searched after the platform's standard application directories
    pub extra_app_dirs: Vec<PathBuf>,
    /// Preferred icon edge length in pixels
    pub icon_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extra_app_dirs: Vec::new(),
            icon_size: DEFAULT_ICON_SIZE,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_values(
            env::var_os(APP_DIRS_VAR).map(|v| env::split_paths(&v).collect()),
            env::var(ICON_SIZE_VAR).ok(),
        )
    }

    fn from_values(app_dirs: Option<Vec<PathBuf>>, icon_size: Option<String>) -> Self {
        let extra_app_dirs = app_dirs
            .unwrap_or_default()
            .into_iter()
            .filter(|dir| !dir.as_os_str().is_empty())
            .collect();

        let icon_size = match icon_size.as_deref().map(parse_icon_size) {
            Some(Ok(size)) => size,
            Some(Err(e)) => {
                logs::log_warn(&format!(
                    "Ignoring {}: {}; using {}",
                    ICON_SIZE_VAR, e, DEFAULT_ICON_SIZE
                ));
                DEFAULT_ICON_SIZE
            }
            None => DEFAULT_ICON_SIZE,
        };

        Self {
            extra_app_dirs,
            icon_size,
        }
    }
}

fn parse_icon_size(raw: &str) -> Result<u32, Box<dyn Error>> {
    let size: u32 = raw.trim().parse()?;
    if (MIN_ICON_SIZE..=MAX_ICON_SIZE).contains(&size) {
        Ok(size)
    } else {
        Err(format!(
            "icon size {} outside {}..={}",
            size, MIN_ICON_SIZE, MAX_ICON_SIZE
        )
        .into())
    }
}

pub fn log_file_path() -> Result<PathBuf, Box<dyn Error>> {
    if let Some(path) = env::var_os(LOG_FILE_VAR).filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }

    // %APPDATA% on Windows, $XDG_DATA_HOME or ~/.local/share on Linux
    #[cfg(not(target_os = "macos"))]
    let base = dirs::data_dir().ok_or("No data directory available")?;

    #[cfg(target_os = "macos")]
    let base = dirs::home_dir()
        .ok_or("No home directory available")?
        .join("Library/Logs");

    Ok(base.join(APP_NAME).join(format!("{}.log", APP_NAME)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_nothing_is_set() {
        assert_eq!(Config::from_values(None, None), Config::default());
    }

    #[test]
    fn accepts_icon_size_in_range() {
        let config = Config::from_values(None, Some(" 256 ".to_string()));
        assert_eq!(config.icon_size, 256);
    }

    #[test]
    fn falls_back_on_bad_icon_size() {
        for raw in ["abc", "8", "4096", ""] {
            let config = Config::from_values(None, Some(raw.to_string()));
            assert_eq!(config.icon_size, DEFAULT_ICON_SIZE, "input {:?}", raw);
        }
    }

    #[test]
    fn drops_empty_app_dirs() {
        let config = Config::from_values(
            Some(vec![
                PathBuf::from("/opt/apps"),
                PathBuf::new(),
                PathBuf::from("/srv/apps"),
            ]),
            None,
        );
        assert_eq!(
            config.extra_app_dirs,
            vec![PathBuf::from("/opt/apps"), PathBuf::from("/srv/apps")]
        );
    }
}
