use crate::apps::{AppDescriptor, BundleId};
use crate::config::Config;
use crate::icons::{self, IconImage};
use rs_apply::Apply;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use winreg::{RegKey, enums::*};

const UNINSTALL_KEY: &str = "SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\Uninstall";

pub fn discover_applications(config: &Config) -> Result<Vec<AppDescriptor>, Box<dyn Error>> {
    registry_apps()
        .chain(directory_apps(&config.extra_app_dirs))
        .collect()
}

pub fn launch(app: &AppDescriptor) -> Result<(), Box<dyn Error>> {
    let working_dir = app.launch_target.parent().filter(|dir| dir.exists());

    let mut command = Command::new(&app.launch_target);
    if let Some(dir) = working_dir {
        command.current_dir(dir);
    }

    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    // Wait in the background so the process handle is released on exit
    std::thread::spawn(move || child.wait());

    Ok(())
}

pub fn extract_icon(app: &AppDescriptor, size: u32) -> Result<Option<IconImage>, Box<dyn Error>> {
    // Icons embedded in executables are not decoded
    app.icon_path
        .as_ref()
        .filter(|path| path.exists() && has_extension(path, &["ico", "png", "svg"]))
        .map(|path| icons::decode_icon_file(path, size))
        .transpose()
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// `DisplayIcon` values may carry a resource index: `C:\app\app.exe,0`.
fn strip_icon_index(raw: &str) -> PathBuf {
    let raw = raw.trim().trim_matches('"');
    match raw.rsplit_once(',') {
        Some((path, index)) if index.trim().parse::<i32>().is_ok() => {
            PathBuf::from(path.trim_matches('"'))
        }
        _ => PathBuf::from(raw),
    }
}

fn registry_apps() -> impl Iterator<Item = Result<AppDescriptor, Box<dyn Error>>> {
    [HKEY_LOCAL_MACHINE, HKEY_CURRENT_USER]
        .into_iter()
        .filter_map(|hkey| RegKey::predef(hkey).open_subkey(UNINSTALL_KEY).ok())
        .flat_map(|uninstall_key| {
            uninstall_key
                .enum_keys()
                .filter_map(Result::ok)
                .filter_map(|name| {
                    let key = uninstall_key.open_subkey(&name).ok()?;
                    parse_registry_entry(&name, &key).transpose()
                })
                .collect::<Vec<_>>()
        })
}

fn parse_registry_entry(
    key_name: &str,
    key: &RegKey,
) -> Result<Option<AppDescriptor>, Box<dyn Error>> {
    if key.get_value::<u32, _>("SystemComponent").ok() == Some(1) {
        return Ok(None);
    }

    let Ok(bundle_id) = BundleId::new(key_name) else {
        return Ok(None);
    };
    let Some(name) = key
        .get_value::<String, _>("DisplayName")
        .ok()
        .filter(|s| !s.trim().is_empty())
    else {
        return Ok(None);
    };

    let icon_path = key
        .get_value::<String, _>("DisplayIcon")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(|raw| strip_icon_index(&raw));

    let install_dir = key
        .get_value::<String, _>("InstallLocation")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(|s| PathBuf::from(s.trim().trim_matches('"')));

    let launch_target = icon_path
        .clone()
        .filter(|path| has_extension(path, &["exe"]))
        .or_else(|| install_dir.as_deref().and_then(first_executable));

    Ok(launch_target.map(|launch_target| AppDescriptor {
        name,
        bundle_id,
        description: key.get_value::<String, _>("Publisher").ok(),
        launch_target,
        icon_path,
    }))
}

fn directory_apps(dirs: &[PathBuf]) -> impl Iterator<Item = Result<AppDescriptor, Box<dyn Error>>> {
    dirs.iter()
        .filter_map(|dir| fs::read_dir(dir).ok())
        .flat_map(|entries| entries.filter_map(Result::ok))
        .filter(|entry| entry.file_type().map_or(false, |ft| ft.is_dir()))
        .filter_map(|entry| directory_to_app(&entry.path()).transpose())
}

fn first_executable(dir: &Path) -> Option<PathBuf> {
    fs::read_dir(dir)
        .ok()?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .find(|path| has_extension(path, &["exe"]))
}

fn directory_to_app(dir: &Path) -> Result<Option<AppDescriptor>, Box<dyn Error>> {
    let name = dir
        .file_name()
        .ok_or("Invalid application directory")?
        .to_string_lossy()
        .into_owned();

    first_executable(dir)
        .and_then(|exe| {
            let bundle_id = BundleId::new(name.clone()).ok()?;
            Some(AppDescriptor {
                name,
                bundle_id,
                description: None,
                icon_path: ["ico", "png"]
                    .iter()
                    .map(|ext| exe.with_extension(ext))
                    .find(|p| p.exists()),
                launch_target: exe,
            })
        })
        .apply(Ok)
}
