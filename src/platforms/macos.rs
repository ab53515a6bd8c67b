use crate::apps::{AppDescriptor, BundleId};
use crate::config::Config;
use crate::icons::{self, IconImage};
use plist::{Dictionary, Value};
use rs_apply::Apply;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

pub fn discover_applications(config: &Config) -> Result<Vec<AppDescriptor>, Box<dyn Error>> {
    app_directories()
        .chain(config.extra_app_dirs.iter().cloned())
        .filter_map(|dir| fs::read_dir(dir).ok())
        .flat_map(|entries| entries.filter_map(Result::ok))
        .filter(|entry| entry.path().extension() == Some(std::ffi::OsStr::new("app")))
        // A malformed bundle must not hide the rest
        .filter_map(|entry| parse_app_bundle(&entry.path()).ok().flatten())
        .collect::<Vec<_>>()
        .apply(Ok)
}

pub fn launch(app: &AppDescriptor) -> Result<(), Box<dyn Error>> {
    let status = Command::new("open")
        .arg("-b")
        .arg(app.bundle_id.as_str())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()?;

    if status.success() {
        Ok(())
    } else {
        Err(format!("open -b {} exited with {}", app.bundle_id, status).into())
    }
}

pub fn extract_icon(app: &AppDescriptor, size: u32) -> Result<Option<IconImage>, Box<dyn Error>> {
    app.icon_path
        .as_ref()
        .filter(|path| path.exists())
        .map(|icon_path| icons::decode_icon_file(icon_path, size))
        .transpose()
}

fn app_directories() -> impl Iterator<Item = PathBuf> {
    [
        "/Applications",
        "/Applications/Utilities",
        "/System/Applications",
        "/System/Applications/Utilities",
    ]
    .into_iter()
    .map(PathBuf::from)
    .chain(dirs::home_dir().map(|home| home.join("Applications")))
}

fn read_info_plist(app_path: &Path) -> Result<Option<Dictionary>, Box<dyn Error>> {
    let plist_path = app_path.join("Contents/Info.plist");
    if !plist_path.exists() {
        return Ok(None);
    }

    plist::from_file::<_, Value>(&plist_path)?
        .into_dictionary()
        .ok_or("Info.plist is not a dictionary")?
        .apply(Some)
        .apply(Ok)
}

fn plist_string(dict: &Dictionary, key: &str) -> Option<String> {
    dict.get(key)?
        .as_string()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

fn parse_app_bundle(app_path: &Path) -> Result<Option<AppDescriptor>, Box<dyn Error>> {
    let Some(info) = read_info_plist(app_path)? else {
        return Ok(None);
    };

    // Bundles without an identifier cannot be opened by id
    let Some(bundle_id) = plist_string(&info, "CFBundleIdentifier").and_then(|id| BundleId::new(id).ok())
    else {
        return Ok(None);
    };

    let file_stem = app_path
        .file_name()
        .ok_or("Invalid app bundle name")?
        .to_string_lossy()
        .trim_end_matches(".app")
        .to_owned();

    let name = plist_string(&info, "CFBundleDisplayName")
        .or_else(|| plist_string(&info, "CFBundleName"))
        .unwrap_or_else(|| file_stem.clone());

    let resources_dir = app_path.join("Contents/Resources");
    let icon_path = icon_from_plist(&info, &resources_dir)
        .or_else(|| find_icon_by_patterns(&resources_dir, &file_stem));

    Ok(Some(AppDescriptor {
        name,
        bundle_id,
        description: plist_string(&info, "CFBundleGetInfoString"),
        launch_target: app_path.to_path_buf(),
        icon_path,
    }))
}

fn icon_from_plist(info: &Dictionary, resources_dir: &Path) -> Option<PathBuf> {
    ["CFBundleIconFile", "CFBundleIconName"]
        .iter()
        .find_map(|&key| {
            let icon_name = plist_string(info, key)?;
            let icon_filename = if icon_name.ends_with(".icns") {
                icon_name
            } else {
                format!("{}.icns", icon_name)
            };
            let icon_path = resources_dir.join(icon_filename);
            icons::is_readable_icns(&icon_path).then_some(icon_path)
        })
}

fn find_icon_by_patterns(resources_dir: &Path, app_name: &str) -> Option<PathBuf> {
    [
        format!("{}.icns", app_name),
        format!("{}.icns", app_name.to_lowercase()),
        "AppIcon.icns".to_string(),
        "app.icns".to_string(),
        "icon.icns".to_string(),
    ]
    .iter()
    .map(|pattern| resources_dir.join(pattern))
    .find(|path| icons::is_readable_icns(path))
}
