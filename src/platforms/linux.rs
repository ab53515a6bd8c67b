use crate::apps::{AppDescriptor, BundleId};
use crate::config::Config;
use crate::icons::{self, IconImage};
use freedesktop_desktop_entry::{DesktopEntry, Iter, default_paths};
use rs_apply::Apply;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

pub fn discover_applications(config: &Config) -> Result<Vec<AppDescriptor>, Box<dyn Error>> {
    let mut dirs = default_paths();
    dirs.extend(config.extra_app_dirs.iter().cloned());
    Ok(discover_in(dirs))
}

pub fn launch(app: &AppDescriptor) -> Result<(), Box<dyn Error>> {
    let content = fs::read_to_string(&app.launch_target)?;
    let entry = DesktopEntry::decode(&app.launch_target, &content)
        .map_err(|e| format!("Invalid desktop entry {}: {:?}", app.launch_target.display(), e))?;
    let exec = entry.exec().ok_or("Desktop entry has no Exec line")?;

    let mut argv = parse_exec(exec).into_iter();
    let program = argv.next().ok_or("Exec line is empty")?;

    let mut child = Command::new(program)
        .args(argv)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    // Reap in the background so finished apps do not linger as zombies
    std::thread::spawn(move || child.wait());

    Ok(())
}

pub fn extract_icon(app: &AppDescriptor, size: u32) -> Result<Option<IconImage>, Box<dyn Error>> {
    app.icon_path
        .as_ref()
        .filter(|path| path.exists())
        .map(|path| icons::decode_icon_file(path, size))
        .transpose()
}

/// Desktop entries found under `dirs`, first occurrence of each id wins.
fn discover_in(dirs: Vec<PathBuf>) -> Vec<AppDescriptor> {
    let mut seen = std::collections::HashSet::new();

    Iter::new(dirs)
        .filter_map(|path| {
            let content = fs::read_to_string(&path).ok()?;
            parse_desktop_entry(&path, &content)
        })
        .filter(|app| seen.insert(app.bundle_id.clone()))
        .collect()
}

fn parse_desktop_entry(path: &Path, content: &str) -> Option<AppDescriptor> {
    let entry = DesktopEntry::decode(path, content).ok()?;
    if !is_application_entry(&entry) {
        return None;
    }

    let name = entry.name(None)?.to_string();
    let bundle_id = BundleId::new(entry.appid.to_string()).ok()?;
    let description = entry.comment(None).map(|cow| cow.to_string());
    let icon_path = entry.icon().and_then(resolve_icon_path);

    Some(AppDescriptor {
        name,
        bundle_id,
        description,
        launch_target: path.to_path_buf(),
        icon_path,
    })
}

fn is_application_entry(entry: &DesktopEntry) -> bool {
    entry.name(None).is_some()
        && entry.exec().is_some_and(|exec| !exec.trim().is_empty())
        && !entry.no_display()
}

/// Splits an Exec value into argv, honouring double quotes and dropping
/// field codes.
fn parse_exec(exec: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_arg = false;
    let mut quoted = false;
    let mut chars = exec.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                quoted = !quoted;
                in_arg = true;
            }
            '\\' if quoted => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            c if c.is_whitespace() && !quoted => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            '%' => match chars.next() {
                Some('%') => {
                    current.push('%');
                    in_arg = true;
                }
                // field code, expands to nothing
                Some(_) | None => {}
            },
            c => {
                current.push(c);
                in_arg = true;
            }
        }
    }

    if in_arg && !current.is_empty() {
        args.push(current);
    }
    args.retain(|arg| !arg.is_empty());
    args
}

fn icon_base_dirs() -> Vec<PathBuf> {
    let mut bases: Vec<PathBuf> = std::env::var("HOME")
        .ok()
        .map(|home| {
            vec![
                PathBuf::from(format!("{}/.local/share/icons", home)),
                PathBuf::from(format!("{}/.icons", home)),
            ]
        })
        .unwrap_or_default();

    bases.extend(
        ["/usr/share/icons", "/usr/local/share/icons", "/usr/share/pixmaps"]
            .iter()
            .map(PathBuf::from),
    );
    bases
}

fn resolve_icon_path(icon_name: &str) -> Option<PathBuf> {
    if icon_name.starts_with('/') {
        return PathBuf::from(icon_name).apply(|p| if p.exists() { Some(p) } else { None });
    }

    find_icon_in(&icon_base_dirs(), icon_name)
}

fn find_icon_in(bases: &[PathBuf], icon_name: &str) -> Option<PathBuf> {
    const SIZED_DIRS: [&str; 6] = [
        "256x256", "128x128", "scalable", "96x96", "64x64", "48x48",
    ];

    bases
        .iter()
        .flat_map(|base| {
            SIZED_DIRS
                .iter()
                .map(move |size| base.join("hicolor").join(size).join("apps"))
                .chain(std::iter::once(base.clone()))
        })
        .flat_map(|dir| {
            ["png", "svg"]
                .iter()
                .map(move |ext| dir.join(format!("{}.{}", icon_name, ext)))
        })
        .find(|path| path.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_entry(dir: &Path, file: &str, body: &str) -> PathBuf {
        let path = dir.join(file);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn exec_field_codes_are_dropped() {
        assert_eq!(parse_exec("firefox %u"), vec!["firefox"]);
        assert_eq!(
            parse_exec("gimp-2.10 --new-instance %F"),
            vec!["gimp-2.10", "--new-instance"]
        );
        assert_eq!(parse_exec("printf 100%%"), vec!["printf", "100%"]);
    }

    #[test]
    fn exec_quotes_group_arguments() {
        assert_eq!(
            parse_exec(r#""/opt/My App/run" --title "hello world" %U"#),
            vec!["/opt/My App/run", "--title", "hello world"]
        );
        assert_eq!(
            parse_exec(r#"sh -c "echo \"hi\"""#),
            vec!["sh", "-c", "echo \"hi\""]
        );
        assert!(parse_exec("   ").is_empty());
    }

    #[test]
    fn parses_visible_application_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_entry(
            dir.path(),
            "org.example.Notes.desktop",
            "[Desktop Entry]\nType=Application\nName=Notes\nComment=Jot things down\nExec=notes %f\nIcon=/nonexistent/notes.png\n",
        );

        let content = fs::read_to_string(&path).unwrap();
        let app = parse_desktop_entry(&path, &content).unwrap();

        assert_eq!(app.name, "Notes");
        assert_eq!(app.bundle_id.as_str(), "org.example.Notes");
        assert_eq!(app.description.as_deref(), Some("Jot things down"));
        assert_eq!(app.launch_target, path);
        assert_eq!(app.icon_path, None);
    }

    #[test]
    fn hidden_and_incomplete_entries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let hidden = write_entry(
            dir.path(),
            "hidden.desktop",
            "[Desktop Entry]\nType=Application\nName=Hidden\nExec=hidden\nNoDisplay=true\n",
        );
        let no_exec = write_entry(
            dir.path(),
            "noexec.desktop",
            "[Desktop Entry]\nType=Application\nName=No Exec\n",
        );

        for path in [hidden, no_exec] {
            let content = fs::read_to_string(&path).unwrap();
            assert!(parse_desktop_entry(&path, &content).is_none(), "{:?}", path);
        }
    }

    #[test]
    fn discovery_keeps_first_of_duplicate_ids() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        write_entry(
            first.path(),
            "editor.desktop",
            "[Desktop Entry]\nType=Application\nName=Editor\nExec=editor\n",
        );
        write_entry(
            second.path(),
            "editor.desktop",
            "[Desktop Entry]\nType=Application\nName=Shadowed Editor\nExec=editor-old\n",
        );
        write_entry(
            second.path(),
            "viewer.desktop",
            "[Desktop Entry]\nType=Application\nName=Viewer\nExec=viewer\n",
        );

        let apps = discover_in(vec![first.path().to_path_buf(), second.path().to_path_buf()]);
        let mut names: Vec<&str> = apps.iter().map(|a| a.name.as_str()).collect();
        names.sort();

        assert_eq!(names, vec!["Editor", "Viewer"]);
    }

    #[test]
    fn icon_lookup_prefers_larger_theme_sizes() {
        let base = tempfile::tempdir().unwrap();
        let small = base.path().join("hicolor/48x48/apps");
        let large = base.path().join("hicolor/256x256/apps");
        fs::create_dir_all(&small).unwrap();
        fs::create_dir_all(&large).unwrap();
        fs::write(small.join("notes.png"), b"small").unwrap();
        fs::write(large.join("notes.png"), b"large").unwrap();

        let found = find_icon_in(&[base.path().to_path_buf()], "notes").unwrap();
        assert_eq!(found, large.join("notes.png"));
        assert!(find_icon_in(&[base.path().to_path_buf()], "missing").is_none());
    }

    #[test]
    fn icon_lookup_falls_back_to_pixmaps_style_dir() {
        let base = tempfile::tempdir().unwrap();
        fs::write(base.path().join("legacy.svg"), b"<svg/>").unwrap();

        let found = find_icon_in(&[base.path().to_path_buf()], "legacy").unwrap();
        assert_eq!(found, base.path().join("legacy.svg"));
    }

    #[test]
    fn launch_runs_exec_line() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("launched");
        let path = write_entry(
            dir.path(),
            "toucher.desktop",
            &format!(
                "[Desktop Entry]\nType=Application\nName=Toucher\nExec=touch \"{}\" %u\n",
                marker.display()
            ),
        );
        let app = AppDescriptor {
            name: "Toucher".to_string(),
            bundle_id: BundleId::new("toucher").unwrap(),
            description: None,
            launch_target: path,
            icon_path: None,
        };

        launch(&app).unwrap();

        for _ in 0..50 {
            if marker.exists() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
        assert!(marker.exists());
    }

    /// Children of this process that have exited but not been reaped.
    fn zombie_children() -> usize {
        let me = std::process::id().to_string();
        fs::read_dir("/proc")
            .unwrap()
            .filter_map(Result::ok)
            .filter_map(|entry| fs::read_to_string(entry.path().join("stat")).ok())
            .filter(|stat| {
                // "pid (comm) state ppid ..."; comm may contain spaces
                let Some((_, rest)) = stat.rsplit_once(')') else {
                    return false;
                };
                let mut fields = rest.split_whitespace();
                fields.next() == Some("Z") && fields.next() == Some(me.as_str())
            })
            .count()
    }

    #[test]
    fn launched_children_are_reaped() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_entry(
            dir.path(),
            "quick.desktop",
            "[Desktop Entry]\nType=Application\nName=Quick\nExec=true\n",
        );
        let app = AppDescriptor {
            name: "Quick".to_string(),
            bundle_id: BundleId::new("quick").unwrap(),
            description: None,
            launch_target: path,
            icon_path: None,
        };

        for _ in 0..3 {
            launch(&app).unwrap();
        }

        let mut zombies = usize::MAX;
        for _ in 0..100 {
            zombies = zombie_children();
            if zombies == 0 {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
        assert_eq!(zombies, 0);
    }

    #[test]
    fn launch_of_missing_program_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_entry(
            dir.path(),
            "ghost.desktop",
            "[Desktop Entry]\nType=Application\nName=Ghost\nExec=/nonexistent/ghost-binary\n",
        );
        let app = AppDescriptor {
            name: "Ghost".to_string(),
            bundle_id: BundleId::new("ghost").unwrap(),
            description: None,
            launch_target: path,
            icon_path: None,
        };

        assert!(launch(&app).is_err());
    }
}
