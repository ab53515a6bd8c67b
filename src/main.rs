use clap::{Parser, Subcommand};
use devicelaunch::{AppDescriptor, DeviceApps, logs};
use image::imageops::{self, FilterType};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "devicelaunch", about = "List, open and fetch icons of installed applications")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List installed applications
    List {
        #[arg(long)]
        json: bool,
    },
    /// Open an application by bundle identifier
    Open { bundle_id: String },
    /// Write an application's icon as PNG
    Icon {
        bundle_id: String,
        #[arg(short, long)]
        output: PathBuf,
        /// Resize to SIZE x SIZE pixels
        #[arg(short, long)]
        size: Option<u32>,
    },
    /// Find applications by name or description
    Search {
        query: String,
        #[arg(long)]
        json: bool,
    },
    Logs {
        #[command(subcommand)]
        action: Option<logs::LogsAction>,
    },
}

fn print_apps(apps: &[AppDescriptor], json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(apps)?);
    } else {
        for app in apps {
            println!("{}\t{}", app.bundle_id, app.name);
        }
    }
    Ok(())
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    logs::init_logger()?;

    let bridge = DeviceApps::new();

    match Cli::parse().command {
        Commands::List { json } => {
            let apps = bridge.apps();
            logs::log_info(&format!("Found {} applications", apps.len()));
            print_apps(&apps, json)?;
        }
        Commands::Open { bundle_id } => {
            if !bridge.open_app(&bundle_id) {
                eprintln!("Could not open '{}'", bundle_id);
                return Ok(ExitCode::FAILURE);
            }
            println!("Opened {}", bundle_id);
        }
        Commands::Icon {
            bundle_id,
            output,
            size,
        } => {
            let Some(icon) = bridge.icon_for_app(&bundle_id) else {
                eprintln!("No icon available for '{}'", bundle_id);
                return Ok(ExitCode::FAILURE);
            };

            let icon = match size.filter(|&s| s > 0 && s != icon.width()) {
                Some(s) => imageops::resize(&icon, s, s, FilterType::Lanczos3),
                None => icon,
            };
            icon.save_with_format(&output, image::ImageFormat::Png)?;
            println!("Wrote {}x{} icon to {}", icon.width(), icon.height(), output.display());
        }
        Commands::Search { query, json } => {
            print_apps(&bridge.search(&query), json)?;
        }
        Commands::Logs { action } => {
            logs::handle_logs_command(action)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}
