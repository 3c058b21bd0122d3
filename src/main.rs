use std::fs::{self, File};
use std::io::{self, Read};
use std::path::PathBuf;

use clap::Parser;
use log::{error, info, warn};
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};

use uinav::core::Navigator;
use uinav::core::config::{self, AssetBackend, UinavConfig};
use uinav::driver::{demo, run_script};

#[derive(Parser)]
#[command(name = "uinav", about = "Screen and popup navigation driver")]
struct Args {
    /// Navigation script to run (reads stdin when omitted)
    script: Option<PathBuf>,

    /// Where view assets are resolved from
    #[arg(short, long, value_enum)]
    backend: Option<AssetBackend>,

    /// Asset root directory for the directory backend
    #[arg(long)]
    assets: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> io::Result<()> {
    let args = Args::parse();
    dotenv::dotenv().ok();

    // Initialize file logger - writes to uinav.log in current directory
    let log_config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .build();

    if let Ok(log_file) = File::create("uinav.log") {
        let _ = WriteLogger::init(LevelFilter::Debug, log_config, log_file);
    }

    let file_config = config::load_config().unwrap_or_else(|e| {
        warn!("Falling back to default config: {}", e);
        eprintln!("warning: {e}; using defaults");
        UinavConfig::default()
    });
    let resolved = config::resolve(&file_config, args.backend, args.assets.as_deref());
    info!(
        "uinav starting with {:?} assets",
        resolved.asset_backend
    );

    let source = match &args.script {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    let navigator = Navigator::from_config(&resolved).map_err(io::Error::other)?;
    demo::place_scene(&navigator);

    let mut stdout = io::stdout();
    let report = run_script(&navigator, &source, &mut stdout)
        .await
        .map_err(|e| {
            error!("Script aborted: {}", e);
            io::Error::other(e)
        })?;

    navigator.shutdown();
    info!("Done: {:?}", report);
    if report.failures > 0 {
        eprintln!("{} of {} steps failed", report.failures, report.steps);
    }
    Ok(())
}
