//! u2kw - run Android UI automation keywords from the command line
//!
//! Usage:
//!     u2kw [OPTIONS] keyword <NAME> [ARGS]...
//!     u2kw [OPTIONS] run <FILE>
//!
//! Environment Variables:
//!     ANDROID_SERIAL: adb serial, device IP or agent URL
//!     U2KW_LOG_DIR: directory for log files (default: logs)
//!     RUST_LOG: log filter (default: info)

mod script;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use u2_keywords::driver::adb::Adb;
use u2_keywords::{init_logging, keyword_catalog, KeywordLibrary, Mobile};

use script::{load_script, run_steps, split_args, Variables};

/// Android UI automation keywords
#[derive(Parser, Debug)]
#[command(name = "u2kw")]
#[command(about = "Run Android UI automation keywords")]
#[command(after_help = r#"Examples:
    # List keywords
    u2kw --list-keywords

    # List adb devices
    u2kw --list-devices

    # Click a button on a specific device
    u2kw --serial emulator-5554 keyword "Click Element By Locator" resourceId=com.example:id/login

    # Run a step table
    u2kw run login.steps
"#)]
struct Cli {
    /// adb serial, device IP or agent URL
    #[arg(short = 's', long, env = "ANDROID_SERIAL")]
    serial: Option<String>,

    /// Directory for log files
    #[arg(long, env = "U2KW_LOG_DIR", default_value = "logs")]
    log_dir: PathBuf,

    /// List connected devices and exit
    #[arg(long)]
    list_devices: bool,

    /// List keywords and exit
    #[arg(long)]
    list_keywords: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one keyword; key=value arguments are named
    Keyword {
        name: String,
        #[arg(allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Run a step table
    Run { file: PathBuf },
}

fn print_keywords() {
    for (name, usage) in keyword_catalog() {
        println!("  {:<50} {}", name, usage);
    }
}

async fn print_devices() -> Result<()> {
    let devices = Adb::new(None).list_devices().await?;
    if devices.is_empty() {
        println!("No devices connected.");
        return Ok(());
    }
    println!("Connected devices:");
    println!("{}", "-".repeat(60));
    for device in devices {
        let status_icon = if device.is_online() {
            "\u{2713}"
        } else {
            "\u{2717}"
        };
        let model_info = device
            .model
            .map(|m| format!(" ({})", m))
            .unwrap_or_default();
        println!(
            "  {} {:<30} [{:?}]{}",
            status_icon, device.serial, device.connection_type, model_info
        );
    }
    Ok(())
}

async fn connect(serial: Option<&str>) -> Result<KeywordLibrary> {
    let mobile: Mobile = Mobile::new();
    mobile
        .connect_device(serial)
        .await
        .with_context(|| format!("connecting to {}", serial.unwrap_or("default device")))?;
    Ok(KeywordLibrary::new(mobile))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    if args.list_keywords {
        print_keywords();
        return Ok(());
    }

    let adb_missing = which::which("adb").is_err();
    if args.list_devices {
        if adb_missing {
            bail!("adb is not installed or not in PATH");
        }
        return print_devices().await;
    }

    let Some(command) = args.command else {
        bail!("nothing to do, see --help");
    };

    let log_file = init_logging(&args.log_dir).context("initializing logging")?;
    info!("Logging to {}", log_file.display());
    if adb_missing {
        warn!("adb is not in PATH, only agent URLs will work");
    }

    let library = connect(args.serial.as_deref()).await?;
    match command {
        Command::Keyword { name, args } => {
            let (positional, named) = split_args(&args, &Variables::default())?;
            let value = library.run_keyword(&name, positional, named).await?;
            println!("{}", value);
        }
        Command::Run { file } => {
            let steps = load_script(&file).await?;
            let count = run_steps(&library, &steps, &mut Variables::default()).await?;
            println!("{} steps passed", count);
        }
    }
    Ok(())
}
