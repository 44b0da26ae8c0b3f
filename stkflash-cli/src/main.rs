//! stkflash CLI - Command-line tool for flashing STK500-style serial bootloaders.
//!
//! ## Features
//!
//! - Flash Intel HEX images with baud-rate fallback
//! - Inspect HEX images without touching hardware
//! - Port listing and controller banner scanning
//! - Line-delimited JSON bridge for a remote UI
//! - Shell completion generation
//! - Environment variable and config file support

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use console::style;
use env_logger::Env;
use log::{debug, warn};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};

mod commands;
mod config;
mod serial;

use config::Config;
use serial::{SerialOptions, ask_remember_port, select_serial_port};

/// Default primary baud rate.
const DEFAULT_BAUD: u32 = 115_200;

/// Whether stderr is a terminal (set once at startup).
static STDERR_IS_TTY: AtomicBool = AtomicBool::new(true);

/// Set by the Ctrl-C handler.
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Check if emoji/animations should be used (TTY and colors enabled).
fn use_fancy_output() -> bool {
    STDERR_IS_TTY.load(Ordering::Relaxed) && console::colors_enabled_stderr()
}

/// Whether the user pressed Ctrl-C.
fn was_interrupted() -> bool {
    INTERRUPTED.load(Ordering::Relaxed)
}

/// Errors that select a specific exit code.
#[derive(Debug, thiserror::Error)]
enum CliError {
    /// Bad invocation or environment (exit code 2).
    #[error("{0}")]
    Usage(String),
    /// User cancelled (exit code 130).
    #[error("{0}")]
    Cancelled(String),
}

/// stkflash - Flash microcontrollers through an STK500-style serial bootloader.
///
/// Environment variables:
///   STKFLASH_PORT              - Default serial port
///   STKFLASH_BAUD              - Primary baud rate (default: 115200)
///   STKFLASH_NON_INTERACTIVE   - Non-interactive mode (disable prompts)
#[derive(Parser)]
#[command(name = "stkflash")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Serial port to use (auto-detected if not specified).
    #[arg(short, long, global = true, env = "STKFLASH_PORT")]
    port: Option<String>,

    /// Primary baud rate [default: 115200].
    #[arg(short, long, global = true, env = "STKFLASH_BAUD")]
    baud: Option<u32>,

    /// Baud rate retried once if the device does not sync.
    #[arg(long, global = true, default_value = "57600")]
    fallback_baud: u32,

    /// Never retry at the fallback baud rate.
    #[arg(long, global = true)]
    no_fallback: bool,

    /// Verbose output level (-v, -vv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Non-interactive mode (fail instead of prompting).
    #[arg(long, global = true, env = "STKFLASH_NON_INTERACTIVE")]
    non_interactive: bool,

    /// Confirm port selection even for auto-detected ports.
    #[arg(long, global = true)]
    confirm_port: bool,

    /// List all available ports (including unknown types).
    #[arg(long, global = true)]
    list_all_ports: bool,

    /// Path to a configuration file.
    #[arg(long = "config", global = true, value_name = "PATH")]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write an Intel HEX image to the device.
    Flash {
        /// Intel HEX file.
        hex: PathBuf,

        /// Bytes per programmed page (even, at most 256).
        #[arg(long, default_value = "256")]
        page_size: usize,
    },

    /// Decode an Intel HEX image and print a summary.
    Info {
        /// Intel HEX file.
        hex: PathBuf,

        /// Page size used for the page count.
        #[arg(long, default_value = "256")]
        page_size: usize,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Sync with the bootloader and print its version and signature.
    Identify,

    /// List available serial ports.
    ListPorts {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Probe USB serial ports for a controller status banner.
    Scan {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Serve scan and flash requests as JSON lines over stdin/stdout.
    Bridge,

    /// Generate shell completion script.
    Completions {
        /// Shell type.
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Cli {
    /// Flash parameters from the command line, falling back to the config file.
    fn flash_config(&self, config: &Config, page_size: usize) -> stkflash::FlashConfig {
        let baud = self
            .baud
            .or(config.port.connection.baud)
            .unwrap_or(DEFAULT_BAUD);
        let flash = stkflash::FlashConfig::default()
            .with_baud(baud)
            .with_page_size(page_size);
        if self.no_fallback {
            flash.without_fallback()
        } else {
            flash.with_fallback_baud(Some(self.fallback_baud))
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // --- NO_COLOR and TTY detection ---
    let stderr_is_tty = console::Term::stderr().is_term();
    STDERR_IS_TTY.store(stderr_is_tty, Ordering::Relaxed);

    if env::var("NO_COLOR").is_ok() || !stderr_is_tty {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();

    debug!(
        "stkflash v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    // First Ctrl-C asks the library to stop at the next page boundary,
    // a second one exits immediately.
    if let Err(e) = ctrlc::set_handler(|| {
        if INTERRUPTED.swap(true, Ordering::Relaxed) {
            std::process::exit(130);
        }
    }) {
        warn!("Could not install Ctrl-C handler: {e}");
    }
    stkflash::set_interrupt_checker(was_interrupted);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_error(&err);
            ExitCode::from(exit_code(&err))
        },
    }
}

fn run(cli: &Cli) -> Result<()> {
    let mut config = if let Some(ref path) = cli.config_path {
        Config::load_from_path(path)
    } else {
        Config::load()
    };

    match &cli.command {
        Commands::Flash { hex, page_size } => {
            commands::flash::cmd_flash(cli, &mut config, hex, *page_size)
        },
        Commands::Info {
            hex,
            page_size,
            json,
        } => commands::info::cmd_info(hex, *page_size, *json),
        Commands::Identify => commands::flash::cmd_identify(cli, &mut config),
        Commands::ListPorts { json } => commands::ports::cmd_list_ports(*json),
        Commands::Scan { json } => commands::ports::cmd_scan(*json),
        Commands::Bridge => {
            commands::bridge::cmd_bridge(cli, &config);
            Ok(())
        },
        Commands::Completions { shell } => {
            commands::completions::cmd_completions(*shell);
            Ok(())
        },
    }
}

/// Get serial port from CLI args, config or interactive selection.
fn get_port(cli: &Cli, config: &mut Config) -> Result<String> {
    let options = SerialOptions {
        port: cli.port.clone(),
        list_all_ports: cli.list_all_ports,
        non_interactive: cli.non_interactive,
        confirm_port: cli.confirm_port,
    };

    let selected = select_serial_port(&options, config)?;

    // Ask to remember if not a known device and interactive mode
    if !selected.is_known && !cli.non_interactive {
        ask_remember_port(&selected.port, config)?;
    }

    Ok(selected.port.name)
}

/// Map an error to the process exit code.
fn exit_code(err: &anyhow::Error) -> u8 {
    if let Some(cli_err) = err.downcast_ref::<CliError>() {
        return match cli_err {
            CliError::Usage(_) => 2,
            CliError::Cancelled(_) => 130,
        };
    }
    match err.downcast_ref::<stkflash::Error>() {
        Some(stkflash::Error::Cancelled) => 130,
        _ => 1,
    }
}

fn report_error(err: &anyhow::Error) {
    eprintln!("{} {err}", style("Error:").red().bold());
    for cause in err.chain().skip(1) {
        eprintln!("  {} {cause}", style("caused by:").dim());
    }
}
