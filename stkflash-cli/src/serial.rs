//! Interactive serial port selection.
//!
//! Resolution order: explicit `--port`, the configured port, a single
//! recognized USB device, then an interactive `dialoguer` prompt. In
//! non-interactive mode anything other than exactly one candidate is a
//! usage error.

use {
    crate::{CliError, config::Config},
    anyhow::Result,
    console::style,
    dialoguer::{Confirm, Error as DialoguerError, Select, theme::ColorfulTheme},
    log::{debug, error, info},
    std::io::IsTerminal,
    stkflash::{DetectedPort, PortInfo, discover_ports},
};

/// Options for serial port selection.
#[derive(Debug, Clone, Default)]
pub struct SerialOptions {
    /// Explicit port specified via CLI.
    pub port: Option<String>,
    /// List all ports (including unknown types).
    pub list_all_ports: bool,
    /// Non-interactive mode (fail if multiple ports).
    pub non_interactive: bool,
    /// Force confirmation even for single recognized port.
    pub confirm_port: bool,
}

/// Result of port selection including whether it was a known device.
pub struct SelectedPort {
    /// The selected port info.
    pub port: DetectedPort,
    /// Whether this port matched a known/configured device.
    pub is_known: bool,
}

/// Selection failures are usage errors so scripts can tell them apart (exit 2).
fn usage_err(message: &str) -> anyhow::Error {
    CliError::Usage(message.to_string()).into()
}

fn cancelled() -> anyhow::Error {
    CliError::Cancelled("Port selection cancelled".to_string()).into()
}

/// Pop the only element of `ports`, or `None` if there are zero or several.
fn single(ports: Vec<DetectedPort>) -> Option<DetectedPort> {
    let mut iter = ports.into_iter();
    match (iter.next(), iter.next()) {
        (Some(port), None) => Some(port),
        _ => None,
    }
}

fn select_non_interactive_port(
    selection_ports: Vec<DetectedPort>,
    config: &Config,
) -> Result<SelectedPort> {
    let count = selection_ports.len();
    match single(selection_ports) {
        Some(port) => Ok(SelectedPort {
            is_known: is_known_device(&port, config),
            port,
        }),
        None if count == 0 => Err(usage_err("No serial ports available")),
        None => Err(usage_err(
            "Found multiple serial ports; pass --port to choose one",
        )),
    }
}

/// Select a serial port interactively or automatically.
pub fn select_serial_port(options: &SerialOptions, config: &Config) -> Result<SelectedPort> {
    if let Some(port_name) = &options.port {
        return Ok(find_port_by_name(port_name));
    }

    if let Some(port_name) = &config.port.connection.serial {
        debug!("Using port from config: {port_name}");
        return Ok(find_port_by_name(port_name));
    }

    let ports = discover_ports();
    if ports.is_empty() {
        return Err(usage_err(
            "No serial ports found; is the board plugged in?",
        ));
    }

    let known_ports: Vec<DetectedPort> = ports
        .iter()
        .filter(|p| is_known_device(p, config))
        .cloned()
        .collect();

    // Known devices first unless the user asks for everything
    let selection_ports = if options.list_all_ports || known_ports.is_empty() {
        ports
    } else {
        known_ports
    };

    if options.non_interactive {
        return select_non_interactive_port(selection_ports, config);
    }

    if selection_ports.len() > 1 {
        ensure_interactive_terminal()?;
        return select_port_interactive(selection_ports, config);
    }

    let port = single(selection_ports).ok_or_else(|| usage_err("No serial ports available"))?;
    let is_known = is_known_device(&port, config);
    if is_known && !options.confirm_port {
        info!("Auto-selected port: {} [{}]", port.name, port.device.name());
        Ok(SelectedPort { port, is_known })
    } else {
        ensure_interactive_terminal()?;
        confirm_single_port(port)
    }
}

fn ensure_interactive_terminal() -> Result<()> {
    if std::io::stdin().is_terminal() && std::io::stderr().is_terminal() {
        Ok(())
    } else {
        Err(usage_err(
            "Port selection needs an interactive terminal; pass --port",
        ))
    }
}

fn map_prompt_error(err: DialoguerError) -> anyhow::Error {
    match err {
        DialoguerError::IO(io_err) if io_err.kind() == std::io::ErrorKind::Interrupted => {
            cancelled()
        },
        DialoguerError::IO(io_err) => usage_err(&format!("Prompt failed: {io_err}")),
    }
}

/// Find a port by name, accepting names the enumerator does not list.
fn find_port_by_name(name: &str) -> SelectedPort {
    let ports = discover_ports();

    let found = ports
        .iter()
        .find(|p| p.name == name)
        .or_else(|| ports.iter().find(|p| p.name.eq_ignore_ascii_case(name)));

    match found {
        Some(port) => SelectedPort {
            port: port.clone(),
            is_known: port.device.is_known(),
        },
        None => SelectedPort {
            port: DetectedPort::from(PortInfo {
                name: name.to_string(),
                ..PortInfo::default()
            }),
            is_known: false,
        },
    }
}

/// Check if a port matches a known device (from config or built-in list).
fn is_known_device(port: &DetectedPort, config: &Config) -> bool {
    if port.device.is_known() {
        return true;
    }
    match (port.vid, port.pid) {
        (Some(vid), Some(pid)) => config.is_remembered(vid, pid),
        _ => false,
    }
}

fn port_label(port: &DetectedPort, config: &Config) -> String {
    let name = if is_known_device(port, config) {
        style(&port.name).bold().to_string()
    } else {
        port.name.clone()
    };

    let device_info = if port.device.is_known() {
        format!(" [{}]", style(port.device.name()).yellow())
    } else if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
        format!(" ({vid:04X}:{pid:04X})")
    } else {
        String::new()
    };

    let product = port
        .product
        .as_ref()
        .map(|p| format!(" - {}", style(p).dim()))
        .unwrap_or_default();

    format!("{name}{device_info}{product}")
}

fn select_port_interactive(mut ports: Vec<DetectedPort>, config: &Config) -> Result<SelectedPort> {
    eprintln!(
        "{} Found {} serial ports",
        style("ℹ").blue(),
        ports.len()
    );
    eprintln!(
        "{}",
        style("Ports shown in bold are recognized USB serial devices").dim()
    );

    ports.sort_by_key(|p| !is_known_device(p, config));

    // Keep labels on one line in narrow terminals
    let term_width = usize::from(console::Term::stderr().size().1);
    let max_item_width = term_width.saturating_sub(4);
    let labels: Vec<String> = ports
        .iter()
        .map(|port| {
            console::truncate_str(&port_label(port, config), max_item_width, "\u{2026}")
                .into_owned()
        })
        .collect();

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select a serial port")
        .items(&labels)
        .default(0)
        .interact_opt()
        .map_err(map_prompt_error)?;

    let index = selection.ok_or_else(cancelled)?;
    let port = ports
        .into_iter()
        .nth(index)
        .ok_or_else(|| anyhow::anyhow!("Invalid port index: {index}"))?;
    let is_known = is_known_device(&port, config);
    Ok(SelectedPort { port, is_known })
}

fn confirm_single_port(port: DetectedPort) -> Result<SelectedPort> {
    let product_info = port
        .product
        .as_ref()
        .map(|p| format!(" - {p}"))
        .unwrap_or_default();

    let confirmed = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Use {}{product_info}?", port.name))
        .default(true)
        .interact_opt()
        .map_err(map_prompt_error)?
        .unwrap_or(false);

    if confirmed {
        Ok(SelectedPort {
            port,
            is_known: false,
        })
    } else {
        Err(cancelled())
    }
}

/// Ask user if they want to remember this port.
pub fn ask_remember_port(port: &DetectedPort, config: &mut Config) -> Result<()> {
    let (Some(vid), Some(pid)) = (port.vid, port.pid) else {
        return Ok(());
    };
    if config.is_remembered(vid, pid) || !std::io::stdin().is_terminal() {
        return Ok(());
    }

    let confirmed = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt("Remember this device for future auto-detection?")
        .default(false)
        .interact_opt()
        .map_err(map_prompt_error)?
        .unwrap_or(false);

    if confirmed {
        if let Err(e) = config.remember_usb_device(vid, pid) {
            error!("Failed to save port configuration: {e}");
        }
    }

    Ok(())
}
