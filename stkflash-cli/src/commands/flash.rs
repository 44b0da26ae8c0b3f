//! Flash and identify command implementations.

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use stkflash::{Flasher, MemoryImage, NativeOpener};

use crate::config::Config;
use crate::{Cli, CliError, get_port, use_fancy_output, was_interrupted};

fn ensure_not_interrupted() -> Result<()> {
    if was_interrupted() {
        Err(CliError::Cancelled("Interrupted".to_string()).into())
    } else {
        Ok(())
    }
}

fn progress_bar(hidden: bool) -> Result<ProgressBar> {
    if hidden {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")?
            .progress_chars("#>-"),
    );
    pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
    Ok(pb)
}

/// Read and decode a HEX file.
pub(crate) fn load_image(path: &Path) -> Result<MemoryImage> {
    MemoryImage::from_file(path)
        .with_context(|| format!("Failed to load HEX image {}", path.display()))
}

/// Flash command implementation.
pub(crate) fn cmd_flash(cli: &Cli, config: &mut Config, hex: &Path, page_size: usize) -> Result<()> {
    if !cli.quiet {
        eprintln!(
            "{} Loading {}",
            style("📦").cyan(),
            hex.display()
        );
    }

    // Decode before touching any port
    let image = load_image(hex)?;
    if !cli.quiet {
        eprintln!(
            "{} {} bytes in {} pages",
            style("ℹ").blue(),
            image.len(),
            image.page_count(page_size.max(1))
        );
    }

    let port = get_port(cli, config)?;
    ensure_not_interrupted()?;

    if !cli.quiet {
        eprintln!("{} Connecting to {port}...", style("🔌").cyan());
    }

    let pb = progress_bar(cli.quiet || !use_fancy_output())?;
    pb.set_message(port.clone());

    let mut flasher = Flasher::new(NativeOpener).with_config(cli.flash_config(config, page_size));
    let result = flasher.flash_image(&image, &port, |progress| {
        pb.set_position(u64::from(progress.percent()));
    });

    if let Err(err) = result {
        pb.abandon();
        return Err(anyhow::Error::new(err).context(format!("Flashing {port} failed")));
    }
    pb.finish_with_message("complete");

    if !cli.quiet {
        eprintln!("\n{} Flash completed", style("🎉").green().bold());
    }

    Ok(())
}

/// Identify command implementation.
pub(crate) fn cmd_identify(cli: &Cli, config: &mut Config) -> Result<()> {
    let port = get_port(cli, config)?;
    ensure_not_interrupted()?;

    let mut flasher = Flasher::new(NativeOpener).with_config(cli.flash_config(config, 256));
    let identity = flasher
        .identify(&port)
        .with_context(|| format!("Identifying device on {port} failed"))?;

    println!("{port}: {identity}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_load_image_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.hex");
        fs::write(&path, ":0100000001FE\n").unwrap();

        let err = load_image(&path).unwrap_err();
        assert!(err.to_string().contains("bad.hex"));
        assert!(err.downcast_ref::<stkflash::Error>().is_some());
    }

    #[test]
    fn test_load_image_valid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ok.hex");
        fs::write(&path, ":0400000001020304F2\n:00000001FF\n").unwrap();

        let image = load_image(&path).unwrap();
        assert_eq!(image.data(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_hidden_progress_bar() {
        let pb = progress_bar(true).unwrap();
        assert!(pb.is_hidden());
    }
}
