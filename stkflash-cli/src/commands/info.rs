//! HEX image info command.

use {
    anyhow::Result,
    console::style,
    std::path::Path,
    stkflash::{MAX_PROGRAM_SIZE, MemoryImage},
};

use super::flash::load_image;

fn format_address(addr: Option<u32>) -> String {
    addr.map_or_else(|| "-".to_string(), |a| format!("0x{a:08X}"))
}

fn info_json(image: &MemoryImage, page_size: usize) -> serde_json::Value {
    serde_json::json!({
        "ok": true,
        "data": {
            "size": image.len(),
            "page_size": page_size,
            "pages": image.page_count(page_size),
            "fits": image.len() <= MAX_PROGRAM_SIZE,
            "start_segment_address": image.start_segment_address(),
            "start_linear_address": image.start_linear_address(),
        }
    })
}

/// Info command implementation.
pub(crate) fn cmd_info(hex: &Path, page_size: usize, json: bool) -> Result<()> {
    let image = load_image(hex)?;
    let page_size = page_size.max(1);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&info_json(&image, page_size))?
        );
        return Ok(());
    }

    eprintln!("{}", style(hex.display()).bold().underlined());
    println!("  Size:           {} bytes", image.len());
    println!("  Pages:          {} x {page_size} bytes", image.page_count(page_size));
    println!(
        "  Start segment:  {}",
        format_address(image.start_segment_address())
    );
    println!(
        "  Start linear:   {}",
        format_address(image.start_linear_address())
    );
    if image.len() > MAX_PROGRAM_SIZE {
        eprintln!(
            "{} Image exceeds the {MAX_PROGRAM_SIZE} bytes a bootloader can address",
            style("⚠").yellow()
        );
    }
    eprintln!("{} Decoded OK", style("✓").green());

    Ok(())
}
