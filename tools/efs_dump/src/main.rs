mod config;
mod flags;
mod logger;

use amd_manifest::{efs, FlatImage};
use colored::Colorize;
use config::Config;
use eyre::{Result, WrapErr};
use log::{info, warn};

fn main() -> Result<()> {
    color_eyre::install()?;

    let flags = flags::EfsDump::from_env_or_exit();
    let config = Config::new(&flags)?;
    logger::init(config.log_level)?;

    let bytes = std::fs::read(&config.image)
        .wrap_err_with(|| format!("Failed to read firmware image {}", config.image.display()))?;
    let image = FlatImage::with_mapping_top(&bytes, config.mapping_top);
    match image.base_address() {
        Some(base) => info!("Loaded {:#x} byte image, mapped at {:#x}..{:#x}", bytes.len(), base, config.mapping_top),
        None => warn!("Image ({:#x} bytes) is too big to fit below {:#x}", bytes.len(), config.mapping_top),
    }

    let (structure, range) = efs::find(&image).wrap_err("Failed to find the Embedded Firmware Structure")?;

    println!(
        "{}",
        format!("[*] Embedded Firmware Structure at offset {:#x} ({} bytes)", range.offset, range.length).bold().magenta()
    );
    if let Some(address) = image.offset_to_phys_addr(range.offset) {
        println!("Physical address: {:#x}", address);
    }
    println!("{}", structure);

    if config.raw {
        if let Some(raw) = range.slice(&bytes) {
            println!("{}", "[*] Raw bytes".bold().magenta());
            hex_dump(range.offset, raw);
        }
    }

    Ok(())
}

fn hex_dump(base: u64, bytes: &[u8]) {
    for (i, line) in bytes.chunks(16).enumerate() {
        let hex = line.iter().map(|byte| format!("{:02x}", byte)).collect::<Vec<_>>().join(" ");
        println!("{:08x}: {}", base + (i * 16) as u64, hex);
    }
}
