//! Merges the optional `EfsDump.toml` config file with the command-line flags. Flags take priority over the file,
//! which takes priority over the defaults.

use crate::flags::EfsDump;
use amd_manifest::image::DEFAULT_MAPPING_TOP;
use eyre::{eyre, Result, WrapErr};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_PATH: &str = "EfsDump.toml";

#[derive(Clone, Debug)]
pub struct Config {
    pub image: PathBuf,
    pub mapping_top: u64,
    pub log_level: LevelFilter,
    pub raw: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct ConfigFile {
    mapping_top: Option<u64>,
    log_level: Option<String>,
}

impl ConfigFile {
    fn load(path: &Path) -> Result<ConfigFile> {
        let contents =
            std::fs::read_to_string(path).wrap_err_with(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&contents).wrap_err_with(|| format!("Failed to parse config file {}", path.display()))
    }
}

impl Config {
    pub fn new(flags: &EfsDump) -> Result<Config> {
        let file = match flags.config {
            Some(ref path) => ConfigFile::load(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => ConfigFile::load(Path::new(DEFAULT_CONFIG_PATH))?,
            None => ConfigFile::default(),
        };

        Config::merge(flags, file)
    }

    fn merge(flags: &EfsDump, file: ConfigFile) -> Result<Config> {
        let mapping_top = match flags.mapping_top {
            Some(ref address) => parse_address(address)?,
            None => file.mapping_top.unwrap_or(DEFAULT_MAPPING_TOP),
        };

        let log_level = if flags.verbose {
            LevelFilter::Trace
        } else {
            match file.log_level {
                Some(ref level) => {
                    level.parse::<LevelFilter>().map_err(|_| eyre!("Unrecognised log level in config file: '{}'", level))?
                }
                None => LevelFilter::Info,
            }
        };

        Ok(Config { image: flags.image.clone(), mapping_top, log_level, raw: flags.raw })
    }
}

/// Parse an address given either in hex (with a `0x` prefix) or decimal.
fn parse_address(s: &str) -> Result<u64> {
    let s = s.replace('_', "");
    let result = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse::<u64>(),
    };
    result.wrap_err_with(|| format!("Invalid address: '{}'", s))
}
