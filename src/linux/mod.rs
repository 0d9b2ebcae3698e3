//! Linux plumbing: `/dev/i2c-N` buses, GPIO backends and board settings.

pub mod error;
pub mod gpio;
pub mod settings;

use std::path::Path;

use linux_embedded_hal::I2cdev;
use log::debug;

pub use self::error::{Error, Result};
pub use self::settings::{DacSettings, GpioSettings, Settings};

/// Opens an I2C character device such as `/dev/i2c-1`.
pub fn open_bus(path: &Path) -> Result<I2cdev> {
    debug!("opening I2C bus {}", path.display());
    I2cdev::new(path).map_err(|e| Error::I2cOpen(path.to_owned(), e))
}

/// Parses a 7-bit I2C address written in hex (`0x64`) or decimal (`100`).
pub fn parse_address(text: &str) -> Result<u8> {
    let trimmed = text.trim();
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => trimmed.parse::<u8>(),
    };
    match parsed {
        Ok(address) if address <= 0x7f => Ok(address),
        _ => Err(Error::InvalidAddress(text.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses() {
        assert_eq!(parse_address("0x64").unwrap(), 0x64);
        assert_eq!(parse_address("0X7f").unwrap(), 0x7f);
        assert_eq!(parse_address("96").unwrap(), 0x60);
        assert_eq!(parse_address(" 0x03 ").unwrap(), 0x03);
        assert!(matches!(parse_address("0x80"), Err(Error::InvalidAddress(_))));
        assert!(matches!(parse_address("300"), Err(Error::InvalidAddress(_))));
        assert!(matches!(parse_address("dac0"), Err(Error::InvalidAddress(_))));
    }
}
