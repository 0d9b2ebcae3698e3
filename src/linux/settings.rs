//! Board description: which bus the DACs sit on and how their control lines are wired.
//!
//! Settings come from an optional TOML file, then `MCP4728_`-prefixed environment variables
//! (`MCP4728_BUS=/dev/i2c-0`, `MCP4728_GPIO__BACKEND=sysfs`).  Anything left unset falls back
//! to the defaults below, which describe the reference board.
//!
//! ```toml
//! bus = "/dev/i2c-1"
//!
//! [gpio]
//! backend = "cdev"
//! chip = "/dev/gpiochip0"
//!
//! [[dac]]
//! name = "dac0"
//! address = 0x60
//! ldac = 0
//! rdy = 25
//! ```

use std::path::{Path, PathBuf};

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use serde::Deserialize;

use crate::linux::error::{Error, Result};
use crate::linux::gpio::Backend;
use crate::DEFAULT_ADDRESS;

#[derive(Debug, Deserialize, PartialEq, Eq, Clone)]
#[serde(default)]
pub struct Settings {
    /// I2C character device the DACs are attached to.
    pub bus: PathBuf,
    pub gpio: GpioSettings,
    #[serde(rename = "dac")]
    pub dacs: Vec<DacSettings>,
}

#[derive(Debug, Deserialize, PartialEq, Eq, Clone)]
#[serde(default)]
pub struct GpioSettings {
    pub backend: Backend,
    /// GPIO chip device, used by the `cdev` backend only.
    pub chip: PathBuf,
    /// Consumer label shown for requested lines.
    pub consumer: String,
}

#[derive(Debug, Deserialize, PartialEq, Eq, Clone)]
pub struct DacSettings {
    pub name: String,
    pub address: u8,
    /// GPIO line wired to LDAC.
    #[serde(default)]
    pub ldac: Option<u32>,
    /// GPIO line wired to RDY/BSY.
    #[serde(default)]
    pub rdy: Option<u32>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            bus: PathBuf::from("/dev/i2c-1"),
            gpio: GpioSettings::default(),
            dacs: vec![
                DacSettings {
                    name: "dac0".to_owned(),
                    address: 0x60,
                    ldac: Some(0),
                    rdy: Some(25),
                },
                DacSettings {
                    name: "dac1".to_owned(),
                    address: 0x64,
                    ldac: Some(1),
                    rdy: Some(21),
                },
            ],
        }
    }
}

impl Default for GpioSettings {
    fn default() -> Self {
        GpioSettings {
            backend: Backend::Cdev,
            chip: PathBuf::from("/dev/gpiochip0"),
            consumer: "mcp4728ctl".to_owned(),
        }
    }
}

impl Settings {
    /// Loads settings from `path` (if any) and the environment.
    pub fn load(path: Option<&Path>) -> Result<Settings> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        Self::build(builder)
    }

    /// Parses settings from TOML text, still honouring the environment.
    pub fn from_toml_str(text: &str) -> Result<Settings> {
        Self::build(Config::builder().add_source(File::from_str(text, FileFormat::Toml)))
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Settings> {
        let conf = builder
            .add_source(
                Environment::with_prefix("MCP4728")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;
        Ok(conf.try_deserialize()?)
    }

    /// Looks a DAC up by name.
    pub fn dac(&self, name: &str) -> Result<&DacSettings> {
        self.dacs
            .iter()
            .find(|dac| dac.name == name)
            .ok_or_else(|| Error::UnknownDac(name.to_owned()))
    }

    /// Picks the DAC a factory-default part should be moved to, and its address.
    ///
    /// A named DAC wins.  Otherwise the DAC configured at `to` is used, and failing that the
    /// first DAC whose address is not the factory default.
    pub fn bring_up_target(
        &self,
        dac: Option<&str>,
        to: Option<u8>,
    ) -> Result<(&DacSettings, u8)> {
        if let Some(name) = dac {
            let dac = self.dac(name)?;
            return Ok((dac, to.unwrap_or(dac.address)));
        }
        let configured = to.and_then(|to| self.dacs.iter().find(|dac| dac.address == to));
        let dac = configured
            .or_else(|| self.dacs.iter().find(|dac| dac.address != DEFAULT_ADDRESS))
            .ok_or(Error::NoRelocatableDac)?;
        Ok((dac, to.unwrap_or(dac.address)))
    }
}

impl DacSettings {
    pub fn ldac_line(&self) -> Result<u32> {
        self.ldac.ok_or_else(|| Error::MissingLine {
            dac: self.name.clone(),
            line: "LDAC",
        })
    }

    pub fn rdy_line(&self) -> Result<u32> {
        self.rdy.ok_or_else(|| Error::MissingLine {
            dac: self.name.clone(),
            line: "RDY",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_reference_board() {
        let settings = Settings::default();
        assert_eq!(settings.bus, PathBuf::from("/dev/i2c-1"));
        assert_eq!(settings.gpio.backend, Backend::Cdev);
        let dac1 = settings.dac("dac1").unwrap();
        assert_eq!(dac1.address, 0x64);
        assert_eq!(dac1.ldac_line().unwrap(), 1);
        assert_eq!(dac1.rdy_line().unwrap(), 21);
    }

    #[test]
    fn parse_toml() {
        let settings = Settings::from_toml_str(
            r#"
            bus = "/dev/i2c-3"

            [gpio]
            backend = "sysfs"

            [[dac]]
            name = "left"
            address = 0x61
            ldac = 17

            [[dac]]
            name = "right"
            address = 0x62
            "#,
        )
        .unwrap();
        assert_eq!(settings.bus, PathBuf::from("/dev/i2c-3"));
        assert_eq!(settings.gpio.backend, Backend::Sysfs);
        assert_eq!(settings.gpio.chip, PathBuf::from("/dev/gpiochip0"));
        assert_eq!(settings.dacs.len(), 2);

        let left = settings.dac("left").unwrap();
        assert_eq!(left.address, 0x61);
        assert_eq!(left.ldac_line().unwrap(), 17);
        assert!(matches!(
            left.rdy_line(),
            Err(Error::MissingLine { line: "RDY", .. })
        ));
        assert!(matches!(settings.dac("dac0"), Err(Error::UnknownDac(_))));
    }

    #[test]
    fn bring_up_moves_default_part_to_dac1() {
        let settings = Settings::default();
        let (dac, to) = settings.bring_up_target(None, None).unwrap();
        assert_eq!(dac.name, "dac1");
        assert_eq!(to, 0x64);
        assert_eq!(dac.ldac_line().unwrap(), 1);
        assert_eq!(dac.rdy_line().unwrap(), 21);
    }

    #[test]
    fn bring_up_target_overrides() {
        let settings = Settings::default();
        let (dac, to) = settings.bring_up_target(Some("dac0"), None).unwrap();
        assert_eq!((dac.name.as_str(), to), ("dac0", DEFAULT_ADDRESS));

        let (dac, to) = settings.bring_up_target(Some("dac0"), Some(0x62)).unwrap();
        assert_eq!((dac.name.as_str(), to), ("dac0", 0x62));

        let (dac, to) = settings.bring_up_target(None, Some(0x60)).unwrap();
        assert_eq!((dac.name.as_str(), to), ("dac0", 0x60));

        let (dac, to) = settings.bring_up_target(None, Some(0x63)).unwrap();
        assert_eq!((dac.name.as_str(), to), ("dac1", 0x63));

        assert!(matches!(
            settings.bring_up_target(Some("dac7"), None),
            Err(Error::UnknownDac(_))
        ));
    }

    #[test]
    fn bring_up_needs_a_relocatable_dac() {
        let settings = Settings::from_toml_str(
            r#"
            [[dac]]
            name = "only"
            address = 0x60
            "#,
        )
        .unwrap();
        assert!(matches!(
            settings.bring_up_target(None, None),
            Err(Error::NoRelocatableDac)
        ));
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let settings = Settings::from_toml_str("").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn rejects_unknown_backend() {
        let result = Settings::from_toml_str("[gpio]\nbackend = \"wiringpi\"\n");
        assert!(matches!(result, Err(Error::Configuration(_))));
    }
}
