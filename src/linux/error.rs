use std::fmt;
use std::path::PathBuf;

use linux_embedded_hal::gpio_cdev;
use linux_embedded_hal::i2cdev::linux::LinuxI2CError;
use linux_embedded_hal::sysfs_gpio;
use linux_embedded_hal::{CdevPinError, I2CError, SysfsPinError};

use crate::linux::gpio::Backend;

#[derive(Debug)]
pub enum Error {
    I2cOpen(PathBuf, LinuxI2CError),
    I2c(I2CError),
    Cdev(gpio_cdev::errors::Error),
    CdevPin(CdevPinError),
    Sysfs(sysfs_gpio::Error),
    SysfsPin(SysfsPinError),
    #[cfg(feature = "rpi")]
    Rppal(rppal::gpio::Error),
    Configuration(config::ConfigError),
    BackendUnavailable(Backend),
    NotAnOutput,
    NotAnInput,
    UnknownDac(String),
    NoRelocatableDac,
    MissingLine { dac: String, line: &'static str },
    InvalidAddress(String),
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

macro_rules! impl_error {
    ($inner:ty, $variant:ident) => {
        impl From<$inner> for Error {
            fn from(inner: $inner) -> Self {
                Error::$variant(inner)
            }
        }
    };
}

impl_error!(I2CError, I2c);
impl_error!(gpio_cdev::errors::Error, Cdev);
impl_error!(CdevPinError, CdevPin);
impl_error!(sysfs_gpio::Error, Sysfs);
impl_error!(SysfsPinError, SysfsPin);
#[cfg(feature = "rpi")]
impl_error!(rppal::gpio::Error, Rppal);
impl_error!(config::ConfigError, Configuration);

impl embedded_hal::digital::Error for Error {
    fn kind(&self) -> embedded_hal::digital::ErrorKind {
        embedded_hal::digital::ErrorKind::Other
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::I2cOpen(path, inner) => write!(f, "{}: {}", path.display(), inner),
            Error::I2c(inner) => write!(f, "{:?}", inner),
            Error::Cdev(inner) => write!(f, "{}", inner),
            Error::CdevPin(inner) => write!(f, "{:?}", inner),
            Error::Sysfs(inner) => write!(f, "{}", inner),
            Error::SysfsPin(inner) => write!(f, "{:?}", inner),
            #[cfg(feature = "rpi")]
            Error::Rppal(inner) => write!(f, "{}", inner),
            Error::Configuration(inner) => write!(f, "{}", inner),
            Error::BackendUnavailable(backend) => {
                write!(f, "GPIO backend {:?} is not compiled in", backend)
            }
            Error::NotAnOutput => write!(f, "GPIO line was requested as an input"),
            Error::NotAnInput => write!(f, "GPIO line was requested as an output"),
            Error::UnknownDac(name) => write!(f, "no DAC named {:?} in the settings", name),
            Error::NoRelocatableDac => {
                write!(f, "no DAC in the settings has a non-default address")
            }
            Error::MissingLine { dac, line } => {
                write!(f, "DAC {:?} has no {} line configured", dac, line)
            }
            Error::InvalidAddress(text) => write!(f, "invalid I2C address: {}", text),
        }
    }
}
