//! GPIO lines for LDAC and RDY/BSY, behind one of several Linux backends.

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use linux_embedded_hal::gpio_cdev::{Chip, LineRequestFlags};
use linux_embedded_hal::sysfs_gpio::Direction;
use linux_embedded_hal::{CdevPin, SysfsPin};
use log::{debug, warn};
use serde::Deserialize;

use crate::linux::error::{Error, Result};
use crate::linux::settings::GpioSettings;

/// How GPIO lines are reached.
#[derive(Debug, Deserialize, PartialEq, Eq, Copy, Clone)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// The GPIO character device (`/dev/gpiochipN`), as used by libgpiod.
    Cdev,
    /// The legacy `/sys/class/gpio` interface.
    Sysfs,
    /// Direct register access on a Raspberry Pi; line numbers are BCM GPIO numbers.
    Rppal,
}

/// A requested GPIO line.
///
/// Sysfs lines are unexported again when dropped; the other backends release theirs on close.
pub enum Line {
    Cdev(CdevPin),
    Sysfs(SysfsPin),
    #[cfg(feature = "rpi")]
    RppalOutput(rppal::gpio::OutputPin),
    #[cfg(feature = "rpi")]
    RppalInput(rppal::gpio::InputPin),
}

/// Requests `line` as an output, initially driven high.
pub fn output(settings: &GpioSettings, line: u32) -> Result<Line> {
    debug!("requesting {:?} line {} as output", settings.backend, line);
    match settings.backend {
        Backend::Cdev => {
            let mut chip = Chip::new(&settings.chip)?;
            let handle =
                chip.get_line(line)?
                    .request(LineRequestFlags::OUTPUT, 1, &settings.consumer)?;
            Ok(Line::Cdev(CdevPin::new(handle)?))
        }
        Backend::Sysfs => {
            let pin = SysfsPin::new(u64::from(line));
            pin.export()?;
            pin.set_direction(Direction::High)?;
            Ok(Line::Sysfs(pin))
        }
        Backend::Rppal => rppal_output(line),
    }
}

/// Requests `line` as an input.
pub fn input(settings: &GpioSettings, line: u32) -> Result<Line> {
    debug!("requesting {:?} line {} as input", settings.backend, line);
    match settings.backend {
        Backend::Cdev => {
            let mut chip = Chip::new(&settings.chip)?;
            let handle =
                chip.get_line(line)?
                    .request(LineRequestFlags::INPUT, 0, &settings.consumer)?;
            Ok(Line::Cdev(CdevPin::new(handle)?))
        }
        Backend::Sysfs => {
            let pin = SysfsPin::new(u64::from(line));
            pin.export()?;
            pin.set_direction(Direction::In)?;
            Ok(Line::Sysfs(pin))
        }
        Backend::Rppal => rppal_input(line),
    }
}

#[cfg(feature = "rpi")]
fn rppal_output(line: u32) -> Result<Line> {
    let pin = rppal::gpio::Gpio::new()?.get(bcm_number(line)?)?;
    Ok(Line::RppalOutput(pin.into_output_high()))
}

#[cfg(feature = "rpi")]
fn rppal_input(line: u32) -> Result<Line> {
    let pin = rppal::gpio::Gpio::new()?.get(bcm_number(line)?)?;
    Ok(Line::RppalInput(pin.into_input()))
}

#[cfg(feature = "rpi")]
fn bcm_number(line: u32) -> Result<u8> {
    u8::try_from(line).map_err(|_| Error::Rppal(rppal::gpio::Error::PinNotAvailable(u8::MAX)))
}

#[cfg(not(feature = "rpi"))]
fn rppal_output(_line: u32) -> Result<Line> {
    Err(Error::BackendUnavailable(Backend::Rppal))
}

#[cfg(not(feature = "rpi"))]
fn rppal_input(_line: u32) -> Result<Line> {
    Err(Error::BackendUnavailable(Backend::Rppal))
}

impl Line {
    /// Hands the line back to the kernel.
    pub fn release(&self) -> Result<()> {
        match self {
            Line::Sysfs(pin) => Ok(pin.unexport()?),
            _ => Ok(()),
        }
    }
}

impl Drop for Line {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("failed to release GPIO line: {e}");
        }
    }
}

impl ErrorType for Line {
    type Error = Error;
}

impl OutputPin for Line {
    fn set_low(&mut self) -> Result<()> {
        match self {
            Line::Cdev(pin) => Ok(pin.set_low()?),
            Line::Sysfs(pin) => Ok(pin.set_low()?),
            #[cfg(feature = "rpi")]
            Line::RppalOutput(pin) => {
                pin.set_low();
                Ok(())
            }
            #[cfg(feature = "rpi")]
            Line::RppalInput(_) => Err(Error::NotAnOutput),
        }
    }

    fn set_high(&mut self) -> Result<()> {
        match self {
            Line::Cdev(pin) => Ok(pin.set_high()?),
            Line::Sysfs(pin) => Ok(pin.set_high()?),
            #[cfg(feature = "rpi")]
            Line::RppalOutput(pin) => {
                pin.set_high();
                Ok(())
            }
            #[cfg(feature = "rpi")]
            Line::RppalInput(_) => Err(Error::NotAnOutput),
        }
    }
}

impl InputPin for Line {
    fn is_high(&mut self) -> Result<bool> {
        match self {
            Line::Cdev(pin) => Ok(pin.is_high()?),
            Line::Sysfs(pin) => Ok(pin.is_high()?),
            #[cfg(feature = "rpi")]
            Line::RppalInput(pin) => Ok(pin.is_high()),
            #[cfg(feature = "rpi")]
            Line::RppalOutput(_) => Err(Error::NotAnInput),
        }
    }

    fn is_low(&mut self) -> Result<bool> {
        self.is_high().map(|high| !high)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_of_unexported_sysfs_line() {
        let line = Line::Sysfs(SysfsPin::new(9999));
        assert!(line.release().is_ok());
    }

    #[cfg(not(feature = "rpi"))]
    #[test]
    fn rppal_needs_feature() {
        let settings = GpioSettings {
            backend: Backend::Rppal,
            ..GpioSettings::default()
        };
        assert!(matches!(
            output(&settings, 17),
            Err(Error::BackendUnavailable(Backend::Rppal))
        ));
    }
}
