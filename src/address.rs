//! Reprogramming the I2C address of an MCP4728.
//!
//! The three low address bits live in EEPROM.  They are rewritten with the "Write I2C Address
//! Bits" command:
//!
//! ```text
//! || 1 1 0 0 A2 A1 A0 0 || 0 1 1 A2 A1 A0 0 1 || 0 1 1 A2' A1' A0' 1 0 || 0 1 1 A2' A1' A0' 1 1 ||
//!    device address        current bits          new bits                 new bits (confirm)
//! ```
//!
//! The device only accepts the command when LDAC falls while it is being received, so the
//! sequence drives LDAC high before the write and low right after it, then waits for RDY/BSY to
//! signal the end of the EEPROM cycle and probes both addresses to see where the device answers.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::i2c::I2c;
use log::{debug, info, warn};

use crate::control::{read_ready, wait_until_ready};
use crate::scan::probe;
use crate::types::{AddressChangeError, ReadyState};
use crate::MCP4728;

/// Fixed upper bits of every MCP4728 address.
pub const BASE_ADDRESS: u8 = 0b110_0000;

const COMMAND_WRITE_ADDRESS: u8 = 0b0110_0000;

/// Returns the A2..A0 bits of `address`, or `None` if it is not in `0x60..=0x67`.
pub fn address_bits(address: u8) -> Option<u8> {
    if address & !0b111 == BASE_ADDRESS {
        Some(address & 0b111)
    } else {
        None
    }
}

/// Encodes the three command bytes that follow the device address byte.
pub fn write_address_command(current_address: u8, new_address: u8) -> Option<[u8; 3]> {
    let current = address_bits(current_address)?;
    let new = address_bits(new_address)?;
    Some([
        COMMAND_WRITE_ADDRESS | current << 2 | 0b01,
        COMMAND_WRITE_ADDRESS | new << 2 | 0b10,
        COMMAND_WRITE_ADDRESS | new << 2 | 0b11,
    ])
}

/// Delays used by [`MCP4728::change_address`].
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct AddressChangeTiming {
    /// Time LDAC is held high before the command is sent.
    pub ldac_setup_us: u32,
    /// Time between the end of the command and LDAC going low.
    pub ldac_hold_us: u32,
    /// Interval between RDY/BSY samples.
    pub ready_poll_ms: u32,
    /// How long to wait for the EEPROM write to finish.
    pub ready_timeout_ms: u32,
}

impl Default for AddressChangeTiming {
    fn default() -> Self {
        AddressChangeTiming {
            ldac_setup_us: 50,
            ldac_hold_us: 50,
            ready_poll_ms: 1,
            ready_timeout_ms: 100,
        }
    }
}

/// What the bus looked like after an address change.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct AddressChangeReport {
    pub old_address: u8,
    pub new_address: u8,
    /// RDY/BSY level sampled before anything was sent.
    pub ready_before: ReadyState,
    /// RDY/BSY level sampled right after LDAC went low.
    pub ready_after: ReadyState,
    /// Whether something still answers at the old address.
    pub old_present: bool,
    /// Whether something answers at the new address.
    pub new_present: bool,
}

impl AddressChangeReport {
    /// The device answers at its new address.
    pub fn moved(&self) -> bool {
        self.new_present && (self.old_address == self.new_address || !self.old_present)
    }
}

impl<I2C, E> MCP4728<I2C>
where
    I2C: I2c<Error = E>,
{
    /// Rewrites the address bits in EEPROM so the device answers at `new_address` from now on.
    ///
    /// `ldac` must be the LDAC line of this device only; `rdy` its RDY/BSY line.  LDAC is left
    /// low afterwards, so subsequent writes update the outputs immediately.
    ///
    /// The driver switches to `new_address` only when the device acknowledges there.  Inspect the
    /// returned report to tell whether the device moved.
    ///
    /// # Errors
    ///
    /// [`AddressChangeError::InvalidAddress`] if either address is outside `0x60..=0x67`, in which
    /// case nothing is sent.  [`AddressChangeError::ReadyTimeout`] if RDY/BSY stays low for longer
    /// than `timing.ready_timeout_ms` before or after the write.
    pub fn change_address<LDAC, RDY, D, P>(
        &mut self,
        new_address: u8,
        ldac: &mut LDAC,
        rdy: &mut RDY,
        delay: &mut D,
        timing: &AddressChangeTiming,
    ) -> Result<AddressChangeReport, AddressChangeError<E, P>>
    where
        LDAC: OutputPin<Error = P>,
        RDY: InputPin<Error = P>,
        D: DelayNs,
    {
        let old_address = self.address;
        if address_bits(old_address).is_none() {
            return Err(AddressChangeError::InvalidAddress(old_address));
        }
        let command = write_address_command(old_address, new_address)
            .ok_or(AddressChangeError::InvalidAddress(new_address))?;

        let ready_before = read_ready(rdy).map_err(AddressChangeError::Pin)?;
        debug!("RDY before address write: {ready_before:?}");
        if ready_before == ReadyState::Busy {
            wait_for_eeprom(rdy, delay, timing)?;
        }

        ldac.set_high().map_err(AddressChangeError::Pin)?;
        delay.delay_us(timing.ldac_setup_us);
        self.i2c
            .write(old_address, &command)
            .map_err(AddressChangeError::I2C)?;
        delay.delay_us(timing.ldac_hold_us);
        ldac.set_low().map_err(AddressChangeError::Pin)?;

        let ready_after = read_ready(rdy).map_err(AddressChangeError::Pin)?;
        debug!("RDY after address write: {ready_after:?}");
        wait_for_eeprom(rdy, delay, timing)?;

        let old_present = probe(&mut self.i2c, old_address).is_present();
        let new_present = probe(&mut self.i2c, new_address).is_present();
        let report = AddressChangeReport {
            old_address,
            new_address,
            ready_before,
            ready_after,
            old_present,
            new_present,
        };
        if report.new_present {
            self.address = new_address;
        }
        if report.moved() {
            info!("MCP4728 moved from {old_address:#04x} to {new_address:#04x}");
        } else {
            warn!(
                "MCP4728 at {old_address:#04x} did not move to {new_address:#04x} \
                 (old present: {old_present}, new present: {new_present})"
            );
        }
        Ok(report)
    }
}

fn wait_for_eeprom<RDY, D, E, P>(
    rdy: &mut RDY,
    delay: &mut D,
    timing: &AddressChangeTiming,
) -> Result<(), AddressChangeError<E, P>>
where
    RDY: InputPin<Error = P>,
    D: DelayNs,
{
    if wait_until_ready(rdy, delay, timing.ready_poll_ms, timing.ready_timeout_ms)
        .map_err(AddressChangeError::Pin)?
    {
        Ok(())
    } else {
        Err(AddressChangeError::ReadyTimeout)
    }
}
