//! # MCP4728 bench tooling
//!
//! A platform agnostic driver for the MCP4728 4-channel, 12-bit I2C DAC built on the
//! [embedded-hal](https://github.com/rust-embedded/embedded-hal) 1.0 traits, together with the
//! pieces needed to bring boards up on a Linux single-board computer:
//!
//! - [`scan`]: probe single addresses and scan the bus like `i2cdetect`.
//! - [`control`]: LDAC and RDY/BSY line helpers.
//! - [`address`]: reprogram the I2C address bits held in the DAC's EEPROM.
//! - `waveform`: sine sweep test frames (with the `std` feature).
//! - `linux`: `/dev/i2c-N` buses, GPIO backends and board settings (with the `linux` feature).
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "linux")] {
//! use linux_embedded_hal::I2cdev;
//! use mcp4728_bench::MCP4728;
//!
//! let i2c = I2cdev::new("/dev/i2c-1").unwrap();
//! let mut dac = MCP4728::new(i2c, 0x60);
//! dac.fast_write(483, 279, 297, 590).unwrap();
//! # }
//! ```
#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod address;
pub mod control;
pub mod scan;
mod types;

#[cfg(feature = "linux")]
pub mod linux;
#[cfg(feature = "std")]
pub mod waveform;

pub use crate::address::{AddressChangeReport, AddressChangeTiming};
pub use crate::scan::{BusMap, Presence};
pub use crate::types::*;

use embedded_hal::i2c;

/// Default address of an MCP4728 that has never been reprogrammed.
pub const DEFAULT_ADDRESS: u8 = 0x60;

const ADDRESS_GENERAL_CALL: u8 = 0x00;
const COMMAND_GENERAL_CALL_RESET: u8 = 0b00000110;
const COMMAND_GENERAL_CALL_WAKE_UP: u8 = 0b00001001;
const COMMAND_GENERAL_CALL_SOFTWARE_UPDATE: u8 = 0b00001000;
const COMMAND_SINGLE_WRITE: u8 = 0b01011000;
const COMMAND_MULTI_WRITE: u8 = 0b01000000;
const COMMAND_SEQUENTIAL_WRITE: u8 = 0b01010000;
const COMMAND_WRITE_VOLTAGE_REFERENCE_MODE: u8 = 0b10000000;
const COMMAND_WRITE_GAIN_MODE: u8 = 0b11000000;
const COMMAND_WRITE_POWER_DOWN_MODE: u8 = 0b10100000;

const WRITE_BUFFER_SIZE: usize = 12;

/// MCP4728 4-channel 12-bit I2C DAC.
pub struct MCP4728<I2C> {
    i2c: I2C,
    address: u8,
}

/// Implementation of all commands given a generic I2C bus.
///
/// # Errors
///
/// Any errors encountered within the I2C device will be wrapped in [`Error::I2CError`].
impl<I2C, E> MCP4728<I2C>
where
    I2C: i2c::I2c<Error = E>,
{
    /// Creates a new [`MCP4728`] from an I2C bus that implements the [`embedded_hal::i2c::I2c`]
    /// trait.
    pub fn new(i2c: I2C, address: u8) -> Self {
        MCP4728 { i2c, address }
    }

    /// The 7-bit address the driver is currently talking to.
    pub fn address(&self) -> u8 {
        self.address
    }

    fn write_bytes(&mut self, address: u8, bytes: &[u8]) -> Result<(), Error<E>> {
        self.i2c.write(address, bytes).map_err(Error::I2CError)
    }

    fn write_iter<B>(&mut self, address: u8, bytes: B) -> Result<(), Error<E>>
    where
        B: IntoIterator<Item = u8>,
    {
        let mut buffer = [0; WRITE_BUFFER_SIZE];
        let mut len = 0;
        for b in bytes {
            if len >= WRITE_BUFFER_SIZE {
                return Err(Error::WriteSizeExceeded);
            }
            buffer[len] = b;
            len += 1;
        }
        self.write_bytes(address, &buffer[..len])
    }

    /// Destroy this instance and return the inner I2C bus.
    pub fn release(self) -> I2C {
        self.i2c
    }

    /// Mutable access to the inner bus, e.g. to probe other devices sharing it.
    pub fn bus(&mut self) -> &mut I2C {
        &mut self.i2c
    }

    /// Reads all registers of all channels from the device.
    ///
    /// Each channel includes both the values in EEPROM and in the input registers to the DAC, which
    /// might differ if e.g. fast_write has been used.
    pub fn read(&mut self) -> Result<Registers, Error<E>> {
        let mut bytes = [0; 24];
        self.i2c.read(self.address, &mut bytes)?;
        Ok(Registers {
            channel_a_input: ChannelRegisters::parse(&bytes[0..3]),
            channel_a_eeprom: ChannelRegisters::parse(&bytes[3..6]),
            channel_b_input: ChannelRegisters::parse(&bytes[6..9]),
            channel_b_eeprom: ChannelRegisters::parse(&bytes[9..12]),
            channel_c_input: ChannelRegisters::parse(&bytes[12..15]),
            channel_c_eeprom: ChannelRegisters::parse(&bytes[15..18]),
            channel_d_input: ChannelRegisters::parse(&bytes[18..21]),
            channel_d_eeprom: ChannelRegisters::parse(&bytes[21..24]),
        })
    }

    /// Issues a general call command (address 0x00) to reset the device.  All MCP4728 devices on
    /// the bus will load the values from EEPROM into the output registers and update the output
    /// voltage.
    pub fn general_call_reset(&mut self) -> Result<(), Error<E>> {
        self.write_bytes(ADDRESS_GENERAL_CALL, &[COMMAND_GENERAL_CALL_RESET])
    }

    /// Issues a general call command (address 0x00) to wake up the device.  All MCP4728 devices on
    /// the bus will reset the power down bits and turn on all channels.
    pub fn general_call_wake_up(&mut self) -> Result<(), Error<E>> {
        self.write_bytes(ADDRESS_GENERAL_CALL, &[COMMAND_GENERAL_CALL_WAKE_UP])
    }

    /// Issues a general call command (address 0x00) to update software.  All MCP4728 devices on the
    /// bus will immediately update the output voltage.
    pub fn general_call_software_update(&mut self) -> Result<(), Error<E>> {
        self.write_bytes(
            ADDRESS_GENERAL_CALL,
            &[COMMAND_GENERAL_CALL_SOFTWARE_UPDATE],
        )
    }

    /// Updates the values of all four channels and sets them to be powered on (i.e.
    /// [`PowerDownMode::Normal`] is set).
    ///
    /// This command writes to the output registers directly and does not affect the EEPROM.  The
    /// voltage reference mode and gain mode are not affected.
    ///
    /// # Updating the analog outputs
    ///
    /// This command writes to the input register but does not necessarily update the analog output.
    /// There are several ways to do so:
    ///
    ///   - If the LDAC pin is set low, the output will be updated after the last byte is received
    ///     for each channel.
    ///   - If the LDAC pin transitions from high to low at any time, all channels will be updated
    ///     (see [`control::latch_outputs`]).
    ///   - If a General Call Software Update command is received, all channels will be updated.
    ///
    /// # Errors
    ///
    /// In addition to the internal I2C errors, this can return [`Error::ValueOutOfBounds`] if the
    /// value is out of range (greater than 4095).
    pub fn fast_write(
        &mut self,
        val_a: u16,
        val_b: u16,
        val_c: u16,
        val_d: u16,
    ) -> Result<(), Error<E>> {
        self.fast_write_with_power_down_mode(
            (PowerDownMode::Normal, val_a),
            (PowerDownMode::Normal, val_b),
            (PowerDownMode::Normal, val_c),
            (PowerDownMode::Normal, val_d),
        )
    }

    /// Updates the values of all four channels and sets their corresponding [`PowerDownMode`]s.
    ///
    /// This command writes to the output registers directly and does not affect the EEPROM.  The
    /// voltage reference mode and gain mode are not affected.  The analog outputs update the
    /// same way as with [`MCP4728::fast_write`].
    ///
    /// # Errors
    ///
    /// In addition to the internal I2C errors, this can return [`Error::ValueOutOfBounds`] if the
    /// value is out of range (greater than 4095).
    pub fn fast_write_with_power_down_mode(
        &mut self,
        val_a: (PowerDownMode, u16),
        val_b: (PowerDownMode, u16),
        val_c: (PowerDownMode, u16),
        val_d: (PowerDownMode, u16),
    ) -> Result<(), Error<E>> {
        // || 0 0 PD PD D D D D || D D D D D D D D || per channel
        let mut bytes = [0; 8];
        for (i, &(mode, val)) in [val_a, val_b, val_c, val_d].iter().enumerate() {
            check_value(val)?;
            let [upper, lower] = val.to_be_bytes();
            bytes[2 * i] = (mode as u8) << 4 | upper;
            bytes[2 * i + 1] = lower;
        }
        self.write_bytes(self.address, &bytes)
    }

    /// Writes one frame of four values, e.g. from [`waveform::SineSweep`].
    ///
    /// Equivalent to [`MCP4728::fast_write`].
    pub fn write_frame(&mut self, frame: [u16; 4]) -> Result<(), Error<E>> {
        let [a, b, c, d] = frame;
        self.fast_write(a, b, c, d)
    }

    /// Updates all bits of a single channel to both the DAC input register and EEPROM.
    ///
    /// This sets the voltage reference mode, power down mode, gain mode, and value of the channel.
    ///
    /// # Updating the analog outputs
    ///
    /// This command writes to the input register but does not necessarily update the analog output.
    /// There are several ways to do so:
    ///
    ///   - If `OutputEnableMode` is `Update`, the output will be updated after the last byte is
    ///     received.
    ///   - If the LDAC pin is set low, the output will be updated after the last byte is received.
    ///   - If the LDAC pin transitions from high to low at any time, all channels will be updated.
    ///   - If a General Call Software Update command is received, all channels will be updated.
    ///
    /// # Errors
    ///
    /// In addition to the internal I2C errors, this can return [`Error::ValueOutOfBounds`] if the
    /// value is out of range (greater than 4095).
    pub fn single_write(
        &mut self,
        channel: Channel,
        output_enable_mode: OutputEnableMode,
        channel_state: &ChannelState,
    ) -> Result<(), Error<E>> {
        // || 0 1 0 1 1 CH CH OE || VR PD PD G D D D D || D D D D D D D D ||
        // CH = Channel select
        // OE = Output enable
        // VR = Voltage reference mode
        // PD = Power down mode
        // G = Gain mode
        check_value(channel_state.value)?;
        let [config, lower] = channel_state.config_bytes();
        let bytes = [
            COMMAND_SINGLE_WRITE | (channel as u8) << 1 | output_enable_mode as u8,
            config,
            lower,
        ];
        self.write_bytes(self.address, &bytes)
    }

    /// Updates all bits of 1-4 sequential channels to both the DAC input registers and EEPROM.
    ///
    /// This sets the voltage reference mode, power down mode, gain mode, and value of the channels.
    /// The channels including and after `starting_channel` will be updated (e.g. if
    /// `starting_channel` is channel b, then channels b, c and d will be updated). The number of
    /// entries in `channel_updates` must equal the number of channels that will be updated.
    ///
    /// # Errors
    ///
    /// In addition to the internal I2C errors, this can return [`Error::ValueOutOfBounds`] if any
    /// value is out of range (greater than 4095) and [`Error::StartingChannelMismatch`] if there
    /// is a mismatch between the starting channel and the number of updates.
    pub fn sequential_write(
        &mut self,
        starting_channel: Channel,
        output_enable_mode: OutputEnableMode,
        channel_updates: &[ChannelState],
    ) -> Result<(), Error<E>> {
        // || 0 1 0 1 0 CH CH OE || (VR PD PD G D D D D || D D D D D D D D) * channels ||
        let expected_updates = 4 - starting_channel as usize;
        if channel_updates.len() != expected_updates {
            return Err(Error::StartingChannelMismatch);
        }
        for channel_state in channel_updates {
            check_value(channel_state.value)?;
        }
        let command =
            COMMAND_SEQUENTIAL_WRITE | (starting_channel as u8) << 1 | output_enable_mode as u8;
        let bytes = core::iter::once(command).chain(
            channel_updates
                .iter()
                .flat_map(|channel_state| channel_state.config_bytes()),
        );
        self.write_iter(self.address, bytes)
    }

    /// Updates all bits of multiple channels to both the DAC input registers and EEPROM.
    ///
    /// This sets the voltage reference mode, power down mode, gain mode, and value of the channels.
    ///
    /// # Errors
    ///
    /// In addition to the internal I2C errors, this can return [`Error::ValueOutOfBounds`] if any
    /// value is out of range (greater than 4095).
    ///
    /// Updates are staged in a buffer large enough for four of them (one per channel), and
    /// [`Error::WriteSizeExceeded`] is returned if more are requested.
    pub fn multi_write(
        &mut self,
        channel_updates: &[(Channel, OutputEnableMode, ChannelState)],
    ) -> Result<(), Error<E>> {
        // || 0 1 0 0 0 CH CH OE || VR PD PD G D D D D || D D D D D D D D || per update
        for (_, _, channel_state) in channel_updates {
            check_value(channel_state.value)?;
        }
        let bytes = channel_updates
            .iter()
            .flat_map(|(channel, output_enable_mode, channel_state)| {
                let [config, lower] = channel_state.config_bytes();
                [
                    COMMAND_MULTI_WRITE | (*channel as u8) << 1 | *output_enable_mode as u8,
                    config,
                    lower,
                ]
            });
        self.write_iter(self.address, bytes)
    }

    /// Writes only the voltage reference mode bits for all channels.
    ///
    /// The EEPROM data is not affected and the output of each channel is updated after the command
    /// has been received.
    pub fn write_voltage_reference_mode(
        &mut self,
        mode_a: VoltageReferenceMode,
        mode_b: VoltageReferenceMode,
        mode_c: VoltageReferenceMode,
        mode_d: VoltageReferenceMode,
    ) -> Result<(), Error<E>> {
        let byte = COMMAND_WRITE_VOLTAGE_REFERENCE_MODE
            | (mode_a as u8) << 3
            | (mode_b as u8) << 2
            | (mode_c as u8) << 1
            | mode_d as u8;
        self.write_bytes(self.address, &[byte])
    }

    /// Writes only the gain mode bits for all channels.
    ///
    /// The EEPROM data is not affected and the output of each channel is updated after the command
    /// has been received.
    pub fn write_gain_mode(
        &mut self,
        mode_a: GainMode,
        mode_b: GainMode,
        mode_c: GainMode,
        mode_d: GainMode,
    ) -> Result<(), Error<E>> {
        let byte = COMMAND_WRITE_GAIN_MODE
            | (mode_a as u8) << 3
            | (mode_b as u8) << 2
            | (mode_c as u8) << 1
            | mode_d as u8;
        self.write_bytes(self.address, &[byte])
    }

    /// Writes only the power down mode bits for all channels.
    ///
    /// The EEPROM data is not affected and the output of each channel is updated after the command
    /// has been received.
    pub fn write_power_down_mode(
        &mut self,
        mode_a: PowerDownMode,
        mode_b: PowerDownMode,
        mode_c: PowerDownMode,
        mode_d: PowerDownMode,
    ) -> Result<(), Error<E>> {
        let bytes = [
            COMMAND_WRITE_POWER_DOWN_MODE | (mode_a as u8) << 2 | mode_b as u8,
            (mode_c as u8) << 6 | (mode_d as u8) << 4,
        ];
        self.write_bytes(self.address, &bytes)
    }
}

fn check_value<E>(value: u16) -> Result<(), Error<E>> {
    if value > 0x0fff {
        Err(Error::ValueOutOfBounds(value))
    } else {
        Ok(())
    }
}
