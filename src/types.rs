use core::fmt;
use core::str::FromStr;

use num_enum::{IntoPrimitive, TryFromPrimitive};

// Error types.

/// Error type for the driver, which can represent either an error from this driver or an inner
/// error that comes from the I2C type.
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<InnerError> {
    /// A value was larger than the DAC supports.
    ///
    /// The MCP4728 is a 12-bit DAC, so values that it writes must be smaller than 2^12.
    ValueOutOfBounds(u16),
    /// [`MCP4728::multi_write`](crate::MCP4728::multi_write) can write an arbitrary number of
    /// updates, but the driver writes from a fixed buffer large enough for four updates (one per
    /// channel).  More updates than that return this error.
    WriteSizeExceeded,
    /// A sequential write command was issued with a list of updates that didn't match the
    /// associated starting channel.
    ///
    /// For example, a sequential write command that starts with channel B must contain 3 updates:
    /// for channels B, C, and D.
    StartingChannelMismatch,
    /// Error representing an error that came from the inner I2C driver.
    I2CError(InnerError),
}

impl<InnerError> From<InnerError> for Error<InnerError> {
    fn from(inner: InnerError) -> Self {
        Error::I2CError(inner)
    }
}

impl<InnerError: fmt::Debug> fmt::Display for Error<InnerError> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ValueOutOfBounds(value) => {
                write!(f, "value {value:#06x} does not fit in 12 bits")
            }
            Error::WriteSizeExceeded => write!(f, "too many channel updates in one write"),
            Error::StartingChannelMismatch => {
                write!(f, "number of updates does not match the starting channel")
            }
            Error::I2CError(inner) => write!(f, "I2C error: {inner:?}"),
        }
    }
}

#[cfg(feature = "std")]
impl<InnerError: fmt::Debug> std::error::Error for Error<InnerError> {}

/// Errors from [`MCP4728::change_address`](crate::MCP4728::change_address).
///
/// The sequence touches the bus and two control lines, so errors from either are carried
/// through untouched.
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressChangeError<I2CError, PinError> {
    /// The address is not in the MCP4728 range `0x60..=0x67`.
    InvalidAddress(u8),
    /// RDY/BSY stayed low for longer than the configured timeout.
    ReadyTimeout,
    /// Error from the inner I2C driver.
    I2C(I2CError),
    /// Error from the LDAC or RDY line.
    Pin(PinError),
}

impl<I2CError: fmt::Debug, PinError: fmt::Debug> fmt::Display
    for AddressChangeError<I2CError, PinError>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressChangeError::InvalidAddress(address) => {
                write!(f, "{address:#04x} is not an MCP4728 address (0x60-0x67)")
            }
            AddressChangeError::ReadyTimeout => {
                write!(f, "timed out waiting for the EEPROM write to finish")
            }
            AddressChangeError::I2C(inner) => write!(f, "I2C error: {inner:?}"),
            AddressChangeError::Pin(inner) => write!(f, "GPIO error: {inner:?}"),
        }
    }
}

#[cfg(feature = "std")]
impl<I2CError: fmt::Debug, PinError: fmt::Debug> std::error::Error
    for AddressChangeError<I2CError, PinError>
{
}

// Enums for configuration.

/// Output channel selection.
#[derive(IntoPrimitive, TryFromPrimitive, Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Channel {
    A = 0,
    B = 1,
    C = 2,
    D = 3,
}

impl Channel {
    /// All channels in register order.
    pub const ALL: [Channel; 4] = [Channel::A, Channel::B, Channel::C, Channel::D];
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Channel::A => "A",
            Channel::B => "B",
            Channel::C => "C",
            Channel::D => "D",
        };
        f.write_str(name)
    }
}

/// Error returned when a channel name can't be parsed.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct ParseChannelError;

impl fmt::Display for ParseChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("expected a channel name A-D or an index 0-3")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ParseChannelError {}

/// Parses `A`-`D` (either case) or `0`-`3`.
impl FromStr for Channel {
    type Err = ParseChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "a" | "A" => Ok(Channel::A),
            "b" | "B" => Ok(Channel::B),
            "c" | "C" => Ok(Channel::C),
            "d" | "D" => Ok(Channel::D),
            _ => s
                .parse::<u8>()
                .ok()
                .and_then(|index| Channel::try_from(index).ok())
                .ok_or(ParseChannelError),
        }
    }
}

/// Configuration bit for whether to update the analog output.
#[derive(IntoPrimitive, TryFromPrimitive, Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum OutputEnableMode {
    /// The analog output will be updated immediately after the command is received.
    Update = 0,
    /// The analog output will not be updated automatically.
    ///
    /// Note that there are other ways to update the analog outputs:
    ///  - A high-to-low transition on the LDAC pin
    ///  - Issuing a [`MCP4728::general_call_software_update`](crate::MCP4728::general_call_software_update)
    NoUpdate = 1,
}

/// Configuration bit for which voltage reference a channel should use.
#[derive(IntoPrimitive, TryFromPrimitive, Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum VoltageReferenceMode {
    /// Use the external pin VDD as a voltage reference.
    External = 0,
    /// Use the internal 2.048V reference.
    Internal = 1,
}

/// Configuration bits for the powered-down state of a channel.
#[derive(IntoPrimitive, TryFromPrimitive, Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PowerDownMode {
    /// Channel is not powered down.
    Normal = 0,
    /// Channel is powered down and output pin is connected to ground through a 1K resistor.
    PowerDownOneK = 1,
    /// Channel is powered down and output pin is connected to ground through a 100K resistor.
    PowerDownOneHundredK = 2,
    /// Channel is powered down and output pin is connected to ground through a 500K resistor.
    PowerDownFiveHundredK = 3,
}

/// Configuration bit for the gain selection mode of a channel.
///
/// If the channel is using an external reference, this bit is ignored and a gain of 1x is always
/// used.
#[derive(IntoPrimitive, TryFromPrimitive, Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum GainMode {
    /// Gain is set to unity (1x).
    TimesOne = 0,
    /// Gain is set to 2x.
    TimesTwo = 1,
}

// Enums for status from reads.

/// Status of the EEPROM.
///
/// Reported both in the read-back registers (bit 7 of each record) and on the RDY/BSY pin.  In
/// both places a low level means busy.
#[derive(IntoPrimitive, TryFromPrimitive, Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ReadyState {
    /// The EEPROM is busy.
    ///
    /// Any additional commands received while busy will be ignored.
    Busy = 0,
    /// The EEPROM is not busy.
    Ready = 1,
}

/// The power-on state of the entire device.
#[derive(IntoPrimitive, TryFromPrimitive, Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PowerState {
    /// The device is powered off.
    Off = 0,
    /// The device is powered on.
    On = 1,
}

// Container structs.

/// Representation of all registers of an individual channel.
///
/// Used only for reads.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelRegisters {
    /// All mode configuration bits and value of the channel.
    pub channel_state: ChannelState,
    /// The EEPROM Ready state of the device.
    ///
    /// Note that this is global to the entire device, but the protocol reports it for each channel
    /// so that is duplicated here.
    pub ready_state: ReadyState,
    /// The Power-on-reset state of the device.
    ///
    /// Note that this is global to the entire device, but the protocol reports it for each channel
    /// so that is duplicated here.
    pub power_state: PowerState,
}

impl ChannelRegisters {
    // || RDY POR x x x x x x || VR PD PD G D D D D || D D D D D D D D ||
    pub(crate) fn parse(bytes: &[u8]) -> ChannelRegisters {
        let ready_state = if bytes[0] & 0b10000000 != 0 {
            ReadyState::Ready
        } else {
            ReadyState::Busy
        };
        let power_state = if bytes[0] & 0b01000000 != 0 {
            PowerState::On
        } else {
            PowerState::Off
        };
        let voltage_reference_mode = if bytes[1] & 0b10000000 != 0 {
            VoltageReferenceMode::Internal
        } else {
            VoltageReferenceMode::External
        };
        let power_down_mode = match (bytes[1] & 0b01100000) >> 5 {
            0 => PowerDownMode::Normal,
            1 => PowerDownMode::PowerDownOneK,
            2 => PowerDownMode::PowerDownOneHundredK,
            _ => PowerDownMode::PowerDownFiveHundredK,
        };
        let gain_mode = if bytes[1] & 0b00010000 != 0 {
            GainMode::TimesTwo
        } else {
            GainMode::TimesOne
        };
        ChannelRegisters {
            channel_state: ChannelState {
                voltage_reference_mode,
                power_down_mode,
                gain_mode,
                value: u16::from_be_bytes([bytes[1] & 0b00001111, bytes[2]]),
            },
            ready_state,
            power_state,
        }
    }
}

/// Representation of all registers of all channels.
///
/// Used only for reads.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Registers {
    /// Contents of the DAC input register for channel A.
    pub channel_a_input: ChannelRegisters,
    /// Contents of the EEPROM register for channel A.
    pub channel_a_eeprom: ChannelRegisters,
    /// Contents of the DAC input register for channel B.
    pub channel_b_input: ChannelRegisters,
    /// Contents of the EEPROM register for channel B.
    pub channel_b_eeprom: ChannelRegisters,
    /// Contents of the DAC input register for channel C.
    pub channel_c_input: ChannelRegisters,
    /// Contents of the EEPROM register for channel C.
    pub channel_c_eeprom: ChannelRegisters,
    /// Contents of the DAC input register for channel D.
    pub channel_d_input: ChannelRegisters,
    /// Contents of the EEPROM register for channel D.
    pub channel_d_eeprom: ChannelRegisters,
}

impl Registers {
    /// Returns the `(input, eeprom)` registers of one channel.
    pub fn channel(&self, channel: Channel) -> (&ChannelRegisters, &ChannelRegisters) {
        match channel {
            Channel::A => (&self.channel_a_input, &self.channel_a_eeprom),
            Channel::B => (&self.channel_b_input, &self.channel_b_eeprom),
            Channel::C => (&self.channel_c_input, &self.channel_c_eeprom),
            Channel::D => (&self.channel_d_input, &self.channel_d_eeprom),
        }
    }
}

/// Representation of the register of an indivdual channel.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelState {
    /// The voltage reference mode.
    pub voltage_reference_mode: VoltageReferenceMode,
    /// The power-down mode.
    pub power_down_mode: PowerDownMode,
    /// The gain mode.
    pub gain_mode: GainMode,
    /// The 12-bit value to output.
    ///
    /// Trying to write out-of-range values will result in an [`Error::ValueOutOfBounds`].
    pub value: u16,
}

impl ChannelState {
    /// Creates a ChannelState with a reasonable default state: internal voltage reference, powered
    /// on, x1 gain, and value of 0.
    pub fn new() -> ChannelState {
        ChannelState {
            voltage_reference_mode: VoltageReferenceMode::Internal,
            power_down_mode: PowerDownMode::Normal,
            gain_mode: GainMode::TimesOne,
            value: 0,
        }
    }

    /// Convenience builder method to set voltage reference mode.
    pub fn voltage_reference_mode(mut self, new_val: VoltageReferenceMode) -> ChannelState {
        self.voltage_reference_mode = new_val;
        self
    }

    /// Convenience builder method to set power down mode.
    pub fn power_down_mode(mut self, new_val: PowerDownMode) -> ChannelState {
        self.power_down_mode = new_val;
        self
    }

    /// Convenience builder method to set gain mode.
    pub fn gain_mode(mut self, new_val: GainMode) -> ChannelState {
        self.gain_mode = new_val;
        self
    }

    /// Convenience builder method to set value.
    pub fn value(mut self, new_val: u16) -> ChannelState {
        self.value = new_val;
        self
    }

    // || VR PD PD G D D D D || D D D D D D D D ||
    pub(crate) fn config_bytes(&self) -> [u8; 2] {
        let [upper, lower] = self.value.to_be_bytes();
        [
            (self.voltage_reference_mode as u8) << 7
                | (self.power_down_mode as u8) << 5
                | (self.gain_mode as u8) << 4
                | (upper & 0x0f),
            lower,
        ]
    }
}

impl Default for ChannelState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_from_str() {
        assert_eq!("a".parse(), Ok(Channel::A));
        assert_eq!("D".parse(), Ok(Channel::D));
        assert_eq!("2".parse(), Ok(Channel::C));
        assert_eq!("4".parse::<Channel>(), Err(ParseChannelError));
        assert_eq!("e".parse::<Channel>(), Err(ParseChannelError));
    }

    #[test]
    fn config_bytes() {
        let state = ChannelState::new()
            .power_down_mode(PowerDownMode::PowerDownOneK)
            .gain_mode(GainMode::TimesTwo)
            .value(0x0abc);
        assert_eq!(state.config_bytes(), [0b10111010, 0xbc]);
    }

    #[test]
    fn parse_registers() {
        let registers = ChannelRegisters::parse(&[0b11000000, 0b01011010, 0x55]);
        assert_eq!(registers.ready_state, ReadyState::Ready);
        assert_eq!(registers.power_state, PowerState::On);
        assert_eq!(
            registers.channel_state,
            ChannelState::new()
                .voltage_reference_mode(VoltageReferenceMode::External)
                .power_down_mode(PowerDownMode::PowerDownOneHundredK)
                .gain_mode(GainMode::TimesTwo)
                .value(0x0a55)
        );
    }

    #[test]
    fn parse_eeprom_write_in_progress() {
        let registers = ChannelRegisters::parse(&[0b01000000, 0b10000000, 0x00]);
        assert_eq!(registers.ready_state, ReadyState::Busy);
        assert_eq!(registers.power_state, PowerState::On);
    }
}
