//! LDAC and RDY/BSY control lines.
//!
//! LDAC is an input to the DAC: a high-to-low transition copies every input register to its
//! output, and holding it low makes each write take effect as soon as its last byte arrives.
//! RDY/BSY is an open-drain output that the DAC pulls low while an EEPROM write is in progress.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::types::ReadyState;

/// Samples the RDY/BSY line.
pub fn read_ready<P: InputPin>(rdy: &mut P) -> Result<ReadyState, P::Error> {
    if rdy.is_high()? {
        Ok(ReadyState::Ready)
    } else {
        Ok(ReadyState::Busy)
    }
}

/// Polls RDY/BSY until it reads high or `timeout_ms` has elapsed.
///
/// The line is checked once straight away and then every `poll_ms` (at least 1ms).  Returns
/// `false` on timeout.
pub fn wait_until_ready<P, D>(
    rdy: &mut P,
    delay: &mut D,
    poll_ms: u32,
    timeout_ms: u32,
) -> Result<bool, P::Error>
where
    P: InputPin,
    D: DelayNs,
{
    let poll_ms = poll_ms.max(1);
    let mut waited_ms = 0u32;
    loop {
        if rdy.is_high()? {
            return Ok(true);
        }
        if waited_ms >= timeout_ms {
            return Ok(false);
        }
        delay.delay_ms(poll_ms);
        waited_ms = waited_ms.saturating_add(poll_ms);
    }
}

/// Pulses LDAC high-low-high so that all staged input registers reach the outputs together.
///
/// Use after writes made with LDAC held high, or with [`OutputEnableMode::NoUpdate`].
///
/// [`OutputEnableMode::NoUpdate`]: crate::OutputEnableMode::NoUpdate
pub fn latch_outputs<P, D>(ldac: &mut P, delay: &mut D, width_us: u32) -> Result<(), P::Error>
where
    P: OutputPin,
    D: DelayNs,
{
    ldac.set_high()?;
    delay.delay_us(width_us);
    ldac.set_low()?;
    delay.delay_us(width_us);
    ldac.set_high()
}

#[cfg(test)]
mod tests {
    use super::*;

    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::digital::{Mock as PinMock, State, Transaction as PinTransaction};

    #[test]
    fn ready_levels() {
        let mut rdy = PinMock::new(&[
            PinTransaction::get(State::High),
            PinTransaction::get(State::Low),
        ]);
        assert_eq!(read_ready(&mut rdy).unwrap(), ReadyState::Ready);
        assert_eq!(read_ready(&mut rdy).unwrap(), ReadyState::Busy);
        rdy.done();
    }

    #[test]
    fn wait_returns_once_high() {
        let mut rdy = PinMock::new(&[
            PinTransaction::get(State::Low),
            PinTransaction::get(State::Low),
            PinTransaction::get(State::High),
        ]);
        let mut delay = NoopDelay::new();
        assert!(wait_until_ready(&mut rdy, &mut delay, 1, 100).unwrap());
        rdy.done();
    }

    #[test]
    fn wait_times_out() {
        // Checked at 0, 2, 4 and 6ms, then gives up.
        let mut rdy = PinMock::new(&[
            PinTransaction::get(State::Low),
            PinTransaction::get(State::Low),
            PinTransaction::get(State::Low),
            PinTransaction::get(State::Low),
        ]);
        let mut delay = NoopDelay::new();
        assert!(!wait_until_ready(&mut rdy, &mut delay, 2, 5).unwrap());
        rdy.done();
    }

    #[test]
    fn wait_with_zero_poll_interval() {
        let mut rdy = PinMock::new(&[
            PinTransaction::get(State::Low),
            PinTransaction::get(State::Low),
        ]);
        let mut delay = NoopDelay::new();
        assert!(!wait_until_ready(&mut rdy, &mut delay, 0, 1).unwrap());
        rdy.done();
    }

    #[test]
    fn wait_with_timeout_near_limit() {
        let mut rdy = PinMock::new(&[
            PinTransaction::get(State::Low),
            PinTransaction::get(State::Low),
            PinTransaction::get(State::Low),
        ]);
        let mut delay = NoopDelay::new();
        assert!(!wait_until_ready(&mut rdy, &mut delay, u32::MAX - 1, u32::MAX).unwrap());
        rdy.done();
    }

    #[test]
    fn latch_pulse() {
        let mut ldac = PinMock::new(&[
            PinTransaction::set(State::High),
            PinTransaction::set(State::Low),
            PinTransaction::set(State::High),
        ]);
        let mut delay = NoopDelay::new();
        latch_outputs(&mut ldac, &mut delay, 10).unwrap();
        ldac.done();
    }
}
