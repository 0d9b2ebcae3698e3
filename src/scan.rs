//! Probing the bus for devices, in the manner of `i2cdetect -r`.
//!
//! A device is considered present when it acknowledges a one-byte read.  Reads are used rather
//! than zero-length writes because some devices latch state on a write, and an MCP4728 happily
//! answers a short read with its channel A register.

use core::fmt;
use core::ops::RangeInclusive;

use embedded_hal::i2c::{Error as _, ErrorKind, I2c};
use log::debug;

/// First address scanned by default; 0x00-0x02 are reserved for general call and bus formats.
pub const FIRST_ADDRESS: u8 = 0x03;
/// Last address scanned by default; 0x78-0x7F are reserved for 10-bit addressing.
pub const LAST_ADDRESS: u8 = 0x77;

const MAX_ADDRESS: u8 = 0x7f;

/// Result of probing one address.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Presence {
    /// The address acknowledged.
    Present,
    /// Nothing acknowledged the address.
    Absent,
    /// The transfer failed for a reason other than a missing acknowledge.
    Faulted(ErrorKind),
}

impl Presence {
    pub fn is_present(self) -> bool {
        self == Presence::Present
    }
}

/// Probes a single 7-bit address with a one-byte read.
pub fn probe<I2C: I2c>(i2c: &mut I2C, address: u8) -> Presence {
    let mut buffer = [0u8; 1];
    match i2c.read(address, &mut buffer) {
        Ok(()) => Presence::Present,
        Err(e) => match e.kind() {
            ErrorKind::NoAcknowledge(_) => Presence::Absent,
            kind => Presence::Faulted(kind),
        },
    }
}

/// Probes every address in `range`, clamped to the 7-bit address space.
pub fn scan<I2C: I2c>(i2c: &mut I2C, range: RangeInclusive<u8>) -> BusMap {
    let first = *range.start();
    let last = (*range.end()).min(MAX_ADDRESS);
    let mut map = BusMap::empty(first, last);
    if first > last {
        return map;
    }
    for address in first..=last {
        match probe(i2c, address) {
            Presence::Present => map.present |= 1u128 << address,
            Presence::Absent => {}
            Presence::Faulted(kind) => {
                debug!("probe of {address:#04x} failed: {kind:?}");
                map.faulted |= 1u128 << address;
            }
        }
    }
    map
}

/// Scans the default range `0x03..=0x77`.
pub fn scan_default<I2C: I2c>(i2c: &mut I2C) -> BusMap {
    scan(i2c, FIRST_ADDRESS..=LAST_ADDRESS)
}

/// Outcome of a bus scan: one bit per 7-bit address.
///
/// Displays as the familiar `i2cdetect` grid.  Faulted addresses render the same as absent ones
/// but can be listed with [`BusMap::faulted`].
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct BusMap {
    first: u8,
    last: u8,
    present: u128,
    faulted: u128,
}

impl BusMap {
    fn empty(first: u8, last: u8) -> BusMap {
        BusMap {
            first,
            last,
            present: 0,
            faulted: 0,
        }
    }

    /// Whether `address` was inside the scanned range.
    pub fn scanned(&self, address: u8) -> bool {
        (self.first..=self.last).contains(&address)
    }

    pub fn is_present(&self, address: u8) -> bool {
        address <= MAX_ADDRESS && self.present & (1u128 << address) != 0
    }

    /// Addresses that acknowledged, in ascending order.
    pub fn present(&self) -> impl Iterator<Item = u8> + '_ {
        bits(self.present)
    }

    /// Addresses whose probe failed with a bus error.
    pub fn faulted(&self) -> impl Iterator<Item = u8> + '_ {
        bits(self.faulted)
    }

    /// Number of addresses that acknowledged.
    pub fn len(&self) -> usize {
        self.present.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.present == 0
    }
}

fn bits(mask: u128) -> impl Iterator<Item = u8> {
    (0..=MAX_ADDRESS).filter(move |address| mask & (1u128 << *address) != 0)
}

impl fmt::Display for BusMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "     0  1  2  3  4  5  6  7  8  9  A  B  C  D  E  F")?;
        for row in (0..=MAX_ADDRESS).step_by(16) {
            write!(f, "{row:02x}: ")?;
            for address in row..row + 16 {
                if !self.scanned(address) {
                    write!(f, "   ")?;
                } else if self.is_present(address) {
                    write!(f, "{address:02x} ")?;
                } else {
                    write!(f, "-- ")?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fake_i2c::FakeI2C;

    #[test]
    fn probe_present_absent_faulted() {
        let mut i2c = FakeI2C::with_devices(&[0x60]);
        i2c.faulty.borrow_mut().push(0x20);
        assert_eq!(probe(&mut i2c, 0x60), Presence::Present);
        assert_eq!(probe(&mut i2c, 0x61), Presence::Absent);
        assert_eq!(probe(&mut i2c, 0x20), Presence::Faulted(ErrorKind::Other));
    }

    #[test]
    fn scan_finds_devices() {
        let mut i2c = FakeI2C::with_devices(&[0x01, 0x3c, 0x60, 0x64, 0x7a]);
        i2c.faulty.borrow_mut().push(0x50);
        let map = scan_default(&mut i2c);
        assert_eq!(map.present().collect::<Vec<_>>(), vec![0x3c, 0x60, 0x64]);
        assert_eq!(map.faulted().collect::<Vec<_>>(), vec![0x50]);
        assert_eq!(map.len(), 3);
        assert!(!map.is_present(0x01));
        assert!(!map.is_present(0x7a));
        assert!(!map.is_present(0x50));
    }

    #[test]
    fn scan_clamps_range() {
        let mut i2c = FakeI2C::with_devices(&[0x7f]);
        let map = scan(&mut i2c, 0x70..=0xff);
        assert!(map.scanned(0x7f));
        assert!(map.is_present(0x7f));
        assert!(!map.is_present(0x80));
    }

    #[test]
    fn scan_empty_range() {
        let mut i2c = FakeI2C::with_devices(&[0x10]);
        #[allow(clippy::reversed_empty_ranges)]
        let map = scan(&mut i2c, 0x20..=0x10);
        assert!(map.is_empty());
        assert!(!map.scanned(0x10));
    }

    #[test]
    fn grid() {
        let mut i2c = FakeI2C::with_devices(&[0x03, 0x60, 0x77]);
        let map = scan_default(&mut i2c);
        let grid = map.to_string();
        let lines: Vec<&str> = grid.lines().collect();
        assert_eq!(lines.len(), 9);
        assert_eq!(
            lines[0],
            "     0  1  2  3  4  5  6  7  8  9  A  B  C  D  E  F"
        );
        assert_eq!(
            lines[1],
            "00:          03 -- -- -- -- -- -- -- -- -- -- -- -- "
        );
        assert_eq!(
            lines[7],
            "60: 60 -- -- -- -- -- -- -- -- -- -- -- -- -- -- -- "
        );
        assert_eq!(
            lines[8],
            "70: -- -- -- -- -- -- -- 77                         "
        );
    }
}
