//! Test signals for driving all four channels at once.

use core::f32::consts::TAU;

/// Full-scale code of a 12-bit channel.
pub const FULL_SCALE: u16 = 0x0fff;

/// An endless sine wave on all four channels, each a quarter period ahead of the previous one.
///
/// Frames come out in channel order `[A, B, C, D]` and are ready for
/// [`MCP4728::write_frame`](crate::MCP4728::write_frame).
///
/// ```
/// use mcp4728_bench::waveform::SineSweep;
///
/// let mut sweep = SineSweep::new(4);
/// assert_eq!(sweep.next(), Some([2048, 4095, 2048, 1]));
/// ```
#[derive(Debug, Clone)]
pub struct SineSweep {
    points: u32,
    index: u32,
    amplitude: f32,
    midpoint: f32,
}

impl SineSweep {
    /// A full-scale sweep with `points` samples per period (at least 2).
    pub fn new(points: u32) -> SineSweep {
        SineSweep {
            points: points.max(2),
            index: 0,
            amplitude: 2047.0,
            midpoint: 2048.0,
        }
    }

    /// Peak deviation from the midpoint, in codes.
    pub fn amplitude(mut self, amplitude: u16) -> SineSweep {
        self.amplitude = f32::from(amplitude.min(FULL_SCALE));
        self
    }

    /// Code the wave is centred on.
    pub fn midpoint(mut self, midpoint: u16) -> SineSweep {
        self.midpoint = f32::from(midpoint.min(FULL_SCALE));
        self
    }

    /// Samples per period.
    pub fn points(&self) -> u32 {
        self.points
    }

    fn sample(&self, phase: f32) -> u16 {
        let value = self.midpoint + self.amplitude * phase.sin();
        value.round().clamp(0.0, f32::from(FULL_SCALE)) as u16
    }
}

impl Iterator for SineSweep {
    type Item = [u16; 4];

    fn next(&mut self) -> Option<[u16; 4]> {
        let phase = TAU * self.index as f32 / self.points as f32;
        self.index = (self.index + 1) % self.points;
        Some([
            self.sample(phase),
            self.sample(phase + TAU / 4.0),
            self.sample(phase + TAU / 2.0),
            self.sample(phase + 3.0 * TAU / 4.0),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarter_points() {
        let frames: Vec<[u16; 4]> = SineSweep::new(4).take(4).collect();
        assert_eq!(
            frames,
            vec![
                [2048, 4095, 2048, 1],
                [4095, 2048, 1, 2048],
                [2048, 1, 2048, 4095],
                [1, 2048, 4095, 2048],
            ]
        );
    }

    #[test]
    fn each_channel_leads_the_previous_by_a_quarter() {
        let frames: Vec<[u16; 4]> = SineSweep::new(32).take(64).collect();
        for index in 0..32 {
            for channel in 1..4 {
                assert_eq!(frames[index][channel], frames[index + 8][channel - 1]);
            }
        }
    }

    #[test]
    fn repeats_every_period() {
        let mut sweep = SineSweep::new(32);
        let first: Vec<[u16; 4]> = sweep.by_ref().take(32).collect();
        let second: Vec<[u16; 4]> = sweep.take(32).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn clamps_to_full_scale() {
        let sweep = SineSweep::new(16).amplitude(4000).midpoint(3000);
        for frame in sweep.take(16) {
            assert!(frame.iter().all(|&value| value <= FULL_SCALE));
        }
        let mut sweep = SineSweep::new(4).amplitude(4000).midpoint(3000);
        assert_eq!(sweep.next(), Some([3000, 4095, 3000, 0]));
    }

    #[test]
    fn minimum_points() {
        let mut sweep = SineSweep::new(0);
        assert_eq!(sweep.points(), 2);
        assert_eq!(sweep.next(), Some([2048, 4095, 2048, 1]));
        assert_eq!(sweep.next().map(|frame| frame[0]), Some(2048));
    }
}
