//! Signed PCM samples to PWM duty values.

use crate::Volume;

/// What the converter does with the volume multiplier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Scaling {
    /// Scale the signed amplitude before recentering.
    Amplitude,
    /// Ignore the multiplier and only recenter.
    Bypass,
}

/// Maps signed 16 bit samples onto `0..=top`.
///
/// `duty = ((s + 32768) * (top + 1)) / 65536`, truncated. The neutral value is
/// the duty of a zero sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Converter {
    top: u16,
    scaling: Scaling,
}

impl Converter {
    pub const fn new(top: u16, scaling: Scaling) -> Self {
        Self { top, scaling }
    }

    /// Converter for the configured PWM resolution.
    pub const fn configured() -> Self {
        let scaling = if config::SCALE_BY_VOLUME {
            Scaling::Amplitude
        } else {
            Scaling::Bypass
        };
        Self::new(config::PWM_TOP, scaling)
    }

    pub const fn top(&self) -> u16 {
        self.top
    }

    pub const fn scaling(&self) -> Scaling {
        self.scaling
    }

    /// Duty of a zero sample: `(top + 1) / 2`, not `top / 2`.
    ///
    /// With an odd `top` (3905 on the board) the two differ by one count.
    /// Padding and underrun silence use this value, so it has to land exactly
    /// where `duty(0)` does or every gap would step the output by one count.
    pub const fn neutral(&self) -> u16 {
        ((self.top as u32 + 1) / 2) as u16
    }

    #[inline]
    pub fn duty(&self, sample: i16, volume: Volume) -> u16 {
        let sample = match self.scaling {
            Scaling::Amplitude => volume.scale(sample),
            Scaling::Bypass => sample,
        };
        let offset = (sample as i32 + 32768) as u32;
        (offset * (self.top as u32 + 1) / 65536) as u16
    }

    /// Writes one duty value per raw sample into `out`, in order.
    ///
    /// Returns how many were written. Raw samples beyond `out.len()` are left
    /// in the iterator.
    pub fn convert<I>(&self, raw: I, volume: Volume, out: &mut [u16]) -> usize
    where
        I: IntoIterator<Item = i16>,
    {
        let mut written = 0;
        for (slot, sample) in out.iter_mut().zip(raw) {
            *slot = self.duty(sample, volume);
            written += 1;
        }
        written
    }

    pub fn pad(&self, out: &mut [u16]) {
        out.fill(self.neutral());
    }

    /// `convert` followed by neutral padding of whatever is left of `slot`.
    pub fn fill<I>(&self, raw: I, volume: Volume, slot: &mut [u16]) -> usize
    where
        I: IntoIterator<Item = i16>,
    {
        let written = self.convert(raw, volume, slot);
        self.pad(&mut slot[written..]);
        written
    }
}

impl Default for Converter {
    fn default() -> Self {
        Self::configured()
    }
}
