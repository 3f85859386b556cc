//! Volume multiplier and the collaborator that supplies it.

/// Multiplier in `[0, 1]`, stored as Q15 (`FULL` is exactly 1.0).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Volume(u16);

impl Volume {
    const ONE: u16 = 1 << 15;

    pub const MUTE: Volume = Volume(0);
    pub const FULL: Volume = Volume(Self::ONE);

    /// Clamps `value` into `[0, 1]`. NaN is treated as mute.
    pub fn from_unit(value: f32) -> Self {
        if !(value > 0.0) {
            Self::MUTE
        } else if value >= 1.0 {
            Self::FULL
        } else {
            Volume((value * Self::ONE as f32 + 0.5) as u16)
        }
    }

    /// `num / den`, clamped to full scale. A zero denominator mutes.
    pub const fn from_ratio(num: u16, den: u16) -> Self {
        if den == 0 {
            return Self::MUTE;
        }
        let q = (num as u32 * Self::ONE as u32) / den as u32;
        if q >= Self::ONE as u32 {
            Self::FULL
        } else {
            Volume(q as u16)
        }
    }

    pub const fn q15(self) -> u16 {
        self.0
    }

    pub fn as_unit(self) -> f32 {
        self.0 as f32 / Self::ONE as f32
    }

    /// Scales a signed sample, truncating toward zero. `FULL` is exact.
    #[inline]
    pub const fn scale(self, sample: i16) -> i16 {
        ((sample as i32 * self.0 as i32) / Self::ONE as i32) as i16
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::FULL
    }
}

/// Supplies the current volume multiplier.
///
/// Called at most once per slot fill, from the main loop. Results need not be
/// monotonic between calls; values outside `[0, 1]` are clamped.
pub trait VolumeSampler {
    fn multiplier(&mut self) -> f32;
}

impl<F: FnMut() -> f32> VolumeSampler for F {
    fn multiplier(&mut self) -> f32 {
        self()
    }
}

/// A sampler that always answers the same value.
#[derive(Clone, Copy, Debug)]
pub struct FixedVolume(pub f32);

impl VolumeSampler for FixedVolume {
    fn multiplier(&mut self) -> f32 {
        self.0
    }
}
