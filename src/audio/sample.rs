use std::fmt::Debug;

use num_traits::{Bounded, Num, ToPrimitive};

/// Conversion between a concrete sample type and normalized `f32` audio.
///
/// Integer PCM is scaled by its full negative range (`i16` uses 32768), so
/// `-1.0` maps exactly to `i16::MIN` and `+1.0` saturates at `i16::MAX`.
pub trait AudioSample:
    Num + Copy + Send + Sync + PartialOrd + ToPrimitive + Bounded + Debug + 'static
{
    fn to_f32_normalized(self) -> f32;

    fn from_f32_normalized(value: f32) -> Self;
}

impl AudioSample for f32 {
    fn to_f32_normalized(self) -> f32 {
        self
    }

    fn from_f32_normalized(value: f32) -> Self {
        value.clamp(-1.0, 1.0)
    }
}

impl AudioSample for i16 {
    fn to_f32_normalized(self) -> f32 {
        self as f32 / 32768.0
    }

    fn from_f32_normalized(value: f32) -> Self {
        (value * 32768.0)
            .round()
            .clamp(i16::MIN as f32, i16::MAX as f32) as i16
    }
}
