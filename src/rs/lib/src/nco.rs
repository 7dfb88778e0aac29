// Oscillator bank: the timer interrupt half of the organ.
//
// `tick` runs once per timer period with interrupts masked. It never
// logs or blocks. Per voice it does a wrapping add, a table read, an
// 8x8 multiply and a PWM write.

use hal::pwm::PwmBank;
use organ_hal as hal;

use crate::config::{ConfigError, SmoothingPolicy};
use crate::organ::Organ;

/// Unsigned midpoint of the 8-bit duty range.
pub const DUTY_BIAS: u8 = 0x80;

/// Scale a wavetable sample by `volume` (0..=255 meaning 0..~1) and
/// rebias it into an unsigned duty value.
#[inline(always)]
pub fn duty(volume: u8, sample: i8) -> u8 {
    (((volume as i16 * sample as i16) >> 8) as u8) ^ DUTY_BIAS
}

impl SmoothingPolicy {
    /// Next smoothed volume. `crossed` is set on the tick where the
    /// phase accumulator wrapped.
    #[inline(always)]
    pub fn settle(self, smoothed: u8, target: u8, crossed: bool) -> u8 {
        match self {
            SmoothingPolicy::None => target,
            SmoothingPolicy::Transition if crossed => {
                if smoothed < target {
                    smoothed + 1
                } else if smoothed > target {
                    smoothed - 1
                } else {
                    smoothed
                }
            }
            SmoothingPolicy::WaitNewPhase if crossed => target,
            _ => smoothed,
        }
    }
}

pub struct Oscillators<'a, const N: usize> {
    organ: &'a Organ<N>,
    /// Left-aligned P-bit accumulators.
    phase: [u32; N],
    smoothed: [u8; N],
}

impl<'a, const N: usize> Oscillators<'a, N> {
    pub(crate) fn new(organ: &'a Organ<N>) -> Self {
        Self {
            organ,
            phase: [0; N],
            smoothed: [0; N],
        }
    }

    /// Check once, before the tick is armed, that `pwm` has a channel
    /// for every voice.
    pub fn check_bank<P: PwmBank>(&self, pwm: &P) -> Result<(), ConfigError> {
        if pwm.channels() < N {
            return Err(ConfigError::PwmChannels { voices: N, channels: pwm.channels() });
        }
        Ok(())
    }

    /// Advance every voice by one sample and write its duty to `pwm`.
    #[inline]
    pub fn tick<P: PwmBank>(&mut self, pwm: &mut P) {
        let wav = self.organ.tables().wavetable();
        let policy = self.organ.config().smoothing;
        for n in 0..N {
            let slot = self.organ.slot(n);
            let (phase, crossed) = self.phase[n].overflowing_add(slot.increment());
            self.phase[n] = phase;
            let volume = policy.settle(self.smoothed[n], slot.target_volume(), crossed);
            self.smoothed[n] = volume;
            pwm.write_duty(n, duty(volume, wav.sample((phase >> 24) as u8)));
        }
    }

    /// P-bit phase of voice `n`.
    pub fn phase(&self, n: usize) -> u32 {
        self.phase[n] >> self.organ.tables().align_shift()
    }

    /// Top byte of the accumulator, i.e. the wavetable index.
    pub fn table_index(&self, n: usize) -> u8 {
        (self.phase[n] >> 24) as u8
    }

    pub fn smoothed_volume(&self, n: usize) -> u8 {
        self.smoothed[n]
    }
}
