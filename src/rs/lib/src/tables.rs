// Wavetable and per-semitone phase increments, built once at startup.
//
// Increments are stored as P-bit values (P = accumulator width). The
// tick runs a 32-bit accumulator with the P bits left-aligned, so the
// carry out of bit 31 is the P-bit wrap and bits 31..24 always index
// the wavetable. `align_shift` converts between the two.

use core::f32::consts::PI;
#[cfg(not(test))]
use micromath::F32Ext;

use crate::config::{ConfigError, OrganConfig, N_KEYS};

pub const N_SAMP: usize = 256;
pub const N_SEMITONES: usize = 12;
pub const WAVE_AMPLITUDE: f32 = 127.0;

/// Octave of the highest key (127) that the frequency table covers.
/// The table itself holds octave `HIGHEST_OCTAVE + 1` (keys 132..=143),
/// so every playable key is reached by shifting right at least once.
pub const HIGHEST_OCTAVE: u8 = 10;

const SEMITONE_RATIO: f32 = 1.059_463_1;
const A4_KEY: u8 = 69;

pub struct Wavetable([i8; N_SAMP]);

impl Wavetable {
    pub fn sine() -> Self {
        let mut wav = [0i8; N_SAMP];
        for (i, s) in wav.iter_mut().enumerate() {
            let x = 2.0f32 * PI * (i as f32) / (N_SAMP as f32);
            *s = (WAVE_AMPLITUDE * x.sin()).round() as i8;
        }
        Self(wav)
    }

    #[inline(always)]
    pub fn sample(&self, index: u8) -> i8 {
        self.0[index as usize]
    }

    pub fn samples(&self) -> &[i8; N_SAMP] {
        &self.0
    }
}

pub struct FrequencyTable {
    increments: [u32; N_SEMITONES],
}

impl FrequencyTable {
    pub fn new(config: &OrganConfig) -> Result<Self, ConfigError> {
        let full_scale = (1u64 << config.accumulator_width) as f32;
        let ticks_per_second = config.tick_hz as f32;

        // Walk up from A4 to the C that starts the table octave.
        let table_key = (HIGHEST_OCTAVE + 1) * N_SEMITONES as u8;
        let mut hz = config.reference_hz;
        for _ in A4_KEY..table_key {
            hz *= SEMITONE_RATIO;
        }

        let mut increments = [0u32; N_SEMITONES];
        for inc in increments.iter_mut() {
            let step = full_scale * hz / ticks_per_second + 0.5f32;
            if step >= full_scale {
                return Err(ConfigError::IncrementOverflow);
            }
            *inc = step as u32;
            hz *= SEMITONE_RATIO;
        }
        Ok(Self { increments })
    }

    pub fn increments(&self) -> &[u32; N_SEMITONES] {
        &self.increments
    }

    #[inline]
    pub fn increment(&self, semitone: u8, shift: u8) -> u32 {
        self.increments[semitone as usize] >> shift
    }
}

/// Split a key into (semitone, right shift) for `FrequencyTable::increment`.
#[inline]
pub fn key_position(key: u8) -> (u8, u8) {
    let octave = key / N_SEMITONES as u8;
    (key % N_SEMITONES as u8, HIGHEST_OCTAVE + 1 - octave)
}

/// Precomputed `key_position` for every MIDI key.
pub struct OctaveLookup([(u8, u8); N_KEYS]);

impl OctaveLookup {
    pub fn new() -> Self {
        let mut lut = [(0u8, 0u8); N_KEYS];
        for (key, entry) in lut.iter_mut().enumerate() {
            *entry = key_position(key as u8);
        }
        Self(lut)
    }

    #[inline]
    pub fn position(&self, key: u8) -> (u8, u8) {
        self.0[key as usize]
    }
}

impl Default for OctaveLookup {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Tables {
    wavetable: Wavetable,
    frequencies: FrequencyTable,
    lookup: Option<OctaveLookup>,
    align_shift: u32,
}

impl Tables {
    pub fn new(config: &OrganConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            wavetable: Wavetable::sine(),
            frequencies: FrequencyTable::new(config)?,
            lookup: config.octave_lookup.then(OctaveLookup::new),
            align_shift: 32 - config.accumulator_width as u32,
        })
    }

    pub fn wavetable(&self) -> &Wavetable {
        &self.wavetable
    }

    pub fn frequencies(&self) -> &FrequencyTable {
        &self.frequencies
    }

    /// P-bit phase increment for a key (0..=127).
    pub fn increment(&self, key: u8) -> u32 {
        let (semitone, shift) = match &self.lookup {
            Some(lut) => lut.position(key),
            None => key_position(key),
        };
        self.frequencies.increment(semitone, shift)
    }

    #[inline(always)]
    pub fn align_shift(&self) -> u32 {
        self.align_shift
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sine_shape() {
        let wav = Wavetable::sine();
        assert_eq!(wav.sample(0), 0);
        assert_eq!(wav.sample(64), 127);
        assert_eq!(wav.sample(128), 0);
        assert_eq!(wav.sample(192), -127);
        for i in 1..128u8 {
            // Odd symmetry around the half period.
            assert_eq!(wav.sample(i), -wav.sample(i.wrapping_neg()));
        }
    }

    #[test]
    fn increments_rise_by_semitones() {
        let cfg = OrganConfig::default();
        let table = FrequencyTable::new(&cfg).unwrap();
        let inc = table.increments();
        for s in 1..N_SEMITONES {
            let ratio = inc[s] as f32 / inc[s - 1] as f32;
            assert!((ratio - SEMITONE_RATIO).abs() < 1e-3, "semitone {} ratio {}", s, ratio);
        }
    }

    #[test]
    fn a4_lands_on_reference() {
        let cfg = OrganConfig::default();
        let tables = Tables::new(&cfg).unwrap();
        let inc = tables.increment(69) as f32;
        let hz = inc * cfg.tick_hz as f32 / 65536.0;
        assert!((hz - 440.0).abs() < 2.0, "A4 = {}Hz", hz);
        // One octave down is half the increment, give or take truncation.
        let a3 = tables.increment(57);
        assert!((tables.increment(69) / 2).abs_diff(a3) <= 1);
    }

    #[test]
    fn lookup_matches_division() {
        let cfg = OrganConfig::default();
        let with_lut = Tables::new(&cfg).unwrap();
        let without = Tables::new(&OrganConfig { octave_lookup: false, ..cfg }).unwrap();
        for key in 0..N_KEYS as u8 {
            assert_eq!(with_lut.increment(key), without.increment(key));
        }
        assert_eq!(key_position(60), (0, 6));
        assert_eq!(key_position(127), (7, 1));
        assert_eq!(key_position(0), (0, 11));
    }

    #[test]
    fn wide_accumulator() {
        let cfg = OrganConfig { accumulator_width: 32, ..Default::default() };
        let tables = Tables::new(&cfg).unwrap();
        assert_eq!(tables.align_shift(), 0);
        let narrow = Tables::new(&OrganConfig::default()).unwrap();
        assert_eq!(narrow.align_shift(), 16);
        let ratio = tables.increment(69) as f64 / narrow.increment(69) as f64;
        assert!((ratio - 65536.0).abs() / 65536.0 < 2e-3);
    }

    #[test]
    fn slow_tick_overflows() {
        let cfg = OrganConfig { tick_hz: 8_000, ..Default::default() };
        assert!(matches!(FrequencyTable::new(&cfg), Err(ConfigError::IncrementOverflow)));
    }
}
