// Organ configuration, resolved once before the tables are built.
//
// Everything here is fixed for the life of the firmware: the voice
// pool size is a const generic on `Organ`, `voice_count` only has to
// agree with it.

use core::fmt;
use log::info;
use strum_macros::{EnumIter, IntoStaticStr};

/// MIDI key numbers are 7 bits.
pub const N_KEYS: usize = 128;

/// Narrowest accumulator that still has a full high-order byte to
/// index the wavetable with.
pub const MIN_ACCUMULATOR_WIDTH: u8 = 9;
pub const MAX_ACCUMULATOR_WIDTH: u8 = 32;

/// How `smoothed_volume` follows `target_volume` in the tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum SmoothingPolicy {
    /// Output always uses the target volume; may click on change.
    None,
    /// Step one unit toward the target on each zero-phase crossing.
    #[default]
    Transition,
    /// Jump to the target on the next zero-phase crossing.
    WaitNewPhase,
}

/// Velocity to target volume mapping. Both are monotonic.
#[derive(Debug, Default, Clone, Copy, PartialEq, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum VelocityCurve {
    /// Squeeze velocity into the upper half of the volume range,
    /// 0..=127 -> 128..=192.
    #[default]
    Compressed,
    /// Scale velocity across the full range, 0..=127 -> 0..=255.
    Direct,
}

impl VelocityCurve {
    pub fn volume(self, velocity: u8) -> u8 {
        let v = velocity & 0x7f;
        match self {
            VelocityCurve::Compressed => 128 + (v / 2) + (v & 1),
            VelocityCurve::Direct => (v << 1) | (v >> 6),
        }
    }
}

/// Which of several equally old voices gets stolen.
#[derive(Debug, Default, Clone, Copy, PartialEq, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum TieBreak {
    #[default]
    LowestIndex,
    HighestIndex,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    /// `voice_count` does not match the pool the organ was built with,
    /// or the pool is empty.
    VoiceCount { configured: usize, pool: usize },
    AccumulatorWidth(u8),
    MidiChannel(u8),
    /// Tick rate or reference pitch is zero, negative or not finite.
    Tuning,
    /// The top semitone of the reference octave does not fit the
    /// accumulator at this tick rate.
    IncrementOverflow,
    /// The PWM bank has fewer channels than there are voices.
    PwmChannels { voices: usize, channels: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::VoiceCount { configured, pool } =>
                write!(f, "voice_count {} does not match pool of {}", configured, pool),
            ConfigError::AccumulatorWidth(w) =>
                write!(f, "accumulator width {} outside {}..={}",
                       w, MIN_ACCUMULATOR_WIDTH, MAX_ACCUMULATOR_WIDTH),
            ConfigError::MidiChannel(ch) =>
                write!(f, "midi channel {} outside 0..=15", ch),
            ConfigError::Tuning =>
                write!(f, "tick rate and reference pitch must be positive"),
            ConfigError::IncrementOverflow =>
                write!(f, "reference octave does not fit the accumulator"),
            ConfigError::PwmChannels { voices, channels } =>
                write!(f, "pwm bank has {} channels for {} voices", channels, voices),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrganConfig {
    pub voice_count: usize,
    /// Phase accumulator width in bits, P.
    pub accumulator_width: u8,
    pub smoothing: SmoothingPolicy,
    /// Precompute (semitone, shift) per key instead of dividing at note-on.
    pub octave_lookup: bool,
    /// Zero-based MIDI channel that is serviced.
    pub midi_channel: u8,
    /// Timer interrupt rate in Hz.
    pub tick_hz: u32,
    /// Pitch of A4 (key 69) in Hz.
    pub reference_hz: f32,
    pub velocity_curve: VelocityCurve,
    pub tie_break: TieBreak,
    /// Mask the tick while a voice's increment and volume are updated,
    /// so the interrupt never sees half an assignment.
    pub mask_on_assign: bool,
}

impl Default for OrganConfig {
    fn default() -> Self {
        Self {
            voice_count: 6,
            accumulator_width: 16,
            smoothing: SmoothingPolicy::default(),
            octave_lookup: true,
            midi_channel: 0,
            // 16MHz core clock, 8-bit fast PWM overflow interrupt.
            tick_hz: 16_000_000 / 256,
            reference_hz: 440.0,
            velocity_curve: VelocityCurve::default(),
            tie_break: TieBreak::default(),
            mask_on_assign: false,
        }
    }
}

impl OrganConfig {
    /// Check everything except the increment range, which needs the
    /// frequency table (see `tables::FrequencyTable::new`).
    pub fn validate(&self, pool: usize) -> Result<(), ConfigError> {
        if pool == 0 || self.voice_count != pool {
            return Err(ConfigError::VoiceCount { configured: self.voice_count, pool });
        }
        if !(MIN_ACCUMULATOR_WIDTH..=MAX_ACCUMULATOR_WIDTH).contains(&self.accumulator_width) {
            return Err(ConfigError::AccumulatorWidth(self.accumulator_width));
        }
        if self.midi_channel > 15 {
            return Err(ConfigError::MidiChannel(self.midi_channel));
        }
        if self.tick_hz == 0 || !self.reference_hz.is_finite() || self.reference_hz <= 0.0 {
            return Err(ConfigError::Tuning);
        }
        Ok(())
    }

    pub fn log(&self) {
        let smoothing: &'static str = self.smoothing.into();
        let curve: &'static str = self.velocity_curve.into();
        let tie_break: &'static str = self.tie_break.into();
        info!("organ/config: voices={} width={} smoothing={} octave_lookup={}",
              self.voice_count, self.accumulator_width, smoothing, self.octave_lookup);
        info!("organ/config: channel={} tick_hz={} a4={} velocity={} steal_ties={} mask_on_assign={}",
              self.midi_channel, self.tick_hz, self.reference_hz,
              curve, tie_break, self.mask_on_assign);
    }
}
