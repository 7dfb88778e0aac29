#![cfg_attr(not(test), no_std)]

#[cfg(test)]
#[macro_use]
extern crate std;

pub mod config;
pub mod midi;
pub mod nco;
pub mod organ;
pub mod tables;
pub mod voices;

pub use config::{ConfigError, OrganConfig, SmoothingPolicy, TieBreak, VelocityCurve};
pub use midi::MidiDecoder;
pub use nco::Oscillators;
pub use organ::Organ;
pub use voices::{VoiceView, Voices};

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Once;

    static INIT: Once = Once::new();

    pub fn setup_logger() {
      INIT.call_once(env_logger::init);
    }
}
