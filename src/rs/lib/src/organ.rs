// The one region of memory shared between the timer interrupt and the
// foreground loop.
//
// Field ownership:
//
//   foreground (`Voices`)       increment, target_volume, key, age,
//                               enabled tones, active count
//   interrupt  (`Oscillators`)  phase, smoothed_volume
//
// Only `increment` and `target_volume` cross between the two, through
// the atomics in `Slot`. Relaxed loads and stores are enough: each
// field has exactly one writer and the reader tolerates seeing the
// pair from two different assignments for a single tick. Set
// `mask_on_assign` to close even that window.
//
// Targets need native 32-bit atomic load/store (no CAS is used).

use core::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use log::info;

use crate::config::{ConfigError, OrganConfig};
use crate::nco::Oscillators;
use crate::tables::Tables;
use crate::voices::Voices;

pub(crate) struct Slot {
    /// Left-aligned in 32 bits, see `tables`.
    increment: AtomicU32,
    target_volume: AtomicU8,
}

impl Slot {
    const fn new() -> Self {
        Self {
            increment: AtomicU32::new(0),
            target_volume: AtomicU8::new(0),
        }
    }

    #[inline(always)]
    pub(crate) fn increment(&self) -> u32 {
        self.increment.load(Ordering::Relaxed)
    }

    #[inline(always)]
    pub(crate) fn target_volume(&self) -> u8 {
        self.target_volume.load(Ordering::Relaxed)
    }
}

pub struct Organ<const N: usize> {
    config: OrganConfig,
    tables: Tables,
    slots: [Slot; N],
}

impl<const N: usize> Organ<N> {
    pub fn new(config: OrganConfig) -> Result<Self, ConfigError> {
        config.validate(N)?;
        let tables = Tables::new(&config)?;
        config.log();
        info!("organ: tables ready, increments={:?}", tables.frequencies().increments());
        Ok(Self {
            config,
            tables,
            slots: core::array::from_fn(|_| Slot::new()),
        })
    }

    /// Hand out the foreground and interrupt halves.
    ///
    /// Both borrow the organ, so there is never more than one writer per
    /// field. The interrupt half goes to the timer handler, the
    /// foreground half stays with the MIDI loop.
    ///
    /// Every voice starts free and silent, including after a previous
    /// pair of halves has been dropped.
    pub fn split(&mut self) -> (Voices<'_, N>, Oscillators<'_, N>) {
        for slot in self.slots.iter_mut() {
            *slot.increment.get_mut() = 0;
            *slot.target_volume.get_mut() = 0;
        }
        let organ: &Self = self;
        (Voices::new(organ), Oscillators::new(organ))
    }

    pub fn config(&self) -> &OrganConfig {
        &self.config
    }

    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    #[inline(always)]
    pub(crate) fn slot(&self, n: usize) -> &Slot {
        &self.slots[n]
    }

    /// Publish a new (P-bit) increment and target volume for voice `n`.
    pub(crate) fn publish(&self, n: usize, increment: u32, volume: u8) {
        let slot = &self.slots[n];
        let aligned = increment << self.tables.align_shift();
        if self.config.mask_on_assign {
            critical_section::with(|_| {
                slot.increment.store(aligned, Ordering::Relaxed);
                slot.target_volume.store(volume, Ordering::Relaxed);
            });
        } else {
            slot.increment.store(aligned, Ordering::Relaxed);
            slot.target_volume.store(volume, Ordering::Relaxed);
        }
    }

    /// Fade voice `n` out. The increment is left alone so the waveform
    /// keeps running until the smoothed volume reaches zero.
    pub(crate) fn silence(&self, n: usize) {
        self.slots[n].target_volume.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_validates() {
        crate::tests::setup_logger();
        assert!(Organ::<6>::new(OrganConfig::default()).is_ok());
        assert!(matches!(Organ::<4>::new(OrganConfig::default()),
                         Err(ConfigError::VoiceCount { configured: 6, pool: 4 })));
        let cfg = OrganConfig { voice_count: 0, ..Default::default() };
        assert!(Organ::<0>::new(cfg).is_err());
    }

    #[test]
    fn publish_left_aligns() {
        let cfg = OrganConfig { voice_count: 1, accumulator_width: 12, ..Default::default() };
        let organ = Organ::<1>::new(cfg).unwrap();
        organ.publish(0, 0x123, 200);
        assert_eq!(organ.slot(0).increment(), 0x123 << 20);
        assert_eq!(organ.slot(0).target_volume(), 200);
        organ.silence(0);
        assert_eq!(organ.slot(0).target_volume(), 0);
        assert_eq!(organ.slot(0).increment(), 0x123 << 20);
    }

    #[test]
    fn split_starts_silent() {
        let mut organ = Organ::<2>::new(OrganConfig { voice_count: 2, ..Default::default() }).unwrap();
        {
            let (mut voices, _) = organ.split();
            voices.note_on(60, 100);
            voices.note_on(64, 100);
        }
        assert_ne!(organ.slot(0).target_volume(), 0);
        let (voices, _) = organ.split();
        assert_eq!(voices.num_active(), 0);
        for n in 0..2 {
            assert_eq!(voices.voice(n).increment, 0);
            assert_eq!(voices.voice(n).target_volume, 0);
        }
    }

    #[test]
    fn masked_publish() {
        let cfg = OrganConfig { voice_count: 2, mask_on_assign: true, ..Default::default() };
        let organ = Organ::<2>::new(cfg).unwrap();
        organ.publish(1, 1000, 150);
        assert_eq!(organ.slot(1).increment(), 1000 << 16);
        assert_eq!(organ.slot(1).target_volume(), 150);
    }
}
