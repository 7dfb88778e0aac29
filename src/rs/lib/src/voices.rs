// Voice allocation: the foreground half of the organ.
//
// Maps incoming notes onto the fixed pool of oscillators. A note that
// is already sounding is retriggered in place; otherwise a free voice
// is taken, and with the pool full the oldest voice is stolen. Age is
// a per-voice counter bumped on every new assignment, which gives an
// LRU order without timestamps.

use log::{debug, warn};
use midi_types::MidiMessage;
use organ_hal::hal_nb::serial::Read;

use crate::config::{TieBreak, N_KEYS};
use crate::midi::MidiDecoder;
use crate::organ::Organ;

#[derive(Clone, Copy, Default)]
struct Assignment {
    key: Option<u8>,
    age: u8,
}

/// Snapshot of one voice as seen by the foreground.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceView {
    pub key: Option<u8>,
    /// `None` when the voice is free.
    pub age: Option<u8>,
    /// P-bit phase increment.
    pub increment: u32,
    pub target_volume: u8,
}

/// Set of sounding keys, one bit per MIDI key.
#[derive(Clone, Copy, Default, PartialEq)]
struct KeySet(u128);

impl KeySet {
    #[inline]
    fn contains(&self, key: u8) -> bool {
        self.0 & (1u128 << key) != 0
    }

    #[inline]
    fn insert(&mut self, key: u8) {
        self.0 |= 1u128 << key;
    }

    #[inline]
    fn remove(&mut self, key: u8) {
        self.0 &= !(1u128 << key);
    }
}

pub struct Voices<'a, const N: usize> {
    organ: &'a Organ<N>,
    voices: [Assignment; N],
    enabled: KeySet,
    num_active: usize,
    decoder: MidiDecoder,
}

impl<'a, const N: usize> Voices<'a, N> {
    pub(crate) fn new(organ: &'a Organ<N>) -> Self {
        Self {
            organ,
            voices: [Assignment::default(); N],
            enabled: KeySet::default(),
            num_active: 0,
            decoder: MidiDecoder::new(organ.config().midi_channel),
        }
    }

    pub fn note_on(&mut self, key: u8, velocity: u8) {
        if key as usize >= N_KEYS {
            warn!("voices: ignoring note-on for key {}", key);
            return;
        }

        if self.enabled.contains(key) {
            if let Some(n) = self.find(key) {
                debug!("voices: retrigger {} on voice {}", key, n);
                self.assign(n, key, velocity);
            }
            return;
        }

        let n = if self.num_active < N {
            // A free voice must exist while the count is below N.
            let Some(n) = self.voices.iter().position(|v| v.key.is_none()) else {
                return;
            };
            self.num_active += 1;
            debug!("voices: assign {} to free voice {}", key, n);
            n
        } else {
            let n = self.oldest();
            debug!("voices: steal voice {} (key {:?}, age {}) for {}",
                   n, self.voices[n].key, self.voices[n].age, key);
            n
        };

        for (i, v) in self.voices.iter_mut().enumerate() {
            if i != n && v.key.is_some() {
                v.age = v.age.saturating_add(1);
            }
        }
        self.assign(n, key, velocity);
    }

    pub fn note_off(&mut self, key: u8, _velocity: u8) {
        if key as usize >= N_KEYS || !self.enabled.contains(key) {
            debug!("voices: stray note-off for {}", key);
            return;
        }
        if let Some(n) = self.find(key) {
            debug!("voices: release {} from voice {}", key, n);
            self.enabled.remove(key);
            self.voices[n] = Assignment::default();
            self.organ.silence(n);
            self.num_active -= 1;
        }
    }

    /// Release every sounding note through the normal note-off path.
    pub fn all_notes_off(&mut self) {
        for n in 0..N {
            if let Some(key) = self.voices[n].key {
                self.note_off(key, 0);
            }
        }
    }

    /// Dispatch a decoded message. Only note events on the serviced
    /// channel have any effect; a note-on with velocity 0 is a note-off.
    pub fn handle(&mut self, msg: &MidiMessage) {
        match *msg {
            MidiMessage::NoteOn(ch, note, vel) if self.serviced(ch.into()) => {
                let velocity: u8 = vel.into();
                if velocity == 0 {
                    self.note_off(note.into(), 0);
                } else {
                    self.note_on(note.into(), velocity);
                }
            }
            MidiMessage::NoteOff(ch, note, vel) if self.serviced(ch.into()) => {
                self.note_off(note.into(), vel.into());
            }
            _ => {}
        }
    }

    /// Block until one complete message arrives on `serial`, then
    /// dispatch it.
    pub fn poll<S: Read<u8>>(&mut self, serial: &mut S) -> Result<(), S::Error> {
        let msg = self.decoder.read(serial)?;
        self.handle(&msg);
        Ok(())
    }

    pub fn decoder(&self) -> &MidiDecoder {
        &self.decoder
    }

    pub fn num_active(&self) -> usize {
        self.num_active
    }

    pub fn is_sounding(&self, key: u8) -> bool {
        (key as usize) < N_KEYS && self.enabled.contains(key)
    }

    pub fn sounding_keys(&self) -> heapless::Vec<u8, N_KEYS> {
        let mut keys = heapless::Vec::new();
        for key in 0..N_KEYS as u8 {
            if self.enabled.contains(key) {
                // Capacity covers every key.
                keys.push(key).ok();
            }
        }
        keys
    }

    pub fn voice(&self, n: usize) -> VoiceView {
        let v = &self.voices[n];
        let slot = self.organ.slot(n);
        VoiceView {
            key: v.key,
            age: v.key.map(|_| v.age),
            increment: slot.increment() >> self.organ.tables().align_shift(),
            target_volume: slot.target_volume(),
        }
    }

    fn serviced(&self, channel: u8) -> bool {
        channel == self.organ.config().midi_channel
    }

    fn find(&self, key: u8) -> Option<usize> {
        self.voices.iter().position(|v| v.key == Some(key))
    }

    /// Voice with the strictly largest age, ties broken per config.
    fn oldest(&self) -> usize {
        let tie_break = self.organ.config().tie_break;
        let mut oldest = 0;
        for (n, v) in self.voices.iter().enumerate().skip(1) {
            let max = self.voices[oldest].age;
            let older = match tie_break {
                TieBreak::LowestIndex => v.age > max,
                TieBreak::HighestIndex => v.age >= max,
            };
            if older {
                oldest = n;
            }
        }
        oldest
    }

    fn assign(&mut self, n: usize, key: u8, velocity: u8) {
        if let Some(previous) = self.voices[n].key {
            self.enabled.remove(previous);
        }
        let config = self.organ.config();
        let increment = self.organ.tables().increment(key);
        self.organ.publish(n, increment, config.velocity_curve.volume(velocity));
        self.voices[n] = Assignment { key: Some(key), age: 0 };
        self.enabled.insert(key);
    }
}
