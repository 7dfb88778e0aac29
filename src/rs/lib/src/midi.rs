// Serial MIDI byte-stream decoder.
//
// Every status byte is treated as carrying exactly two data bytes.
// Those are always consumed, whatever the channel or command, so the
// decoder stays aligned with the stream. Data bytes that arrive while
// no status is pending are dropped, which resynchronizes on the next
// status byte after line noise or a mid-message power-up.

use log::trace;
use midi_types::{Channel, MidiMessage, Note, Value7};
use organ_hal::hal_nb::serial::Read;
use organ_hal::serial::recv_byte;

const STATUS_BIT: u8 = 0x80;
const DATA_MASK: u8 = 0x7f;

const NOTE_OFF: u8 = 0x8;
const NOTE_ON: u8 = 0x9;

/// What the pending status byte will turn into once its data arrives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    NoteOff,
    NoteOn,
    /// Another channel or a command the organ does not play.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecoderState {
    SeekStatus,
    ReadParam1 { command: Command },
    ReadParam2 { command: Command, key: u8 },
}

pub struct MidiDecoder {
    channel: u8,
    state: DecoderState,
}

impl MidiDecoder {
    pub fn new(channel: u8) -> Self {
        Self {
            channel: channel & 0x0f,
            state: DecoderState::SeekStatus,
        }
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// True between messages.
    pub fn is_idle(&self) -> bool {
        self.state == DecoderState::SeekStatus
    }

    fn decode_status(&self, status: u8) -> Command {
        if status & 0x0f != self.channel {
            return Command::Ignored;
        }
        match status >> 4 {
            NOTE_OFF => Command::NoteOff,
            NOTE_ON => Command::NoteOn,
            _ => Command::Ignored,
        }
    }

    /// Push one byte through the state machine. Returns a message when
    /// the byte completes a note event on the serviced channel.
    pub fn feed(&mut self, byte: u8) -> Option<MidiMessage> {
        match self.state {
            DecoderState::SeekStatus => {
                if byte & STATUS_BIT != 0 {
                    self.state = DecoderState::ReadParam1 { command: self.decode_status(byte) };
                } else {
                    trace!("midi: drop {:#04x}", byte);
                }
                None
            }
            DecoderState::ReadParam1 { command } => {
                self.state = DecoderState::ReadParam2 { command, key: byte & DATA_MASK };
                None
            }
            DecoderState::ReadParam2 { command, key } => {
                self.state = DecoderState::SeekStatus;
                self.dispatch(command, key, byte & DATA_MASK)
            }
        }
    }

    fn dispatch(&self, command: Command, key: u8, velocity: u8) -> Option<MidiMessage> {
        let channel = Channel::from(self.channel);
        match command {
            Command::NoteOn if velocity != 0 =>
                Some(MidiMessage::NoteOn(channel, Note::from(key), Value7::from(velocity))),
            // Zero velocity on a note-on means note-off.
            Command::NoteOn | Command::NoteOff =>
                Some(MidiMessage::NoteOff(channel, Note::from(key), Value7::from(velocity))),
            Command::Ignored => None,
        }
    }

    /// Block on `serial` until a complete note event is decoded.
    pub fn read<S: Read<u8>>(&mut self, serial: &mut S) -> Result<MidiMessage, S::Error> {
        loop {
            let byte = recv_byte(serial)?;
            if let Some(msg) = self.feed(byte) {
                return Ok(msg);
            }
        }
    }
}
