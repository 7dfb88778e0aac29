//! Host-side stand-ins for the organ's collaborators
//!
//! `DummyPwm` records every duty written by the oscillator bank and
//! `DummySerial` replays a fixed MIDI byte stream. Both are used by the
//! unit and integration tests, and are handy for running the engine on a
//! desktop without a board attached.

use embedded_hal_nb::serial::{self, ErrorKind, ErrorType, Read};

use crate::pwm::PwmBank;

/// Raised by `DummySerial` once the recorded stream is exhausted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EndOfStream;

impl serial::Error for EndOfStream {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// PWM bank that remembers the last duty of every channel.
pub struct DummyPwm<const N: usize> {
    pub duty: [u8; N],
    pub writes: usize,
}

impl<const N: usize> DummyPwm<N> {
    pub fn new() -> Self {
        Self {
            duty: [0x80; N],
            writes: 0,
        }
    }
}

impl<const N: usize> Default for DummyPwm<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> PwmBank for DummyPwm<N> {
    fn channels(&self) -> usize {
        N
    }

    fn write_duty(&mut self, channel: usize, duty: u8) {
        self.duty[channel] = duty;
        self.writes += 1;
    }
}

/// Serial port that yields bytes from a slice.
///
/// Every other read returns `WouldBlock` first when `stall` is set, to
/// exercise callers that go through `nb::block!`.
pub struct DummySerial<'a> {
    bytes: &'a [u8],
    pos: usize,
    stall: bool,
    stalled: bool,
}

impl<'a> DummySerial<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0, stall: false, stalled: false }
    }

    pub fn stalling(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0, stall: true, stalled: false }
    }

    /// Number of bytes consumed so far.
    pub fn consumed(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }
}

impl ErrorType for DummySerial<'_> {
    type Error = EndOfStream;
}

impl Read<u8> for DummySerial<'_> {
    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        if self.stall && !self.stalled {
            self.stalled = true;
            return Err(nb::Error::WouldBlock);
        }
        self.stalled = false;
        match self.bytes.get(self.pos) {
            Some(&b) => {
                self.pos += 1;
                Ok(b)
            }
            None => Err(nb::Error::Other(EndOfStream)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::recv_byte;
    use crate::tests::setup_logger;

    #[test]
    fn serial_replays_then_ends() {
        setup_logger();
        let mut serial = DummySerial::stalling(&[0x90, 0x3c]);
        assert_eq!(recv_byte(&mut serial), Ok(0x90));
        assert_eq!(recv_byte(&mut serial), Ok(0x3c));
        assert_eq!(serial.consumed(), 2);
        assert_eq!(recv_byte(&mut serial), Err(EndOfStream));
    }

    #[test]
    fn pwm_records_writes() {
        let mut pwm = DummyPwm::<2>::new();
        pwm.write_duty(1, 3);
        log::info!("duty = {:?}", pwm.duty);
        assert_eq!(pwm.duty, [0x80, 3]);
        assert_eq!(pwm.writes, 1);
    }
}
