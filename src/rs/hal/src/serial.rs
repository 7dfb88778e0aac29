// Blocking byte input on top of a non-blocking UART.

use embedded_hal_nb::serial::Read;

/// Spin until the UART yields a byte.
///
/// This is the only place the foreground loop is allowed to stall.
#[inline]
pub fn recv_byte<S: Read<u8>>(serial: &mut S) -> Result<u8, S::Error> {
    nb::block!(serial.read())
}
