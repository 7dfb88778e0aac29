// Duty-cycle sink for the oscillator bank.
//
// One compare channel per voice. Channels are expected to run an 8-bit
// counter (TOP = 255), so the duty value is written without rescaling.

use embedded_hal::pwm::SetDutyCycle;

pub trait PwmBank {
    /// Number of compare channels the bank can drive.
    fn channels(&self) -> usize;
    fn write_duty(&mut self, channel: usize, duty: u8);
}

impl<P: SetDutyCycle, const N: usize> PwmBank for [P; N] {
    fn channels(&self) -> usize {
        N
    }

    #[inline(always)]
    fn write_duty(&mut self, channel: usize, duty: u8) {
        if let Some(ch) = self.get_mut(channel) {
            ch.set_duty_cycle(u16::from(duty)).ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::pwm::ErrorType;

    struct Compare(u16);

    impl ErrorType for Compare {
        type Error = Infallible;
    }

    impl SetDutyCycle for Compare {
        fn max_duty_cycle(&self) -> u16 {
            255
        }

        fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
            self.0 = duty;
            Ok(())
        }
    }

    #[test]
    fn array_bank_writes_each_channel() {
        let mut bank = [Compare(0), Compare(0), Compare(0)];
        assert_eq!(bank.channels(), 3);
        bank.write_duty(0, 0x80);
        bank.write_duty(2, 0xff);
        assert_eq!(bank[0].0, 0x80);
        assert_eq!(bank[1].0, 0);
        assert_eq!(bank[2].0, 0xff);
    }

    #[test]
    fn out_of_range_channel_is_ignored() {
        let mut bank = [Compare(7)];
        bank.write_duty(1, 0x10);
        assert_eq!(bank[0].0, 7);
    }
}
