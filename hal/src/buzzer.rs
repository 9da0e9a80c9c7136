//! # Piezo buzzer
//!
//! The buzzer is connected to the channel 1 output pin of TIM2 (PA0). The tone's frequency is set
//! by the auto reload register and its volume by the duty cycle.
//!
//! TIM21 is the sequence timer. While a melody plays it interrupts at 64 Hz to step through it.
//!
//! Neither timer runs in STOP, so the MCU must only sleep while the buzzer is in use.

use crate::system::{System, CLK_FREQ};
use stm32l0::stm32l0x3::{GPIOA, TIM2, TIM21};

/// Sequence timer rate (Hz)
pub const SEQUENCE_HZ: usize = 64;

// TIM21 counts at 128 Hz and reloads every second count
const SEQUENCE_PRESCALER: u16 = (CLK_FREQ / (SEQUENCE_HZ * 2) - 1) as u16;

/// Calculate the value for the auto reload register from a frequency (Hz)
pub const fn arr_from_frequency(freq: usize) -> u16 {
    let arr = CLK_FREQ / freq;
    if arr < 2 {
        1
    } else {
        (arr - 1) as u16
    }
}

/// Calculate the value for the compare capture register from a duty cycle (%) and ARR value
/// ([`arr_from_frequency`])
pub const fn ccr_from_duty(duty: usize, arr: u16) -> u16 {
    ((duty * (arr as usize + 1)) / 100) as u16
}

pub struct Buzzer {
    tone: TIM2,
    sequence: TIM21,
}

impl Buzzer {
    pub fn configure(tone: TIM2, sequence: TIM21, sys: &mut System, gpio: &mut GPIOA) -> Buzzer {
        sys.enable_tim2_clk();
        sys.enable_tim21_clk();

        // Configure PA0 to use alternate function mode
        gpio.moder.modify(|_, w| w.mode0().alternate());

        // Set PA0 alternate function to TIM2_CH1 (AF2)
        gpio.afrl.modify(|_, w| w.afsel0().af2());

        // Enable PWM mode 1 for TIM2_CH1 with a preloaded compare register
        tone.ccmr1_output()
            .write(|w| w.oc1m().pwm_mode1().oc1pe().enabled());

        // Enable TIM2_CH1 output pin
        tone.ccer.write(|w| w.cc1e().enabled());

        // Count at the system clock
        tone.psc.write(|w| w.psc().bits(0));

        // Sequence timer
        //
        // * Prescale to 128 Hz and reload every other count
        // * Interrupt on update
        sequence
            .psc
            .write(|w| w.psc().bits(SEQUENCE_PRESCALER));
        sequence.arr.write(|w| w.arr().bits(1));
        sequence.dier.write(|w| w.uie().enabled());

        Self { tone, sequence }
    }

    /// Sound a tone of `frequency` Hz at `duty` % duty cycle
    pub fn play(&mut self, frequency: u16, duty: u8) {
        let arr = arr_from_frequency(frequency.max(1) as usize);

        // Safety: TIM2 is a 32 bit timer but the tones only need 16 bits
        self.tone.arr.write(|w| unsafe { w.bits(arr as u32) });
        self.tone
            .ccr1
            .write(|w| unsafe { w.bits(ccr_from_duty(duty as usize, arr) as u32) });

        // Load the new period straight away
        self.tone.egr.write(|w| w.ug().update());
        self.tone.cr1.modify(|_, w| w.cen().enabled());
    }

    /// Stop any tone
    pub fn silence(&mut self) {
        self.tone.cr1.modify(|_, w| w.cen().disabled());
        self.tone.ccr1.write(|w| unsafe { w.bits(0) });
    }

    pub fn start_sequence_timer(&mut self) {
        self.sequence.cnt.write(|w| unsafe { w.bits(0) });
        self.sequence.sr.modify(|_, w| w.uif().clear());
        self.sequence.cr1.modify(|_, w| w.cen().enabled());
    }

    pub fn stop_sequence_timer(&mut self) {
        self.sequence.cr1.modify(|_, w| w.cen().disabled());
        self.sequence.sr.modify(|_, w| w.uif().clear());
    }

    /// Clear the sequence timer interrupt. Returns whether it was pending.
    pub fn take_sequence_interrupt(&mut self) -> bool {
        let pending = self.sequence.sr.read().uif().is_update_pending();
        self.sequence.sr.modify(|_, w| w.uif().clear());
        pending
    }
}
