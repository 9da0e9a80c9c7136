//! # LED
//!
//! The backlight LEDs sit on PA4 (red) and PA5 (green) and are switched on or off, with no
//! dimming.

use stm32l0::stm32l0x3::GPIOA;

const RED: u32 = 4;
const GREEN: u32 = 5;

/// Set or reset bit of `pin` in BSRR
const fn bsrr(pin: u32, on: bool) -> u32 {
    if on {
        1 << pin
    } else {
        1 << (pin + 16)
    }
}

pub struct Led(());

impl Led {
    pub fn configure(gpio: &mut GPIOA) -> Self {
        // Push pull outputs, off
        gpio.bsrr
            .write(|w| unsafe { w.bits(bsrr(RED, false) | bsrr(GREEN, false)) });
        gpio.moder
            .modify(|_, w| w.mode4().output().mode5().output());

        Self(())
    }

    /// Switch each LED
    pub fn set(&mut self, red: bool, green: bool) {
        // Safety: BSRR writes are atomic and only touch the LED pins
        unsafe {
            (*GPIOA::ptr())
                .bsrr
                .write(|w| w.bits(bsrr(RED, red) | bsrr(GREEN, green)));
        }
    }

    pub fn off(&mut self) {
        self.set(false, false);
    }
}
