//! # Liquid crystal display
//!
//! https://www.sensorwatch.net/docs/wig/display/
//!
//! The display is six seven segment digits on three common lines. [`Segments`] holds one bit per
//! segment, laid out the way the LCD RAM is, so a whole frame is written in one go.

use crate::system::System;
use stm32l0::stm32l0x3::{GPIOA, GPIOB, LCD, SYSCFG};

/// The segments are stored in a 96 bit integer, 32 bits for each common line
///
/// # Memory map
///
/// ```txt
///       ----------
/// 0x60 | u32 COM2 |
///      | u32 COM1 |
/// 0x00 | u32 COM0 |
///       ----------
/// ```
pub type Segments = u128;

/// Turn off all segments
pub const BLANK: Segments = 0;

/// Number of digits on the display
pub const DIGITS: usize = 6;

/// Convert an LCD segment pin number to an MCU LCD segment number
const fn lcd_to_mcu(seg: usize) -> usize {
    match seg {
        0 => 16,
        1 => 9,
        2 => 8,
        3 => 7,
        4 => 17,
        5 => 2,
        6 => 15,
        7 => 14,
        13 => 13,
        17 => 12,
        18 => 11,
        19 => 10,
        20 => 6,
        21 => 5,
        22 => 4,
        23 => 3,
        _ => panic!("Invalid segment number"),
    }
}

/// Create a segment from an LCD common and segment line
const fn build_segment(com: usize, seg: usize) -> Segments {
    1 << (lcd_to_mcu(seg) + (com * 32))
}

/// Segments A to G of each digit, numbered left (hours) to right (seconds)
///
/// Digit 0 has A and D wired together.
const DIGIT_SEGMENTS: [[Segments; 7]; DIGITS] = [
    [
        build_segment(1, 5),
        build_segment(0, 4),
        build_segment(2, 4),
        build_segment(1, 5),
        build_segment(2, 5),
        build_segment(0, 5),
        build_segment(1, 4),
    ],
    [
        build_segment(0, 3),
        build_segment(0, 2),
        build_segment(1, 2),
        build_segment(2, 2),
        build_segment(2, 3),
        build_segment(1, 6),
        build_segment(1, 3),
    ],
    [
        build_segment(2, 1),
        build_segment(0, 0),
        build_segment(2, 0),
        build_segment(2, 1),
        build_segment(1, 1),
        build_segment(0, 1),
        build_segment(1, 0),
    ],
    [
        build_segment(0, 22),
        build_segment(0, 13),
        build_segment(2, 22),
        build_segment(2, 23),
        build_segment(1, 23),
        build_segment(0, 23),
        build_segment(1, 22),
    ],
    [
        build_segment(0, 21),
        build_segment(0, 20),
        build_segment(2, 19),
        build_segment(2, 20),
        build_segment(2, 21),
        build_segment(1, 21),
        build_segment(1, 20),
    ],
    [
        build_segment(0, 19),
        build_segment(0, 18),
        build_segment(1, 17),
        build_segment(2, 17),
        build_segment(2, 18),
        build_segment(1, 19),
        build_segment(1, 18),
    ],
];

/// Lit segments of each glyph, bit 0 being segment A
const GLYPHS: [u8; 10] = [
    0b011_1111, // 0
    0b000_0110, // 1
    0b101_1011, // 2
    0b100_1111, // 3
    0b110_0110, // 4
    0b110_1101, // 5
    0b111_1101, // 6
    0b000_0111, // 7
    0b111_1111, // 8
    0b110_1111, // 9
];

/// Glyph for a minus sign
const MINUS: u8 = 0b100_0000;

const fn glyph(position: usize, pattern: u8) -> Segments {
    let mut segments = BLANK;
    let mut i = 0;
    while i < 7 {
        if pattern & (1 << i) != 0 {
            segments |= DIGIT_SEGMENTS[position][i];
        }
        i += 1;
    }

    segments
}

/// The segments showing `value` (0 to 9) at `position`. Blank for anything else.
pub const fn digit(position: usize, value: u8) -> Segments {
    if position >= DIGITS || value > 9 {
        return BLANK;
    }

    glyph(position, GLYPHS[value as usize])
}

/// A minus sign at `position`
pub const fn minus(position: usize) -> Segments {
    if position >= DIGITS {
        return BLANK;
    }

    glyph(position, MINUS)
}

/// Two digit number at `position` and the digit after it. Values over 99 are truncated.
pub const fn pair(position: usize, value: u8) -> Segments {
    let value = value % 100;
    digit(position, value / 10) | digit(position + 1, value % 10)
}

/// Liquid crystal display
pub struct Lcd(LCD);

impl Lcd {
    pub fn configure(
        lcd: LCD,
        sys: &mut System,
        syscfg: &mut SYSCFG,
        gpioa: &mut GPIOA,
        gpiob: &mut GPIOB,
    ) -> Self {
        sys.enable_lcd_clk();

        // Configure comm pins
        gpioa
            .afrh
            .modify(|_, w| w.afsel8().af1().afsel9().af1().afsel10().af1());

        // Configure segment pins
        gpioa
            .afrl
            .modify(|_, w| w.afsel3().af1().afsel6().af1().afsel7().af1());

        gpioa.afrh.modify(|_, w| w.afsel15().af1());

        gpiob.afrl.modify(|_, w| {
            w.afsel0()
                .af1()
                .afsel1()
                .af1()
                .afsel3()
                .af1()
                .afsel4()
                .af1()
                .afsel5()
                .af1()
        });

        gpiob.afrh.modify(|_, w| {
            w.afsel8()
                .af1()
                .afsel10()
                .af1()
                .afsel11()
                .af1()
                .afsel12()
                .af1()
                .afsel13()
                .af1()
                .afsel14()
                .af1()
                .afsel15()
                .af1()
        });

        // Enable VLCD2 decouple capacitor on PB2
        syscfg
            .cfgr2
            .modify(|r, w| unsafe { w.bits((r.bits() & !(0x1F << 1)) | (1 << 1)) });

        // Configure the LCD frame control register
        //
        // * Set the frame rate to 31.03 Hz
        // * Set the LCD voltage to 3.12v
        // * Set pulse duration to 1/clk_pos FIXME: probably needs changing
        //
        // TODO: Figure out the best VLCD voltage for contrast
        lcd.fcr
            .write(|w| unsafe { w.ps().bits(4).div().bits(6).cc().bits(4).pon().bits(1) });

        // Configure the LCD control register
        //
        // * Set bias to 1/2
        // * Set duty to 1/3
        // * Use internal voltage source
        // * Enable LCD module
        lcd.cr.write(|w| unsafe {
            w.bias()
                .bits(0b001)
                .duty()
                .bits(0b010)
                .vsel()
                .clear_bit()
                .lcden()
                .set_bit()
        });

        Self(lcd)
    }

    /// Write segments to the LCD
    pub fn write(&mut self, seg: Segments) {
        const MASK: u128 = u32::MAX as u128;

        // The previous frame has to be shown before the RAM can be written again
        while self.0.sr.read().udr().bit_is_set() {}

        // This is safe assuming that Segments has been correctly created
        unsafe {
            self.0.ram_com0.as_ptr().write((seg & MASK) as u32);
            self.0.ram_com1.as_ptr().write((seg >> 32 & MASK) as u32);
            self.0.ram_com2.as_ptr().write((seg >> 64 & MASK) as u32);
        }

        // Trigger a display update
        self.0.sr.modify(|_, w| w.udr().set_bit());
    }

    /// Turn off all segments
    pub fn clear(&mut self) {
        self.write(BLANK);
    }
}
