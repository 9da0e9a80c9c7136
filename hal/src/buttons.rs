//! # Buttons
//!
//! The three buttons pull their pins high when pressed. Each pin interrupts on both edges and
//! the handler reads the pin level to tell a press from a release.
//!
//! | Button | Pin | Interrupt  |
//! |--------|-----|------------|
//! | Light  | PA1 | `EXTI0_1`  |
//! | Alarm  | PA2 | `EXTI2_3`  |
//! | Mode   | PB9 | `EXTI4_15` |
//!
//! The Alarm button doubles as the external wake source: it stays enabled in low energy mode
//! and is the WKUP3 pin that ends standby.

use stm32l0::stm32l0x3::{EXTI, GPIOA, GPIOB, SYSCFG};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    Light,
    Alarm,
    Mode,
}

impl Line {
    pub const ALL: [Line; 3] = [Line::Light, Line::Alarm, Line::Mode];

    /// EXTI line, which is also the pin number
    const fn exti(self) -> u8 {
        match self {
            Line::Light => 1,
            Line::Alarm => 2,
            Line::Mode => 9,
        }
    }

    const fn mask(self) -> u32 {
        1 << self.exti()
    }
}

pub struct Buttons(EXTI);

impl Buttons {
    pub fn configure(
        exti: EXTI,
        syscfg: &mut SYSCFG,
        gpioa: &mut GPIOA,
        gpiob: &mut GPIOB,
    ) -> Self {
        // Configure button pins
        //
        // * Input mode
        // * Pull down
        gpioa
            .moder
            .modify(|_, w| w.mode1().input().mode2().input());
        gpioa
            .pupdr
            .modify(|_, w| w.pupd1().pull_down().pupd2().pull_down());
        gpiob.moder.modify(|_, w| w.mode9().input());
        gpiob.pupdr.modify(|_, w| w.pupd9().pull_down());

        // Route EXTI9 to port B, lines 1 and 2 stay on port A
        syscfg
            .exticr3
            .modify(|_, w| unsafe { w.exti9().bits(0b0001) });

        let all = Line::ALL.iter().fold(0, |mask, line| mask | line.mask());

        // Configure the EXTI lines
        //
        // * Trigger on both edges
        // * Unmask the interrupts
        exti.rtsr.modify(|r, w| unsafe { w.bits(r.bits() | all) });
        exti.ftsr.modify(|r, w| unsafe { w.bits(r.bits() | all) });
        exti.pr.write(|w| unsafe { w.bits(all) });
        exti.imr.modify(|r, w| unsafe { w.bits(r.bits() | all) });

        Self(exti)
    }

    /// Whether the button is held down
    pub fn is_pressed(&self, line: Line) -> bool {
        // Safety: read only access to the input data registers
        let idr = unsafe {
            match line {
                Line::Light | Line::Alarm => (*GPIOA::ptr()).idr.read().bits(),
                Line::Mode => (*GPIOB::ptr()).idr.read().bits(),
            }
        };

        idr & line.mask() != 0
    }

    /// Take the pending edge on `line`, returning the pin level if there was one
    pub fn take_edge(&mut self, line: Line) -> Option<bool> {
        if self.0.pr.read().bits() & line.mask() == 0 {
            return None;
        }

        // Write one to clear
        self.0.pr.write(|w| unsafe { w.bits(line.mask()) });
        Some(self.is_pressed(line))
    }

    /// Enable or disable the interrupts of every button but Alarm
    pub fn set_wake_only(&mut self, wake_only: bool) {
        let others = Line::Light.mask() | Line::Mode.mask();
        self.0.imr.modify(|r, w| unsafe {
            if wake_only {
                w.bits(r.bits() & !others)
            } else {
                w.bits(r.bits() | others)
            }
        });
    }
}
