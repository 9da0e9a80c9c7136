//! # Real time clock (RTC)
//!
//! The real time clock uses the low frequency external oscillator in order to measure wall time.
//!
//! The watch doesn't use the calendar as a calendar. It is never set, and only serves as a free
//! running counter: the seconds since the calendar's epoch (2000-01-01) times 128, plus the
//! sub-second count. That counter wraps after about 388 days, which the runtime folds into its
//! clock reference.
//!
//! ## Prescalers
//!
//! ```txt
//! LSE (32.768 kHz) -> PREDIV_A (/128) -> ck_apre (256 Hz) -> PREDIV_S (/256) -> ck_spre (1 Hz)
//! ```
//!
//! The sub-second register counts down at 256 Hz, so a counter tick is two of its steps.
//!
//! ## Compare
//!
//! Alarm A is the compare register. Arming it converts the counter target back into a day of the
//! month, a time and a sub-second value, all of which have to match. A target that has already
//! passed pends the RTC interrupt in software.
//!
//! ## Wake up timer
//!
//! The wake up timer is the periodic tick, clocked at RTCCLK / 2 so every power of two from 1 to
//! 128 Hz divides it evenly.
//!
//! ## Backup registers
//!
//! The RTC contains five registers which retain their contents as long as the RTC is powered;
//! meaning that they survive a reset and standby.

use cortex_m::peripheral::NVIC;
use stm32l0::stm32l0x3::{Interrupt, EXTI, RTC};

use crate::system::System;

/// Counter ticks per second
pub const COUNTER_HZ: u32 = 128;

/// Number of backup registers
pub const BACKUP_REGISTERS: u8 = 5;

const PREDIV_A: u8 = 127;
const PREDIV_S: u16 = 255;

/// Wake up timer clock (Hz)
const WAKEUP_HZ: u32 = 32768 / 2;

const SECONDS_PER_DAY: u64 = 86_400;

/// EXTI lines of the RTC interrupts
const EXTI_ALARM: u8 = 17;
const EXTI_WAKEUP: u8 = 20;

/// The interrupt flags taken by [`Rtc::take_flags()`]
#[derive(Debug, Clone, Copy, Default)]
pub struct Flags {
    /// Alarm A matched, or a target was armed in the past
    pub compare: bool,
    /// The wake up timer elapsed
    pub tick: bool,
}

/// # RTC
///
/// The RTC has two states, `run` mode and `initialisation` mode.
///
/// - In initialisation mode the RTC is stopped; the prescalers are writeable.
/// - In run mode the RTC measures time.
///
/// The prescalers are only written on the first boot after a backup domain reset, so the
/// counter keeps counting across resets and standby.
///
/// See [`crate::rtc`] for more information.
pub struct Rtc {
    rtc: RTC,
    /// Compare target armed in the past, to be reported by the next [`Rtc::take_flags()`]
    overdue: bool,
}

impl Rtc {
    /// Configure the RTC
    pub fn configure(rtc: RTC, sys: &mut System, exti: &mut EXTI) -> Rtc {
        sys.enable_rtc();

        // Unlock RTC registers
        rtc.wpr.write(|w| unsafe { w.key().bits(0xCA) });
        rtc.wpr.write(|w| unsafe { w.key().bits(0x53) });

        if rtc.isr.read().inits().bit_is_clear() {
            // Enter initialisation mode
            rtc.isr.modify(|_, w| w.init().init_mode());
            while rtc.isr.read().initf().is_not_allowed() {}

            // Both prescalers have to be written, synchronous first
            rtc.prer.write(|w| unsafe { w.prediv_s().bits(PREDIV_S) });
            rtc.prer
                .modify(|_, w| unsafe { w.prediv_a().bits(PREDIV_A) });

            // Return to run mode
            rtc.isr.modify(|_, w| w.init().free_running_mode());
            while rtc.isr.read().initf().is_allowed() {}
        }

        // Configure the RTC control register
        //
        // * Bypass the shadow registers. This is required due to the low APB1 clock speed
        // * Set the wakeup clock to RTCCLK / 2
        // * Disable alarm A and the wakeup timer until they are armed
        rtc.cr.write(|w| w.bypshad().bypass_shadow_reg().wucksel().div2());

        // Configure the RTC EXTI lines
        //
        // * Enable rising edge trigger
        // * Unmask the interrupt
        exti.rtsr.modify(|r, w| unsafe {
            w.bits(r.bits() | 1 << EXTI_ALARM | 1 << EXTI_WAKEUP)
        });
        exti.imr.modify(|r, w| unsafe {
            w.bits(r.bits() | 1 << EXTI_ALARM | 1 << EXTI_WAKEUP)
        });

        Self {
            rtc,
            overdue: false,
        }
    }

    /// A read only handle to the counter and the backup registers
    pub fn reader(&self) -> Reader {
        Reader(())
    }

    /// The free running counter
    pub fn counter(&self) -> u32 {
        self.reader().counter()
    }

    /// Arm alarm A at the counter value `target`, or disable it
    pub fn arm(&mut self, target: Option<u32>) {
        // Alarm A can only be written while disabled
        self.rtc
            .cr
            .modify(|_, w| w.alrae().clear_bit().alraie().clear_bit());
        while self.rtc.isr.read().alrawf().bit_is_clear() {}
        self.rtc.isr.modify(|_, w| w.alraf().clear_bit());

        let Some(target) = target else {
            self.overdue = false;
            return;
        };

        let now = self.reader().ticks();
        let ahead = target.wrapping_sub(now as u32) as i32;
        if ahead <= 0 {
            self.overdue = true;
            NVIC::pend(Interrupt::RTC);
            return;
        }

        let at = now + ahead as u64;
        let seconds = at / COUNTER_HZ as u64;
        let subsecond = (at % COUNTER_HZ as u64) as u16;
        let (_, _, day) = civil_from_days((seconds / SECONDS_PER_DAY) as u32);
        let time = (seconds % SECONDS_PER_DAY) as u32;
        let (hour, minute, second) = (time / 3600, time / 60 % 60, time % 60);

        // Match the date, hours, minutes and seconds
        self.rtc.alrmar.write(|w| unsafe {
            w.msk4()
                .clear_bit()
                .wdsel()
                .clear_bit()
                .dt()
                .bits((day / 10) as u8)
                .du()
                .bits((day % 10) as u8)
                .msk3()
                .clear_bit()
                .ht()
                .bits(hour as u8 / 10)
                .hu()
                .bits(hour as u8 % 10)
                .msk2()
                .clear_bit()
                .mnt()
                .bits(minute as u8 / 10)
                .mnu()
                .bits(minute as u8 % 10)
                .msk1()
                .clear_bit()
                .st()
                .bits(second as u8 / 10)
                .su()
                .bits(second as u8 % 10)
        });

        // Match all eight bits of the sub-second count
        self.rtc.alrmassr.write(|w| unsafe {
            w.maskss()
                .bits(8)
                .ss()
                .bits(PREDIV_S - subsecond * (PREDIV_S + 1) / COUNTER_HZ as u16)
        });

        self.overdue = false;
        self.rtc
            .cr
            .modify(|_, w| w.alrae().set_bit().alraie().set_bit());
    }

    /// Start the wake up timer at `frequency` Hz, or stop it
    pub fn set_tick_frequency(&mut self, frequency: Option<u8>) {
        self.rtc
            .cr
            .modify(|_, w| w.wute().clear_bit().wutie().clear_bit());

        let Some(frequency) = frequency.filter(|&f| f > 0) else {
            return;
        };

        while self.rtc.isr.read().wutwf().bit_is_clear() {}

        let reload = WAKEUP_HZ / frequency as u32 - 1;
        self.rtc.wutr.write(|w| unsafe { w.wut().bits(reload as u16) });
        self.rtc.isr.modify(|_, w| w.wutf().clear_bit());
        self.rtc
            .cr
            .modify(|_, w| w.wute().set_bit().wutie().set_bit());
    }

    /// Take and clear the interrupt flags. Called from the RTC interrupt handler.
    pub fn take_flags(&mut self) -> Flags {
        let isr = self.rtc.isr.read();
        let flags = Flags {
            compare: isr.alraf().bit_is_set() || core::mem::take(&mut self.overdue),
            tick: isr.wutf().bit_is_set(),
        };

        self.rtc
            .isr
            .modify(|_, w| w.alraf().clear_bit().wutf().clear_bit());

        // The EXTI pending bits have to be cleared as well
        // SAFETY: write one to clear, only touching the RTC lines
        unsafe {
            (*EXTI::ptr())
                .pr
                .write(|w| w.bits(1 << EXTI_ALARM | 1 << EXTI_WAKEUP));
        }

        flags
    }

    /// Write a backup register. Out of range indices are ignored.
    pub fn write_backup(&mut self, index: u8, value: u32) {
        if index < BACKUP_REGISTERS {
            self.rtc.bkpr[index as usize].write(|w| unsafe { w.bkp().bits(value) });
        }
    }
}

/// Read only access to the RTC
///
/// Reading the counter and the backup registers has no side effects, so the handle can be used
/// from anywhere while [`Rtc`] itself is locked by its owner.
#[derive(Debug, Clone, Copy)]
pub struct Reader(());

impl Reader {
    fn rtc(&self) -> &'static stm32l0::stm32l0x3::rtc::RegisterBlock {
        // SAFETY: only used for reads, and a `Reader` only exists once `Rtc` is configured
        unsafe { &*RTC::ptr() }
    }

    /// Counter ticks since the calendar's epoch
    fn ticks(&self) -> u64 {
        let rtc = self.rtc();

        // With the shadow registers bypassed a second can roll over mid read. The sub-second
        // count reloads when it does, so read until it hasn't gone up.
        loop {
            let before = rtc.ssr.read().ss().bits();
            let tr = rtc.tr.read();
            let dr = rtc.dr.read();
            let after = rtc.ssr.read().ss().bits();

            if after > before {
                continue;
            }

            let year = 2000 + dr.yt().bits() as u32 * 10 + dr.yu().bits() as u32;
            let month = dr.mt().bit() as u32 * 10 + dr.mu().bits() as u32;
            let day = dr.dt().bits() as u32 * 10 + dr.du().bits() as u32;
            let days = days_from_civil(year, month, day) as u64;

            let hour = tr.ht().bits() as u64 * 10 + tr.hu().bits() as u64;
            let minute = tr.mnt().bits() as u64 * 10 + tr.mnu().bits() as u64;
            let second = tr.st().bits() as u64 * 10 + tr.su().bits() as u64;
            let seconds = days * SECONDS_PER_DAY + hour * 3600 + minute * 60 + second;

            let elapsed = (PREDIV_S - after.min(PREDIV_S)) as u64;
            let subsecond = elapsed * COUNTER_HZ as u64 / (PREDIV_S as u64 + 1);
            return seconds * COUNTER_HZ as u64 + subsecond;
        }
    }

    /// The free running counter
    pub fn counter(&self) -> u32 {
        self.ticks() as u32
    }

    /// Read a backup register, 0 if out of range
    pub fn backup(&self, index: u8) -> u32 {
        if index < BACKUP_REGISTERS {
            self.rtc().bkpr[index as usize].read().bkp().bits()
        } else {
            0
        }
    }
}

/// Days since 2000-01-01
const fn days_from_civil(year: u32, month: u32, day: u32) -> u32 {
    const CUMULATIVE: [u32; 12] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334];

    let years = year.saturating_sub(2000);
    let month = if month >= 1 && month <= 12 { month } else { 1 };
    let leap = year % 4 == 0 && (year % 100 != 0 || year % 400 == 0);

    // Leap days in the years before this one, 2000 being one of them
    let leap_days = match years {
        0 => 0,
        n => (n - 1) / 4 + 1 - (n - 1) / 100 + (n - 1) / 400,
    };
    let leap_day = (leap && month > 2) as u32;

    years * 365 + leap_days + CUMULATIVE[month as usize - 1] + leap_day + day.saturating_sub(1)
}

/// Year, month and day of the month, `days` after 2000-01-01
fn civil_from_days(mut days: u32) -> (u32, u32, u32) {
    let mut year = 2000;
    loop {
        let leap = year % 4 == 0 && (year % 100 != 0 || year % 400 == 0);
        let length = if leap { 366 } else { 365 };
        if days < length {
            break;
        }
        days -= length;
        year += 1;
    }

    let leap = year % 4 == 0 && (year % 100 != 0 || year % 400 == 0);
    let months = [31, if leap { 29 } else { 28 }, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

    let mut month = 1;
    for length in months {
        if days < length {
            break;
        }
        days -= length;
        month += 1;
    }

    (year, month, days + 1)
}
