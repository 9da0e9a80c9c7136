//! # Analogue to digital converter (ADC)
//!
//! In the watch, the ADC is used for reading the temperature as well as reading
//! the battery cell voltage.
//!
//! ## Calibrating
//!
//! The ADC needs to be recalibrated when an environmental change occurs. The
//! biggest factor is the battery voltage however temperature can also affect
//! it's readings. It's recommended to run the [`calibrate()`](Adc::calibrate)
//! method on a regular bases to ensure the ADC stays accurate.
//!
//! The calibration factor is lost whenever the ADC is disabled, so it is kept
//! in [`Adc`] and written back before each conversion sequence.
//!
//! ## Sample time
//!
//! With a system clock of 65.536 kHz, an ADC clock prescaler of /2 and sample
//! duration of 1.5 clock cycles, this equates to a sample time of is approx
//! 46μs. The prescaler is there to ensure that the ADC can get a 50% duty
//! cycle, square wave clock signal.
//!
//! The minimum sample time for the temperature sensor and VREFINT voltage is
//! 10μs.

use crate::system::System;
use stm32l0::stm32l0x3::{ADC, SYSCFG};

/// Supply voltage the factory calibration values were taken at (mV)
const CAL_VDDA: u32 = 3000;

const TS_CAL1_TEMP: f32 = 30.0; // °C
const TS_CAL2_TEMP: f32 = 130.0; // °C

/// Factory calibration values in system memory
const VREFINT_CAL: *const u16 = 0x1FF8_0078 as *const u16;
const TS_CAL1: *const u16 = 0x1FF8_007A as *const u16;
const TS_CAL2: *const u16 = 0x1FF8_007E as *const u16;

fn factory(address: *const u16) -> u16 {
    // Safety: the calibration values are in read only system memory on every stm32l0x3
    unsafe { address.read_volatile() }
}

/// The results of an ADC measurement
#[derive(Debug, Clone, Copy)]
pub struct AdcMeasurement {
    vrefint: u16,
    tsense: u16,
}

impl AdcMeasurement {
    /// Get the battery voltage in millivolts
    pub fn voltage(&self) -> u16 {
        (CAL_VDDA * factory(VREFINT_CAL) as u32 / self.vrefint.max(1) as u32) as u16
    }

    /// Get the temperature in degrees celsius
    pub fn temperature(&self) -> f32 {
        let ts_cal1 = factory(TS_CAL1) as f32;
        let ts_cal2 = factory(TS_CAL2) as f32;

        // Scale the reading to the 3V supply the calibration was taken at
        let tsense =
            self.tsense as f32 * factory(VREFINT_CAL) as f32 / self.vrefint.max(1) as f32;

        (TS_CAL2_TEMP - TS_CAL1_TEMP) / (ts_cal2 - ts_cal1) * (tsense - ts_cal1) + TS_CAL1_TEMP
    }
}

/// # ADC
///
/// See [`crate::adc`] for a more information.
pub struct Adc {
    adc: ADC,
    calibration: u8,
}

impl Adc {
    /// Configure and calibrate the ADC
    pub fn configure(adc: ADC, sys: &mut System, syscfg: &mut SYSCFG) -> Self {
        sys.enable_adc_clk();

        // Use PCLK/2 as the ADC clock
        adc.cfgr2.write(|w| w.ckmode().pclk_div2());

        // Enable low frequency mode as PCLK is <3.5 MHz
        adc.ccr.write(|w| w.lfmen().enabled());

        // Configure SYSCFG reference control and status register
        //
        // * Enable temperature sensor reference
        // * Enable VREFINT reference
        syscfg
            .cfgr3
            .modify(|_, w| w.enbuf_sensor_adc().enabled().enbuf_vrefint_adc().enabled());

        // Configure ADC channel selection register
        //
        // * Select VREFINT (channel 17)
        // * Select temperature sensor (channel 18)
        adc.chselr
            .write(|w| w.chsel17().selected().chsel18().selected());

        let mut adc = Self {
            adc,
            calibration: 0,
        };
        adc.calibrate();
        adc
    }

    /// Calibrate the ADC. The ADC must be disabled.
    pub fn calibrate(&mut self) {
        self.adc.cr.modify(|_, w| w.adcal().start_calibration());

        while self.adc.isr.read().eocal().is_not_complete() {}
        self.adc.isr.modify(|_, w| w.eocal().clear());

        self.calibration = self.adc.calfact.read().calfact().bits();

        // Ensure ADCAL = 0 before continuing
        while self.adc.cr.read().adcal().is_calibrating() {}
    }

    /// Read the next adc conversion
    fn read(&self) -> u16 {
        // Wait for the conversion to finish
        while self.adc.isr.read().eoc().is_not_complete() {}

        // Reading ADC_DR clears the conversion finished status bit
        self.adc.dr.read().data().bits()
    }

    /// Power up the ADC, measure VREFINT and the temperature sensor and power it back down
    pub fn measure(&mut self) -> AdcMeasurement {
        // Configure ADC common configuration register
        //
        // * Enable vrefint
        // * Enable temperature sensor
        self.adc
            .ccr
            .modify(|_, w| w.vrefen().enabled().tsen().enabled());

        // Both VREFINT and TSEN have a maximum start time of 10us. As the sysclk is at 65.536 kHz,
        // each clock cycle is ~15us. Therefore by the time the ADC is ready,
        // they will be stabilized.

        // Enable ADC
        self.adc.cr.modify(|_, w| w.aden().enabled());

        // Wait for the ADC to power up
        while self.adc.isr.read().adrdy().is_not_ready() {}
        self.adc.isr.modify(|_, w| w.adrdy().clear());

        // Apply the stored calibration
        self.adc
            .calfact
            .write(|w| w.calfact().bits(self.calibration));

        // First measurement is vrefint, followed immediately by the temperature
        // sensor
        let (vrefint, tsense) = cortex_m::interrupt::free(|_| {
            // Start conversion sequence
            self.adc.cr.modify(|_, w| w.adstart().start_conversion());

            (self.read(), self.read())
        });

        // Ensure ADSTART = 0 before continuing
        while self.adc.cr.read().adstart().is_active() {}

        // Configure ADC common configuration register
        //
        // * Disable vrefint
        // * Disable temperature sensor
        self.adc
            .ccr
            .modify(|_, w| w.vrefen().disabled().tsen().disabled());

        // Disable ADC
        self.adc.cr.modify(|_, w| w.addis().disable());

        AdcMeasurement { vrefint, tsense }
    }
}
