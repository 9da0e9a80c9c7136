use cortex_m::peripheral::SCB;
use stm32l0::stm32l0x3::{PWR, RCC};

/// The system clock frequency (Hz)
pub const CLK_FREQ: usize = 65536;

/// # System management
///
/// The general clock and power configuration is such that to provide ultra low power operation
///
/// * The system clock (MSI) is set to range 0 (~65.536 kHz)
/// * The voltage regulator is set to range 3 (1.2v)
///
/// Note that the LPRUN mode isn't used as it would require a full reset after each wakeup from
/// stop. As the device is designed to constantly be entering and exiting stop mode, using
/// LPRUN isn't feasible.
///
/// ## Standby
///
/// [`System::standby()`] is the watch's backup mode. Only the RTC and its backup registers keep
/// running; the Alarm button (WKUP3) or an RTC alarm resets the MCU, after which
/// [`System::woke_from_standby()`] reports where it came from.
pub struct System {
    rcc: RCC,
    pwr: PWR,
}

impl System {
    pub fn configure(rcc: RCC, pwr: PWR, scb: &mut SCB) -> Self {
        // Enter stop mode on WFI
        scb.set_sleepdeep();

        // Set the MSI clock to 65.536 kHz
        rcc.icscr.write(|w| w.msirange().range0());

        // Enable PWR clock
        rcc.apb1enr.modify(|_, w| w.pwren().enabled());

        // Configure PWR control register
        //
        // * Enable voltage regulator range 3 (1.2V)
        // * Switch the regulator into low power mode when sleep or deep sleep is entered
        // * Enter stop mode on deepsleep
        // * Enable RTC write access
        // * Switch off VREFINT in stop mode
        pwr.cr.write(|w| {
            w.vos()
                .v1_2()
                .lpsdsr()
                .low_power_mode()
                .pdds()
                .stop_mode()
                .dbp()
                .enabled()
                .ulp()
                .enabled()
        });

        // Enable SYSCFG clock
        rcc.apb2enr.modify(|_, w| w.syscfgen().enabled());

        // Enable GPIO port clocks
        rcc.iopenr
            .write(|w| w.iopaen().enabled().iopben().enabled().iopcen().enabled());

        // The RTC clock source can only be chosen once per backup domain reset
        if rcc.csr.read().rtcen().is_disabled() {
            // Configure the Control/Status register
            //
            // * Set the RTC/LCD to use the LSE
            // * Set LSE to medium-high drive capability
            rcc.csr
                .modify(|_, w| w.rtcsel().lse().lsedrv().medium_high());
        }

        // Turn on the LSE
        rcc.csr.modify(|_, w| w.lseon().on());

        // Wait for the LSE to stabilise
        while rcc.csr.read().lserdy().is_not_ready() {}

        Self { rcc, pwr }
    }

    /// Whether this boot is a wake from standby. Clears the flag.
    pub fn woke_from_standby(&mut self) -> bool {
        let standby = self.pwr.csr.read().sbf().bit_is_set();
        if standby {
            self.pwr.cr.modify(|_, w| w.csbf().set_bit());
        }

        standby
    }

    /// Enter standby mode. Doesn't return, waking up resets the MCU.
    pub fn standby(&mut self, scb: &mut SCB) -> ! {
        // Wake on a rising edge of WKUP3 (PA2, the Alarm button)
        self.pwr.csr.modify(|_, w| w.ewup3().set_bit());

        // Enter standby on deepsleep and clear any stale wakeup flag
        self.pwr
            .cr
            .modify(|_, w| w.pdds().standby_mode().cwuf().set_bit());
        scb.set_sleepdeep();

        loop {
            cortex_m::asm::dsb();
            cortex_m::asm::wfi();
        }
    }

    /// Clear the wakeup flag before the next STOP
    pub fn clear_wakeup_flag(&mut self) {
        self.pwr.cr.modify(|_, w| w.cwuf().set_bit());
    }

    /// Enable the ADC peripheral clock (PCLK)
    pub(crate) fn enable_adc_clk(&mut self) {
        self.rcc.apb2enr.modify(|_, w| w.adcen().enabled());

        // Disable ADC clock during sleep
        self.rcc.apb2smenr.modify(|_, w| w.adcsmen().disabled());
    }

    /// Enable the RTC
    pub(crate) fn enable_rtc(&mut self) {
        self.rcc.csr.modify(|_, w| w.rtcen().enabled());
    }

    /// Enable LCD perihpheral clock
    pub(crate) fn enable_lcd_clk(&mut self) {
        self.rcc
            .apb1enr
            .modify(|r, w| unsafe { w.bits(r.bits() | 1 << 9) });

        // Enable LCD clock during sleep
        self.rcc
            .apb1smenr
            .modify(|r, w| unsafe { w.bits(r.bits() | 1 << 9) });
    }

    /// Enable TIM2 peripheral clock
    pub(crate) fn enable_tim2_clk(&mut self) {
        self.rcc.apb1enr.modify(|_, w| w.tim2en().enabled());

        // Keep TIM2 running in sleep, it is only stopped by STOP
        self.rcc.apb1smenr.modify(|_, w| w.tim2smen().enabled());
    }

    /// Enable TIM21 peripheral clock
    pub(crate) fn enable_tim21_clk(&mut self) {
        self.rcc.apb2enr.modify(|_, w| w.tim21en().enabled());
        self.rcc.apb2smenr.modify(|_, w| w.tim21smen().enabled());
    }

    /// Enable the flash interface clock during sleep so the storage stays readable
    pub(crate) fn enable_flash_clk(&mut self) {
        self.rcc.ahbsmenr.modify(|_, w| w.mifsmen().enabled());
    }
}
