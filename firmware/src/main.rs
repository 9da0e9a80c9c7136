#![no_main]
#![no_std]

use defmt_rtt as _; // global logger
use panic_probe as _; // panic handler

mod board;
mod faces;

/// State shared between the interrupt handlers and the runtime
static SHARED: movement::Shared = movement::Shared::new();

#[rtic::app(device = watch_hal::pac, peripherals = true)]
mod app {
    use cortex_m::peripheral::SCB;
    use movement::buzzer::Buzzer as _;
    use movement::{Button, Config, Face, Platform, Runtime};
    use rtic::Mutex;
    use watch_hal::buttons::Line;
    use watch_hal::{Adc, Buttons, Buzzer, Lcd, Led, Rtc, Storage, System};

    use crate::board::{Board, Piezo};
    use crate::faces::{ClockFace, ThermometerFace};
    use crate::SHARED;

    #[shared]
    struct Shared {
        rtc: Rtc,
        buttons: Buttons,
        buzzer: Buzzer,
    }

    #[local]
    struct Local {
        system: System,
        scb: SCB,
        lcd: Lcd,
        led: Led,
        adc: Adc,
        storage: Option<Storage>,
        resume: bool,
    }

    #[init]
    fn init(cx: init::Context) -> (Shared, Local) {
        defmt::info!("init");

        let mut dp = cx.device;
        let mut scb = cx.core.SCB;

        let mut system = System::configure(dp.RCC, dp.PWR, &mut scb);
        let resume = system.woke_from_standby();

        let rtc = Rtc::configure(dp.RTC, &mut system, &mut dp.EXTI);
        let buttons = Buttons::configure(dp.EXTI, &mut dp.SYSCFG, &mut dp.GPIOA, &mut dp.GPIOB);
        let buzzer = Buzzer::configure(dp.TIM2, dp.TIM21, &mut system, &mut dp.GPIOA);
        let lcd = Lcd::configure(
            dp.LCD,
            &mut system,
            &mut dp.SYSCFG,
            &mut dp.GPIOA,
            &mut dp.GPIOB,
        );
        let led = Led::configure(&mut dp.GPIOA);
        let adc = Adc::configure(dp.ADC, &mut system, &mut dp.SYSCFG);
        let storage = Storage::configure(dp.FLASH, &mut system);

        (
            Shared {
                rtc,
                buttons,
                buzzer,
            },
            Local {
                system,
                scb,
                lcd,
                led,
                adc,
                storage: Some(storage),
                resume,
            },
        )
    }

    #[idle(
        shared = [rtc, buttons, buzzer],
        local = [system, scb, lcd, led, adc, storage, resume]
    )]
    fn idle(cx: idle::Context) -> ! {
        defmt::info!("idle");

        let storage = defmt::unwrap!(cx.local.storage.take());
        let resume = *cx.local.resume;
        defmt::info!("battery: {} mV", cx.local.adc.measure().voltage());

        let board = Board::new(
            cx.shared.rtc,
            cx.shared.buttons,
            cx.shared.buzzer,
            cx.local.lcd,
            cx.local.led,
            cx.local.adc,
            cx.local.system,
            cx.local.scb,
        );

        run(board, storage, resume)
    }

    /// The main loop
    fn run<R, B, Z>(board: Board<R, B, Z>, storage: Storage, resume: bool) -> !
    where
        R: Mutex<T = Rtc>,
        B: Mutex<T = Buttons>,
        Z: Mutex<T = Buzzer>,
    {
        let mut clock = ClockFace::default();
        let mut thermometer = ThermometerFace;
        let faces: [&mut dyn Face<Board<R, B, Z>>; 2] = [&mut clock, &mut thermometer];

        let mut runtime = match resume {
            true => Runtime::resume(board, storage, &SHARED, Config::DEFAULT, faces),
            false => Runtime::new(board, storage, &SHARED, Config::DEFAULT, faces),
        };

        loop {
            if runtime.run_once() {
                runtime.movement_mut().platform_mut().wait_for_interrupt();
            }
        }
    }

    #[task(binds = RTC, shared = [rtc])]
    fn rtc_interrupt(mut cx: rtc_interrupt::Context) {
        cx.shared.rtc.lock(|rtc| {
            let flags = rtc.take_flags();
            let now = rtc.counter();

            if flags.tick {
                SHARED.tick(now);
            }
            if flags.compare {
                rtc.arm(SHARED.compare_fired(now));
            }
        });
    }

    /// Handle an edge on a button line
    fn button_edge(
        rtc: &mut impl Mutex<T = Rtc>,
        buttons: &mut impl Mutex<T = Buttons>,
        line: Line,
    ) {
        let Some(pressed) = buttons.lock(|buttons| buttons.take_edge(line)) else {
            return;
        };

        let button = match line {
            Line::Light => Button::Light,
            Line::Alarm => Button::Alarm,
            Line::Mode => Button::Mode,
        };

        // Alarm is the only line left enabled in low energy mode
        if button == Button::Alarm && SHARED.is_sleeping() {
            if pressed {
                SHARED.extwake();
            }
            return;
        }

        rtc.lock(|rtc| {
            let now = rtc.counter();
            rtc.arm(SHARED.button_edge(button, pressed, now));
        });
    }

    #[task(binds = EXTI0_1, shared = [rtc, buttons])]
    fn light_button(mut cx: light_button::Context) {
        button_edge(&mut cx.shared.rtc, &mut cx.shared.buttons, Line::Light);
    }

    #[task(binds = EXTI2_3, shared = [rtc, buttons])]
    fn alarm_button(mut cx: alarm_button::Context) {
        button_edge(&mut cx.shared.rtc, &mut cx.shared.buttons, Line::Alarm);
    }

    #[task(binds = EXTI4_15, shared = [rtc, buttons])]
    fn mode_button(mut cx: mode_button::Context) {
        button_edge(&mut cx.shared.rtc, &mut cx.shared.buttons, Line::Mode);
    }

    #[task(binds = TIM21, shared = [buzzer])]
    fn sequence_timer(mut cx: sequence_timer::Context) {
        cx.shared.buzzer.lock(|buzzer| {
            if buzzer.take_sequence_interrupt() {
                Piezo(buzzer).apply(SHARED.sequencer_step());
            }
        });
    }
}
