use core::cell::RefCell;

use embedded_hal::digital::v2::OutputPin;
use fugit::ExtU32;
use fugit::MicrosDurationU32;
use rp_pico::hal;

use cortex_m::interrupt::Mutex;
use hal::gpio::Pin;
use hal::gpio::PushPullOutput;
use hal::timer::Alarm;
use hal::timer::Alarm1;
use pac::interrupt;
use rp_pico::pac;

/// Playback status LED, separate from the on-board LED used for fatal codes.
pub type StatusLedPin = Pin<rp_pico::hal::gpio::pin::bank0::Gpio15, PushPullOutput>;

/// Playback events the status LED can show.
#[derive(Clone, Copy)]
pub enum Signal {
    /// One long flash while a stream starts.
    Start,
    /// Two short flashes: a slot was not refilled in time.
    Underrun,
}

#[derive(Clone, Copy)]
enum Step {
    On(u32),
    Off(u32),
}

const START_STEPS: &[Step] = &[Step::On(300)];
const UNDERRUN_STEPS: &[Step] = &[Step::On(50), Step::Off(50), Step::On(50)];

impl Signal {
    fn steps(self) -> &'static [Step] {
        match self {
            Signal::Start => START_STEPS,
            Signal::Underrun => UNDERRUN_STEPS,
        }
    }
}

/// Where the LED is in the signal it is showing.
struct Playhead {
    steps: &'static [Step],
    next: usize,
}

impl Playhead {
    const IDLE: Self = Self {
        steps: &[],
        next: 0,
    };

    fn new(signal: Signal) -> Self {
        Self {
            steps: signal.steps(),
            next: 0,
        }
    }

    /// The LED level to set and how long to hold it, or `None` once done.
    fn advance(&mut self) -> Option<(bool, MicrosDurationU32)> {
        let step = *self.steps.get(self.next)?;
        self.next += 1;
        Some(match step {
            Step::On(ms) => (true, ms.millis()),
            Step::Off(ms) => (false, ms.millis()),
        })
    }
}

struct StatusLed {
    alarm: Alarm1,
    pin: StatusLedPin,
    playhead: Playhead,
}

impl StatusLed {
    fn schedule(&mut self, after: MicrosDurationU32) {
        if self.alarm.schedule(after).is_err() {
            defmt::warn!("status led alarm could not be scheduled");
        }
    }
}

static STATUS_LED: Mutex<RefCell<Option<StatusLed>>> = Mutex::new(RefCell::new(None));

pub fn setup_timer_interrupt(timer: &mut hal::Timer, pin: StatusLedPin) {
    unsafe {
        pac::NVIC::unmask(pac::Interrupt::TIMER_IRQ_1);
    }

    let Some(mut alarm) = timer.alarm_1() else {
        defmt::warn!("no alarm left for the status led");
        return;
    };
    alarm.enable_interrupt();
    cortex_m::interrupt::free(|cs| {
        STATUS_LED.borrow(cs).replace(Some(StatusLed {
            alarm,
            pin,
            playhead: Playhead::IDLE,
        }));
    });
}

/// Starts showing `signal`, cutting off whatever was showing. Safe to call
/// from interrupt context.
pub fn show(signal: Signal) {
    cortex_m::interrupt::free(|cs| {
        let mut led = STATUS_LED.borrow(cs).borrow_mut();
        let Some(led) = led.as_mut() else {
            return;
        };
        led.playhead = Playhead::new(signal);
        led.schedule(1000u32.micros());
    });
}

#[interrupt]
fn TIMER_IRQ_1() {
    cortex_m::interrupt::free(|cs| {
        let mut led = STATUS_LED.borrow(cs).borrow_mut();
        let Some(led) = led.as_mut() else {
            return;
        };

        led.alarm.clear_interrupt();

        match led.playhead.advance() {
            Some((lit, hold)) => {
                let _ = if lit {
                    led.pin.set_high()
                } else {
                    led.pin.set_low()
                };
                led.schedule(hold);
            }
            None => {
                let _ = led.pin.set_low();
            }
        }
    })
}
