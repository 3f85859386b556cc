use crate::hal::pac;
use cortex_m::interrupt::Mutex;
use embedded_hal::digital::v2::InputPin;
use fugit::ExtU32;
use hal::pac::interrupt;
use rp_pico::hal::{
    self,
    gpio::Interrupt,
    timer::{Alarm, Alarm2},
};

use core::cell::RefCell;
use hal::gpio;

/// Stops the current stream, or replays the asset once stopped.
pub type ButtonPin = gpio::Pin<gpio::bank0::Gpio5, gpio::PullUpInput>;

const DEBOUNCE_DURATION_MILLIS: u32 = 30;

#[derive(Copy, Clone, PartialEq, Eq)]
enum DebouncingState {
    Debouncing(ButtonState),
    Fixed(ButtonState),
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum ButtonState {
    Pressed,
    Released,
}

struct IrqData {
    button: ButtonPin,
    alarm: Alarm2,
    state: DebouncingState,
    event_pressed: bool,
}

impl IrqData {
    fn debounce(&mut self) {
        if self.alarm.schedule(DEBOUNCE_DURATION_MILLIS.millis()).is_err() {
            defmt::warn!("debounce alarm could not be scheduled");
        }
    }
}

static IRQ_DATA: Mutex<RefCell<Option<IrqData>>> = Mutex::new(RefCell::new(None));

/// Forgets presses that happened so far.
pub fn clear() {
    cortex_m::interrupt::free(|cs| {
        if let Some(data) = IRQ_DATA.borrow(cs).borrow_mut().as_mut() {
            data.event_pressed = false;
        }
    });
}

/// Whether the button was pressed since the last call (or `clear`).
pub fn take_press() -> bool {
    cortex_m::interrupt::free(|cs| {
        IRQ_DATA
            .borrow(cs)
            .borrow_mut()
            .as_mut()
            .map_or(false, |data| core::mem::take(&mut data.event_pressed))
    })
}

pub fn setup_interrupt(timer: &mut hal::Timer, mut button: ButtonPin) {
    let Some(mut alarm) = timer.alarm_2() else {
        return;
    };
    alarm.enable_interrupt();

    button.set_interrupt_enabled(Interrupt::EdgeHigh, true);
    button.set_interrupt_enabled(Interrupt::EdgeLow, true);

    cortex_m::interrupt::free(|cs| {
        IRQ_DATA.borrow(cs).replace(Some(IrqData {
            button,
            state: DebouncingState::Fixed(ButtonState::Released),
            alarm,
            event_pressed: false,
        }));
    });

    unsafe {
        pac::NVIC::unmask(pac::Interrupt::IO_IRQ_BANK0);
        pac::NVIC::unmask(pac::Interrupt::TIMER_IRQ_2);
    }
}

#[interrupt]
fn IO_IRQ_BANK0() {
    cortex_m::interrupt::free(|cs| {
        let mut data = IRQ_DATA.borrow(cs).borrow_mut();
        let Some(data) = data.as_mut() else {
            return;
        };

        if data.button.interrupt_status(Interrupt::EdgeLow) {
            if data.state == DebouncingState::Fixed(ButtonState::Released) {
                data.debounce();
                data.state = DebouncingState::Debouncing(ButtonState::Pressed);
            }
            data.button.clear_interrupt(Interrupt::EdgeLow);
        }

        if data.button.interrupt_status(Interrupt::EdgeHigh) {
            if data.state == DebouncingState::Fixed(ButtonState::Pressed) {
                data.debounce();
                data.state = DebouncingState::Debouncing(ButtonState::Released);
            }
            data.button.clear_interrupt(Interrupt::EdgeHigh);
        }
    });
}

#[interrupt]
fn TIMER_IRQ_2() {
    cortex_m::interrupt::free(|cs| {
        let mut data = IRQ_DATA.borrow(cs).borrow_mut();
        let Some(data) = data.as_mut() else {
            return;
        };

        data.alarm.clear_interrupt();

        let DebouncingState::Debouncing(target_state) = data.state else {
            return;
        };
        let current_state = match data.button.is_high() {
            Ok(true) => ButtonState::Released,
            _ => ButtonState::Pressed,
        };
        // A press that bounced back within the debounce window still counts.
        if current_state == ButtonState::Pressed || target_state == ButtonState::Pressed {
            data.event_pressed = true;
        }
        data.state = DebouncingState::Fixed(current_state);
    })
}
