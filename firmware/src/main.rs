#![no_std]
#![no_main]

mod blink;
mod button;
mod led;
mod output;
mod panic;
mod transfer;
mod volume;

use core::ptr::addr_of_mut;

use defmt_rtt as _;
// The macro for our start-up function
use rp_pico::entry;

// Pull in any important traits
use rp_pico::hal;
use rp_pico::hal::pac;
use rp_pico::hal::prelude::*;

use picowave::{
    Converter, DoubleBuffer, Error, PlaybackController, PlaybackState, VolumeSampler,
    WaveformSource,
};

use crate::transfer::IrqEngine;
use crate::volume::PotVolume;

static ASSET: &[u8] = include_bytes!("../assets/chime.wav");

static mut BUFFER: DoubleBuffer<{ config::BUFFER_LEN }> =
    DoubleBuffer::new(config::NEUTRAL_DUTY);

type LedPin = hal::gpio::Pin<hal::gpio::bank0::Gpio25, hal::gpio::PushPullOutput>;

type Controller<V> =
    PlaybackController<'static, 'static, V, IrqEngine, { config::BUFFER_LEN }>;

/// Entry point to our bare-metal application.
///
/// The `#[entry]` macro ensures the Cortex-M start-up code calls this function
/// as soon as all global variables are initialised.
///
/// Plays the embedded asset, then waits for the button and plays it again.
#[entry]
fn main() -> ! {
    run()
}

fn run() -> ! {
    let core = unsafe { pac::CorePeripherals::steal() };
    let mut pac = unsafe { pac::Peripherals::steal() };

    // Set up the watchdog driver - needed by the clock setup code
    let mut watchdog = hal::Watchdog::new(pac.WATCHDOG);

    // The default is to generate a 125 MHz system clock, which the sample rate
    // in `config` is derived from.
    let Ok(clocks) = hal::clocks::init_clocks_and_plls(
        rp_pico::XOSC_CRYSTAL_FREQ,
        pac.XOSC,
        pac.CLOCKS,
        pac.PLL_SYS,
        pac.PLL_USB,
        &mut pac.RESETS,
        &mut watchdog,
    ) else {
        panic!("clock setup failed");
    };

    // The single-cycle I/O block controls our GPIO pins
    let sio = hal::Sio::new(pac.SIO);

    // Set the pins up according to their function on this particular board
    let pins = rp_pico::Pins::new(
        pac.IO_BANK0,
        pac.PADS_BANK0,
        sio.gpio_bank0,
        &mut pac.RESETS,
    );

    let mut delay = cortex_m::delay::Delay::new(core.SYST, clocks.system_clock.freq().to_Hz());
    let mut led_pin = pins.led.into_push_pull_output();

    let mut timer = hal::Timer::new(pac.TIMER, &mut pac.RESETS);
    led::setup_timer_interrupt(&mut timer, pins.gpio15.into_push_pull_output());
    button::setup_interrupt(&mut timer, pins.gpio5.into_pull_up_input());

    let adc = hal::Adc::new(pac.ADC, &mut pac.RESETS);
    let volume = PotVolume::new(adc, pins.gpio26.into_floating_input());

    let source = match WaveformSource::from_wav(ASSET) {
        Ok(source) => source,
        Err(e) => fatal(&mut led_pin, &mut delay, e),
    };
    if source.sample_rate() != Some(config::SAMPLE_RATE) {
        defmt::warn!(
            "asset is {} Hz, output runs at {} Hz",
            source.sample_rate(),
            config::SAMPLE_RATE
        );
    }

    let (_pwm, channel) = output::setup_output(pac.PWM, pac.DMA, &mut pac.RESETS, pins.gpio28);

    // Safety: `run` never returns and is the only place that touches BUFFER.
    let buffer = unsafe { &mut *addr_of_mut!(BUFFER) };
    let (producer, consumer) = buffer.split();
    transfer::setup_dma_interrupt(consumer, channel);

    let mut controller =
        PlaybackController::new(source, volume, Converter::configured(), producer, IrqEngine);

    defmt::info!(
        "{} samples, {} per slot, {} us per slot",
        controller.source().total_samples(),
        config::BUFFER_LEN,
        config::BUFFER_PERIOD_US
    );

    loop {
        play(&mut controller, &mut led_pin, &mut delay);

        // Wait for the button before playing again.
        button::clear();
        while !button::take_press() {
            cortex_m::asm::wfi();
        }
        let source = match WaveformSource::from_wav(ASSET) {
            Ok(source) => source,
            Err(e) => fatal(&mut led_pin, &mut delay, e),
        };
        if let Err(e) = controller.load(source) {
            fatal(&mut led_pin, &mut delay, e);
        }
    }
}

/// Streams the loaded source to completion. A button press ends it early.
fn play<V: VolumeSampler>(
    controller: &mut Controller<V>,
    led_pin: &mut LedPin,
    delay: &mut cortex_m::delay::Delay,
) {
    button::clear();
    led::show(led::Signal::Start);

    // ----------------------------------------------------------------------------
    // Main loop! -----------------------------------------------------------------
    // ----------------------------------------------------------------------------
    loop {
        match controller.poll() {
            Ok(PlaybackState::Stopped) => break,
            Ok(_) => {}
            Err(e) => fatal(led_pin, delay, e),
        }
        if button::take_press() {
            controller.request_stop();
        }
    }

    let stats = controller.stats();
    defmt::info!(
        "played {} samples in {} fills, {} underruns",
        stats.samples_played,
        stats.fills,
        stats.underruns
    );
}

fn fatal(led_pin: &mut LedPin, delay: &mut cortex_m::delay::Delay, error: Error) -> ! {
    defmt::error!("fatal: {}", error);
    blink::blink_signals_loop(led_pin, delay, blink::error_signal(error));
}
