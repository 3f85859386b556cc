use rp_pico::{
    hal::{self, Clock},
    pac,
};

use crate::blink;

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    cortex_m::interrupt::disable();
    defmt::error!("{}", defmt::Display2Format(info));

    let core = unsafe { pac::CorePeripherals::steal() };
    let mut pac = unsafe { pac::Peripherals::steal() };

    // Silence the output first.
    pac.DMA
        .chan_abort
        .write(|w| unsafe { w.bits(1 << crate::output::DMA_CHANNEL) });
    pac.PWM.ch[crate::output::PWM_SLICE]
        .cc
        .modify(|_, w| unsafe { w.a().bits(config::NEUTRAL_DUTY) });

    let mut watchdog = hal::Watchdog::new(pac.WATCHDOG);
    let Ok(clocks) = hal::clocks::init_clocks_and_plls(
        rp_pico::XOSC_CRYSTAL_FREQ,
        pac.XOSC,
        pac.CLOCKS,
        pac.PLL_SYS,
        pac.PLL_USB,
        &mut pac.RESETS,
        &mut watchdog,
    ) else {
        loop {
            cortex_m::asm::wfi();
        }
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

    blink::blink_signals_loop(&mut led_pin, &mut delay, &blink::BLINK_PANIC);
}
