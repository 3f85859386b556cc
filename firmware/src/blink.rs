use picowave::Error;

pub const BLINK_ERR_2_SHORT: [u8; 4] = [1u8, 0u8, 1u8, 0u8];
pub const BLINK_ERR_3_SHORT: [u8; 6] = [1u8, 0u8, 1u8, 0u8, 1u8, 0u8];
pub const BLINK_ERR_4_SHORT: [u8; 8] = [1u8, 0u8, 1u8, 0u8, 1u8, 0u8, 1u8, 0u8];
pub const BLINK_ERR_5_SHORT: [u8; 10] = [1u8, 0u8, 1u8, 0u8, 1u8, 0u8, 1u8, 0u8, 1u8, 0u8];
pub const BLINK_ERR_6_SHORT: [u8; 12] =
    [1u8, 0u8, 1u8, 0u8, 1u8, 0u8, 1u8, 0u8, 1u8, 0u8, 1u8, 0u8];
// ... --- ...
pub const BLINK_PANIC: [u8; 30] = [
    1, 0, 1, 0, 1, 0, 0, 0, 0, 3, 0, 0, 0, 3, 0, 0, 0, 3, 0, 0, 0, 1, 0, 1, 0, 1, 0, 0, 0, 0,
];

/// Blink code reported for a fatal error.
pub fn error_signal(error: Error) -> &'static [u8] {
    match error {
        Error::NoTransferChannel => &BLINK_ERR_2_SHORT,
        Error::NotPrimed => &BLINK_ERR_3_SHORT,
        Error::Busy => &BLINK_ERR_4_SHORT,
        Error::MalformedAsset => &BLINK_ERR_5_SHORT,
        Error::UnsupportedFormat => &BLINK_ERR_6_SHORT,
    }
}

pub fn blink_signals(
    pin: &mut dyn embedded_hal::digital::v2::OutputPin<Error = core::convert::Infallible>,
    delay: &mut cortex_m::delay::Delay,
    sig: &[u8],
) {
    for bit in sig {
        let _ = if *bit != 0 {
            pin.set_high()
        } else {
            pin.set_low()
        };

        let length = if *bit > 0 { *bit } else { 1 };

        for _ in 0..length {
            delay.delay_ms(200);
        }
    }

    let _ = pin.set_low();

    delay.delay_ms(500);
}

pub fn blink_signals_loop(
    pin: &mut dyn embedded_hal::digital::v2::OutputPin<Error = core::convert::Infallible>,
    delay: &mut cortex_m::delay::Delay,
    sig: &[u8],
) -> ! {
    loop {
        blink_signals(pin, delay, sig);
        delay.delay_ms(1000);
    }
}
