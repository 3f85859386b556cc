#![no_std]

// ----------------------------------------------------------------------------
// Configurable
// ----------------------------------------------------------------------------
pub const PWM_TOP: u16 = 3905; //Wrap value, duty values live in 0..=PWM_TOP
pub const PWM_DIV_INT: u8 = 1;
pub const PWM_DIV_FRAC: u8 = 4; // In 1/16ths
pub const BUFFER_LEN: usize = 1024; // Samples per slot
pub const SCALE_BY_VOLUME: bool = true;

// ----------------------------------------------------------------------------
// Should probably not be changed:
// ----------------------------------------------------------------------------
pub const FORMAT_BITS_PER_SAMPLE: u16 = 16;
pub const WAV_HEADER_LEN: usize = 44;
pub const CLOCK_RATE: u32 = 125_000_000;
pub const NUM_SLOTS: usize = 2;
pub const ADC_MAX: u16 = 4095; // 12 bit converter

// ----------------------------------------------------------------------------
// Derived from other values:
// ----------------------------------------------------------------------------
pub const NEUTRAL_DUTY: u16 = ((PWM_TOP as u32 + 1) / 2) as u16;

pub const PWM_DIV_SIXTEENTHS: u32 = 16 * PWM_DIV_INT as u32 + PWM_DIV_FRAC as u32;
pub const SAMPLE_RATE: u32 = CLOCK_RATE * 16 / ((PWM_TOP as u32 + 1) * PWM_DIV_SIXTEENTHS);
pub const BUFFER_PERIOD_US: u32 = 1_000_000 /*mu*/ * BUFFER_LEN as u32 / SAMPLE_RATE /*Hz*/;

const _: () = assert!(PWM_DIV_INT >= 1, "pwm divider must be at least 1");
const _: () = assert!(PWM_DIV_FRAC < 16, "pwm fractional divider has 4 bits");
const _: () = assert!(PWM_TOP < u16::MAX, "duty values must fit a 16 bit transfer");
const _: () = assert!(BUFFER_LEN > 0);
