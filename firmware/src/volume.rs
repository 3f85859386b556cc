use embedded_hal::adc::OneShot;
use rp_pico::hal;

use hal::gpio::bank0::Gpio26;
use hal::gpio::{FloatingInput, Pin};
use picowave::VolumeSampler;

pub type PotPin = Pin<Gpio26, FloatingInput>;

/// Volume potentiometer on ADC0.
pub struct PotVolume {
    adc: hal::Adc,
    pin: PotPin,
    last: f32,
}

impl PotVolume {
    pub fn new(adc: hal::Adc, pin: PotPin) -> Self {
        Self {
            adc,
            pin,
            last: 1.0,
        }
    }
}

impl VolumeSampler for PotVolume {
    fn multiplier(&mut self) -> f32 {
        // Keep the previous reading if the conversion is not ready.
        let raw: Option<u16> = self.adc.read(&mut self.pin).ok();
        if let Some(raw) = raw {
            self.last = raw.min(config::ADC_MAX) as f32 / config::ADC_MAX as f32;
        }
        self.last
    }
}
