use embedded_hal::PwmPin;
use rp_pico::hal;
use rp_pico::hal::pac;

use hal::gpio::bank0::Gpio28;
use picowave::{Block, TransferChannel};

/// GPIO28 is channel A of this slice.
pub const PWM_SLICE: usize = 6;
/// DMA channel that feeds the compare register.
pub const DMA_CHANNEL: usize = 0;

// DREQ_PWM_WRAP0 is 24, one request line per slice.
const DREQ_PWM_WRAP: u8 = 24 + PWM_SLICE as u8;
// DATA_SIZE encoding for 16 bit transfers.
const SIZE_HALFWORD: u8 = 1;

pub type PwmSlice = hal::pwm::Slice<hal::pwm::Pwm6, hal::pwm::FreeRunning>;

/// Configures the PWM slice for audio and brings the DMA block out of reset.
///
/// The slice wraps at `PWM_TOP` with a divider of `PWM_DIV_INT + PWM_DIV_FRAC/16`,
/// which fixes the sample rate. The output starts out at neutral.
pub fn setup_output<M: hal::gpio::PinMode + hal::gpio::ValidPinMode<Gpio28>>(
    pwm: pac::PWM,
    dma: pac::DMA,
    resets: &mut pac::RESETS,
    output_pin: hal::gpio::Pin<Gpio28, M>,
) -> (PwmSlice, DmaPwm) {
    let slices = hal::pwm::Slices::new(pwm, resets);
    let mut slice = slices.pwm6;
    slice.set_top(config::PWM_TOP);
    slice.set_div_int(config::PWM_DIV_INT);
    slice.set_div_frac(config::PWM_DIV_FRAC);
    slice.channel_a.output_to(output_pin);
    slice.channel_a.set_duty(config::NEUTRAL_DUTY);
    slice.enable();

    resets.reset.modify(|_, w| w.dma().clear_bit());
    while resets.reset_done.read().dma().bit_is_clear() {}

    defmt::info!(
        "pwm slice {}: top {}, {} Hz",
        PWM_SLICE,
        config::PWM_TOP,
        config::SAMPLE_RATE
    );
    (slice, DmaPwm::new(dma, DMA_CHANNEL))
}

/// One DMA channel paced by the PWM wrap, writing 16 bit duty values into the
/// compare register of [`PWM_SLICE`].
pub struct DmaPwm {
    dma: pac::DMA,
    channel: usize,
    cc_addr: u32,
}

impl DmaPwm {
    fn new(dma: pac::DMA, channel: usize) -> Self {
        let pwm = unsafe { &*pac::PWM::ptr() };
        let cc_addr = &pwm.ch[PWM_SLICE].cc as *const _ as u32;
        Self {
            dma,
            channel,
            cc_addr,
        }
    }

    fn ch(&self) -> &pac::dma::CH {
        &self.dma.ch[self.channel]
    }

    fn mask(&self) -> u32 {
        1 << self.channel
    }
}

impl TransferChannel<'static> for DmaPwm {
    fn begin(&mut self, block: Block<'static>) {
        let ch = self.ch();
        ch.ch_read_addr
            .write(|w| unsafe { w.bits(block.as_ptr() as u32) });
        ch.ch_write_addr.write(|w| unsafe { w.bits(self.cc_addr) });
        ch.ch_trans_count
            .write(|w| unsafe { w.bits(block.len() as u32) });
        // Writing CTRL_TRIG starts the transfer.
        ch.ch_ctrl_trig.write(|w| unsafe {
            w.data_size()
                .bits(SIZE_HALFWORD)
                .incr_read()
                .set_bit()
                .incr_write()
                .clear_bit()
                .treq_sel()
                .bits(DREQ_PWM_WRAP)
                .chain_to()
                .bits(self.channel as u8)
                .en()
                .set_bit()
        });
    }

    fn acknowledge(&mut self) {
        let mask = self.mask();
        self.dma.ints0.write(|w| unsafe { w.bits(mask) });
    }

    fn abort(&mut self) {
        let mask = self.mask();
        self.dma.chan_abort.write(|w| unsafe { w.bits(mask) });
        while self.dma.chan_abort.read().bits() & mask != 0 {}
        // An abort can still flag completion.
        self.acknowledge();
    }

    fn hold(&mut self, duty: u16) {
        let pwm = unsafe { &*pac::PWM::ptr() };
        pwm.ch[PWM_SLICE].cc.modify(|_, w| unsafe { w.a().bits(duty) });
    }

    fn enable_interrupt(&mut self) {
        let mask = self.mask();
        self.dma
            .inte0
            .modify(|r, w| unsafe { w.bits(r.bits() | mask) });
    }

    fn disable_interrupt(&mut self) {
        let mask = self.mask();
        self.dma
            .inte0
            .modify(|r, w| unsafe { w.bits(r.bits() & !mask) });
    }
}
