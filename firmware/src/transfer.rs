use core::cell::RefCell;

use cortex_m::interrupt::Mutex;

use rp_pico::hal::pac;

use pac::interrupt;
use picowave::{Completion, Consumer, EngineHandle, Error, TransferEngine};

use crate::output::DmaPwm;

pub type Engine = TransferEngine<'static, DmaPwm, { config::BUFFER_LEN }>;

struct DmaIrqData {
    engine: Engine,
    // The channel while no stream owns it.
    parked: Option<DmaPwm>,
}

static DMA_IRQ_DATA: Mutex<RefCell<Option<DmaIrqData>>> = Mutex::new(RefCell::new(None));

pub fn setup_dma_interrupt(consumer: Consumer<'static, { config::BUFFER_LEN }>, channel: DmaPwm) {
    cortex_m::interrupt::free(|cs| {
        DMA_IRQ_DATA.borrow(cs).replace(Some(DmaIrqData {
            engine: TransferEngine::new(consumer),
            parked: Some(channel),
        }));
    });

    unsafe {
        pac::NVIC::unmask(pac::Interrupt::DMA_IRQ_0);
    }
}

/// Starts and stops the engine living in `DMA_IRQ_0`.
pub struct IrqEngine;

impl EngineHandle for IrqEngine {
    fn start(&mut self) -> picowave::Result<()> {
        cortex_m::interrupt::free(|cs| {
            let mut data = DMA_IRQ_DATA.borrow(cs).borrow_mut();
            let Some(data) = data.as_mut() else {
                return Err(Error::NoTransferChannel);
            };
            let channel = data.parked.take().ok_or(Error::NoTransferChannel)?;
            if let Err(e) = data.engine.start(channel) {
                data.parked = data.engine.release();
                return Err(e);
            }
            Ok(())
        })
    }

    fn stop(&mut self) {
        cortex_m::interrupt::free(|cs| {
            if let Some(data) = DMA_IRQ_DATA.borrow(cs).borrow_mut().as_mut() {
                if let Some(channel) = data.engine.release() {
                    data.parked = Some(channel);
                }
            }
        });
    }
}

#[interrupt]
fn DMA_IRQ_0() {
    let completion = cortex_m::interrupt::free(|cs| {
        DMA_IRQ_DATA
            .borrow(cs)
            .borrow_mut()
            .as_mut()
            .map(|data| data.engine.on_complete())
    });

    if let Some(Completion::Underrun { .. }) = completion {
        crate::led::show(crate::led::Signal::Underrun);
    }
}
