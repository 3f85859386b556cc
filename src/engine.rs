//! The paced consumer: owns the pacing channel for a session and runs the
//! completion handler.
//!
//! Everything in here is meant to run in interrupt context. It only rotates
//! the slot index, flips slot states and re-points the channel; no
//! conversion or allocation happens here.

use crate::slots::{Block, Consumer};
use crate::{Error, Result};

/// What the engine is streaming.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum EnginePhase {
    /// Not running, or ran out of data after end of stream.
    Idle = 0,
    /// Streaming the slot at `current`.
    Draining = 1,
    /// Underrun: streaming silence until the next slot is armed.
    Starved = 2,
}

impl EnginePhase {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => EnginePhase::Draining,
            2 => EnginePhase::Starved,
            _ => EnginePhase::Idle,
        }
    }
}

/// The hardware that moves duty values to the output at the pacing rate.
///
/// On the RP2040 this is a DMA channel triggered by the PWM wrap request,
/// writing into the compare register of one PWM slice.
pub trait TransferChannel<'a> {
    /// Points the channel at `block` and starts streaming it. Raises the
    /// completion interrupt once the last value has been transferred.
    ///
    /// The block's slot stays `Draining` until that completion has been
    /// handled, so the channel may read it up to then and no later.
    fn begin(&mut self, block: Block<'a>);

    /// Clears the pending completion interrupt.
    fn acknowledge(&mut self);

    /// Stops any transfer in progress.
    fn abort(&mut self);

    /// Drives the output at `duty` directly.
    fn hold(&mut self, duty: u16);

    fn enable_interrupt(&mut self);

    fn disable_interrupt(&mut self);
}

/// What a completion did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Completion {
    /// The next slot was armed in time and is now streaming. `finished` is
    /// the slot handed back to the producer (`None` after silence).
    Continued { finished: Option<usize>, next: usize },
    /// The next slot was not armed: silence is streaming instead.
    Underrun { finished: Option<usize>, count: u32 },
    /// End of stream: nothing more to stream, the channel is idle.
    Drained { finished: Option<usize> },
    /// The engine was not running.
    Spurious,
}

/// Drains armed slots through a [`TransferChannel`].
pub struct TransferEngine<'a, C, const N: usize> {
    consumer: Consumer<'a, N>,
    channel: Option<C>,
    in_flight: Option<usize>,
}

impl<'a, C: TransferChannel<'a>, const N: usize> TransferEngine<'a, C, N> {
    pub fn new(consumer: Consumer<'a, N>) -> Self {
        Self {
            consumer,
            channel: None,
            in_flight: None,
        }
    }

    /// Takes `channel` for the session and starts streaming slot 0.
    ///
    /// Must be called with the completion interrupt masked. If slot 0 is not
    /// armed the channel stays parked in the engine; [`Self::release`] gives
    /// it back.
    pub fn start(&mut self, channel: C) -> Result<()> {
        debug_assert!(self.channel.is_none(), "engine already owns a channel");
        let channel = self.channel.insert(channel);
        let Some(block) = self.consumer.claim(0) else {
            return Err(Error::NotPrimed);
        };
        self.consumer.set_current(0);
        self.consumer.set_phase(EnginePhase::Draining);
        self.in_flight = Some(0);
        channel.enable_interrupt();
        channel.begin(block);
        debug!("engine started on slot 0");
        Ok(())
    }

    /// Completion handler. Call once per completion interrupt.
    ///
    /// The next slot is claimed and started before the finished one is handed
    /// back, so the channel never waits on the producer.
    pub fn on_complete(&mut self) -> Completion {
        let Some(channel) = self.channel.as_mut() else {
            return Completion::Spurious;
        };
        channel.acknowledge();
        if self.consumer.phase() == EnginePhase::Idle {
            return Completion::Spurious;
        }

        let finished = self.in_flight.take();
        let next = self.consumer.current() ^ 1;
        if let Some(block) = self.consumer.claim(next) {
            self.consumer.set_current(next);
            self.consumer.set_phase(EnginePhase::Draining);
            self.in_flight = Some(next);
            channel.begin(block);
            if let Some(slot) = finished {
                self.consumer.release(slot);
            }
            return Completion::Continued { finished, next };
        }

        if let Some(slot) = finished {
            self.consumer.release(slot);
        }
        if self.consumer.end_of_stream() {
            self.consumer.set_phase(EnginePhase::Idle);
            channel.hold(self.consumer.neutral());
            debug!("engine drained");
            return Completion::Drained { finished };
        }

        let count = self.consumer.record_underrun();
        self.consumer.set_phase(EnginePhase::Starved);
        channel.begin(self.consumer.silence());
        warn!("underrun #{}: slot {} not armed", count, next);
        Completion::Underrun { finished, count }
    }

    /// Silences the output and gives the channel back.
    ///
    /// Disables the completion interrupt first. Any slot still streaming is
    /// handed back to the producer.
    pub fn release(&mut self) -> Option<C> {
        let mut channel = self.channel.take()?;
        channel.disable_interrupt();
        channel.abort();
        channel.hold(self.consumer.neutral());
        if let Some(slot) = self.in_flight.take() {
            self.consumer.release(slot);
        }
        self.consumer.set_phase(EnginePhase::Idle);
        debug!("engine released channel");
        Some(channel)
    }

    pub fn phase(&self) -> EnginePhase {
        self.consumer.phase()
    }

    pub fn is_running(&self) -> bool {
        self.phase() != EnginePhase::Idle
    }

    /// Slot most recently claimed by the channel.
    pub fn current(&self) -> usize {
        self.consumer.current()
    }

    pub fn underruns(&self) -> u32 {
        self.consumer.underruns()
    }

    pub fn channel(&self) -> Option<&C> {
        self.channel.as_ref()
    }

    pub fn channel_mut(&mut self) -> Option<&mut C> {
        self.channel.as_mut()
    }
}
