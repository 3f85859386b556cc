//! Simulated pacing channel for driving the engine on the host.
#![allow(dead_code)]

use std::cell::RefCell;

use picowave::{
    Block, Completion, Converter, DoubleBuffer, EngineHandle, Error, Producer, Scaling, SlotState,
    TransferChannel, TransferEngine,
};

/// Behaves like a DMA channel feeding a PWM compare register: every tick is
/// one PWM wrap and moves one value, the completion interrupt fires right
/// after the last value of a block.
pub struct SimChannel<'a> {
    block: Option<Block<'a>>,
    pos: usize,
    level: u16,
    irq_enabled: bool,
    pending: bool,
    /// Every duty value the output produced, one per tick.
    pub output: Vec<u16>,
}

impl<'a> SimChannel<'a> {
    pub fn new(level: u16) -> Self {
        Self {
            block: None,
            pos: 0,
            level,
            irq_enabled: false,
            pending: false,
            output: Vec::new(),
        }
    }

    pub fn level(&self) -> u16 {
        self.level
    }

    pub fn irq_enabled(&self) -> bool {
        self.irq_enabled
    }

    fn remaining(&self) -> usize {
        self.block.map_or(0, |b| b.len()).saturating_sub(self.pos)
    }

    pub fn is_busy(&self) -> bool {
        self.remaining() > 0
    }

    /// Returns true when the tick raised the completion interrupt.
    pub fn tick(&mut self) -> bool {
        if let Some(block) = self.block.filter(|_| self.is_busy()) {
            // SAFETY: this block's completion has not fired yet, so the engine
            // still holds its slot as draining. One value is read per tick,
            // like the DMA read pointer.
            self.level = unsafe { *block.as_ptr().add(self.pos) };
            self.pos += 1;
            self.output.push(self.level);
            if !self.is_busy() && self.irq_enabled {
                self.pending = true;
                return true;
            }
            return false;
        }
        self.output.push(self.level);
        false
    }
}

impl<'a> TransferChannel<'a> for SimChannel<'a> {
    fn begin(&mut self, block: Block<'a>) {
        assert!(!self.is_busy(), "channel re-pointed mid-transfer");
        self.block = Some(block);
        self.pos = 0;
    }

    fn acknowledge(&mut self) {
        self.pending = false;
    }

    fn abort(&mut self) {
        self.block = None;
        self.pos = 0;
    }

    fn hold(&mut self, duty: u16) {
        self.level = duty;
    }

    fn enable_interrupt(&mut self) {
        self.irq_enabled = true;
    }

    fn disable_interrupt(&mut self) {
        self.irq_enabled = false;
    }
}

/// The engine plus a one-channel pool, as the interrupt context sees them.
pub struct Bench<'a, const N: usize> {
    pub engine: RefCell<TransferEngine<'a, SimChannel<'a>, N>>,
    pub pool: RefCell<Option<SimChannel<'a>>>,
    pub completions: RefCell<Vec<Completion>>,
}

impl<'a, const N: usize> Bench<'a, N> {
    pub fn new(
        buffer: &'a mut DoubleBuffer<N>,
        channel: Option<SimChannel<'a>>,
    ) -> (Self, Producer<'a, N>) {
        let (producer, consumer) = buffer.split();
        let bench = Self {
            engine: RefCell::new(TransferEngine::new(consumer)),
            pool: RefCell::new(channel),
            completions: RefCell::new(Vec::new()),
        };
        (bench, producer)
    }

    pub fn handle(&self) -> Handle<'_, 'a, N> {
        Handle(self)
    }

    /// One PWM wrap, running the completion handler if it fired.
    pub fn tick(&self) -> Option<Completion> {
        let mut engine = self.engine.borrow_mut();
        let fired = engine.channel_mut().map_or(false, |c| c.tick());
        if !fired {
            return None;
        }
        let completion = engine.on_complete();
        self.completions.borrow_mut().push(completion);
        Some(completion)
    }

    pub fn ticks(&self, n: usize) {
        for _ in 0..n {
            self.tick();
        }
    }

    /// Output recorded so far, wherever the channel currently is.
    pub fn output(&self) -> Vec<u16> {
        if let Some(c) = self.engine.borrow().channel() {
            return c.output.clone();
        }
        self.pool
            .borrow()
            .as_ref()
            .map(|c| c.output.clone())
            .unwrap_or_default()
    }

    pub fn underruns(&self) -> usize {
        self.completions
            .borrow()
            .iter()
            .filter(|c| matches!(c, Completion::Underrun { .. }))
            .count()
    }
}

pub struct Handle<'b, 'a, const N: usize>(&'b Bench<'a, N>);

impl<const N: usize> EngineHandle for Handle<'_, '_, N> {
    fn start(&mut self) -> picowave::Result<()> {
        let channel = self
            .0
            .pool
            .borrow_mut()
            .take()
            .ok_or(Error::NoTransferChannel)?;
        let mut engine = self.0.engine.borrow_mut();
        if let Err(e) = engine.start(channel) {
            *self.0.pool.borrow_mut() = engine.release();
            return Err(e);
        }
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(channel) = self.0.engine.borrow_mut().release() {
            *self.0.pool.borrow_mut() = Some(channel);
        }
    }
}

/// Converter whose duty values are `sample + 32768`, so output order can be
/// checked sample by sample.
pub fn identity_converter() -> Converter {
    Converter::new(u16::MAX, Scaling::Bypass)
}

pub fn identity_duty(sample: i16) -> u16 {
    (sample as i32 + 32768) as u16
}

pub fn pcm(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Distinct, never-zero samples.
pub fn ramp(len: usize) -> Vec<i16> {
    (0..len).map(|i| (i % 30_000) as i16 + 1).collect()
}

/// Asserts the slot invariants that hold at any instant.
pub fn check_slots<const N: usize>(producer: &Producer<'_, N>, streaming_without_underrun: bool) {
    let states = [producer.slot_state(0), producer.slot_state(1)];
    let draining = states.iter().filter(|s| **s == SlotState::Draining).count();
    assert!(draining <= 1, "both slots draining: {states:?}");
    if streaming_without_underrun {
        assert_eq!(draining, 1, "streaming without a draining slot: {states:?}");
        assert!(
            states.iter().any(|s| *s != SlotState::Unarmed),
            "both slots unarmed while streaming: {states:?}"
        );
    }
}
