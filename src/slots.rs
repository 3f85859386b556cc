//! Two fixed-capacity slots shared between the refill loop and the
//! completion interrupt.
//!
//! Ownership of a slot follows its state:
//!
//! ```text
//!            Producer::fill          Consumer::claim         Consumer::release
//! Unarmed ─────────────────▶ Armed ─────────────────▶ Draining ─────────────────▶ Unarmed
//! ```
//!
//! While a slot is `Unarmed` only the producer touches it, otherwise only the
//! consumer does. Each side therefore only ever stores a state it found in its
//! own half of the cycle, which works with plain atomic loads and stores (the
//! Cortex-M0+ has no compare-and-swap).

use core::cell::UnsafeCell;
use core::marker::PhantomData;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use crate::engine::EnginePhase;

/// Where a slot is in its fill/drain cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SlotState {
    /// Free for the producer to fill.
    Unarmed = 0,
    /// Filled and waiting for the engine.
    Armed = 1,
    /// Being streamed to the output.
    Draining = 2,
}

impl SlotState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => SlotState::Armed,
            2 => SlotState::Draining,
            _ => SlotState::Unarmed,
        }
    }
}

/// A claimed slot (or the silence block), as the transfer channel sees it.
///
/// This is an address and a length, not a borrow: the consumer hands the slot
/// back with [`Consumer::release`] while copies of the handle may still exist,
/// and the producer then rewrites that memory.
#[derive(Clone, Copy, Debug)]
pub struct Block<'a> {
    ptr: NonNull<u16>,
    len: usize,
    _buffer: PhantomData<&'a [u16]>,
}

// SAFETY: a `Block` is only an address into a `DoubleBuffer`, which is `Sync`.
// Dereferencing it goes through `as_slice`, which carries its own contract.
unsafe impl Send for Block<'_> {}

impl<'a> Block<'a> {
    fn new(ptr: NonNull<u16>, len: usize) -> Self {
        Self {
            ptr,
            len,
            _buffer: PhantomData,
        }
    }

    /// First duty value, for programming the transfer's read address.
    pub fn as_ptr(&self) -> *const u16 {
        self.ptr.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Reads the block's duty values.
    ///
    /// # Safety
    ///
    /// The returned slice must not be used after the slot this block was
    /// claimed from has been released, since the producer may then refill it.
    /// Blocks of silence never change and carry no such restriction.
    pub unsafe fn as_slice(&self) -> &'a [u16] {
        core::slice::from_raw_parts(self.ptr.as_ptr(), self.len)
    }
}

/// Both slots, a block of silence for underruns, and the handoff flags.
pub struct DoubleBuffer<const N: usize> {
    slots: [UnsafeCell<[u16; N]>; 2],
    silence: [u16; N],
    neutral: u16,
    state: [AtomicU8; 2],
    // Written by the consumer only.
    current: AtomicU8,
    phase: AtomicU8,
    underruns: AtomicU32,
    // Written by the producer only.
    end_of_stream: AtomicBool,
}

// SAFETY: slot contents are only accessed by the side that owns the slot's
// current state (see module docs), and state changes are published with
// release/acquire ordering.
unsafe impl<const N: usize> Sync for DoubleBuffer<N> {}

impl<const N: usize> DoubleBuffer<N> {
    /// `neutral` is the duty value used for silence.
    pub const fn new(neutral: u16) -> Self {
        Self {
            slots: [UnsafeCell::new([neutral; N]), UnsafeCell::new([neutral; N])],
            silence: [neutral; N],
            neutral,
            state: [AtomicU8::new(0), AtomicU8::new(0)],
            current: AtomicU8::new(0),
            phase: AtomicU8::new(EnginePhase::Idle as u8),
            underruns: AtomicU32::new(0),
            end_of_stream: AtomicBool::new(false),
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Hands out the only producer and consumer for this buffer.
    pub fn split(&mut self) -> (Producer<'_, N>, Consumer<'_, N>) {
        let this: &Self = self;
        this.phase.store(EnginePhase::Idle as u8, Ordering::Release);
        this.current.store(0, Ordering::Release);
        let mut producer = Producer {
            buffer: this,
            next_fill: 0,
            _not_sync: PhantomData,
        };
        producer.reset();
        this.underruns.store(0, Ordering::Relaxed);
        let consumer = Consumer {
            buffer: this,
            _not_sync: PhantomData,
        };
        (producer, consumer)
    }

    fn state(&self, slot: usize) -> SlotState {
        SlotState::from_u8(self.state[slot].load(Ordering::Acquire))
    }

    fn set_state(&self, slot: usize, state: SlotState) {
        self.state[slot].store(state as u8, Ordering::Release);
    }

    fn phase(&self) -> EnginePhase {
        EnginePhase::from_u8(self.phase.load(Ordering::Acquire))
    }
}

/// Main loop side: fills `Unarmed` slots and arms them.
pub struct Producer<'a, const N: usize> {
    buffer: &'a DoubleBuffer<N>,
    next_fill: usize,
    _not_sync: PhantomData<core::cell::Cell<()>>,
}

impl<'a, const N: usize> Producer<'a, N> {
    /// Index of the slot the next `fill` writes. Slots are filled in strict
    /// alternation so the engine drains them in stream order.
    pub fn next_slot(&self) -> usize {
        self.next_fill
    }

    /// Whether the next slot in fill order is free.
    pub fn can_fill(&self) -> bool {
        self.buffer.state(self.next_fill) == SlotState::Unarmed
    }

    /// Lets `f` write the next slot, then arms it.
    ///
    /// Returns `None` without calling `f` if that slot is still armed or
    /// draining. Otherwise returns whatever `f` returned.
    pub fn fill<R>(&mut self, f: impl FnOnce(&mut [u16; N]) -> R) -> Option<R> {
        let slot = self.next_fill;
        if !self.can_fill() {
            return None;
        }
        // SAFETY: the slot is `Unarmed`, so the consumer does not look at it
        // until we publish `Armed` below.
        let data = unsafe { &mut *self.buffer.slots[slot].get() };
        let ret = f(data);
        self.buffer.set_state(slot, SlotState::Armed);
        self.next_fill ^= 1;
        Some(ret)
    }

    /// Tells the engine no more slots will be armed.
    pub fn finish(&mut self) {
        self.buffer.end_of_stream.store(true, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.buffer.end_of_stream.load(Ordering::Acquire)
    }

    /// Returns both slots to `Unarmed` and clears the end-of-stream marker.
    ///
    /// Only valid while the engine is idle; the completion interrupt must not
    /// be live.
    pub fn reset(&mut self) {
        debug_assert!(self.buffer.phase() == EnginePhase::Idle);
        self.buffer.set_state(0, SlotState::Unarmed);
        self.buffer.set_state(1, SlotState::Unarmed);
        self.buffer.end_of_stream.store(false, Ordering::Release);
        self.next_fill = 0;
    }

    pub fn slot_state(&self, slot: usize) -> SlotState {
        self.buffer.state(slot)
    }

    /// Slot the engine is currently draining (or last drained).
    pub fn current(&self) -> usize {
        self.buffer.current.load(Ordering::Acquire) as usize
    }

    pub fn phase(&self) -> EnginePhase {
        self.buffer.phase()
    }

    /// True once the engine has stopped pulling data.
    pub fn is_drained(&self) -> bool {
        self.phase() == EnginePhase::Idle
    }

    pub fn underruns(&self) -> u32 {
        self.buffer.underruns.load(Ordering::Acquire)
    }

    /// Duty value the buffer pads and underruns with.
    pub fn neutral(&self) -> u16 {
        self.buffer.neutral
    }
}

/// Completion side: claims armed slots for the channel and releases them.
pub struct Consumer<'a, const N: usize> {
    buffer: &'a DoubleBuffer<N>,
    _not_sync: PhantomData<core::cell::Cell<()>>,
}

impl<'a, const N: usize> Consumer<'a, N> {
    /// Moves an `Armed` slot to `Draining` and returns where its contents
    /// live. The contents stay put until the matching `release`.
    pub fn claim(&mut self, slot: usize) -> Option<Block<'a>> {
        if self.buffer.state(slot) != SlotState::Armed {
            return None;
        }
        self.buffer.set_state(slot, SlotState::Draining);
        let ptr = NonNull::new(self.buffer.slots[slot].get().cast::<u16>())?;
        Some(Block::new(ptr, N))
    }

    /// Hands a drained slot back to the producer.
    pub fn release(&mut self, slot: usize) {
        debug_assert!(self.buffer.state(slot) == SlotState::Draining);
        self.buffer.set_state(slot, SlotState::Unarmed);
    }

    pub fn slot_state(&self, slot: usize) -> SlotState {
        self.buffer.state(slot)
    }

    pub fn current(&self) -> usize {
        self.buffer.current.load(Ordering::Relaxed) as usize
    }

    pub fn set_current(&mut self, slot: usize) {
        self.buffer.current.store(slot as u8, Ordering::Release);
    }

    pub fn phase(&self) -> EnginePhase {
        self.buffer.phase()
    }

    pub fn set_phase(&mut self, phase: EnginePhase) {
        self.buffer.phase.store(phase as u8, Ordering::Release);
    }

    pub fn end_of_stream(&self) -> bool {
        self.buffer.end_of_stream.load(Ordering::Acquire)
    }

    /// Counts one underrun. Single writer, so a load/store pair is enough.
    pub fn record_underrun(&mut self) -> u32 {
        let count = self.buffer.underruns.load(Ordering::Relaxed).wrapping_add(1);
        self.buffer.underruns.store(count, Ordering::Release);
        count
    }

    pub fn underruns(&self) -> u32 {
        self.buffer.underruns.load(Ordering::Relaxed)
    }

    pub fn neutral(&self) -> u16 {
        self.buffer.neutral
    }

    /// A slot-sized block of neutral duty values.
    pub fn silence(&self) -> Block<'a> {
        let silence: &'a [u16; N] = &self.buffer.silence;
        Block::new(NonNull::from(silence).cast::<u16>(), N)
    }
}
