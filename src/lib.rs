//! Double-buffered PWM audio streaming.
//!
//! A stored mono 16 bit PCM waveform is converted into PWM duty values and
//! handed, one slot at a time, to a transfer channel that writes them to the
//! PWM compare register at the wrap rate of the PWM slice. Two slots are used:
//! while the channel drains one, the main loop refills the other.
//!
//! ```text
//! main loop                               completion interrupt
//! ─────────                               ────────────────────
//! PlaybackController ── Producer ──▶ [slot 0][slot 1] ◀── Consumer ── TransferEngine
//!   WaveformSource::take                                  TransferChannel::begin
//!   Converter::fill
//! ```
//!
//! Every slot transition has exactly one writer: the producer moves a slot
//! from `Unarmed` to `Armed`, the consumer moves it on to `Draining` and back
//! to `Unarmed`. Only the completion handler re-points the channel.
#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod controller;
pub mod convert;
pub mod engine;
mod error;
pub mod slots;
pub mod source;
pub mod volume;

pub use controller::{EngineHandle, PlaybackController, PlaybackState, PlaybackStats};
pub use convert::{Converter, Scaling};
pub use engine::{Completion, EnginePhase, TransferChannel, TransferEngine};
pub use error::{Error, Result};
pub use slots::{Block, Consumer, DoubleBuffer, Producer, SlotState};
pub use source::{Samples, WaveformSource};
pub use volume::{FixedVolume, Volume, VolumeSampler};
