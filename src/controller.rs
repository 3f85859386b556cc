//! Main loop side of playback: priming, refilling, draining and teardown.

use crate::slots::Producer;
use crate::{Converter, Error, Result, Volume, VolumeSampler, WaveformSource};

/// Lifecycle of one stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlaybackState {
    /// Loaded, engine not started.
    Idle,
    /// Filling both slots before the engine starts.
    Priming,
    /// Engine running, refilling slots as they come back.
    Streaming,
    /// Source exhausted (or stop requested); waiting for the engine to
    /// finish the armed slots.
    DrainingTail,
    /// Engine stopped, channel released, output neutral.
    Stopped,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PlaybackStats {
    /// Raw samples handed to the converter.
    pub samples_played: u32,
    /// Slots filled, priming included.
    pub fills: u32,
    /// Completions that found no armed slot.
    pub underruns: u32,
}

/// How the controller starts and stops the engine living in the completion
/// context.
pub trait EngineHandle {
    /// Claims a pacing channel and starts streaming slot 0.
    ///
    /// Fails with [`Error::NoTransferChannel`] if no channel can be claimed.
    fn start(&mut self) -> Result<()>;

    /// Disables completions, forces the output to neutral and releases the
    /// channel. Called once the engine has drained.
    fn stop(&mut self);
}

/// Drives a [`WaveformSource`] through the double buffer.
pub struct PlaybackController<'a, 's, V, E, const N: usize> {
    source: WaveformSource<'s>,
    volume: V,
    converter: Converter,
    producer: Producer<'a, N>,
    engine: E,
    state: PlaybackState,
    stop_requested: bool,
    stats: PlaybackStats,
    // Underrun count already on the buffer when this stream was loaded.
    underrun_base: u32,
}

impl<'a, 's, V, E, const N: usize> PlaybackController<'a, 's, V, E, N>
where
    V: VolumeSampler,
    E: EngineHandle,
{
    /// Builds a controller for one stream from `source`.
    ///
    /// `producer` may come fresh from [`DoubleBuffer::split`] or back out of
    /// [`Self::into_parts`]; either way it is reset so the stream starts at
    /// slot 0. The engine must be idle. The buffer and `converter` have to
    /// agree on the neutral duty value.
    ///
    /// [`DoubleBuffer::split`]: crate::DoubleBuffer::split
    pub fn new(
        source: WaveformSource<'s>,
        volume: V,
        converter: Converter,
        mut producer: Producer<'a, N>,
        engine: E,
    ) -> Self {
        debug_assert_eq!(
            producer.neutral(),
            converter.neutral(),
            "buffer and converter disagree on the neutral duty"
        );
        producer.reset();
        let underrun_base = producer.underruns();
        Self {
            source,
            volume,
            converter,
            producer,
            engine,
            state: PlaybackState::Idle,
            stop_requested: false,
            stats: PlaybackStats::default(),
            underrun_base,
        }
    }

    /// Replaces the source for the next stream.
    ///
    /// Only allowed before the first `poll` or after the stream stopped.
    pub fn load(&mut self, source: WaveformSource<'s>) -> Result<()> {
        match self.state {
            PlaybackState::Idle | PlaybackState::Stopped => {}
            _ => return Err(Error::Busy),
        }
        self.producer.reset();
        self.source = source;
        self.state = PlaybackState::Idle;
        self.stop_requested = false;
        self.stats = PlaybackStats::default();
        self.underrun_base = self.producer.underruns();
        Ok(())
    }

    /// One non-blocking step of the main loop.
    pub fn poll(&mut self) -> Result<PlaybackState> {
        match self.state {
            PlaybackState::Idle if self.stop_requested => {
                self.state = PlaybackState::Stopped;
            }
            PlaybackState::Idle => self.prime()?,
            PlaybackState::Streaming => self.refill(),
            PlaybackState::DrainingTail => {
                if self.producer.is_drained() {
                    self.teardown();
                }
            }
            PlaybackState::Priming | PlaybackState::Stopped => {}
        }
        Ok(self.state)
    }

    /// Busy-polls until the stream has stopped.
    pub fn run(&mut self) -> Result<PlaybackStats> {
        while self.poll()? != PlaybackState::Stopped {}
        Ok(self.stats())
    }

    /// Ends the stream early. The armed slots still play out, so the output
    /// is left at neutral rather than wherever the waveform was.
    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn stats(&self) -> PlaybackStats {
        PlaybackStats {
            underruns: self.producer.underruns().wrapping_sub(self.underrun_base),
            ..self.stats
        }
    }

    pub fn source(&self) -> &WaveformSource<'s> {
        &self.source
    }

    pub fn producer(&self) -> &Producer<'a, N> {
        &self.producer
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn into_parts(self) -> (Producer<'a, N>, E) {
        (self.producer, self.engine)
    }

    fn prime(&mut self) -> Result<()> {
        self.state = PlaybackState::Priming;
        info!(
            "priming {} samples, {} per slot",
            self.source.total_samples(),
            N
        );
        for _ in 0..2 {
            // Both slots are free before the engine starts.
            let _ = self.fill_next();
        }
        let exhausted = self.source.is_exhausted();
        if exhausted {
            self.producer.finish();
        }

        if let Err(e) = self.engine.start() {
            error!("playback could not start: {}", e);
            self.state = PlaybackState::Stopped;
            return Err(e);
        }
        self.state = if exhausted {
            PlaybackState::DrainingTail
        } else {
            PlaybackState::Streaming
        };
        info!("streaming");
        Ok(())
    }

    fn refill(&mut self) {
        if self.stop_requested {
            info!("stop requested at sample {}", self.source.cursor());
            self.enter_tail();
            return;
        }
        if self.fill_next().is_some() && self.source.is_exhausted() {
            self.enter_tail();
        }
    }

    fn enter_tail(&mut self) {
        self.producer.finish();
        self.state = PlaybackState::DrainingTail;
        debug!("draining tail");
    }

    fn teardown(&mut self) {
        self.engine.stop();
        self.source.rewind();
        self.state = PlaybackState::Stopped;
        info!(
            "stopped after {} samples, {} underruns",
            self.stats.samples_played,
            self.stats().underruns
        );
    }

    /// take + convert + arm on the next slot, if it is free.
    fn fill_next(&mut self) -> Option<usize> {
        let source = &mut self.source;
        let volume = &mut self.volume;
        let converter = &self.converter;
        let count = self.producer.fill(|slot| {
            let raw = source.take(N);
            let multiplier = Volume::from_unit(volume.multiplier());
            converter.fill(raw, multiplier, slot)
        })?;
        self.stats.samples_played += count as u32;
        self.stats.fills += 1;
        trace!("filled {} samples", count);
        Some(count)
    }
}
