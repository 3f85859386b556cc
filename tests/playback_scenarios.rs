//! End to end streaming against a simulated DMA/PWM channel.

mod common;

use common::*;
use config::NEUTRAL_DUTY;
use picowave::{
    Completion, Converter, DoubleBuffer, EnginePhase, FixedVolume, PlaybackController,
    PlaybackState, Scaling, SlotState, Volume, VolumeSampler, WaveformSource,
};

type Ctl<'a, 's, 'b, V, const N: usize> = PlaybackController<'a, 's, V, Handle<'b, 'a, N>, N>;

/// Alternates one main loop poll with one PWM wrap until the stream stops.
fn drive<V: VolumeSampler, const N: usize>(
    ctl: &mut Ctl<'_, '_, '_, V, N>,
    bench: &Bench<'_, N>,
    max_ticks: usize,
) {
    for _ in 0..max_ticks {
        let state = ctl.poll().unwrap();
        if state == PlaybackState::Stopped {
            return;
        }
        if state == PlaybackState::Streaming {
            check_slots(ctl.producer(), bench.underruns() == 0);
        } else {
            check_slots(ctl.producer(), false);
        }
        bench.tick();
    }
    panic!("stream did not stop within {max_ticks} ticks");
}

#[test]
fn source_of_two_slots_primes_and_drains() {
    const N: usize = 1024;
    let samples = ramp(2048);
    let bytes = pcm(&samples);
    let converter = Converter::configured();

    let mut buffer = DoubleBuffer::<N>::new(NEUTRAL_DUTY);
    let (bench, producer) = Bench::new(&mut buffer, Some(SimChannel::new(NEUTRAL_DUTY)));
    let mut ctl = PlaybackController::new(
        WaveformSource::from_pcm(&bytes),
        FixedVolume(1.0),
        converter,
        producer,
        bench.handle(),
    );

    assert_eq!(ctl.poll().unwrap(), PlaybackState::DrainingTail);
    assert_eq!(ctl.stats().fills, 2);
    assert_eq!(ctl.producer().slot_state(0), SlotState::Draining);
    assert_eq!(ctl.producer().slot_state(1), SlotState::Armed);

    drive(&mut ctl, &bench, 3 * N);

    let stats = ctl.stats();
    assert_eq!(stats.fills, 2);
    assert_eq!(stats.samples_played, 2048);
    assert_eq!(stats.underruns, 0);

    let expected: Vec<u16> = samples
        .iter()
        .map(|s| converter.duty(*s, Volume::FULL))
        .collect();
    let output = bench.output();
    assert_eq!(output.len(), 2048);
    assert_eq!(output, expected);
}

#[test]
fn partial_second_slot_is_padded_with_neutral() {
    const N: usize = 1024;
    let samples = ramp(1500);
    let bytes = pcm(&samples);
    let converter = Converter::configured();

    let mut buffer = DoubleBuffer::<N>::new(NEUTRAL_DUTY);
    let (bench, producer) = Bench::new(&mut buffer, Some(SimChannel::new(NEUTRAL_DUTY)));
    let mut ctl = PlaybackController::new(
        WaveformSource::from_pcm(&bytes),
        FixedVolume(1.0),
        converter,
        producer,
        bench.handle(),
    );
    drive(&mut ctl, &bench, 3 * N);

    let stats = ctl.stats();
    assert_eq!(stats.fills, 2);
    assert_eq!(stats.samples_played, 1500);

    let output = bench.output();
    assert_eq!(output.len(), 2 * N);
    for (i, s) in samples.iter().enumerate() {
        assert_eq!(output[i], converter.duty(*s, Volume::FULL), "sample {i}");
    }
    // 476 real samples in slot 1, 548 neutral.
    assert!(output[1500..].iter().all(|d| *d == NEUTRAL_DUTY));
    assert_eq!(output[1500..].len(), 548);
}

#[test]
fn source_shorter_than_a_slot_still_primes_both() {
    const N: usize = 1024;
    let samples = ramp(300);
    let bytes = pcm(&samples);

    let mut buffer = DoubleBuffer::<N>::new(NEUTRAL_DUTY);
    let (bench, producer) = Bench::new(&mut buffer, Some(SimChannel::new(NEUTRAL_DUTY)));
    let mut ctl = PlaybackController::new(
        WaveformSource::from_pcm(&bytes),
        FixedVolume(1.0),
        Converter::configured(),
        producer,
        bench.handle(),
    );

    assert_eq!(ctl.poll().unwrap(), PlaybackState::DrainingTail);
    assert_eq!(ctl.producer().slot_state(1), SlotState::Armed);
    drive(&mut ctl, &bench, 3 * N);

    assert_eq!(ctl.stats().fills, 2);
    assert_eq!(ctl.stats().samples_played, 300);
    let output = bench.output();
    assert_eq!(output.len(), 2 * N);
    assert!(output[300..].iter().all(|d| *d == NEUTRAL_DUTY));
}

#[test]
fn empty_source_plays_silence_and_stops() {
    const N: usize = 8;
    let mut buffer = DoubleBuffer::<N>::new(NEUTRAL_DUTY);
    let (bench, producer) = Bench::new(&mut buffer, Some(SimChannel::new(NEUTRAL_DUTY)));
    let mut ctl = PlaybackController::new(
        WaveformSource::from_pcm(&[]),
        FixedVolume(1.0),
        Converter::configured(),
        producer,
        bench.handle(),
    );
    drive(&mut ctl, &bench, 4 * N);

    assert_eq!(ctl.stats().samples_played, 0);
    assert!(bench.output().iter().all(|d| *d == NEUTRAL_DUTY));
}

#[test]
fn long_stream_refills_in_order() {
    const N: usize = 16;
    let samples = ramp(5 * N + 3);
    let bytes = pcm(&samples);

    let mut buffer = DoubleBuffer::<N>::new(32768);
    let (bench, producer) = Bench::new(&mut buffer, Some(SimChannel::new(32768)));
    let mut ctl = PlaybackController::new(
        WaveformSource::from_pcm(&bytes),
        FixedVolume(1.0),
        identity_converter(),
        producer,
        bench.handle(),
    );

    assert_eq!(ctl.poll().unwrap(), PlaybackState::Streaming);
    drive(&mut ctl, &bench, 20 * N);

    let stats = ctl.stats();
    assert_eq!(stats.samples_played as usize, samples.len());
    assert_eq!(stats.fills, 6);
    assert_eq!(stats.underruns, 0);

    let output = bench.output();
    assert_eq!(output.len(), 6 * N);
    let expected: Vec<u16> = samples.iter().map(|s| identity_duty(*s)).collect();
    assert_eq!(output[..samples.len()], expected[..]);
    assert!(output[samples.len()..].iter().all(|d| *d == 32768));
    assert!(bench
        .completions
        .borrow()
        .iter()
        .all(|c| matches!(c, Completion::Continued { .. } | Completion::Drained { .. })));
}

#[test]
fn late_refill_plays_silence_then_recovers() {
    const N: usize = 16;
    let samples = ramp(4 * N);
    let bytes = pcm(&samples);

    let mut buffer = DoubleBuffer::<N>::new(32768);
    let (bench, producer) = Bench::new(&mut buffer, Some(SimChannel::new(32768)));
    let mut ctl = PlaybackController::new(
        WaveformSource::from_pcm(&bytes),
        FixedVolume(1.0),
        identity_converter(),
        producer,
        bench.handle(),
    );

    assert_eq!(ctl.poll().unwrap(), PlaybackState::Streaming);

    // Slot 0 plays out, but the main loop is held up and never refills it.
    bench.ticks(N);
    assert_eq!(ctl.producer().slot_state(0), SlotState::Unarmed);
    bench.ticks(N);
    assert_eq!(
        bench.completions.borrow().last(),
        Some(&Completion::Underrun {
            finished: Some(1),
            count: 1
        })
    );
    assert_eq!(ctl.producer().phase(), EnginePhase::Starved);
    assert_eq!(ctl.stats().underruns, 1);

    bench.ticks(5);
    assert_eq!(ctl.stats().samples_played, 2 * N as u32);

    // The delayed fill finally lands.
    assert_eq!(ctl.poll().unwrap(), PlaybackState::Streaming);
    assert_eq!(ctl.stats().samples_played, 3 * N as u32);
    bench.ticks(N - 5);
    assert_eq!(
        bench.completions.borrow().last(),
        Some(&Completion::Continued {
            finished: None,
            next: 0
        })
    );
    assert_eq!(ctl.producer().phase(), EnginePhase::Draining);

    drive(&mut ctl, &bench, 10 * N);
    assert_eq!(ctl.stats().samples_played, 4 * N as u32);
    assert_eq!(ctl.stats().underruns, 1);

    let output = bench.output();
    assert!(output[2 * N..3 * N].iter().all(|d| *d == 32768));
    let audible: Vec<u16> = output.iter().copied().filter(|d| *d != 32768).collect();
    let expected: Vec<u16> = samples.iter().map(|s| identity_duty(*s)).collect();
    assert_eq!(audible, expected);
}

#[test]
fn extremes_reach_both_ends_of_the_duty_range() {
    const N: usize = 4;
    let bytes = pcm(&[i16::MAX, i16::MIN, 0]);

    let mut buffer = DoubleBuffer::<N>::new(NEUTRAL_DUTY);
    let (bench, producer) = Bench::new(&mut buffer, Some(SimChannel::new(NEUTRAL_DUTY)));
    let mut ctl = PlaybackController::new(
        WaveformSource::from_pcm(&bytes),
        FixedVolume(1.0),
        Converter::new(config::PWM_TOP, Scaling::Amplitude),
        producer,
        bench.handle(),
    );
    drive(&mut ctl, &bench, 4 * N);

    let output = bench.output();
    assert_eq!(output[..3], [3905, 0, NEUTRAL_DUTY]);
}

#[test]
fn volume_is_sampled_once_per_fill() {
    const N: usize = 8;
    let samples = vec![20_000i16; 3 * N];
    let bytes = pcm(&samples);
    let converter = Converter::new(config::PWM_TOP, Scaling::Amplitude);

    let mut calls = 0u32;
    let volumes = [1.0f32, 0.5, 0.0];
    let sampler = || {
        let v = volumes[calls as usize % volumes.len()];
        calls += 1;
        v
    };

    let mut buffer = DoubleBuffer::<N>::new(NEUTRAL_DUTY);
    let (bench, producer) = Bench::new(&mut buffer, Some(SimChannel::new(NEUTRAL_DUTY)));
    let mut ctl = PlaybackController::new(
        WaveformSource::from_pcm(&bytes),
        sampler,
        converter,
        producer,
        bench.handle(),
    );
    drive(&mut ctl, &bench, 10 * N);
    let fills = ctl.stats().fills;
    drop(ctl);
    assert_eq!(calls, fills);

    let output = bench.output();
    assert!(output[..N].iter().all(|d| *d == converter.duty(20_000, Volume::FULL)));
    let half = converter.duty(20_000, Volume::from_unit(0.5));
    assert!(output[N..2 * N].iter().all(|d| *d == half));
    assert!(output[2 * N..3 * N].iter().all(|d| *d == NEUTRAL_DUTY));
}

#[test]
fn bypass_scaling_ignores_volume() {
    const N: usize = 8;
    let bytes = pcm(&[i16::MAX; N]);

    let mut buffer = DoubleBuffer::<N>::new(NEUTRAL_DUTY);
    let (bench, producer) = Bench::new(&mut buffer, Some(SimChannel::new(NEUTRAL_DUTY)));
    let mut ctl = PlaybackController::new(
        WaveformSource::from_pcm(&bytes),
        FixedVolume(0.0),
        Converter::new(config::PWM_TOP, Scaling::Bypass),
        producer,
        bench.handle(),
    );
    drive(&mut ctl, &bench, 4 * N);
    assert!(bench.output()[..N].iter().all(|d| *d == config::PWM_TOP));
}
