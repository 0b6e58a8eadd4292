//! The built-in effects driven through the real planner and scheduler.

use std::sync::atomic::AtomicBool;

use cadena_core::{
    PlannedEffect, PullStatus, Result, Sample, SampleSink, StreamInfo, build_chain, plan_chain,
};
use cadena_effects::Registry;

struct VecSink(Vec<Sample>);

impl SampleSink for VecSink {
    fn write(&mut self, buf: &[Sample]) -> Result<usize> {
        self.0.extend_from_slice(buf);
        Ok(buf.len())
    }
}

fn effect(name: &str, args: &[&str]) -> PlannedEffect {
    PlannedEffect {
        name: name.to_string(),
        args: args.iter().map(|s| s.to_string()).collect(),
    }
}

/// Push `data` through a planned chain tick by tick and drain it.
fn process(
    user: &[PlannedEffect],
    input: StreamInfo,
    output: StreamInfo,
    data: &[Sample],
) -> Vec<Sample> {
    const BUFSIZE: usize = 128;
    let registry = Registry::new();
    let plan = plan_chain(user, &registry, input, output).unwrap();
    let mut chain = build_chain(&plan.entries, &registry, input, output, BUFSIZE).unwrap();
    let mut sink = VecSink(Vec::new());
    let abort = AtomicBool::new(false);

    let mut eof = false;
    for tick in data.chunks(BUFSIZE) {
        chain.input_buf_mut()[..tick.len()].copy_from_slice(tick);
        chain.input_produced(tick.len());
        if chain.flow_out(&mut sink, &abort).unwrap() == PullStatus::Eof {
            eof = true;
            break;
        }
    }
    if !eof {
        chain.drain_out(&mut sink, &abort).unwrap();
    }
    chain.stop_all();
    sink.0
}

#[test]
fn vol_scales_through_the_chain() {
    let info = StreamInfo::new(8000, 1);
    let out = process(&[effect("vol", &["0.5"])], info, info, &[100, -100, 3]);
    assert_eq!(out, vec![50, -50, 2]);
}

#[test]
fn trim_then_pad_reshapes_the_stream() {
    let info = StreamInfo::new(4, 1);
    let data: Vec<Sample> = (1..=8).collect();
    // Skip 1 second (4 samples), keep the rest, append 0.5 s of silence.
    let out = process(
        &[effect("trim", &["1"]), effect("pad", &["0.5"])],
        info,
        info,
        &data,
    );
    assert_eq!(out, vec![5, 6, 7, 8, 0, 0]);
}

#[test]
fn trim_with_length_cuts_the_session_short() {
    let info = StreamInfo::new(4, 1);
    let data: Vec<Sample> = (0..400).collect();
    let out = process(&[effect("trim", &["0", "1"])], info, info, &data);
    assert_eq!(out, vec![0, 1, 2, 3]);
}

#[test]
fn auto_rate_adapter_is_inserted_for_mismatched_rates() {
    let input = StreamInfo::new(8000, 1);
    let output = StreamInfo::new(4000, 1);
    let data: Vec<Sample> = (0..200).collect();
    let out = process(&[], input, output, &data);
    assert!((out.len() as i64 - 100).abs() <= 1);
    assert_eq!(&out[..3], &[0, 2, 4]);
}

#[test]
fn auto_channels_adapter_duplicates_mono_to_stereo() {
    let input = StreamInfo::new(8000, 1);
    let output = StreamInfo::new(8000, 2);
    let out = process(&[], input, output, &[1, 2, 3]);
    assert_eq!(out, vec![1, 1, 2, 2, 3, 3]);
}

#[test]
fn stereo_rate_conversion_runs_split_per_channel() {
    // The resampler is mono; on stereo input the chain must split, run a
    // twin per channel, and re-interleave without crosstalk.
    let input = StreamInfo::new(8000, 2);
    let output = StreamInfo::new(4000, 2);
    // L ramps positive, R ramps negative.
    let mut data = Vec::new();
    for i in 0..100 {
        data.push(i as Sample);
        data.push(-(i as Sample));
    }
    let out = process(&[], input, output, &data);
    assert!(out.len() >= 96);
    for frame in out.chunks(2) {
        assert_eq!(frame[0], -frame[1]);
        assert_eq!(frame[0] % 2, 0);
    }
}

#[test]
fn vol_and_inverse_vol_round_trip() {
    let info = StreamInfo::new(8000, 1);
    let data: Vec<Sample> = vec![4000, -12000, 0, 800];
    let out = process(
        &[effect("vol", &["0.25"]), effect("vol", &["4"])],
        info,
        info,
        &data,
    );
    assert_eq!(out, data);
}
