//! Property-based tests for the combiner and scheduler.
//!
//! Checks the cursor invariant, write losslessness across arbitrary
//! partial-write sizes, and the mix-mean property under randomized input.

use std::sync::atomic::AtomicBool;

use cadena_core::{
    CombineMode, Combiner, EffectChain, PullStatus, Result, Sample, SampleSink, SampleSource,
    StreamInfo,
};
use proptest::prelude::*;

struct VecSource {
    info: StreamInfo,
    data: Vec<Sample>,
    pos: usize,
}

impl SampleSource for VecSource {
    fn info(&self) -> StreamInfo {
        self.info
    }
    fn read(&mut self, buf: &mut [Sample]) -> Result<usize> {
        let n = buf.len().min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

fn source(channels: u32, data: Vec<Sample>) -> Box<dyn SampleSource> {
    Box::new(VecSource {
        info: StreamInfo::new(8000, channels),
        data,
        pos: 0,
    })
}

/// Sink accepting a bounded random number of samples per call.
struct ChokedSink {
    samples: Vec<Sample>,
    chokes: Vec<usize>,
    at: usize,
}

impl SampleSink for ChokedSink {
    fn write(&mut self, buf: &[Sample]) -> Result<usize> {
        let choke = self.chokes[self.at % self.chokes.len()];
        self.at += 1;
        let n = buf.len().min(choke.max(1));
        self.samples.extend_from_slice(&buf[..n]);
        Ok(n)
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Whatever the sink's appetite per call, every sample produced by the
    /// chain reaches it exactly once, in order.
    #[test]
    fn writes_are_lossless_across_partial_writes(
        data in prop::collection::vec(any::<i32>(), 1..512),
        chokes in prop::collection::vec(1usize..64, 1..8),
    ) {
        let mut chain = EffectChain::new(StreamInfo::new(8000, 1), 128);
        let mut sink = ChokedSink { samples: Vec::new(), chokes, at: 0 };
        let abort = AtomicBool::new(false);

        for tick in data.chunks(128) {
            chain.input_buf_mut()[..tick.len()].copy_from_slice(tick);
            chain.input_produced(tick.len());
            let st = chain.flow_out(&mut sink, &abort).unwrap();
            prop_assert_eq!(st, PullStatus::NeedInput);
        }
        chain.drain_out(&mut sink, &abort).unwrap();
        prop_assert_eq!(&sink.samples, &data);
        prop_assert_eq!(chain.output_wide_samples(), data.len() as u64);
    }

    /// Mixing the same signal N times at volume 1/N reproduces the signal
    /// within rounding: each input rounds independently, so the error is
    /// bounded by N/2 counts.
    #[test]
    fn mix_of_identical_inputs_is_the_mean(
        data in prop::collection::vec(-1_000_000i32..1_000_000, 1..128),
        n in 2usize..5,
    ) {
        let volume = 1.0 / n as f64;
        let sources = (0..n).map(|_| (source(1, data.clone()), volume)).collect();
        let mut combiner = Combiner::new(CombineMode::Mix, sources, 1.0, 256).unwrap();

        let mut out = Vec::new();
        let mut dst = vec![0; 256];
        loop {
            let wide = combiner.combine_next(&mut dst).unwrap();
            if wide == 0 {
                break;
            }
            out.extend_from_slice(&dst[..wide]);
        }
        prop_assert_eq!(out.len(), data.len());
        for (got, want) in out.iter().zip(&data) {
            prop_assert!((i64::from(*got) - i64::from(*want)).unsigned_abs() <= n as u64);
        }
        prop_assert_eq!(combiner.mixing_clips(), 0);
    }

    /// Clip counters never decrease as more data flows.
    #[test]
    fn clip_counters_are_monotone(
        data in prop::collection::vec(any::<i32>(), 1..256),
        volume in 0.5f64..4.0,
    ) {
        let sources = vec![(source(1, data), volume)];
        let mut combiner = Combiner::new(CombineMode::Sequence, sources, 1.0, 64).unwrap();

        let mut dst = vec![0; 64];
        let mut last = 0;
        loop {
            let wide = combiner.combine_next(&mut dst).unwrap();
            if wide == 0 {
                break;
            }
            let clips = combiner.volume_clips();
            prop_assert!(clips >= last);
            last = clips;
        }
    }

    /// Merge output at every wide index holds each input's sample while it
    /// lasts and silence afterwards.
    #[test]
    fn merge_pads_with_true_silence(
        a in prop::collection::vec(any::<i32>(), 1..64),
        b in prop::collection::vec(any::<i32>(), 1..64),
    ) {
        let sources = vec![(source(1, a.clone()), 1.0), (source(1, b.clone()), 1.0)];
        let mut combiner = Combiner::new(CombineMode::Merge, sources, 1.0, 256).unwrap();

        let mut out = Vec::new();
        let mut dst = vec![0; 256];
        loop {
            let wide = combiner.combine_next(&mut dst).unwrap();
            if wide == 0 {
                break;
            }
            out.extend_from_slice(&dst[..wide * 2]);
        }
        let longest = a.len().max(b.len());
        prop_assert_eq!(out.len(), longest * 2);
        for ws in 0..longest {
            let want_a = a.get(ws).copied().unwrap_or(0);
            let want_b = b.get(ws).copied().unwrap_or(0);
            prop_assert_eq!(out[ws * 2], want_a);
            prop_assert_eq!(out[ws * 2 + 1], want_b);
        }
    }
}
