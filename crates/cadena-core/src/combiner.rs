//! The input combiner.
//!
//! Reconciles 1..N input streams into the single wide-sample stream that
//! enters slot 0 of the effect chain. Per tick it produces up to
//! `bufsize / channels` wide samples, applying each input's volume (with
//! clip accounting) on the way in.
//!
//! Modes: `sequence` and `concatenate` play inputs one at a time
//! (concatenate advances within the session, sequence is sessioned by the
//! driver); `mix` sums inputs sample-by-sample in a 64-bit accumulator
//! with saturation; `merge` stacks input channels side by side, padding
//! exhausted inputs with silence.

use crate::error::{Error, Result};
use crate::sample::{Sample, apply_volume, clip_i64};
use crate::signal::StreamInfo;

/// How multiple inputs become one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombineMode {
    /// One input at a time; each gets its own session and the signals
    /// must segue.
    Sequence,
    /// One input at a time within a single session; rigid join.
    Concatenate,
    /// Sum all inputs.
    Mix,
    /// Stack all inputs' channels.
    Merge,
}

impl CombineMode {
    /// Name as used on the command line.
    pub const fn name(self) -> &'static str {
        match self {
            CombineMode::Sequence => "sequence",
            CombineMode::Concatenate => "concatenate",
            CombineMode::Mix => "mix",
            CombineMode::Merge => "merge",
        }
    }

    /// Whether inputs are consumed one after another.
    pub const fn is_serial(self) -> bool {
        matches!(self, CombineMode::Sequence | CombineMode::Concatenate)
    }
}

/// A readable, opened input stream.
pub trait SampleSource {
    /// The stream's resolved signal.
    fn info(&self) -> StreamInfo;

    /// Read up to `buf.len()` samples; 0 means end of stream.
    fn read(&mut self, buf: &mut [Sample]) -> Result<usize>;

    /// Saturation events recorded while converting into the sample
    /// domain.
    fn clips(&self) -> u64 {
        0
    }
}

struct Input {
    source: Box<dyn SampleSource>,
    volume: f64,
    volume_clips: u64,
    done: bool,
}

/// Combines input streams under a [`CombineMode`].
pub struct Combiner {
    mode: CombineMode,
    info: StreamInfo,
    inputs: Vec<Input>,
    current: usize,
    /// Per-input staging buffers for the parallel modes.
    scratch: Vec<Vec<Sample>>,
    /// Wide samples each input delivered this tick.
    tick_wide: Vec<usize>,
    mixing_clips: u64,
    read_wide: u64,
}

impl Combiner {
    /// Build a combiner over opened sources.
    ///
    /// `volumes` pairs each source with its effective volume (replay gain
    /// already folded in). `speed` scales the resulting stream's nominal
    /// rate; it does not change what is read.
    pub fn new(
        mode: CombineMode,
        sources: Vec<(Box<dyn SampleSource>, f64)>,
        speed: f64,
        bufsize: usize,
    ) -> Result<Self> {
        assert!(!sources.is_empty(), "combiner needs at least one input");

        let first = sources[0].0.info();
        if !matches!(mode, CombineMode::Sequence) {
            if sources.iter().any(|(s, _)| s.info().rate != first.rate) {
                return Err(Error::RateMismatch);
            }
        }

        let channels = match mode {
            CombineMode::Sequence => first.channels,
            CombineMode::Concatenate => {
                if sources.iter().any(|(s, _)| s.info().channels != first.channels) {
                    return Err(Error::ChannelMismatch);
                }
                first.channels
            }
            CombineMode::Mix => {
                let max = sources
                    .iter()
                    .map(|(s, _)| s.info().channels)
                    .max()
                    .unwrap_or(1);
                if sources.iter().any(|(s, _)| s.info().channels != max) {
                    tracing::warn!("mixed inputs have differing channel counts");
                }
                max
            }
            CombineMode::Merge => sources.iter().map(|(s, _)| s.info().channels).sum(),
        };

        let rate = (f64::from(first.rate) * speed).round() as u32;
        let scratch = if mode.is_serial() {
            Vec::new()
        } else {
            sources.iter().map(|_| vec![0; bufsize]).collect()
        };
        let tick_wide = vec![0; sources.len()];
        let inputs = sources
            .into_iter()
            .map(|(source, volume)| Input {
                source,
                volume,
                volume_clips: 0,
                done: false,
            })
            .collect();

        Ok(Self {
            mode,
            info: StreamInfo::new(rate, channels),
            inputs,
            current: 0,
            scratch,
            tick_wide,
            mixing_clips: 0,
            read_wide: 0,
        })
    }

    /// The authoritative signal of the stream entering slot 0.
    pub fn info(&self) -> StreamInfo {
        self.info
    }

    /// Produce one tick of wide samples into `dst`.
    ///
    /// Returns the number of wide samples produced; 0 is end of input.
    pub fn combine_next(&mut self, dst: &mut [Sample]) -> Result<usize> {
        let wide = if self.mode.is_serial() {
            self.next_serial(dst)?
        } else {
            self.next_parallel(dst)?
        };
        self.read_wide += wide as u64;
        Ok(wide)
    }

    fn next_serial(&mut self, dst: &mut [Sample]) -> Result<usize> {
        let channels = self.info.channels as usize;
        let want = dst.len() / channels * channels;
        loop {
            let input = &mut self.inputs[self.current];
            let n = input.source.read(&mut dst[..want])?;
            if n == 0 {
                if self.mode == CombineMode::Concatenate && self.current + 1 < self.inputs.len() {
                    self.current += 1;
                    continue;
                }
                return Ok(0);
            }
            let whole = n - n % channels;
            if whole < n {
                tracing::warn!(
                    extra = n - whole,
                    "input delivered a partial frame; dropping the stragglers"
                );
            }
            if input.volume != 1.0 {
                for s in &mut dst[..whole] {
                    *s = apply_volume(*s, input.volume, &mut input.volume_clips);
                }
            }
            return Ok(whole / channels);
        }
    }

    fn next_parallel(&mut self, dst: &mut [Sample]) -> Result<usize> {
        let channels = self.info.channels as usize;
        let want_wide = dst.len() / channels;

        // Pull a tick from every input that still has data.
        let mut out_wide = 0;
        for (i, input) in self.inputs.iter_mut().enumerate() {
            let in_channels = input.source.info().channels as usize;
            self.tick_wide[i] = 0;
            if input.done {
                continue;
            }
            let take = (want_wide * in_channels).min(self.scratch[i].len());
            let n = input.source.read(&mut self.scratch[i][..take])?;
            if n == 0 {
                input.done = true;
                continue;
            }
            if input.volume != 1.0 {
                for s in &mut self.scratch[i][..n] {
                    *s = apply_volume(*s, input.volume, &mut input.volume_clips);
                }
            }
            self.tick_wide[i] = n / in_channels;
            out_wide = out_wide.max(self.tick_wide[i]);
        }
        if out_wide == 0 {
            return Ok(0);
        }

        match self.mode {
            CombineMode::Mix => {
                for ws in 0..out_wide {
                    for ch in 0..channels {
                        let mut acc: i64 = 0;
                        for (i, input) in self.inputs.iter().enumerate() {
                            let in_channels = input.source.info().channels as usize;
                            if ws < self.tick_wide[i] && ch < in_channels {
                                acc += i64::from(self.scratch[i][ws * in_channels + ch]);
                            }
                        }
                        dst[ws * channels + ch] = clip_i64(acc, &mut self.mixing_clips);
                    }
                }
            }
            CombineMode::Merge => {
                for ws in 0..out_wide {
                    let mut offset = 0;
                    for (i, input) in self.inputs.iter().enumerate() {
                        let in_channels = input.source.info().channels as usize;
                        for ch in 0..in_channels {
                            // Exhausted inputs pad with silence to the
                            // longest input.
                            dst[ws * channels + offset + ch] = if ws < self.tick_wide[i] {
                                self.scratch[i][ws * in_channels + ch]
                            } else {
                                0
                            };
                        }
                        offset += in_channels;
                    }
                }
            }
            CombineMode::Sequence | CombineMode::Concatenate => unreachable!(),
        }
        Ok(out_wide)
    }

    /// Abandon the current input and move to the next (concatenate mode).
    ///
    /// Returns false when there is no further input.
    pub fn skip_current(&mut self) -> bool {
        if self.current + 1 < self.inputs.len() {
            self.current += 1;
            true
        } else {
            false
        }
    }

    /// Wide samples read so far, for progress reporting.
    pub fn read_wide_samples(&self) -> u64 {
        self.read_wide
    }

    /// Pre-set the read counter after a seek ahead of the loop.
    pub fn set_read_wide_samples(&mut self, wide: u64) {
        self.read_wide = wide;
    }

    /// Clips recorded while applying per-input volumes.
    pub fn volume_clips(&self) -> u64 {
        self.inputs.iter().map(|i| i.volume_clips).sum()
    }

    /// Clips the sources recorded while converting into the sample
    /// domain.
    pub fn source_clips(&self) -> u64 {
        self.inputs.iter().map(|i| i.source.clips()).sum()
    }

    /// Clips recorded while summing in mix mode.
    pub fn mixing_clips(&self) -> u64 {
        self.mixing_clips
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::SAMPLE_MAX;

    struct VecSource {
        info: StreamInfo,
        data: Vec<Sample>,
        pos: usize,
    }

    impl VecSource {
        fn new(rate: u32, channels: u32, data: Vec<Sample>) -> Box<Self> {
            Box::new(Self {
                info: StreamInfo::new(rate, channels),
                data,
                pos: 0,
            })
        }
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

    fn drive(combiner: &mut Combiner, bufsize: usize) -> Vec<Sample> {
        let mut dst = vec![0; bufsize];
        let channels = combiner.info().channels as usize;
        let mut out = Vec::new();
        loop {
            let wide = combiner.combine_next(&mut dst).unwrap();
            if wide == 0 {
                break;
            }
            out.extend_from_slice(&dst[..wide * channels]);
        }
        out
    }

    #[test]
    fn concatenate_joins_inputs() {
        let a = VecSource::new(8000, 1, vec![1, 2, 3]);
        let b = VecSource::new(8000, 1, vec![4, 5]);
        let mut c =
            Combiner::new(CombineMode::Concatenate, vec![(a, 1.0), (b, 1.0)], 1.0, 16).unwrap();
        assert_eq!(c.info(), StreamInfo::new(8000, 1));
        assert_eq!(drive(&mut c, 16), vec![1, 2, 3, 4, 5]);
        assert_eq!(c.read_wide_samples(), 5);
    }

    #[test]
    fn concatenate_rejects_channel_mismatch() {
        let a = VecSource::new(8000, 1, vec![]);
        let b = VecSource::new(8000, 2, vec![]);
        assert!(matches!(
            Combiner::new(CombineMode::Concatenate, vec![(a, 1.0), (b, 1.0)], 1.0, 16),
            Err(Error::ChannelMismatch)
        ));
    }

    #[test]
    fn parallel_modes_reject_rate_mismatch() {
        let a = VecSource::new(8000, 1, vec![]);
        let b = VecSource::new(44100, 1, vec![]);
        assert!(matches!(
            Combiner::new(CombineMode::Mix, vec![(a, 1.0), (b, 1.0)], 1.0, 16),
            Err(Error::RateMismatch)
        ));
    }

    #[test]
    fn mix_sums_and_saturates() {
        let a = VecSource::new(8000, 1, vec![100, SAMPLE_MAX, 5]);
        let b = VecSource::new(8000, 1, vec![200, SAMPLE_MAX]);
        let mut c = Combiner::new(CombineMode::Mix, vec![(a, 1.0), (b, 1.0)], 1.0, 16).unwrap();
        let out = drive(&mut c, 16);
        assert_eq!(out, vec![300, SAMPLE_MAX, 5]);
        assert_eq!(c.mixing_clips(), 1);
    }

    #[test]
    fn mix_uses_max_channels_and_missing_channels_add_nothing() {
        // Stereo + mono: mono contributes to channel 0 only.
        let st = VecSource::new(8000, 2, vec![10, 20, 30, 40]);
        let mo = VecSource::new(8000, 1, vec![1, 2]);
        let mut c = Combiner::new(CombineMode::Mix, vec![(st, 1.0), (mo, 1.0)], 1.0, 16).unwrap();
        assert_eq!(c.info().channels, 2);
        assert_eq!(drive(&mut c, 16), vec![11, 20, 32, 40]);
    }

    #[test]
    fn merge_stacks_channels_and_pads_short_inputs() {
        let a = VecSource::new(44100, 1, vec![1, 2, 3, 4]);
        let b = VecSource::new(44100, 1, vec![9, 8]);
        let mut c = Combiner::new(CombineMode::Merge, vec![(a, 1.0), (b, 1.0)], 1.0, 16).unwrap();
        assert_eq!(c.info().channels, 2);
        assert_eq!(drive(&mut c, 16), vec![1, 9, 2, 8, 3, 0, 4, 0]);
    }

    #[test]
    fn volume_is_applied_per_input() {
        let a = VecSource::new(8000, 1, vec![1000, -1000]);
        let mut c = Combiner::new(CombineMode::Sequence, vec![(a, 0.5)], 1.0, 16).unwrap();
        assert_eq!(drive(&mut c, 16), vec![500, -500]);
        assert_eq!(c.volume_clips(), 0);
    }

    #[test]
    fn speed_scales_the_nominal_rate() {
        let a = VecSource::new(44100, 1, vec![0; 8]);
        let c = Combiner::new(CombineMode::Sequence, vec![(a, 1.0)], 1.5, 16).unwrap();
        assert_eq!(c.info().rate, 66150);
    }

    #[test]
    fn mix_of_identical_inputs_with_auto_volume_is_the_mean() {
        let data: Vec<Sample> = vec![400, -800, 1200, 0];
        let a = VecSource::new(8000, 1, data.clone());
        let b = VecSource::new(8000, 1, data.clone());
        let mut c = Combiner::new(CombineMode::Mix, vec![(a, 0.5), (b, 0.5)], 1.0, 16).unwrap();
        assert_eq!(drive(&mut c, 16), data);
        assert_eq!(c.mixing_clips(), 0);
        assert_eq!(c.volume_clips(), 0);
    }
}
