//! Start/length trimming.

use cadena_core::{
    EffectFlags, EffectHandler, FlowStatus, Result, Sample, StartAction, StreamInfo,
};

use crate::parse::Position;

/// `trim START [LENGTH]`: discard audio before START, keep at most
/// LENGTH thereafter.
///
/// The driver may seek a lone seekable input to START itself; it then
/// rewrites START to `0s`, and an instance with zero start and no length
/// elides from the chain.
pub struct Trim {
    start: Position,
    length: Option<Position>,
    channels: usize,
    skip_left: u64,
    take_left: Option<u64>,
}

impl Trim {
    /// An instance pending `getopts`.
    pub fn new() -> Self {
        Self {
            start: Position::Samples(0),
            length: None,
            channels: 1,
            skip_left: 0,
            take_left: None,
        }
    }
}

impl Default for Trim {
    fn default() -> Self {
        Self::new()
    }
}

/// The start offset a `trim` invocation would skip, in wide samples.
///
/// Used by the driver's seek optimization without instantiating the
/// effect.
pub fn start_offset(args: &[String], rate: u32) -> Option<u64> {
    let first = args.first()?;
    Position::parse(first).map(|p| p.to_wide_samples(rate))
}

impl EffectHandler for Trim {
    fn name(&self) -> &'static str {
        "trim"
    }

    fn usage(&self) -> &'static str {
        "trim START [LENGTH]"
    }

    fn flags(&self) -> EffectFlags {
        EffectFlags {
            mchan: true,
            length: true,
            ..EffectFlags::NONE
        }
    }

    fn getopts(&mut self, args: &[String]) -> Result<()> {
        match args {
            [start] => {
                self.start = Position::parse(start)
                    .ok_or_else(|| self.usage_error("bad START position"))?;
                self.length = None;
                Ok(())
            }
            [start, length] => {
                self.start = Position::parse(start)
                    .ok_or_else(|| self.usage_error("bad START position"))?;
                self.length = Some(
                    Position::parse(length)
                        .ok_or_else(|| self.usage_error("bad LENGTH position"))?,
                );
                Ok(())
            }
            _ => Err(self.usage_error("expects START and an optional LENGTH")),
        }
    }

    fn start(&mut self, input: &StreamInfo, _output: &mut StreamInfo) -> Result<StartAction> {
        self.channels = input.channels as usize;
        self.skip_left = self.start.to_wide_samples(input.rate);
        self.take_left = self.length.map(|l| l.to_wide_samples(input.rate));
        if self.skip_left == 0 && self.take_left.is_none() {
            return Ok(StartAction::Elide);
        }
        Ok(StartAction::Engage)
    }

    fn flow(
        &mut self,
        input: &[Sample],
        output: &mut [Sample],
        used: &mut usize,
        produced: &mut usize,
    ) -> Result<FlowStatus> {
        let ch = self.channels;
        let in_wide = input.len() / ch;
        let out_wide = output.len() / ch;

        let skip = (self.skip_left.min(in_wide as u64)) as usize;
        self.skip_left -= skip as u64;
        if self.skip_left > 0 {
            *used = skip * ch;
            *produced = 0;
            return Ok(FlowStatus::More);
        }

        let avail = in_wide - skip;
        let mut take = avail.min(out_wide);
        if let Some(left) = self.take_left {
            take = take.min(left as usize);
        }
        output[..take * ch].copy_from_slice(&input[skip * ch..(skip + take) * ch]);
        if let Some(left) = self.take_left.as_mut() {
            *left -= take as u64;
        }

        *used = (skip + take) * ch;
        *produced = take * ch;
        if self.take_left == Some(0) {
            Ok(FlowStatus::Eof)
        } else {
            Ok(FlowStatus::More)
        }
    }

    fn stop(&mut self) {
        if self.skip_left > 0 {
            tracing::warn!(
                wide_samples = self.skip_left,
                "trim start lies past the end of the input"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prepared(args: &[&str], rate: u32, channels: u32) -> Trim {
        let mut trim = Trim::new();
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        trim.getopts(&args).unwrap();
        let input = StreamInfo::new(rate, channels);
        let mut output = input;
        assert_eq!(
            trim.start(&input, &mut output).unwrap(),
            StartAction::Engage
        );
        trim
    }

    fn flow(trim: &mut Trim, input: &[Sample], out_len: usize) -> (Vec<Sample>, usize, FlowStatus) {
        let mut output = vec![0; out_len];
        let (mut used, mut produced) = (0, 0);
        let st = trim.flow(input, &mut output, &mut used, &mut produced).unwrap();
        output.truncate(produced);
        (output, used, st)
    }

    #[test]
    fn skips_start_then_passes() {
        // Sample-count form: 2 wide samples skipped.
        let mut trim = prepared(&["2s"], 8000, 1);
        let (out, used, st) = flow(&mut trim, &[1, 2, 3, 4, 5], 8);
        assert_eq!(out, vec![3, 4, 5]);
        assert_eq!(used, 5);
        assert_eq!(st, FlowStatus::More);
    }

    #[test]
    fn length_limits_and_reports_eof() {
        let mut trim = prepared(&["1s", "2s"], 8000, 1);
        let (out, _, st) = flow(&mut trim, &[1, 2, 3, 4, 5], 8);
        assert_eq!(out, vec![2, 3]);
        assert_eq!(st, FlowStatus::Eof);
    }

    #[test]
    fn operates_on_wide_samples() {
        // Stereo: skipping 1 wide sample drops one L/R pair.
        let mut trim = prepared(&["1s"], 8000, 2);
        let (out, _, _) = flow(&mut trim, &[1, 10, 2, 20, 3, 30], 8);
        assert_eq!(out, vec![2, 20, 3, 30]);
    }

    #[test]
    fn skip_spanning_multiple_buffers() {
        let mut trim = prepared(&["4s"], 8000, 1);
        let (out, used, _) = flow(&mut trim, &[1, 2, 3], 8);
        assert!(out.is_empty());
        assert_eq!(used, 3);
        let (out, _, _) = flow(&mut trim, &[4, 5, 6], 8);
        assert_eq!(out, vec![5, 6]);
    }

    #[test]
    fn seconds_convert_via_rate() {
        let mut trim = Trim::new();
        trim.getopts(&["1".to_string()]).unwrap();
        let input = StreamInfo::new(4, 1);
        let mut output = input;
        trim.start(&input, &mut output).unwrap();
        let (out, _, _) = flow(&mut trim, &[1, 2, 3, 4, 5, 6], 8);
        assert_eq!(out, vec![5, 6]);
    }

    #[test]
    fn zero_start_without_length_elides() {
        let mut trim = Trim::new();
        trim.getopts(&["0s".to_string()]).unwrap();
        let input = StreamInfo::new(8000, 1);
        let mut output = input;
        assert_eq!(trim.start(&input, &mut output).unwrap(), StartAction::Elide);
    }

    #[test]
    fn start_offset_reads_the_first_argument() {
        let args = vec!["10".to_string(), "5".to_string()];
        assert_eq!(start_offset(&args, 8000), Some(80000));
        assert_eq!(start_offset(&[], 8000), None);
    }
}
