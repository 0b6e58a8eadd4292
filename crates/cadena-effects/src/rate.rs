//! Linear-interpolation resampler.
//!
//! The planner's default rate adapter. Deliberately single-channel: on a
//! stereo stream the chain duplicates it over split left/right buffers,
//! which keeps the interpolation state per channel.

use cadena_core::{
    EffectFlags, EffectHandler, FlowStatus, Result, Sample, StartAction, StreamInfo, clip_f64,
};

/// `rate [HZ]`: resample to HZ (default: the output file's rate).
pub struct Rate {
    target: Option<u32>,
    /// Input samples per output sample.
    step: f64,
    /// Fractional position between `x0` and `x1`.
    t: f64,
    x0: Option<f64>,
    x1: Option<f64>,
    clips: u64,
}

impl Rate {
    /// An instance pending `getopts`.
    pub fn new() -> Self {
        Self {
            target: None,
            step: 1.0,
            t: 0.0,
            x0: None,
            x1: None,
            clips: 0,
        }
    }
}

impl Default for Rate {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectHandler for Rate {
    fn name(&self) -> &'static str {
        "rate"
    }

    fn usage(&self) -> &'static str {
        "rate [HZ]"
    }

    fn flags(&self) -> EffectFlags {
        EffectFlags {
            rate: true,
            ..EffectFlags::NONE
        }
    }

    fn getopts(&mut self, args: &[String]) -> Result<()> {
        match args {
            [] => Ok(()),
            [hz] => {
                let rate = hz.parse::<u32>().ok().filter(|r| *r > 0);
                self.target = Some(rate.ok_or_else(|| self.usage_error("bad rate"))?);
                Ok(())
            }
            _ => Err(self.usage_error("expects at most one rate argument")),
        }
    }

    fn start(&mut self, input: &StreamInfo, output: &mut StreamInfo) -> Result<StartAction> {
        let out_rate = self.target.unwrap_or(output.rate);
        if out_rate == input.rate {
            return Ok(StartAction::Elide);
        }
        output.rate = out_rate;
        self.step = f64::from(input.rate) / f64::from(out_rate);
        self.t = 0.0;
        self.x0 = None;
        self.x1 = None;
        Ok(StartAction::Engage)
    }

    fn flow(
        &mut self,
        input: &[Sample],
        output: &mut [Sample],
        used: &mut usize,
        produced: &mut usize,
    ) -> Result<FlowStatus> {
        let mut i = 0;
        let mut o = 0;
        loop {
            // Keep the two-sample window primed.
            if self.x0.is_none() {
                if i >= input.len() {
                    break;
                }
                self.x0 = Some(f64::from(input[i]));
                i += 1;
                continue;
            }
            if self.x1.is_none() {
                if i >= input.len() {
                    break;
                }
                self.x1 = Some(f64::from(input[i]));
                i += 1;
                continue;
            }
            if self.t >= 1.0 {
                self.t -= 1.0;
                self.x0 = self.x1.take();
                continue;
            }
            if o >= output.len() {
                break;
            }
            let x0 = self.x0.unwrap();
            let x1 = self.x1.unwrap();
            output[o] = clip_f64(x0 + self.t * (x1 - x0), &mut self.clips);
            o += 1;
            self.t += self.step;
        }
        *used = i;
        *produced = o;
        Ok(FlowStatus::More)
    }

    fn clips(&self) -> u64 {
        self.clips
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prepared(in_rate: u32, out_rate: u32) -> Rate {
        let mut rate = Rate::new();
        rate.getopts(&[]).unwrap();
        let input = StreamInfo::new(in_rate, 1);
        let mut output = StreamInfo::new(out_rate, 1);
        assert_eq!(
            rate.start(&input, &mut output).unwrap(),
            StartAction::Engage
        );
        assert_eq!(output.rate, out_rate);
        rate
    }

    fn run(rate: &mut Rate, input: &[Sample]) -> Vec<Sample> {
        let mut out = Vec::new();
        let mut pos = 0;
        while pos < input.len() {
            let end = (pos + 7).min(input.len());
            let mut buf = [0; 16];
            let (mut used, mut produced) = (0, 0);
            rate.flow(&input[pos..end], &mut buf, &mut used, &mut produced)
                .unwrap();
            out.extend_from_slice(&buf[..produced]);
            pos += used;
            if used == 0 && produced == 0 {
                break;
            }
        }
        out
    }

    #[test]
    fn identical_rates_elide() {
        let mut rate = Rate::new();
        let input = StreamInfo::new(44100, 1);
        let mut output = StreamInfo::new(44100, 1);
        assert_eq!(rate.start(&input, &mut output).unwrap(), StartAction::Elide);
    }

    #[test]
    fn downsampling_halves_the_sample_count() {
        let mut rate = prepared(8000, 4000);
        let input: Vec<Sample> = (0..100).collect();
        let out = run(&mut rate, &input);
        assert!((out.len() as i64 - 50).abs() <= 1);
        // Every output lands on an even input index.
        for (k, &s) in out.iter().enumerate() {
            assert_eq!(s, (2 * k) as Sample);
        }
    }

    #[test]
    fn upsampling_interpolates_between_samples() {
        let mut rate = prepared(4000, 8000);
        let out = run(&mut rate, &[0, 100, 200]);
        assert_eq!(&out[..4], &[0, 50, 100, 150]);
    }

    #[test]
    fn explicit_target_overrides_the_output_rate() {
        let mut rate = Rate::new();
        rate.getopts(&["16000".to_string()]).unwrap();
        let input = StreamInfo::new(8000, 1);
        let mut output = StreamInfo::new(44100, 1);
        rate.start(&input, &mut output).unwrap();
        assert_eq!(output.rate, 16000);
    }

    #[test]
    fn output_count_tracks_the_ratio() {
        let mut rate = prepared(44100, 22050);
        let input: Vec<Sample> = vec![7; 4410];
        let out = run(&mut rate, &input);
        let expected = 4410 / 2;
        assert!((out.len() as i64 - expected as i64).abs() <= 1);
    }
}
