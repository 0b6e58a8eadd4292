//! Scalar gain with clip accounting.

use cadena_core::{
    EffectFlags, EffectHandler, FlowStatus, Result, Sample, apply_volume,
};

use crate::parse::parse_gain;

/// `vol GAIN[dB]`: multiply every sample by a factor, saturating.
pub struct Vol {
    gain: f64,
    clips: u64,
}

impl Vol {
    /// A unity-gain instance, pending `getopts`.
    pub fn new() -> Self {
        Self {
            gain: 1.0,
            clips: 0,
        }
    }
}

impl Default for Vol {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectHandler for Vol {
    fn name(&self) -> &'static str {
        "vol"
    }

    fn usage(&self) -> &'static str {
        "vol GAIN[dB]"
    }

    fn flags(&self) -> EffectFlags {
        EffectFlags {
            mchan: true,
            ..EffectFlags::NONE
        }
    }

    fn getopts(&mut self, args: &[String]) -> Result<()> {
        match args {
            [gain] => {
                self.gain = parse_gain(gain)
                    .ok_or_else(|| self.usage_error("gain must be a number or NdB"))?;
                Ok(())
            }
            _ => Err(self.usage_error("expects exactly one gain argument")),
        }
    }

    fn flow(
        &mut self,
        input: &[Sample],
        output: &mut [Sample],
        used: &mut usize,
        produced: &mut usize,
    ) -> Result<FlowStatus> {
        let n = input.len().min(output.len());
        for (out, &sample) in output[..n].iter_mut().zip(input) {
            *out = apply_volume(sample, self.gain, &mut self.clips);
        }
        *used = n;
        *produced = n;
        Ok(FlowStatus::More)
    }

    fn clips(&self) -> u64 {
        self.clips
    }
}
