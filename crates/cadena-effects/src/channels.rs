//! Channel-count adapter.

use cadena_core::{
    EffectFlags, EffectHandler, FlowStatus, Result, Sample, StartAction, StreamInfo,
};

/// `channels [N]`: remix to N channels (default: the output file's
/// count).
///
/// Reducing averages the input channels that fold onto each output
/// channel; increasing duplicates input channels cyclically.
pub struct Channels {
    target: Option<u32>,
    in_channels: usize,
    out_channels: usize,
}

impl Channels {
    /// An instance pending `getopts`.
    pub fn new() -> Self {
        Self {
            target: None,
            in_channels: 1,
            out_channels: 1,
        }
    }
}

impl Default for Channels {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectHandler for Channels {
    fn name(&self) -> &'static str {
        "channels"
    }

    fn usage(&self) -> &'static str {
        "channels [N]"
    }

    fn flags(&self) -> EffectFlags {
        EffectFlags {
            mchan: true,
            chan: true,
            ..EffectFlags::NONE
        }
    }

    fn getopts(&mut self, args: &[String]) -> Result<()> {
        match args {
            [] => Ok(()),
            [n] => {
                let channels = n.parse::<u32>().ok().filter(|c| *c > 0);
                self.target = Some(channels.ok_or_else(|| self.usage_error("bad channel count"))?);
                Ok(())
            }
            _ => Err(self.usage_error("expects at most one channel count")),
        }
    }

    fn start(&mut self, input: &StreamInfo, output: &mut StreamInfo) -> Result<StartAction> {
        let out = self.target.unwrap_or(output.channels);
        if out == input.channels {
            return Ok(StartAction::Elide);
        }
        output.channels = out;
        self.in_channels = input.channels as usize;
        self.out_channels = out as usize;
        Ok(StartAction::Engage)
    }

    fn flow(
        &mut self,
        input: &[Sample],
        output: &mut [Sample],
        used: &mut usize,
        produced: &mut usize,
    ) -> Result<FlowStatus> {
        let in_ch = self.in_channels;
        let out_ch = self.out_channels;
        let frames = (input.len() / in_ch).min(output.len() / out_ch);

        for f in 0..frames {
            let src = &input[f * in_ch..(f + 1) * in_ch];
            let dst = &mut output[f * out_ch..(f + 1) * out_ch];
            if out_ch < in_ch {
                // Average the input channels folding onto each output.
                for (o, slot) in dst.iter_mut().enumerate() {
                    let mut acc: i64 = 0;
                    let mut count: i64 = 0;
                    let mut c = o;
                    while c < in_ch {
                        acc += i64::from(src[c]);
                        count += 1;
                        c += out_ch;
                    }
                    *slot = (acc / count) as Sample;
                }
            } else {
                for (o, slot) in dst.iter_mut().enumerate() {
                    *slot = src[o % in_ch];
                }
            }
        }

        *used = frames * in_ch;
        *produced = frames * out_ch;
        Ok(FlowStatus::More)
    }
}
