//! Trailing silence.

use cadena_core::{
    EffectFlags, EffectHandler, FlowStatus, Result, Sample, StartAction, StreamInfo,
};

use crate::parse::Position;

/// `pad LENGTH`: append LENGTH of silence once the input runs dry.
///
/// Flow is a pass-through; the silence is produced during the drain
/// phase.
pub struct Pad {
    length: Position,
    channels: usize,
    pad_left: u64,
}

impl Pad {
    /// An instance pending `getopts`.
    pub fn new() -> Self {
        Self {
            length: Position::Samples(0),
            channels: 1,
            pad_left: 0,
        }
    }
}

impl Default for Pad {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectHandler for Pad {
    fn name(&self) -> &'static str {
        "pad"
    }

    fn usage(&self) -> &'static str {
        "pad LENGTH"
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
            [length] => {
                self.length = Position::parse(length)
                    .ok_or_else(|| self.usage_error("bad LENGTH position"))?;
                Ok(())
            }
            _ => Err(self.usage_error("expects exactly one LENGTH argument")),
        }
    }

    fn start(&mut self, input: &StreamInfo, _output: &mut StreamInfo) -> Result<StartAction> {
        self.channels = input.channels as usize;
        self.pad_left = self.length.to_wide_samples(input.rate);
        if self.pad_left == 0 {
            return Ok(StartAction::Elide);
        }
        Ok(StartAction::Engage)
    }

    fn drain(&mut self, output: &mut [Sample], produced: &mut usize) -> Result<FlowStatus> {
        let out_wide = (output.len() / self.channels) as u64;
        let emit = self.pad_left.min(out_wide) as usize;
        output[..emit * self.channels].fill(0);
        self.pad_left -= emit as u64;
        *produced = emit * self.channels;
        if self.pad_left == 0 {
            Ok(FlowStatus::Eof)
        } else {
            Ok(FlowStatus::More)
        }
    }
}
