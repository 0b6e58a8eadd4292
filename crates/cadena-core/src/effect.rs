//! The effect-handler contract.
//!
//! Every transform in the chain implements [`EffectHandler`]. The trait is
//! object-safe and every lifecycle method has a sensible no-op default, so
//! an effect only writes the parts it needs: a pure pass-through proxy can
//! get away with `name()` alone.
//!
//! Lifecycle: `getopts` (once, at parse time) → `start` (per session, with
//! the resolved input signal) → any number of `flow` calls → `drain` calls
//! once upstream is exhausted → `stop`. Dropping the handler releases its
//! state.

use crate::error::{Error, Result};
use crate::sample::Sample;
use crate::signal::StreamInfo;

/// Capability flags describing how an effect interacts with the chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EffectFlags {
    /// Processes interleaved multi-channel audio itself. Effects without
    /// this flag are duplicated over split left/right buffers when fed
    /// more than one channel.
    pub mchan: bool,
    /// Changes the channel count.
    pub chan: bool,
    /// Changes the sample rate.
    pub rate: bool,
    /// Changes the total duration unpredictably; disables known-length
    /// reporting on the output.
    pub length: bool,
    /// A proxy with no audible effect; may be elided from the chain.
    pub null: bool,
    /// Kept for compatibility; use discouraged.
    pub deprecated: bool,
}

impl EffectFlags {
    /// No capabilities.
    pub const NONE: EffectFlags = EffectFlags {
        mchan: false,
        chan: false,
        rate: false,
        length: false,
        null: false,
        deprecated: false,
    };
}

/// What `start` decided about this instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartAction {
    /// Take part in the chain.
    Engage,
    /// The effect would do nothing with these parameters; remove the slot.
    Elide,
}

/// Whether an effect can produce more data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStatus {
    /// More data may follow.
    More,
    /// No further input will be consumed (flow) or output produced (drain).
    Eof,
}

/// A stateful audio transform.
///
/// `flow` and `drain` report progress through the `used`/`produced` out
/// parameters: on return, `used` is how many input samples were consumed
/// (at most `input.len()`) and `produced` how many output samples were
/// written (at most `output.len()`). Both are zeroed by the caller before
/// the call.
pub trait EffectHandler {
    /// The effect's registered name.
    fn name(&self) -> &'static str;

    /// One-line usage text for diagnostics.
    fn usage(&self) -> &'static str {
        ""
    }

    /// Capability flags.
    fn flags(&self) -> EffectFlags {
        EffectFlags::NONE
    }

    /// Parse command-line arguments. Called once before `start`.
    fn getopts(&mut self, args: &[String]) -> Result<()> {
        if args.is_empty() {
            Ok(())
        } else {
            Err(self.usage_error("takes no arguments"))
        }
    }

    /// Prepare for a session.
    ///
    /// `input` is the resolved signal entering the effect. `output` arrives
    /// pre-filled with the chain's expectation (rate/channel targets for
    /// RATE/CHAN effects) and may be adjusted to what the effect will
    /// actually deliver.
    fn start(&mut self, input: &StreamInfo, output: &mut StreamInfo) -> Result<StartAction> {
        let _ = (input, output);
        Ok(StartAction::Engage)
    }

    /// Consume input and produce output.
    ///
    /// The default is a transparent copy, which is what NULL-flagged
    /// proxies want.
    fn flow(
        &mut self,
        input: &[Sample],
        output: &mut [Sample],
        used: &mut usize,
        produced: &mut usize,
    ) -> Result<FlowStatus> {
        let n = input.len().min(output.len());
        output[..n].copy_from_slice(&input[..n]);
        *used = n;
        *produced = n;
        Ok(FlowStatus::More)
    }

    /// Produce residual output after input is exhausted.
    fn drain(&mut self, output: &mut [Sample], produced: &mut usize) -> Result<FlowStatus> {
        let _ = output;
        *produced = 0;
        Ok(FlowStatus::Eof)
    }

    /// End-of-session cleanup. State may be inspected afterwards.
    fn stop(&mut self) {}

    /// Saturation events this instance has recorded.
    fn clips(&self) -> u64 {
        0
    }

    /// Construct a usage error mentioning this effect.
    fn usage_error(&self, message: &str) -> Error {
        Error::EffectUsage {
            effect: self.name().to_string(),
            message: message.to_string(),
            usage: self.usage().to_string(),
        }
    }
}

/// Creates effect handlers by name.
///
/// Implemented by the effects library's registry; the planner uses it to
/// instantiate both user effects and the default rate/channel adapters.
pub trait EffectFactory {
    /// Create a fresh, unconfigured instance of the named effect.
    fn create(&self, name: &str) -> Option<Box<dyn EffectHandler>>;
}
