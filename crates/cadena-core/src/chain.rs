//! Effect slots and the effect table.
//!
//! The chain is an ordered table of slots. Slot 0 is a sentinel: its
//! buffer holds freshly combined input samples and its cursors act as the
//! producer side of the pipeline. Real effects occupy slots 1 and up.
//!
//! Each slot's output buffer is a window with two cursors, `odone`
//! (consumed by the downstream neighbour) and `olen` (produced so far).
//! The invariant `0 <= odone <= olen <= bufsize` holds at all times.

use crate::effect::EffectHandler;
use crate::error::{Error, Result};
use crate::sample::Sample;
use crate::signal::StreamInfo;

/// Hard cap on chain length, the sentinel slot included.
pub const MAX_EFFECTS: usize = 16;

/// Default per-slot buffer capacity in samples.
pub const DEFAULT_BUFSIZE: usize = 8192;

/// Sentinel handler occupying slot 0. Never flowed.
struct InputSentinel;

impl EffectHandler for InputSentinel {
    fn name(&self) -> &'static str {
        "input"
    }
}

/// One node in the chain: a transform plus its output window.
pub struct EffectSlot {
    pub(crate) handler: Box<dyn EffectHandler>,
    /// Signal entering the slot.
    pub ininfo: StreamInfo,
    /// Signal leaving the slot.
    pub outinfo: StreamInfo,
    pub(crate) obuf: Vec<Sample>,
    pub(crate) olen: usize,
    pub(crate) odone: usize,
}

impl EffectSlot {
    fn new(handler: Box<dyn EffectHandler>, ininfo: StreamInfo, outinfo: StreamInfo, bufsize: usize) -> Self {
        Self {
            handler,
            ininfo,
            outinfo,
            obuf: vec![0; bufsize],
            olen: 0,
            odone: 0,
        }
    }

    /// The slot's effect name.
    pub fn name(&self) -> &'static str {
        self.handler.name()
    }

    /// Samples produced but not yet consumed downstream.
    pub fn remaining(&self) -> usize {
        self.olen - self.odone
    }

    pub(crate) fn space(&self) -> usize {
        self.obuf.len() - self.olen
    }

    /// Reset the window once everything produced has been consumed.
    pub(crate) fn reclaim(&mut self) {
        if self.odone == self.olen {
            self.odone = 0;
            self.olen = 0;
        }
    }
}

/// The effect table plus the scheduler state that drives it.
///
/// Built by the planner; driven by [`flow_out`](EffectChain::flow_out) and
/// [`drain_out`](EffectChain::drain_out) in `sched`.
pub struct EffectChain {
    pub(crate) slots: Vec<EffectSlot>,
    /// Right-channel twins, parallel to `slots`. Present where a handler
    /// lacking the multi-channel capability was fed more than one channel;
    /// the twin holds independent effect state, output is re-interleaved
    /// into the left slot's buffer.
    pub(crate) right: Vec<Option<Box<dyn EffectHandler>>>,
    /// Index of the earliest slot still producing.
    pub(crate) input_eff: usize,
    /// Whether that slot reported EOF on its last flow/drain call.
    pub(crate) input_eff_eof: bool,
    pub(crate) bufsize: usize,
    // Split-path scratch: de-interleaved input halves and output halves.
    pub(crate) ibufl: Vec<Sample>,
    pub(crate) ibufr: Vec<Sample>,
    pub(crate) obufl: Vec<Sample>,
    pub(crate) obufr: Vec<Sample>,
    /// Flat samples delivered to the sink.
    pub(crate) output_flat: u64,
}

impl EffectChain {
    /// Create a chain holding only the sentinel input slot.
    pub fn new(input: StreamInfo, bufsize: usize) -> Self {
        let sentinel = EffectSlot::new(Box::new(InputSentinel), input, input, bufsize);
        let half = bufsize / 2;
        Self {
            slots: vec![sentinel],
            right: vec![None],
            input_eff: 0,
            input_eff_eof: false,
            bufsize,
            ibufl: vec![0; half],
            ibufr: vec![0; half],
            obufl: vec![0; half],
            obufr: vec![0; half],
            output_flat: 0,
        }
    }

    /// Append a started effect to the table.
    pub(crate) fn push(
        &mut self,
        handler: Box<dyn EffectHandler>,
        right: Option<Box<dyn EffectHandler>>,
        ininfo: StreamInfo,
        outinfo: StreamInfo,
    ) -> Result<()> {
        if self.slots.len() >= MAX_EFFECTS {
            return Err(Error::TooManyEffects(MAX_EFFECTS));
        }
        self.slots
            .push(EffectSlot::new(handler, ininfo, outinfo, self.bufsize));
        self.right.push(right);
        Ok(())
    }

    /// Number of slots, the sentinel included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the chain holds no real effects.
    pub fn is_empty(&self) -> bool {
        self.slots.len() == 1
    }

    /// The signal the final slot delivers to the sink.
    pub fn output_info(&self) -> StreamInfo {
        self.slots[self.slots.len() - 1].outinfo
    }

    /// The signal entering slot 0.
    pub fn input_info(&self) -> StreamInfo {
        self.slots[0].ininfo
    }

    /// The sentinel slot's buffer, for the combiner to fill.
    ///
    /// Only valid to fill when the previous tick has been fully consumed;
    /// the driver loop guarantees this by not refilling until `flow_out`
    /// asks for more input.
    pub fn input_buf_mut(&mut self) -> &mut [Sample] {
        debug_assert_eq!(self.slots[0].remaining(), 0);
        &mut self.slots[0].obuf
    }

    /// Record that the combiner placed `nsamples` samples in slot 0.
    pub fn input_produced(&mut self, nsamples: usize) {
        debug_assert!(nsamples <= self.bufsize);
        self.slots[0].odone = 0;
        self.slots[0].olen = nsamples;
    }

    /// Total wide samples delivered to the sink so far.
    pub fn output_wide_samples(&self) -> u64 {
        self.output_flat / u64::from(self.output_info().channels)
    }

    /// Stop every effect, left table and right twins.
    pub fn stop_all(&mut self) {
        for slot in &mut self.slots[1..] {
            slot.handler.stop();
        }
        for twin in self.right.iter_mut().flatten() {
            twin.stop();
        }
    }

    /// Clip total across the table.
    ///
    /// Where a right twin exists, the left handler's count is added a
    /// second time and the twin's own counter is not consulted.
    pub fn effect_clips(&self) -> u64 {
        let mut total = 0;
        for (slot, twin) in self.slots.iter().zip(&self.right).skip(1) {
            total += slot.handler.clips();
            if twin.is_some() {
                total += slot.handler.clips();
            }
        }
        total
    }

    /// Slot views for diagnostics.
    pub fn slots(&self) -> &[EffectSlot] {
        &self.slots
    }
}
