//! The pull scheduler.
//!
//! Data is driven through the chain in reverse: each pass walks from the
//! sink end toward the current producer, flowing an effect only when its
//! predecessor holds unconsumed samples, and breaks out as soon as a slot
//! finishes a buffer so the downstream side can pull it. Buffers are not
//! queues — each slot owns a single window with produced/consumed cursors,
//! reused once the downstream neighbour catches up.
//!
//! `input_eff` tracks the earliest slot still producing. While it is 0 the
//! sentinel slot feeds the chain and the caller refills it from the
//! combiner; once an effect reports EOF mid-chain (or the caller enters
//! drain), `input_eff` moves forward and the remaining effects are drained
//! one by one until the pipeline is dry.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::chain::{EffectChain, EffectSlot};
use crate::effect::FlowStatus;
use crate::error::{Error, Result};
use crate::sample::Sample;

/// What the scheduler needs next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullStatus {
    /// Slot 0 is empty; refill it from the combiner and call again.
    NeedInput,
    /// No further input reads are needed; the session is over.
    Eof,
}

/// Receives the final slot's output.
pub trait SampleSink {
    /// Write samples, returning how many were accepted. Zero with an `Ok`
    /// return is treated as a sink failure by the scheduler.
    fn write(&mut self, buf: &[Sample]) -> Result<usize>;
}

/// De-interleave a stereo run into left/right halves.
///
/// The left half receives the extra sample when the run length is odd.
fn deinterleave(src: &[Sample], left: &mut [Sample], right: &mut [Sample]) {
    for (i, pair) in src.chunks(2).enumerate() {
        left[i] = pair[0];
        if let Some(&r) = pair.get(1) {
            right[i] = r;
        }
    }
}

/// Re-interleave split halves into `dst`, returning samples written.
///
/// The halves are expected to be equal; should they diverge, the paired
/// prefix is interleaved and the longer side's tail is appended, which
/// shifts channels downstream.
fn interleave(dst: &mut [Sample], left: &[Sample], right: &[Sample]) -> usize {
    let pairs = left.len().min(right.len());
    let mut w = 0;
    for i in 0..pairs {
        dst[w] = left[i];
        dst[w + 1] = right[i];
        w += 2;
    }
    for &s in &left[pairs..] {
        dst[w] = s;
        w += 1;
    }
    for &s in &right[pairs..] {
        dst[w] = s;
        w += 1;
    }
    w
}

impl EffectChain {
    /// Flow data through the chain and out to `sink` until every slot is
    /// empty or the pipeline signals EOF.
    ///
    /// Returns [`PullStatus::NeedInput`] when slot 0 has been consumed and
    /// the combiner should provide the next tick, [`PullStatus::Eof`] when
    /// no further input reads are needed.
    pub fn flow_out(&mut self, sink: &mut dyn SampleSink, abort: &AtomicBool) -> Result<PullStatus> {
        loop {
            // Walk the chain backwards, pulling from the sink end.
            let mut e = self.slots.len() - 1;
            while e >= self.input_eff.max(1) {
                let at_eof_producer = e == self.input_eff && self.input_eff_eof;
                if !at_eof_producer && self.slots[e - 1].remaining() > 0 {
                    if self.flow_one(e)? == FlowStatus::Eof {
                        self.input_eff = e;
                        // The effect may still have residue to drain.
                        self.input_eff_eof = false;
                    }
                }
                // A finished buffer is flushed downstream before anything
                // upstream runs again, so an effect normally flows into an
                // empty window.
                if self.slots[e].remaining() > 0 {
                    break;
                }
                e -= 1;
            }

            // Deliver whatever reached the final slot.
            if self.slots[self.slots.len() - 1].remaining() > 0 {
                if self.write_out(sink, abort)? {
                    return Ok(PullStatus::Eof);
                }
            }

            // Release fully consumed windows for reuse.
            for slot in &mut self.slots {
                slot.reclaim();
            }

            // Anything still in flight? Only whole output frames count.
            let out_channels = self.output_info().channels as usize;
            let mut havedata = false;
            for slot in &self.slots[self.input_eff..] {
                let rem = slot.remaining();
                if rem >= out_channels {
                    havedata = true;
                    break;
                }
                if rem > 0 {
                    tracing::warn!(
                        effect = slot.name(),
                        remaining = rem,
                        "buffer holds an incomplete frame"
                    );
                }
            }
            if havedata {
                continue;
            }

            if self.input_eff > 0 {
                // Past the producer slot: drain effects in order.
                if self.input_eff >= self.slots.len() {
                    return Ok(PullStatus::Eof);
                }
                if self.input_eff_eof {
                    self.input_eff += 1;
                    self.input_eff_eof = false;
                    continue;
                }
                let (produced, status) = self.drain_one(self.input_eff)?;
                if produced == 0 {
                    self.input_eff += 1;
                    self.input_eff_eof = false;
                } else {
                    self.input_eff_eof = status == FlowStatus::Eof;
                }
                continue;
            }

            return Ok(PullStatus::NeedInput);
        }
    }

    /// Drain residual samples out of every effect and deliver them.
    ///
    /// Called once the combiner reports end of input.
    pub fn drain_out(&mut self, sink: &mut dyn SampleSink, abort: &AtomicBool) -> Result<()> {
        if self.input_eff == 0 {
            self.input_eff = 1;
            self.input_eff_eof = false;
        }
        self.flow_out(sink, abort).map(|_| ())
    }

    /// Flow one effect: consume from slot `e - 1`, append to slot `e`.
    fn flow_one(&mut self, e: usize) -> Result<FlowStatus> {
        self.slots[e].reclaim();

        let (head, tail) = self.slots.split_at_mut(e);
        let prev = &mut head[e - 1];
        let slot = &mut tail[0];

        let status;
        let used;
        let produced;

        if let Some(twin) = self.right[e].as_mut() {
            // Split path: the handler is single-channel but the stream is
            // not. Feed de-interleaved halves to two independent instances
            // and re-interleave their output.
            let avail = prev.remaining();
            let take_l = (avail + 1) / 2;
            let take_r = avail / 2;
            deinterleave(
                &prev.obuf[prev.odone..prev.olen],
                &mut self.ibufl[..take_l],
                &mut self.ibufr[..take_r],
            );
            let half = slot.space() / 2;
            let (mut used_l, mut prod_l) = (0, 0);
            let st_l = slot.handler.flow(
                &self.ibufl[..take_l],
                &mut self.obufl[..half],
                &mut used_l,
                &mut prod_l,
            )?;
            let (mut used_r, mut prod_r) = (0, 0);
            let st_r = twin.flow(
                &self.ibufr[..take_r],
                &mut self.obufr[..half],
                &mut used_r,
                &mut prod_r,
            )?;
            if prod_l != prod_r {
                tracing::warn!(
                    effect = slot.handler.name(),
                    left = prod_l,
                    right = prod_r,
                    "split channels produced unequal sample counts"
                );
            }
            let n = interleave(
                &mut slot.obuf[slot.olen..],
                &self.obufl[..prod_l],
                &self.obufr[..prod_r],
            );
            slot.olen += n;
            prev.odone += used_l + used_r;
            used = used_l + used_r;
            produced = prod_l + prod_r;
            status = if st_l == FlowStatus::Eof || st_r == FlowStatus::Eof {
                FlowStatus::Eof
            } else {
                FlowStatus::More
            };
        } else {
            let (mut u, mut p) = (0, 0);
            status = slot.handler.flow(
                &prev.obuf[prev.odone..prev.olen],
                &mut slot.obuf[slot.olen..],
                &mut u,
                &mut p,
            )?;
            prev.odone += u;
            slot.olen += p;
            used = u;
            produced = p;
        }

        debug_assert!(prev.odone <= prev.olen);
        debug_assert!(slot.olen <= slot.obuf.len());

        if status != FlowStatus::Eof && used == 0 && produced == 0 {
            return Err(Error::Deadlock(slot.handler.name().to_string()));
        }
        Ok(status)
    }

    /// Drain one effect into its own buffer.
    fn drain_one(&mut self, e: usize) -> Result<(usize, FlowStatus)> {
        self.slots[e].reclaim();
        let slot = &mut self.slots[e];

        if let Some(twin) = self.right[e].as_mut() {
            let half = slot.space() / 2;
            let (mut prod_l, mut prod_r) = (0, 0);
            let st_l = slot.handler.drain(&mut self.obufl[..half], &mut prod_l)?;
            let st_r = twin.drain(&mut self.obufr[..half], &mut prod_r)?;
            if prod_l != prod_r {
                tracing::warn!(
                    effect = slot.handler.name(),
                    left = prod_l,
                    right = prod_r,
                    "split channels drained unequal sample counts"
                );
            }
            let n = interleave(
                &mut slot.obuf[slot.olen..],
                &self.obufl[..prod_l],
                &self.obufr[..prod_r],
            );
            slot.olen += n;
            let status = if st_l == FlowStatus::Eof || st_r == FlowStatus::Eof {
                FlowStatus::Eof
            } else {
                FlowStatus::More
            };
            Ok((n, status))
        } else {
            let mut produced = 0;
            let status = slot
                .handler
                .drain(&mut slot.obuf[slot.olen..], &mut produced)?;
            slot.olen += produced;
            Ok((produced, status))
        }
    }

    /// Write the final slot's window to the sink, retrying partial writes.
    ///
    /// Returns `Ok(true)` when a user abort interrupted the write.
    fn write_out(&mut self, sink: &mut dyn SampleSink, abort: &AtomicBool) -> Result<bool> {
        let last = self.slots.len() - 1;
        let slot: &mut EffectSlot = &mut self.slots[last];
        while slot.remaining() > 0 {
            if abort.load(Ordering::Relaxed) {
                return Ok(true);
            }
            let n = sink.write(&slot.obuf[slot.odone..slot.olen])?;
            if n == 0 {
                return Err(Error::Sink("sink accepted no samples".to_string()));
            }
            slot.odone += n;
            self.output_flat += n as u64;
        }
        Ok(false)
    }
}
