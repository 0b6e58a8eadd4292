//! cadena-core: the audio pipeline engine.
//!
//! This crate holds the heart of the cadena driver: the machinery that
//! takes one or more opened input streams, combines them into a single
//! wide-sample stream, pulls that stream through a chain of stateful
//! effects, and hands the result to a sink.
//!
//! # Pieces
//!
//! - [`Sample`] and helpers: the full-scale `i32` sample domain with
//!   saturating, clip-counting arithmetic.
//! - [`SignalInfo`] / [`StreamInfo`]: partial and resolved stream
//!   descriptions.
//! - [`EffectHandler`]: the contract every effect implements, with
//!   capability flags and no-op defaults.
//! - [`Combiner`]: sequence / concatenate / mix / merge input combining.
//! - [`plan_chain`] / [`build_chain`]: default-adapter insertion and
//!   table assembly.
//! - [`EffectChain`]: the effect table plus the demand-driven pull
//!   scheduler (`flow_out` / `drain_out`).
//!
//! The engine is single-threaded and cooperative: nothing here blocks
//! except the source and sink handles it is given, and cancellation is a
//! sticky atomic flag checked between writes.
//!
//! Format handles and concrete effects live in `cadena-io` and
//! `cadena-effects`; the binary in `cadena-cli` wires everything up.

mod chain;
mod combiner;
mod effect;
mod error;
mod planner;
mod sample;
mod sched;
mod signal;

pub use chain::{DEFAULT_BUFSIZE, EffectChain, EffectSlot, MAX_EFFECTS};
pub use combiner::{CombineMode, Combiner, SampleSource};
pub use effect::{EffectFactory, EffectFlags, EffectHandler, FlowStatus, StartAction};
pub use error::{Error, Result};
pub use planner::{ChainPlan, PlannedEffect, build_chain, extract_speed, plan_chain};
pub use sample::{
    SAMPLE_MAX, SAMPLE_MIN, Sample, apply_volume, clip_f64, clip_i64, narrow_to_bits,
    sample_from_f64, sample_to_f64, widen_from_bits,
};
pub use sched::{PullStatus, SampleSink};
pub use signal::{Encoding, SampleSize, SignalInfo, StreamInfo};

/// Most inputs a single session will combine.
pub const MAX_INPUT_FILES: usize = 32;
