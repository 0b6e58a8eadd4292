//! cadena-effects: the built-in effects.
//!
//! Every effect implements `cadena_core::EffectHandler`. The set is small
//! but covers what the pipeline itself needs:
//!
//! - [`Vol`]: scalar gain with clip accounting
//! - [`Trim`]: start/length trimming, cooperating with the driver's seek
//!   optimization
//! - [`Pad`]: trailing silence, produced during the drain phase
//! - [`Rate`]: the planner's default rate adapter (linear interpolation)
//! - [`Channels`]: the planner's default channel adapter
//! - [`Speed`]: pitch/tempo factor, resolved entirely at plan time
//!
//! [`Registry`] maps names to descriptors and factories; it implements
//! `cadena_core::EffectFactory` for the planner.

mod channels;
mod pad;
mod parse;
mod rate;
mod registry;
mod speed;
mod trim;
mod vol;

pub use channels::Channels;
pub use pad::Pad;
pub use parse::{Position, parse_gain};
pub use rate::Rate;
pub use registry::{EffectDescriptor, Registry};
pub use speed::Speed;
pub use trim::{Trim, start_offset as trim_start_offset};
pub use vol::Vol;
