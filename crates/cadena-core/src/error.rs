//! Error types for the pipeline engine.

use thiserror::Error;

/// Errors raised by the combiner, planner, and scheduler.
#[derive(Debug, Error)]
pub enum Error {
    /// No effect with the given name exists.
    #[error("unknown effect: {0}")]
    UnknownEffect(String),

    /// An effect rejected its arguments.
    #[error("effect '{effect}': {message}\nusage: {usage}")]
    EffectUsage {
        /// Effect name.
        effect: String,
        /// What was wrong.
        message: String,
        /// The effect's usage string.
        usage: String,
    },

    /// An effect failed while starting or processing.
    #[error("effect '{effect}': {message}")]
    EffectRuntime {
        /// Effect name.
        effect: String,
        /// What went wrong.
        message: String,
    },

    /// An effect neither consumed nor produced samples.
    #[error("effect '{0}' took no samples and gave no samples")]
    Deadlock(String),

    /// The chain would exceed the slot limit.
    #[error("too many effects ({0} max)")]
    TooManyEffects(usize),

    /// More than one user effect changes the channel count.
    #[error("cannot specify multiple effects that change the channel count")]
    MultipleChannelEffects,

    /// Inputs disagree on sample rate where they must not.
    #[error("input files must have the same sample rate")]
    RateMismatch,

    /// Inputs disagree on channel count where they must not.
    #[error("input files must have the same number of channels")]
    ChannelMismatch,

    /// A source handle failed to deliver samples.
    #[error("input: {0}")]
    Source(String),

    /// The sink handle failed to accept samples.
    #[error("output: {0}")]
    Sink(String),
}

/// Convenience result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
