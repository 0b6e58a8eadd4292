//! cadena: command-line audio pipeline driver.
//!
//! `cadena [gopts] [fopts] infile... [fopts] outfile [effect [effopts]]...`
//!
//! Reads one or more audio streams, combines them (sequence, concatenate,
//! mix, or merge), pulls the result through an effects chain, and writes a
//! single output. Invoked as `play` it appends the default audio device as
//! the output; as `rec` it prepends the default device as the input.

mod args;
mod interrupt;
mod progress;
mod replaygain;
mod session;

use std::process::ExitCode;

/// Driver-level error, carrying the exit status taxonomy: usage errors
/// exit 1, I/O and effect-runtime errors exit 2.
#[derive(Debug)]
pub enum AppError {
    /// Bad flags, missing files, illegal combine constraints.
    Usage(String),
    /// I/O or effect failure at open time or mid-session.
    Runtime(anyhow::Error),
}

impl AppError {
    /// Sort an engine error into the exit taxonomy.
    pub fn from_core(err: cadena_core::Error) -> Self {
        use cadena_core::Error;
        match err {
            Error::UnknownEffect(_)
            | Error::EffectUsage { .. }
            | Error::TooManyEffects(_)
            | Error::MultipleChannelEffects
            | Error::RateMismatch
            | Error::ChannelMismatch => AppError::Usage(err.to_string()),
            Error::EffectRuntime { .. }
            | Error::Deadlock(_)
            | Error::Source(_)
            | Error::Sink(_) => AppError::Runtime(err.into()),
        }
    }

    /// Sort a format-layer error into the exit taxonomy.
    pub fn from_io(err: cadena_io::Error) -> Self {
        use cadena_io::Error;
        match err {
            Error::UnknownType(_)
            | Error::IncompleteRawSignal
            | Error::UnsupportedEncoding(_)
            | Error::UnsupportedSize(_)
            | Error::Playlist { .. } => AppError::Usage(err.to_string()),
            other => AppError::Runtime(other.into()),
        }
    }
}

fn main() -> ExitCode {
    let argv: Vec<String> = std::env::args().collect();

    let invocation = match args::parse(&argv) {
        Ok(args::Parsed::Run(invocation)) => invocation,
        Ok(args::Parsed::Exit(code)) => return ExitCode::from(code),
        Err(err) => return fail(err),
    };

    init_tracing(invocation.opts.verbosity);
    tracing::debug!(
        inputs = invocation.inputs.len(),
        combine = invocation.opts.combine.name(),
        effects = invocation.effects.len(),
        "starting session"
    );

    match session::run(invocation) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => fail(err),
    }
}

fn fail(err: AppError) -> ExitCode {
    match err {
        AppError::Usage(message) => {
            eprintln!("cadena: {message}");
            ExitCode::from(1)
        }
        AppError::Runtime(err) => {
            eprintln!("cadena: {err:#}");
            ExitCode::from(2)
        }
    }
}

fn init_tracing(verbosity: u8) {
    use tracing_subscriber::EnvFilter;

    let default = match verbosity {
        0 | 1 => "error",
        2 => "warn",
        3 => "info",
        4 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .init();
}
