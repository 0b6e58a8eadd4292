//! cadena-io: the format layer.
//!
//! Opens files and devices as typed sample streams in the engine's
//! full-scale `i32` domain:
//!
//! - **WAV** via hound (PCM 8/16/24/32 and IEEE float)
//! - **raw** headerless audio (signed/unsigned PCM, float, G.711 µ-law
//!   and A-law), honoring the byte/bit/nibble reversal flags
//! - **null** for the `-n`/`-e` placeholder files
//! - **device**: the default audio device via cpal, bridged to the
//!   engine's blocking read/write model
//! - **playlists**: `.m3u` and `.pls` expansion
//!
//! Streams are opened with [`open_read`] / [`open_write`], which resolve
//! the format from an explicit type hint or the filename extension.

mod device;
mod format;
mod g711;
mod null;
mod playlist;
mod raw;
mod wav;

pub use format::{FormatReader, FormatWriter, open_read, open_write};
pub use playlist::{expand_playlist, is_playlist};

/// Error types for format-layer operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// WAV container error.
    #[error("WAV file error: {0}")]
    Wav(#[from] hound::Error),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file type could not be determined.
    #[error("cannot determine type of '{0}'; specify one with -t")]
    UnknownType(String),

    /// Raw audio was opened without a complete signal description.
    #[error("raw audio requires rate, channels, sample size, and encoding")]
    IncompleteRawSignal,

    /// The encoding is recognized but not handled by this format.
    #[error("unsupported encoding: {0}")]
    UnsupportedEncoding(&'static str),

    /// The size/encoding combination is not representable.
    #[error("unsupported sample size for {0} encoding")]
    UnsupportedSize(&'static str),

    /// Seek on a stream that cannot seek.
    #[error("stream is not seekable")]
    NotSeekable,

    /// No audio device is available.
    #[error("no audio device available")]
    NoDevice,

    /// Audio device stream failure.
    #[error("audio stream error: {0}")]
    Stream(String),

    /// Playlist file could not be parsed.
    #[error("playlist '{path}': {message}")]
    Playlist {
        /// The playlist file.
        path: String,
        /// What was wrong.
        message: String,
    },
}

/// Convenience result type for format-layer operations.
pub type Result<T> = std::result::Result<T, Error>;
