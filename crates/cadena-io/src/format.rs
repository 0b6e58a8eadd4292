//! Format handle traits and the open path.

use cadena_core::{Encoding, Sample, SampleSize, SignalInfo};

use crate::{Error, Result, device, null, raw, wav};

/// An opened, readable audio stream.
pub trait FormatReader {
    /// The resolved signal description.
    fn signal(&self) -> &SignalInfo;

    /// Total length in samples (flat, across channels), if known.
    fn length_samples(&self) -> Option<u64>;

    /// Comment metadata attached to the stream.
    fn comment(&self) -> Option<&str> {
        None
    }

    /// Whether [`seek`](Self::seek) is supported.
    fn seekable(&self) -> bool {
        false
    }

    /// Whether this stream is an audio device rather than a file.
    fn is_device(&self) -> bool {
        false
    }

    /// Read up to `buf.len()` samples; 0 means end of stream.
    fn read(&mut self, buf: &mut [Sample]) -> Result<usize>;

    /// Position the stream at an absolute flat-sample offset.
    fn seek(&mut self, sample: u64) -> Result<()> {
        let _ = sample;
        Err(Error::NotSeekable)
    }

    /// Saturation events recorded while widening samples into the
    /// engine's domain.
    fn clips(&self) -> u64 {
        0
    }
}

/// An opened, writable audio stream.
pub trait FormatWriter {
    /// The signal description being written.
    fn signal(&self) -> &SignalInfo;

    /// Whether this stream is an audio device rather than a file.
    fn is_device(&self) -> bool {
        false
    }

    /// Write samples, returning how many were accepted.
    fn write(&mut self, buf: &[Sample]) -> Result<usize>;

    /// Flush and close the stream, patching headers where the container
    /// needs it.
    fn finalize(&mut self) -> Result<()>;

    /// Saturation events recorded while narrowing samples for the
    /// container.
    fn clips(&self) -> u64 {
        0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormatKind {
    Wav,
    Raw,
    Null,
    Device,
}

/// Resolve a format from the explicit hint or the filename, folding
/// extension-implied encodings into the signal.
fn resolve(path: &str, type_hint: Option<&str>, signal: &mut SignalInfo) -> Result<FormatKind> {
    let name = type_hint
        .map(str::to_ascii_lowercase)
        .or_else(|| extension_of(path));

    let kind = match name.as_deref() {
        Some("wav") => FormatKind::Wav,
        Some("raw" | "pcm") => FormatKind::Raw,
        Some("ul" | "ulaw") => {
            signal.encoding.get_or_insert(Encoding::Ulaw);
            signal.size.get_or_insert(SampleSize::One);
            signal.rate.get_or_insert(8000);
            signal.channels.get_or_insert(1);
            FormatKind::Raw
        }
        Some("al" | "alaw") => {
            signal.encoding.get_or_insert(Encoding::Alaw);
            signal.size.get_or_insert(SampleSize::One);
            signal.rate.get_or_insert(8000);
            signal.channels.get_or_insert(1);
            FormatKind::Raw
        }
        Some("null") => FormatKind::Null,
        Some("device") => FormatKind::Device,
        _ => return Err(Error::UnknownType(path.to_string())),
    };
    Ok(kind)
}

fn extension_of(path: &str) -> Option<String> {
    std::path::Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Open a stream for reading.
///
/// `hints` carries command-line overrides; the opened handle's signal has
/// every field resolved. `-` reads standard input (raw and wav only).
pub fn open_read(
    path: &str,
    hints: &SignalInfo,
    type_hint: Option<&str>,
) -> Result<Box<dyn FormatReader>> {
    let mut signal = hints.clone();
    let kind = resolve(path, type_hint, &mut signal)?;
    tracing::debug!(path, kind = ?kind, "opening input");
    match kind {
        FormatKind::Wav => wav::open_read(path, &signal),
        FormatKind::Raw => raw::open_read(path, &signal),
        FormatKind::Null => Ok(null::open_read(&signal)),
        FormatKind::Device => device::open_read(&signal),
    }
}

/// Open a stream for writing.
///
/// `signal` must describe the stream completely enough for the format;
/// `length` is the expected total in samples (flat), 0/None when unknown.
/// `-` writes standard output (raw only — WAV needs to seek back and
/// patch its header).
pub fn open_write(
    path: &str,
    signal: &SignalInfo,
    type_hint: Option<&str>,
    length: Option<u64>,
    comment: Option<&str>,
) -> Result<Box<dyn FormatWriter>> {
    let mut signal = signal.clone();
    let kind = resolve(path, type_hint, &mut signal)?;
    tracing::debug!(path, kind = ?kind, length, "opening output");
    if comment.is_some() {
        // None of the built-in containers carries comment chunks.
        tracing::debug!(path, "comment metadata is not stored by this format");
    }
    match kind {
        FormatKind::Wav => wav::open_write(path, &signal),
        FormatKind::Raw => raw::open_write(path, &signal),
        FormatKind::Null => Ok(null::open_write(&signal)),
        FormatKind::Device => device::open_write(&signal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_resolution() {
        let mut sig = SignalInfo::default();
        assert_eq!(resolve("a.wav", None, &mut sig).unwrap(), FormatKind::Wav);
        assert_eq!(resolve("a.RAW", None, &mut sig).unwrap(), FormatKind::Raw);
        assert!(resolve("noext", None, &mut sig).is_err());
    }

    #[test]
    fn type_hint_wins_over_extension() {
        let mut sig = SignalInfo::default();
        assert_eq!(
            resolve("a.wav", Some("raw"), &mut sig).unwrap(),
            FormatKind::Raw
        );
    }

    #[test]
    fn ulaw_extension_implies_encoding() {
        let mut sig = SignalInfo::default();
        assert_eq!(resolve("x.ul", None, &mut sig).unwrap(), FormatKind::Raw);
        assert_eq!(sig.encoding, Some(Encoding::Ulaw));
        assert_eq!(sig.size, Some(SampleSize::One));
        assert_eq!(sig.rate, Some(8000));
    }

    #[test]
    fn explicit_hints_survive_extension_defaults() {
        let mut sig = SignalInfo {
            rate: Some(16000),
            ..SignalInfo::default()
        };
        resolve("x.ul", None, &mut sig).unwrap();
        assert_eq!(sig.rate, Some(16000));
    }
}
