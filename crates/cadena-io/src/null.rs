//! The null format backing `-n`/`-e` placeholder files.
//!
//! Reads produce immediate end-of-stream (effects that synthesize audio
//! do so in their drain phase); writes are counted and discarded.

use cadena_core::{Sample, SignalInfo};

use crate::Result;
use crate::format::{FormatReader, FormatWriter};

const DEFAULT_RATE: u32 = 48000;

/// A null input: correct signal, no samples.
pub struct NullInput {
    signal: SignalInfo,
}

/// Open a null input, defaulting unset rate/channels.
pub fn open_read(hints: &SignalInfo) -> Box<dyn FormatReader> {
    let mut signal = hints.clone();
    signal.rate.get_or_insert(DEFAULT_RATE);
    signal.channels.get_or_insert(1);
    Box::new(NullInput { signal })
}

impl FormatReader for NullInput {
    fn signal(&self) -> &SignalInfo {
        &self.signal
    }

    fn length_samples(&self) -> Option<u64> {
        None
    }

    fn read(&mut self, _buf: &mut [Sample]) -> Result<usize> {
        Ok(0)
    }
}

/// A null output: swallows samples, keeps count.
pub struct NullOutput {
    signal: SignalInfo,
    written: u64,
}

/// Open a null output.
pub fn open_write(signal: &SignalInfo) -> Box<dyn FormatWriter> {
    let mut signal = signal.clone();
    signal.rate.get_or_insert(DEFAULT_RATE);
    signal.channels.get_or_insert(1);
    Box::new(NullOutput { signal, written: 0 })
}

impl FormatWriter for NullOutput {
    fn signal(&self) -> &SignalInfo {
        &self.signal
    }

    fn write(&mut self, buf: &[Sample]) -> Result<usize> {
        self.written += buf.len() as u64;
        Ok(buf.len())
    }

    fn finalize(&mut self) -> Result<()> {
        tracing::debug!(samples = self.written, "null output discarded");
        Ok(())
    }
}
