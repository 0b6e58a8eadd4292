//! WAV reading and writing via hound.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read};

use cadena_core::{
    Encoding, Sample, SampleSize, SignalInfo, narrow_to_bits, sample_from_f64, sample_to_f64,
    widen_from_bits,
};
use hound::{SampleFormat, WavReader, WavWriter};

use crate::format::{FormatReader, FormatWriter};
use crate::{Error, Result};

enum Inner {
    /// Regular file; supports seeking.
    File(WavReader<BufReader<File>>),
    /// Standard input or another unseekable byte stream.
    Stream(WavReader<Box<dyn Read>>),
}

/// An opened WAV input.
pub struct WavInput {
    inner: Inner,
    signal: SignalInfo,
    length: u64,
    clips: u64,
}

/// Open a WAV file (or stdin when `path` is `-`) for reading.
pub fn open_read(path: &str, hints: &SignalInfo) -> Result<Box<dyn FormatReader>> {
    let inner = if path == "-" {
        let stdin: Box<dyn Read> = Box::new(io::stdin());
        Inner::Stream(WavReader::new(stdin)?)
    } else {
        Inner::File(WavReader::open(path)?)
    };

    let (spec, length) = match &inner {
        Inner::File(r) => (r.spec(), u64::from(r.len())),
        Inner::Stream(r) => (r.spec(), u64::from(r.len())),
    };

    if let Some(rate) = hints.rate {
        if rate != spec.sample_rate {
            tracing::warn!(
                hinted = rate,
                actual = spec.sample_rate,
                "rate hint ignored; the WAV header wins"
            );
        }
    }

    let signal = SignalInfo {
        rate: Some(spec.sample_rate),
        channels: Some(u32::from(spec.channels)),
        size: SampleSize::from_bytes(u32::from(spec.bits_per_sample.div_ceil(8))),
        encoding: Some(match spec.sample_format {
            SampleFormat::Float => Encoding::Float,
            SampleFormat::Int => Encoding::Signed,
        }),
        ..SignalInfo::default()
    };

    Ok(Box::new(WavInput {
        inner,
        signal,
        length,
        clips: 0,
    }))
}

fn read_samples<R: Read>(
    reader: &mut WavReader<R>,
    buf: &mut [Sample],
    clips: &mut u64,
) -> Result<usize> {
    let spec = reader.spec();
    let mut n = 0;
    match spec.sample_format {
        SampleFormat::Int => {
            let bits = u32::from(spec.bits_per_sample);
            let mut samples = reader.samples::<i32>();
            while n < buf.len() {
                match samples.next() {
                    Some(s) => {
                        buf[n] = widen_from_bits(s?, bits);
                        n += 1;
                    }
                    None => break,
                }
            }
        }
        SampleFormat::Float => {
            let mut samples = reader.samples::<f32>();
            while n < buf.len() {
                match samples.next() {
                    Some(s) => {
                        buf[n] = sample_from_f64(f64::from(s?), clips);
                        n += 1;
                    }
                    None => break,
                }
            }
        }
    }
    Ok(n)
}

impl FormatReader for WavInput {
    fn signal(&self) -> &SignalInfo {
        &self.signal
    }

    fn length_samples(&self) -> Option<u64> {
        Some(self.length)
    }

    fn seekable(&self) -> bool {
        matches!(self.inner, Inner::File(_))
    }

    fn read(&mut self, buf: &mut [Sample]) -> Result<usize> {
        match &mut self.inner {
            Inner::File(r) => read_samples(r, buf, &mut self.clips),
            Inner::Stream(r) => read_samples(r, buf, &mut self.clips),
        }
    }

    fn seek(&mut self, sample: u64) -> Result<()> {
        match &mut self.inner {
            Inner::File(r) => {
                let channels = u64::from(r.spec().channels);
                let frame = (sample / channels) as u32;
                r.seek(frame)?;
                Ok(())
            }
            Inner::Stream(_) => Err(Error::NotSeekable),
        }
    }

    fn clips(&self) -> u64 {
        self.clips
    }
}

/// An opened WAV output.
pub struct WavOutput {
    writer: Option<WavWriter<BufWriter<File>>>,
    signal: SignalInfo,
    bits: u32,
    float: bool,
    clips: u64,
}

/// Create a WAV file for writing.
///
/// The signal's size and encoding choose the container format: float is
/// written as IEEE float 32, everything else as PCM of the given width.
pub fn open_write(path: &str, signal: &SignalInfo) -> Result<Box<dyn FormatWriter>> {
    if path == "-" {
        // hound must seek back to patch the RIFF sizes.
        return Err(Error::Stream(
            "WAV output requires a seekable file; use -t raw for a pipe".to_string(),
        ));
    }

    let size = signal.size.unwrap_or(SampleSize::Two);
    let encoding = signal.encoding.unwrap_or(Encoding::Signed);
    let (bits, sample_format): (u32, SampleFormat) = match encoding {
        Encoding::Float => (32, SampleFormat::Float),
        Encoding::Signed | Encoding::Unsigned => match size {
            SampleSize::One => (8, SampleFormat::Int),
            SampleSize::Two => (16, SampleFormat::Int),
            SampleSize::Three => (24, SampleFormat::Int),
            SampleSize::Four => (32, SampleFormat::Int),
            SampleSize::Eight => return Err(Error::UnsupportedSize("WAV PCM")),
        },
        other => return Err(Error::UnsupportedEncoding(other.name())),
    };

    let rate = signal.rate.unwrap_or(48000);
    let channels = signal.channels.unwrap_or(1);
    let spec = hound::WavSpec {
        channels: channels as u16,
        sample_rate: rate,
        bits_per_sample: bits as u16,
        sample_format,
    };
    let writer = WavWriter::create(path, spec)?;

    let signal = SignalInfo {
        rate: Some(rate),
        channels: Some(channels),
        size: SampleSize::from_bytes(bits.div_ceil(8)),
        encoding: Some(if sample_format == SampleFormat::Float {
            Encoding::Float
        } else {
            Encoding::Signed
        }),
        ..SignalInfo::default()
    };

    Ok(Box::new(WavOutput {
        writer: Some(writer),
        signal,
        bits,
        float: sample_format == SampleFormat::Float,
        clips: 0,
    }))
}

impl FormatWriter for WavOutput {
    fn signal(&self) -> &SignalInfo {
        &self.signal
    }

    fn write(&mut self, buf: &[Sample]) -> Result<usize> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| Error::Stream("write after finalize".to_string()))?;
        if self.float {
            for &s in buf {
                writer.write_sample(sample_to_f64(s) as f32)?;
            }
        } else {
            for &s in buf {
                writer.write_sample(narrow_to_bits(s, self.bits))?;
            }
        }
        Ok(buf.len())
    }

    fn finalize(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.finalize()?;
        }
        Ok(())
    }

    fn clips(&self) -> u64 {
        self.clips
    }
}
