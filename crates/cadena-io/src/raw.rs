//! Headerless audio.
//!
//! The signal must be fully specified up front (rate, channels, size,
//! encoding) — there is no header to consult. Supports linear PCM of 1–4
//! bytes signed or unsigned, IEEE float 4/8 bytes, and G.711 µ-law and
//! A-law, with the byte/bit/nibble reversal flags honored.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};

use cadena_core::{
    Encoding, Sample, SampleSize, SignalInfo, narrow_to_bits, sample_from_f64, sample_to_f64,
    widen_from_bits,
};

use crate::format::{FormatReader, FormatWriter};
use crate::{Error, Result};

/// How one sample travels between bytes and the engine's domain.
#[derive(Debug, Clone, Copy)]
struct Codec {
    encoding: Encoding,
    bytes: usize,
    /// Stored big-endian (after resolving the reversal flag against the
    /// native order).
    big: bool,
    rev_bits: bool,
    rev_nibbles: bool,
}

impl Codec {
    fn from_signal(signal: &SignalInfo) -> Result<Self> {
        let size = signal.size.ok_or(Error::IncompleteRawSignal)?;
        let encoding = signal.encoding.ok_or(Error::IncompleteRawSignal)?;
        match encoding {
            Encoding::Signed | Encoding::Unsigned => {
                if size == SampleSize::Eight {
                    return Err(Error::UnsupportedSize("linear PCM"));
                }
            }
            Encoding::Float => {
                if !matches!(size, SampleSize::Four | SampleSize::Eight) {
                    return Err(Error::UnsupportedSize("float"));
                }
            }
            Encoding::Ulaw | Encoding::Alaw => {
                if size != SampleSize::One {
                    return Err(Error::UnsupportedSize("G.711"));
                }
            }
            other => return Err(Error::UnsupportedEncoding(other.name())),
        }

        let native_big = cfg!(target_endian = "big");
        let big = native_big ^ signal.reverse_bytes.unwrap_or(false);
        Ok(Self {
            encoding,
            bytes: size.bytes() as usize,
            big,
            rev_bits: signal.reverse_bits.unwrap_or(false),
            rev_nibbles: signal.reverse_nibbles.unwrap_or(false),
        })
    }

    fn mangle(&self, b: u8) -> u8 {
        let mut b = b;
        if self.rev_bits {
            b = b.reverse_bits();
        }
        if self.rev_nibbles {
            b = b.rotate_left(4);
        }
        b
    }

    fn decode(&self, raw: &[u8], clips: &mut u64) -> Sample {
        let mut bytes = [0u8; 8];
        for (i, &b) in raw.iter().enumerate() {
            bytes[i] = self.mangle(b);
        }
        let n = self.bytes;
        // Assemble most-significant first.
        let mut word: u64 = 0;
        if self.big {
            for &b in &bytes[..n] {
                word = word << 8 | u64::from(b);
            }
        } else {
            for &b in bytes[..n].iter().rev() {
                word = word << 8 | u64::from(b);
            }
        }

        match self.encoding {
            Encoding::Signed => {
                let bits = (n * 8) as u32;
                // Sign-extend by shifting through the top of an i64.
                let value = ((word as i64) << (64 - bits) >> (64 - bits)) as i32;
                widen_from_bits(value, bits)
            }
            Encoding::Unsigned => {
                let bits = (n * 8) as u32;
                let value = word as i64 - (1i64 << (bits - 1));
                widen_from_bits(value as i32, bits)
            }
            Encoding::Float => {
                let value = if n == 4 {
                    f64::from(f32::from_bits(word as u32))
                } else {
                    f64::from_bits(word)
                };
                sample_from_f64(value, clips)
            }
            Encoding::Ulaw => widen_from_bits(i32::from(crate::g711::ulaw_decode(word as u8)), 16),
            Encoding::Alaw => widen_from_bits(i32::from(crate::g711::alaw_decode(word as u8)), 16),
            _ => unreachable!("rejected in from_signal"),
        }
    }

    fn encode(&self, sample: Sample, out: &mut [u8]) {
        let n = self.bytes;
        let word: u64 = match self.encoding {
            Encoding::Signed => {
                let bits = (n * 8) as u32;
                (narrow_to_bits(sample, bits) as i64 as u64) & (u64::MAX >> (64 - bits))
            }
            Encoding::Unsigned => {
                let bits = (n * 8) as u32;
                let value = i64::from(narrow_to_bits(sample, bits)) + (1i64 << (bits - 1));
                value as u64
            }
            Encoding::Float => {
                if n == 4 {
                    u64::from((sample_to_f64(sample) as f32).to_bits())
                } else {
                    sample_to_f64(sample).to_bits()
                }
            }
            Encoding::Ulaw => {
                u64::from(crate::g711::ulaw_encode(narrow_to_bits(sample, 16) as i16))
            }
            Encoding::Alaw => {
                u64::from(crate::g711::alaw_encode(narrow_to_bits(sample, 16) as i16))
            }
            _ => unreachable!("rejected in from_signal"),
        };

        for (i, slot) in out[..n].iter_mut().enumerate() {
            let shift = if self.big { (n - 1 - i) * 8 } else { i * 8 };
            *slot = self.mangle((word >> shift) as u8);
        }
    }
}

enum Input {
    File(BufReader<File>),
    Stream(Box<dyn Read>),
}

/// An opened raw input.
pub struct RawInput {
    input: Input,
    signal: SignalInfo,
    codec: Codec,
    length: Option<u64>,
    bytes: Vec<u8>,
    clips: u64,
}

/// Open a raw file (or stdin when `path` is `-`) for reading.
pub fn open_read(path: &str, hints: &SignalInfo) -> Result<Box<dyn FormatReader>> {
    let mut signal = hints.clone();
    if signal.rate.is_none() || signal.channels.is_none() {
        return Err(Error::IncompleteRawSignal);
    }
    let codec = Codec::from_signal(&signal)?;
    signal.reverse_bytes.get_or_insert(false);

    let (input, length) = if path == "-" {
        let stdin: Box<dyn Read> = Box::new(io::stdin());
        (Input::Stream(stdin), None)
    } else {
        let file = File::open(path)?;
        let length = file.metadata().ok().map(|m| m.len() / codec.bytes as u64);
        (Input::File(BufReader::new(file)), length)
    };

    Ok(Box::new(RawInput {
        input,
        signal,
        codec,
        length,
        bytes: Vec::new(),
        clips: 0,
    }))
}

impl FormatReader for RawInput {
    fn signal(&self) -> &SignalInfo {
        &self.signal
    }

    fn length_samples(&self) -> Option<u64> {
        self.length
    }

    fn seekable(&self) -> bool {
        matches!(self.input, Input::File(_))
    }

    fn read(&mut self, buf: &mut [Sample]) -> Result<usize> {
        let want = buf.len() * self.codec.bytes;
        self.bytes.resize(want, 0);

        // Short reads happen on pipes; keep going until full or EOF.
        let mut filled = 0;
        loop {
            let n = match &mut self.input {
                Input::File(f) => f.read(&mut self.bytes[filled..want])?,
                Input::Stream(s) => s.read(&mut self.bytes[filled..want])?,
            };
            if n == 0 {
                break;
            }
            filled += n;
            if filled == want {
                break;
            }
        }

        let samples = filled / self.codec.bytes;
        if samples * self.codec.bytes < filled {
            tracing::warn!("input ends mid-sample; trailing bytes dropped");
        }
        for (i, slot) in buf[..samples].iter_mut().enumerate() {
            let at = i * self.codec.bytes;
            *slot = self
                .codec
                .decode(&self.bytes[at..at + self.codec.bytes], &mut self.clips);
        }
        Ok(samples)
    }

    fn seek(&mut self, sample: u64) -> Result<()> {
        match &mut self.input {
            Input::File(f) => {
                f.seek(SeekFrom::Start(sample * self.codec.bytes as u64))?;
                Ok(())
            }
            Input::Stream(_) => Err(Error::NotSeekable),
        }
    }

    fn clips(&self) -> u64 {
        self.clips
    }
}

enum Output {
    File(BufWriter<File>),
    Stream(Box<dyn Write>),
}

/// An opened raw output.
pub struct RawOutput {
    output: Option<Output>,
    signal: SignalInfo,
    codec: Codec,
    bytes: Vec<u8>,
}

/// Create a raw file (or stdout when `path` is `-`) for writing.
pub fn open_write(path: &str, signal: &SignalInfo) -> Result<Box<dyn FormatWriter>> {
    if signal.rate.is_none() || signal.channels.is_none() {
        return Err(Error::IncompleteRawSignal);
    }
    let codec = Codec::from_signal(signal)?;

    let output = if path == "-" {
        let stdout: Box<dyn Write> = Box::new(io::stdout());
        Output::Stream(stdout)
    } else {
        Output::File(BufWriter::new(File::create(path)?))
    };

    Ok(Box::new(RawOutput {
        output: Some(output),
        signal: signal.clone(),
        codec,
        bytes: Vec::new(),
    }))
}

impl FormatWriter for RawOutput {
    fn signal(&self) -> &SignalInfo {
        &self.signal
    }

    fn write(&mut self, buf: &[Sample]) -> Result<usize> {
        let codec = self.codec;
        self.bytes.resize(buf.len() * codec.bytes, 0);
        for (i, &s) in buf.iter().enumerate() {
            let at = i * codec.bytes;
            codec.encode(s, &mut self.bytes[at..at + codec.bytes]);
        }
        match self
            .output
            .as_mut()
            .ok_or_else(|| Error::Stream("write after finalize".to_string()))?
        {
            Output::File(f) => f.write_all(&self.bytes)?,
            Output::Stream(s) => s.write_all(&self.bytes)?,
        }
        Ok(buf.len())
    }

    fn finalize(&mut self) -> Result<()> {
        if let Some(mut output) = self.output.take() {
            match &mut output {
                Output::File(f) => f.flush()?,
                Output::Stream(s) => s.flush()?,
            }
        }
        Ok(())
    }
}
