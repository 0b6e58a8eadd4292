//! Stream and signal descriptions.
//!
//! [`SignalInfo`] describes a stream as the format layer sees it: every
//! field is optional because command-line hints and file headers each fill
//! in only part of the picture. [`StreamInfo`] is the fully resolved view
//! the engine works with once a stream is open.

/// Sample width in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleSize {
    /// 1 byte per sample.
    One,
    /// 2 bytes per sample.
    Two,
    /// 3 bytes per sample.
    Three,
    /// 4 bytes per sample.
    Four,
    /// 8 bytes per sample.
    Eight,
}

impl SampleSize {
    /// Width in bytes.
    pub const fn bytes(self) -> u32 {
        match self {
            SampleSize::One => 1,
            SampleSize::Two => 2,
            SampleSize::Three => 3,
            SampleSize::Four => 4,
            SampleSize::Eight => 8,
        }
    }

    /// Width in bits.
    pub const fn bits(self) -> u32 {
        self.bytes() * 8
    }

    /// Parse a byte count as given on the command line.
    pub fn from_bytes(bytes: u32) -> Option<Self> {
        match bytes {
            1 => Some(SampleSize::One),
            2 => Some(SampleSize::Two),
            3 => Some(SampleSize::Three),
            4 => Some(SampleSize::Four),
            8 => Some(SampleSize::Eight),
            _ => None,
        }
    }
}

/// Sample encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Signed linear PCM.
    Signed,
    /// Unsigned linear PCM.
    Unsigned,
    /// IEEE floating point.
    Float,
    /// G.711 µ-law.
    Ulaw,
    /// G.711 A-law.
    Alaw,
    /// Microsoft ADPCM.
    AdpcmMs,
    /// IMA (DVI) ADPCM.
    AdpcmIma,
    /// OKI (VOX) ADPCM.
    AdpcmOki,
    /// GSM 06.10.
    Gsm,
    /// Encoding not known or not expressible.
    Unknown,
}

impl Encoding {
    /// Short name used in diagnostics.
    pub const fn name(self) -> &'static str {
        match self {
            Encoding::Signed => "signed",
            Encoding::Unsigned => "unsigned",
            Encoding::Float => "float",
            Encoding::Ulaw => "u-law",
            Encoding::Alaw => "a-law",
            Encoding::AdpcmMs => "ms-adpcm",
            Encoding::AdpcmIma => "ima-adpcm",
            Encoding::AdpcmOki => "oki-adpcm",
            Encoding::Gsm => "gsm",
            Encoding::Unknown => "unknown",
        }
    }
}

/// Partial description of a stream.
///
/// Unset fields mean "not specified"; the open path fills them from file
/// headers or, for the output, from the combiner's resolved signal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalInfo {
    /// Sample rate in Hz.
    pub rate: Option<u32>,
    /// Channel count.
    pub channels: Option<u32>,
    /// Sample width.
    pub size: Option<SampleSize>,
    /// Sample encoding.
    pub encoding: Option<Encoding>,
    /// Whether bytes are stored opposite to native order.
    pub reverse_bytes: Option<bool>,
    /// Whether bits within each byte are reversed.
    pub reverse_bits: Option<bool>,
    /// Whether nibbles within each byte are swapped.
    pub reverse_nibbles: Option<bool>,
    /// Format-specific compression factor.
    pub compression: Option<f64>,
}

impl SignalInfo {
    /// Take any fields still unset here from `other`.
    pub fn fill_from(&mut self, other: &SignalInfo) {
        self.rate = self.rate.or(other.rate);
        self.channels = self.channels.or(other.channels);
        self.size = self.size.or(other.size);
        self.encoding = self.encoding.or(other.encoding);
        self.reverse_bytes = self.reverse_bytes.or(other.reverse_bytes);
        self.reverse_bits = self.reverse_bits.or(other.reverse_bits);
        self.reverse_nibbles = self.reverse_nibbles.or(other.reverse_nibbles);
        self.compression = self.compression.or(other.compression);
    }

    /// The resolved engine view, if rate and channels are known.
    pub fn stream(&self) -> Option<StreamInfo> {
        Some(StreamInfo {
            rate: self.rate?,
            channels: self.channels?,
        })
    }
}

/// The resolved per-stream facts the engine cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamInfo {
    /// Sample rate in Hz. Always positive.
    pub rate: u32,
    /// Channel count. Always positive.
    pub channels: u32,
}

impl StreamInfo {
    /// Construct a stream description.
    pub const fn new(rate: u32, channels: u32) -> Self {
        Self { rate, channels }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_from_keeps_set_fields() {
        let mut hints = SignalInfo {
            rate: Some(8000),
            ..SignalInfo::default()
        };
        let header = SignalInfo {
            rate: Some(44100),
            channels: Some(2),
            encoding: Some(Encoding::Signed),
            ..SignalInfo::default()
        };
        hints.fill_from(&header);
        assert_eq!(hints.rate, Some(8000));
        assert_eq!(hints.channels, Some(2));
        assert_eq!(hints.encoding, Some(Encoding::Signed));
    }

    #[test]
    fn stream_requires_rate_and_channels() {
        let mut info = SignalInfo::default();
        assert!(info.stream().is_none());
        info.rate = Some(48000);
        assert!(info.stream().is_none());
        info.channels = Some(1);
        assert_eq!(info.stream(), Some(StreamInfo::new(48000, 1)));
    }
}
