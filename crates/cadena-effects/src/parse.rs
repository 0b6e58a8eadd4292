//! Argument parsing helpers shared by the effects.

/// A point or span in the audio stream, as written on the command line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Position {
    /// Wall-clock seconds.
    Seconds(f64),
    /// An exact wide-sample count (the `Ns` form).
    Samples(u64),
}

impl Position {
    /// Parse `SS[.frac]`, `[[HH:]MM:]SS[.frac]`, or `Ns`.
    pub fn parse(s: &str) -> Option<Position> {
        if let Some(samples) = s.strip_suffix('s') {
            return samples.parse::<u64>().ok().map(Position::Samples);
        }
        let mut seconds = 0.0;
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() > 3 || parts.is_empty() {
            return None;
        }
        for part in &parts {
            if part.is_empty() {
                return None;
            }
            let value = part.parse::<f64>().ok()?;
            if value < 0.0 {
                return None;
            }
            seconds = seconds * 60.0 + value;
        }
        Some(Position::Seconds(seconds))
    }

    /// Resolve to a wide-sample count at `rate`.
    pub fn to_wide_samples(self, rate: u32) -> u64 {
        match self {
            Position::Seconds(s) => (s * f64::from(rate)).round() as u64,
            Position::Samples(n) => n,
        }
    }
}

/// Parse a gain argument: a plain factor, or `NdB`.
pub fn parse_gain(s: &str) -> Option<f64> {
    if let Some(db) = s.strip_suffix("dB").or_else(|| s.strip_suffix("db")) {
        let db = db.parse::<f64>().ok()?;
        Some(10f64.powf(db / 20.0))
    } else {
        s.parse::<f64>().ok()
    }
}
