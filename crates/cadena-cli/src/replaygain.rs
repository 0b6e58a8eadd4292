//! Replay-gain resolution from comment metadata.

/// Which replay-gain tag to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayGainMode {
    /// Ignore replay gain.
    Off,
    /// Use `replaygain_track_gain`.
    Track,
    /// Use `replaygain_album_gain`.
    Album,
}

/// Scan comment text for the selected replay-gain tag.
///
/// Tags look like `replaygain_track_gain=-8.25 dB`, one per line, case
/// insensitive. Returns the gain in dB.
pub fn resolve(comment: Option<&str>, mode: ReplayGainMode) -> Option<f64> {
    let key = match mode {
        ReplayGainMode::Off => return None,
        ReplayGainMode::Track => "replaygain_track_gain",
        ReplayGainMode::Album => "replaygain_album_gain",
    };
    let text = comment?;
    for line in text.lines() {
        let Some((tag, value)) = line.split_once('=') else {
            continue;
        };
        if !tag.trim().eq_ignore_ascii_case(key) {
            continue;
        }
        let value = value.trim();
        let value = value
            .strip_suffix("dB")
            .or_else(|| value.strip_suffix("db"))
            .or_else(|| value.strip_suffix("DB"))
            .unwrap_or(value)
            .trim();
        if let Ok(gain) = value.parse::<f64>() {
            return Some(gain);
        }
    }
    None
}

/// Convert a dB gain to the linear factor folded into a volume.
pub fn to_linear(gain_db: f64) -> f64 {
    10f64.powf(gain_db / 20.0)
}
