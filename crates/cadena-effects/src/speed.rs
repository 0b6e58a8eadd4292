//! Playback-speed adjustment.
//!
//! Speed changes pitch and tempo together by relabeling the stream rate,
//! which the planner folds into the combiner before the chain is built
//! (see `cadena_core::extract_speed`). The handler itself is a NULL proxy
//! and never occupies a slot; it exists so the registry can answer for
//! the name and print usage.

use cadena_core::{EffectFlags, EffectHandler, Result, StartAction, StreamInfo};

/// `speed FACTOR`: adjust pitch and tempo by FACTOR.
pub struct Speed {
    factor: f64,
}

impl Speed {
    /// An instance pending `getopts`.
    pub fn new() -> Self {
        Self { factor: 1.0 }
    }

    /// The configured factor.
    pub fn factor(&self) -> f64 {
        self.factor
    }
}

impl Default for Speed {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectHandler for Speed {
    fn name(&self) -> &'static str {
        "speed"
    }

    fn usage(&self) -> &'static str {
        "speed FACTOR"
    }

    fn flags(&self) -> EffectFlags {
        EffectFlags {
            null: true,
            ..EffectFlags::NONE
        }
    }

    fn getopts(&mut self, args: &[String]) -> Result<()> {
        match args {
            [factor] => {
                let f = factor.parse::<f64>().ok().filter(|f| *f > 0.0);
                self.factor = f.ok_or_else(|| self.usage_error("factor must be positive"))?;
                Ok(())
            }
            _ => Err(self.usage_error("expects exactly one factor")),
        }
    }

    fn start(&mut self, _input: &StreamInfo, _output: &mut StreamInfo) -> Result<StartAction> {
        // The rate relabeling already happened at plan time.
        Ok(StartAction::Elide)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_positive_factor() {
        let mut speed = Speed::new();
        speed.getopts(&["1.5".to_string()]).unwrap();
        assert!((speed.factor() - 1.5).abs() < 1e-12);
        assert!(speed.getopts(&["0".to_string()]).is_err());
        assert!(speed.getopts(&[]).is_err());
    }

    #[test]
    fn always_elides() {
        let mut speed = Speed::new();
        speed.getopts(&["2".to_string()]).unwrap();
        let input = StreamInfo::new(8000, 1);
        let mut output = input;
        assert_eq!(
            speed.start(&input, &mut output).unwrap(),
            StartAction::Elide
        );
    }
}
