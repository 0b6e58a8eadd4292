//! Chain planning and assembly.
//!
//! The planner turns the user's effect sequence into the ordered table the
//! scheduler runs, inserting default rate/channel adapters where the
//! combiner and output signals disagree. Insertion points follow cost:
//! rate and channel changes are monotone in per-sample work, so reductions
//! go before the user's effects and expansions after them.

use crate::chain::EffectChain;
use crate::effect::{EffectFactory, EffectHandler, StartAction};
use crate::error::{Error, Result};
use crate::signal::StreamInfo;

/// One effect invocation as given on the command line (or synthesized by
/// the planner): a registered name plus its raw arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedEffect {
    /// Registered effect name.
    pub name: String,
    /// Arguments for the effect's `getopts`.
    pub args: Vec<String>,
}

impl PlannedEffect {
    /// An invocation with no arguments.
    pub fn bare(name: &str) -> Self {
        Self {
            name: name.to_string(),
            args: Vec::new(),
        }
    }
}

/// The planned chain, ready for [`build_chain`].
#[derive(Debug)]
pub struct ChainPlan {
    /// Effects in execution order, defaults included.
    pub entries: Vec<PlannedEffect>,
    /// Whether any effect changes total duration, which disables
    /// known-length reporting on the output.
    pub changes_length: bool,
}

/// Pull `speed FACTOR` pseudo-effects out of the sequence.
///
/// Speed is resolved entirely at plan time by relabeling the combiner
/// rate; it never occupies a slot. Multiple occurrences compound.
pub fn extract_speed(effects: &mut Vec<PlannedEffect>) -> Result<f64> {
    let mut speed = 1.0;
    let mut kept = Vec::with_capacity(effects.len());
    for entry in effects.drain(..) {
        if entry.name == "speed" {
            let factor = match entry.args.as_slice() {
                [arg] => arg.parse::<f64>().ok().filter(|f| *f > 0.0),
                _ => None,
            };
            match factor {
                Some(f) => speed *= f,
                None => {
                    return Err(Error::EffectUsage {
                        effect: "speed".to_string(),
                        message: "expects one positive factor".to_string(),
                        usage: "speed FACTOR".to_string(),
                    });
                }
            }
        } else {
            kept.push(entry);
        }
    }
    *effects = kept;
    Ok(speed)
}

/// Decide the full effect order for a session.
///
/// `input` is the combiner's resolved signal (speed already applied),
/// `output` the signal the sink was asked for.
pub fn plan_chain(
    user: &[PlannedEffect],
    factory: &dyn EffectFactory,
    input: StreamInfo,
    output: StreamInfo,
) -> Result<ChainPlan> {
    let mut need_rate = input.rate != output.rate;
    let mut need_chan = input.channels != output.channels;
    let mut changes_length = false;

    let mut chan_effects = 0;
    let mut rate_effects = 0;
    for entry in user {
        let handler = factory
            .create(&entry.name)
            .ok_or_else(|| Error::UnknownEffect(entry.name.clone()))?;
        let flags = handler.flags();
        if flags.chan {
            chan_effects += 1;
            need_chan = false;
        }
        if flags.rate {
            rate_effects += 1;
            need_rate = false;
        }
        if flags.length {
            changes_length = true;
        }
        if flags.deprecated {
            tracing::warn!(effect = entry.name.as_str(), "effect is deprecated");
        }
    }
    if chan_effects > 1 {
        return Err(Error::MultipleChannelEffects);
    }
    if rate_effects > 1 {
        tracing::warn!("multiple effects change the sample rate");
    }

    let mut entries = Vec::with_capacity(user.len() + 2);

    // Shrinking work early is cheaper for everything downstream.
    if need_chan && input.channels > output.channels {
        entries.push(PlannedEffect::bare("channels"));
        need_chan = false;
    }
    if need_rate && input.rate > output.rate {
        entries.push(PlannedEffect::bare("rate"));
        need_rate = false;
    }

    entries.extend(user.iter().cloned());

    if need_rate {
        entries.push(PlannedEffect::bare("rate"));
    }
    if need_chan {
        // Only a channel increase can remain at this point.
        entries.push(PlannedEffect::bare("channels"));
    }

    tracing::debug!(
        chain = ?entries.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(),
        "planned effect chain"
    );

    Ok(ChainPlan {
        entries,
        changes_length,
    })
}

/// Instantiate, configure, and start a planned chain.
///
/// Signals propagate slot to slot: each effect sees its predecessor's
/// output signal, with rate/channel targets pre-filled for RATE/CHAN
/// effects. Effects whose `start` reports [`StartAction::Elide`] are
/// removed. Handlers lacking the multi-channel capability that face more
/// than one channel get a right-channel twin with independent state.
pub fn build_chain(
    entries: &[PlannedEffect],
    factory: &dyn EffectFactory,
    input: StreamInfo,
    output: StreamInfo,
    bufsize: usize,
) -> Result<EffectChain> {
    let mut chain = EffectChain::new(input, bufsize);
    let mut cur = input;

    for entry in entries {
        let mut handler: Box<dyn EffectHandler> = factory
            .create(&entry.name)
            .ok_or_else(|| Error::UnknownEffect(entry.name.clone()))?;
        handler.getopts(&entry.args)?;
        let flags = handler.flags();

        let ininfo = cur;
        let mut outinfo = ininfo;
        if flags.chan {
            outinfo.channels = output.channels;
        }
        if flags.rate {
            outinfo.rate = output.rate;
        }

        let split = ininfo.channels > 1 && !flags.mchan;
        if split && ininfo.channels > 2 {
            return Err(Error::EffectRuntime {
                effect: entry.name.clone(),
                message: "only supports mono or stereo input".to_string(),
            });
        }

        if split {
            let mono_in = StreamInfo::new(ininfo.rate, 1);
            let mut mono_out = StreamInfo::new(outinfo.rate, 1);
            if handler.start(&mono_in, &mut mono_out)? == StartAction::Elide {
                tracing::debug!(effect = entry.name.as_str(), "has no effect; removed");
                continue;
            }
            let mut twin = factory
                .create(&entry.name)
                .ok_or_else(|| Error::UnknownEffect(entry.name.clone()))?;
            twin.getopts(&entry.args)?;
            let mut twin_out = StreamInfo::new(outinfo.rate, 1);
            twin.start(&mono_in, &mut twin_out)?;
            outinfo = StreamInfo::new(mono_out.rate, ininfo.channels);
            chain.push(handler, Some(twin), ininfo, outinfo)?;
        } else {
            if handler.start(&ininfo, &mut outinfo)? == StartAction::Elide {
                tracing::debug!(effect = entry.name.as_str(), "has no effect; removed");
                continue;
            }
            chain.push(handler, None, ininfo, outinfo)?;
        }
        cur = chain.output_info();
    }

    Ok(chain)
}
