//! Effect registry and factory.
//!
//! A centralized table of the built-in effects: lookup by name, usage and
//! flag metadata for help output, and instantiation for the planner. The
//! argument scanner also consults it to find where the effect section of
//! the command line begins.

use cadena_core::{EffectFactory, EffectFlags, EffectHandler};

use crate::{Channels, Pad, Rate, Speed, Trim, Vol};

/// Describes one registered effect.
#[derive(Debug, Clone, Copy)]
pub struct EffectDescriptor {
    /// Registered name.
    pub name: &'static str,
    /// One-line usage.
    pub usage: &'static str,
    /// Short description for listings.
    pub description: &'static str,
}

type Factory = fn() -> Box<dyn EffectHandler>;

struct Entry {
    descriptor: EffectDescriptor,
    factory: Factory,
}

/// Registry of all built-in effects.
pub struct Registry {
    entries: Vec<Entry>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Build the registry with every built-in effect registered.
    pub fn new() -> Self {
        let entries = vec![
            Entry {
                descriptor: EffectDescriptor {
                    name: "vol",
                    usage: "vol GAIN[dB]",
                    description: "Scale every sample by a gain factor",
                },
                factory: || Box::new(Vol::new()),
            },
            Entry {
                descriptor: EffectDescriptor {
                    name: "trim",
                    usage: "trim START [LENGTH]",
                    description: "Keep audio from START for LENGTH",
                },
                factory: || Box::new(Trim::new()),
            },
            Entry {
                descriptor: EffectDescriptor {
                    name: "pad",
                    usage: "pad LENGTH",
                    description: "Append LENGTH of silence",
                },
                factory: || Box::new(Pad::new()),
            },
            Entry {
                descriptor: EffectDescriptor {
                    name: "rate",
                    usage: "rate [HZ]",
                    description: "Resample to HZ (linear interpolation)",
                },
                factory: || Box::new(Rate::new()),
            },
            Entry {
                descriptor: EffectDescriptor {
                    name: "channels",
                    usage: "channels [N]",
                    description: "Remix to N channels",
                },
                factory: || Box::new(Channels::new()),
            },
            Entry {
                descriptor: EffectDescriptor {
                    name: "speed",
                    usage: "speed FACTOR",
                    description: "Adjust pitch and tempo together",
                },
                factory: || Box::new(Speed::new()),
            },
        ];
        Self { entries }
    }

    /// Look up an effect by name.
    pub fn find(&self, name: &str) -> Option<&EffectDescriptor> {
        self.entries
            .iter()
            .map(|e| &e.descriptor)
            .find(|d| d.name == name)
    }

    /// Whether `name` is a registered effect.
    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// All registered effects, in listing order.
    pub fn all_effects(&self) -> impl Iterator<Item = &EffectDescriptor> {
        self.entries.iter().map(|e| &e.descriptor)
    }

    /// The capability flags of a registered effect.
    pub fn flags(&self, name: &str) -> Option<EffectFlags> {
        self.entries
            .iter()
            .find(|e| e.descriptor.name == name)
            .map(|e| (e.factory)().flags())
    }
}

impl EffectFactory for Registry {
    fn create(&self, name: &str) -> Option<Box<dyn EffectHandler>> {
        self.entries
            .iter()
            .find(|e| e.descriptor.name == name)
            .map(|e| (e.factory)())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_builtins_are_registered() {
        let registry = Registry::new();
        for name in ["vol", "trim", "pad", "rate", "channels", "speed"] {
            assert!(registry.contains(name), "missing {name}");
            let handler = registry.create(name).unwrap();
            assert_eq!(handler.name(), name);
        }
        assert!(!registry.contains("reverb"));
    }

    #[test]
    fn descriptors_carry_usage() {
        let registry = Registry::new();
        let trim = registry.find("trim").unwrap();
        assert!(trim.usage.contains("START"));
    }

    #[test]
    fn flags_match_the_handlers() {
        let registry = Registry::new();
        assert!(registry.flags("rate").unwrap().rate);
        assert!(registry.flags("channels").unwrap().chan);
        assert!(registry.flags("speed").unwrap().null);
        assert!(!registry.flags("vol").unwrap().rate);
    }
}
