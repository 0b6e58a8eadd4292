//! Command-line scanning.
//!
//! The surface is positional: format options apply to the file that
//! follows them, and everything after the output file is the effects
//! section. clap owns tokenizing, value validation, and help/version; the
//! scanner replays clap's parsed occurrences in argv order (via
//! [`ArgMatches::indices_of`]) to reconstruct which options belong to
//! which file. Short flags without a clap-friendly shape (`-s`, `-2`,
//! `-V3`, ...) are rewritten to hidden long options first.
//!
//! The effects section is found by name: scanning left to right past
//! options and their values, the first bare word that names a registered
//! effect ends the file list.

use std::io::IsTerminal;
use std::path::Path;

use cadena_core::{
    CombineMode, Encoding, EffectFactory, MAX_INPUT_FILES, PlannedEffect, SampleSize, SignalInfo,
};
use cadena_effects::Registry;
use cadena_io::{expand_playlist, is_playlist};
use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::AppError;
use crate::replaygain::ReplayGainMode;

/// Effect-plot output selection. Accepted and recorded; none of the
/// built-in effects emit plots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plot {
    /// No plotting.
    Off,
    /// GNU Octave script.
    Octave,
    /// gnuplot script.
    Gnuplot,
}

/// How the binary was invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Personality {
    /// Plain file-to-file processing.
    Convert,
    /// `play`: output is the default audio device.
    Play,
    /// `rec`: input is the default audio device.
    Rec,
}

/// Session-wide options.
#[derive(Debug, Clone)]
pub struct GlobalOpts {
    /// Per-slot buffer capacity in samples.
    pub buffer_samples: usize,
    /// Input combining mode.
    pub combine: CombineMode,
    /// Prompt before overwriting an existing output file.
    pub interactive: bool,
    /// Replay-gain policy for inputs.
    pub replay_gain: ReplayGainMode,
    /// Seed random-number generators repeatably (`-R`).
    pub repeatable_rng: bool,
    /// Diagnostic verbosity (0..).
    pub verbosity: u8,
    /// Whether the progress line is drawn.
    pub show_progress: bool,
    /// Effect-plot selection.
    pub plot: Plot,
    /// Comment to attach to the output.
    pub comment: Option<String>,
}

/// One file on the command line with the format options that preceded it.
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// Filename; `-` is stdin/stdout.
    pub filename: String,
    /// Explicit type (`-t`), if any.
    pub filetype: Option<String>,
    /// Format hints gathered from the options.
    pub signal: SignalInfo,
    /// Per-file volume (`-v`).
    pub volume: Option<f64>,
}

impl FileEntry {
    fn device() -> Self {
        Self {
            filename: "default".to_string(),
            filetype: Some("device".to_string()),
            signal: SignalInfo::default(),
            volume: None,
        }
    }

    /// Whether this entry names an audio device.
    pub fn is_device(&self) -> bool {
        self.filetype.as_deref() == Some("device")
    }
}

/// A fully scanned invocation.
#[derive(Debug)]
pub struct Invocation {
    /// Session options.
    pub opts: GlobalOpts,
    /// Input files in order.
    pub inputs: Vec<FileEntry>,
    /// The single output file.
    pub output: FileEntry,
    /// User effects in order.
    pub effects: Vec<PlannedEffect>,
    /// How the binary was invoked.
    pub personality: Personality,
}

/// Outcome of scanning: either run, or exit immediately (help, version,
/// `--help-effect`).
pub enum Parsed {
    /// Run a session.
    Run(Invocation),
    /// Exit with this status.
    Exit(u8),
}

/// Options that consume the next token as their value.
const VALUED_SHORT: &[&str] = &["-c", "-r", "-t", "-v", "-C"];
const VALUED_LONG: &[&str] = &[
    "--buffer",
    "--combine",
    "--comment",
    "--comment-file",
    "--endian",
    "--help-effect",
    "--plot",
    "--replay-gain",
    "--verbosity",
    "--channels",
    "--rate",
    "--type",
    "--volume",
    "--compression",
    "--size",
    "--encoding",
    "--byte-order",
    "--null-file",
];

fn takes_value(token: &str) -> bool {
    if token.contains('=') {
        return false;
    }
    VALUED_SHORT.contains(&token) || VALUED_LONG.contains(&token)
}

/// Split argv (without argv[0]) into the file section and the effects
/// section.
fn split_at_effects<'a>(tokens: &'a [String], registry: &Registry) -> (&'a [String], &'a [String]) {
    let mut i = 0;
    while i < tokens.len() {
        let token = &tokens[i];
        if token.len() > 1 && token.starts_with('-') {
            if takes_value(token) {
                i += 1;
            }
        } else if registry.contains(token) {
            return (&tokens[..i], &tokens[i..]);
        }
        i += 1;
    }
    (tokens, &[])
}

/// Rewrite legacy short flags into clap-friendly long forms.
fn normalize(token: &str) -> Vec<String> {
    let mapped: Option<&str> = match token {
        "-s" => Some("--encoding=signed"),
        "-u" => Some("--encoding=unsigned"),
        "-U" => Some("--encoding=ulaw"),
        "-A" => Some("--encoding=alaw"),
        "-a" => Some("--encoding=adpcm"),
        "-i" => Some("--encoding=ima-adpcm"),
        "-o" => Some("--encoding=oki-adpcm"),
        "-g" => Some("--encoding=gsm"),
        "-f" => Some("--encoding=float"),
        "-D" => Some("--no-dither=yes"),
        "-1" => Some("--size=1"),
        "-2" => Some("--size=2"),
        "-3" => Some("--size=3"),
        "-4" => Some("--size=4"),
        "-8" => Some("--size=8"),
        "-L" => Some("--byte-order=little"),
        "-B" => Some("--byte-order=big"),
        "-x" => Some("--byte-order=swap"),
        "-X" => Some("--reverse-bits=yes"),
        "-N" => Some("--reverse-nibbles=yes"),
        "-n" => Some("--null-file=n"),
        "-e" => Some("--null-file=e"),
        "-m" => Some("--combine=mix"),
        "-M" => Some("--combine=merge"),
        "-V" => Some("--verbosity=3"),
        _ => None,
    };
    if let Some(mapped) = mapped {
        return vec![mapped.to_string()];
    }
    if let Some(rest) = token.strip_prefix("-V") {
        if !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()) {
            return vec![format!("--verbosity={rest}")];
        }
    }
    vec![token.to_string()]
}

fn command() -> Command {
    Command::new("cadena")
        .about("cadena audio processor: combine inputs, run effects, write one output")
        .override_usage("cadena [gopts] [fopts] infile... [fopts] outfile [effect [effopts]]...")
        .disable_version_flag(true)
        .arg(
            Arg::new("version")
                .long("version")
                .action(ArgAction::Version)
                .help("Print version"),
        )
        .version(env!("CARGO_PKG_VERSION"))
        // --- global options ---
        .arg(
            Arg::new("buffer")
                .long("buffer")
                .value_name("BYTES")
                .help("Buffer size in bytes (min 17)"),
        )
        .arg(
            Arg::new("combine")
                .long("combine")
                .value_name("MODE")
                .value_parser(["sequence", "concatenate", "mix", "merge"])
                .action(ArgAction::Append)
                .help("How multiple inputs are combined (-m: mix, -M: merge)"),
        )
        .arg(
            Arg::new("comment")
                .long("comment")
                .value_name("TEXT")
                .help("Comment text for the output file"),
        )
        .arg(
            Arg::new("comment-file")
                .long("comment-file")
                .value_name("PATH")
                .help("Read the output comment from a file"),
        )
        .arg(
            Arg::new("endian")
                .long("endian")
                .value_name("ORDER")
                .value_parser(["little", "big", "swap"])
                .help("Default byte order for headerless files"),
        )
        .arg(
            Arg::new("interactive")
                .long("interactive")
                .action(ArgAction::SetTrue)
                .help("Prompt before overwriting an existing output file"),
        )
        .arg(
            Arg::new("help-effect")
                .long("help-effect")
                .value_name("NAME")
                .help("Show usage for an effect ('all' lists every effect)"),
        )
        .arg(
            Arg::new("plot")
                .long("plot")
                .value_name("KIND")
                .value_parser(["off", "octave", "gnuplot"])
                .help("Generate a script to plot effect transfer functions"),
        )
        .arg(
            Arg::new("replay-gain")
                .long("replay-gain")
                .value_name("MODE")
                .value_parser(["track", "album", "off"])
                .help("Replay-gain policy for inputs"),
        )
        .arg(
            Arg::new("verbosity")
                .long("verbosity")
                .value_name("N")
                .help("Diagnostic verbosity 0-5 (-V[N])"),
        )
        .arg(
            Arg::new("progress")
                .short('S')
                .action(ArgAction::SetTrue)
                .help("Display a progress line"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .action(ArgAction::SetTrue)
                .help("Do not display a progress line"),
        )
        .arg(
            Arg::new("repeatable")
                .short('R')
                .action(ArgAction::SetTrue)
                .help("Use a repeatable random-number sequence"),
        )
        // --- per-file format options ---
        .arg(
            Arg::new("channels")
                .short('c')
                .long("channels")
                .value_name("N")
                .action(ArgAction::Append)
                .help("Channel count of the next file"),
        )
        .arg(
            Arg::new("rate")
                .short('r')
                .long("rate")
                .value_name("HZ")
                .action(ArgAction::Append)
                .help("Sample rate of the next file"),
        )
        .arg(
            Arg::new("type")
                .short('t')
                .long("type")
                .value_name("TYPE")
                .action(ArgAction::Append)
                .help("File type of the next file (wav, raw, ul, al, null, device)"),
        )
        .arg(
            Arg::new("volume")
                .short('v')
                .long("volume")
                .value_name("FACTOR")
                .action(ArgAction::Append)
                .allow_hyphen_values(true)
                .help("Volume factor for the next input"),
        )
        .arg(
            Arg::new("compression")
                .short('C')
                .long("compression")
                .value_name("FACTOR")
                .action(ArgAction::Append)
                .allow_hyphen_values(true)
                .help("Compression factor for the next file"),
        )
        .arg(
            Arg::new("size")
                .long("size")
                .value_name("BYTES")
                .value_parser(["1", "2", "3", "4", "8"])
                .action(ArgAction::Append)
                .help("Sample size of the next file in bytes (-1/-2/-3/-4/-8)"),
        )
        .arg(
            Arg::new("encoding")
                .long("encoding")
                .value_name("ENC")
                .value_parser([
                    "signed",
                    "unsigned",
                    "ulaw",
                    "alaw",
                    "adpcm",
                    "ima-adpcm",
                    "oki-adpcm",
                    "gsm",
                    "float",
                ])
                .action(ArgAction::Append)
                .help("Sample encoding of the next file (-s/-u/-U/-A/-a/-i/-o/-g/-f)"),
        )
        .arg(
            Arg::new("byte-order")
                .long("byte-order")
                .value_name("ORDER")
                .value_parser(["little", "big", "swap"])
                .action(ArgAction::Append)
                .help("Byte order of the next file (-L/-B/-x)"),
        )
        .arg(
            Arg::new("reverse-bits")
                .long("reverse-bits")
                .num_args(0..=1)
                .require_equals(true)
                .default_missing_value("yes")
                .action(ArgAction::Append)
                .help("Bits within each byte of the next file are reversed (-X)"),
        )
        .arg(
            Arg::new("reverse-nibbles")
                .long("reverse-nibbles")
                .num_args(0..=1)
                .require_equals(true)
                .default_missing_value("yes")
                .action(ArgAction::Append)
                .help("Nibbles within each byte of the next file are swapped (-N)"),
        )
        .arg(
            Arg::new("no-dither")
                .long("no-dither")
                .num_args(0..=1)
                .require_equals(true)
                .default_missing_value("yes")
                .action(ArgAction::Append)
                .help("Do not dither the next file (-D)"),
        )
        .arg(
            Arg::new("null-file")
                .long("null-file")
                .value_name("MARK")
                .action(ArgAction::Append)
                .hide(true),
        )
        .arg(
            Arg::new("files")
                .value_name("FILE")
                .action(ArgAction::Append)
                .help("Input files, then the output file"),
        )
}

#[derive(Debug)]
enum Event {
    Fopt(&'static str, String),
    File(String),
    NullFile,
}

fn timeline(matches: &ArgMatches) -> Vec<(usize, Event)> {
    const FOPTS: &[&str] = &[
        "channels",
        "rate",
        "type",
        "volume",
        "compression",
        "size",
        "encoding",
        "byte-order",
        "reverse-bits",
        "reverse-nibbles",
        "no-dither",
    ];
    let mut events = Vec::new();
    for &id in FOPTS {
        if let (Some(indices), Some(values)) =
            (matches.indices_of(id), matches.get_many::<String>(id))
        {
            for (index, value) in indices.zip(values) {
                events.push((index, Event::Fopt(id, value.clone())));
            }
        }
    }
    if let (Some(indices), Some(values)) = (
        matches.indices_of("null-file"),
        matches.get_many::<String>("null-file"),
    ) {
        for (index, _) in indices.zip(values) {
            events.push((index, Event::NullFile));
        }
    }
    if let (Some(indices), Some(values)) = (
        matches.indices_of("files"),
        matches.get_many::<String>("files"),
    ) {
        for (index, value) in indices.zip(values) {
            events.push((index, Event::File(value.clone())));
        }
    }
    events.sort_by_key(|(index, _)| *index);
    events
}

fn usage(message: impl Into<String>) -> AppError {
    AppError::Usage(message.into())
}

fn parse_u32(value: &str, what: &str) -> Result<u32, AppError> {
    value
        .parse::<u32>()
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| usage(format!("bad {what}: '{value}'")))
}

fn parse_f64(value: &str, what: &str) -> Result<f64, AppError> {
    value
        .parse::<f64>()
        .map_err(|_| usage(format!("bad {what}: '{value}'")))
}

/// Resolve an order name to the "reversed relative to native" flag.
fn order_reverses(order: &str) -> bool {
    let native_big = cfg!(target_endian = "big");
    match order {
        "little" => native_big,
        "big" => !native_big,
        _ => true, // swap
    }
}

#[derive(Default, Clone)]
struct PendingFile {
    filetype: Option<String>,
    signal: SignalInfo,
    volume: Option<f64>,
}

fn apply_fopt(pending: &mut PendingFile, id: &str, value: &str) -> Result<(), AppError> {
    match id {
        "channels" => pending.signal.channels = Some(parse_u32(value, "channel count")?),
        "rate" => pending.signal.rate = Some(parse_u32(value, "sample rate")?),
        "type" => pending.filetype = Some(value.to_string()),
        "volume" => pending.volume = Some(parse_f64(value, "volume")?),
        "compression" => pending.signal.compression = Some(parse_f64(value, "compression")?),
        "size" => {
            let bytes = parse_u32(value, "sample size")?;
            pending.signal.size = SampleSize::from_bytes(bytes);
        }
        "encoding" => {
            pending.signal.encoding = Some(match value {
                "signed" => Encoding::Signed,
                "unsigned" => Encoding::Unsigned,
                "ulaw" => Encoding::Ulaw,
                "alaw" => Encoding::Alaw,
                "adpcm" => Encoding::AdpcmMs,
                "ima-adpcm" => Encoding::AdpcmIma,
                "oki-adpcm" => Encoding::AdpcmOki,
                "gsm" => Encoding::Gsm,
                _ => Encoding::Float,
            });
        }
        "byte-order" => pending.signal.reverse_bytes = Some(order_reverses(value)),
        "reverse-bits" => pending.signal.reverse_bits = Some(true),
        "reverse-nibbles" => pending.signal.reverse_nibbles = Some(true),
        "no-dither" => {} // accepted; nothing here dithers
        _ => unreachable!("unknown fopt id {id}"),
    }
    Ok(())
}

fn entry_from(pending: &PendingFile, filename: String) -> FileEntry {
    FileEntry {
        filename,
        filetype: pending.filetype.clone(),
        signal: pending.signal.clone(),
        volume: pending.volume,
    }
}

/// Collect the file list, expanding playlists with the surrounding
/// format options.
fn collect_files(events: Vec<(usize, Event)>) -> Result<Vec<FileEntry>, AppError> {
    let mut files = Vec::new();
    let mut pending = PendingFile::default();
    let mut dangling = false;
    for (_, event) in events {
        match event {
            Event::Fopt(id, value) => {
                apply_fopt(&mut pending, id, &value)?;
                dangling = true;
            }
            Event::NullFile => {
                let mut entry = entry_from(&pending, String::new());
                entry.filetype = Some("null".to_string());
                files.push(entry);
                pending = PendingFile::default();
                dangling = false;
            }
            Event::File(name) => {
                if is_playlist(&name) {
                    for item in expand_playlist(&name).map_err(AppError::from_io)? {
                        files.push(entry_from(&pending, item));
                    }
                } else {
                    files.push(entry_from(&pending, name));
                }
                pending = PendingFile::default();
                dangling = false;
            }
        }
    }
    if dangling {
        tracing::warn!("format options after the last file have no effect");
    }
    Ok(files)
}

/// Parse the effects section: each registered name starts a new effect,
/// everything until the next name is its arguments.
fn collect_effects(tokens: &[String], registry: &Registry) -> Result<Vec<PlannedEffect>, AppError> {
    let mut effects: Vec<PlannedEffect> = Vec::new();
    for token in tokens {
        if registry.contains(token) {
            effects.push(PlannedEffect::bare(token));
        } else if let Some(current) = effects.last_mut() {
            current.args.push(token.clone());
        } else {
            return Err(usage(format!("unknown effect: '{token}'")));
        }
    }
    // Validate every effect's arguments up front.
    for effect in &effects {
        let mut handler = registry
            .create(&effect.name)
            .expect("registered name must create");
        handler.getopts(&effect.args).map_err(AppError::from_core)?;
    }
    Ok(effects)
}

fn detect_personality(argv0: &str) -> Personality {
    let stem = Path::new(argv0)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("");
    if stem.ends_with("play") {
        Personality::Play
    } else if stem.ends_with("rec") {
        Personality::Rec
    } else {
        Personality::Convert
    }
}

fn print_effect_help(registry: &Registry, name: &str) -> Result<(), AppError> {
    if name == "all" {
        for descriptor in registry.all_effects() {
            println!("{:24}{}", descriptor.usage, descriptor.description);
        }
        return Ok(());
    }
    match registry.find(name) {
        Some(descriptor) => {
            println!("usage: {}", descriptor.usage);
            println!("{}", descriptor.description);
            Ok(())
        }
        None => Err(usage(format!("unknown effect: '{name}'"))),
    }
}

/// Scan a full argv.
pub fn parse(argv: &[String]) -> Result<Parsed, AppError> {
    let registry = Registry::new();
    let personality = detect_personality(argv.first().map(String::as_str).unwrap_or("cadena"));

    let tokens = &argv[1..];
    let (head, tail) = split_at_effects(tokens, &registry);

    let mut clap_argv: Vec<String> = vec!["cadena".to_string()];
    for token in head {
        clap_argv.extend(normalize(token));
    }

    let matches = match command().try_get_matches_from(&clap_argv) {
        Ok(matches) => matches,
        Err(err) => {
            use clap::error::ErrorKind;
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    let _ = err.print();
                    Ok(Parsed::Exit(0))
                }
                _ => Err(usage(err.to_string())),
            };
        }
    };

    if let Some(name) = matches.get_one::<String>("help-effect") {
        print_effect_help(&registry, name)?;
        return Ok(Parsed::Exit(0));
    }

    // --- global options ---
    let verbosity = match matches.get_one::<String>("verbosity") {
        Some(v) => v
            .parse::<u8>()
            .map_err(|_| usage(format!("bad verbosity: '{v}'")))?,
        None => 2,
    };

    let buffer_samples = match matches.get_one::<String>("buffer") {
        Some(v) => {
            let bytes = v
                .parse::<usize>()
                .ok()
                .filter(|b| *b >= 17)
                .ok_or_else(|| usage(format!("buffer size must be at least 17 bytes: '{v}'")))?;
            (bytes / std::mem::size_of::<cadena_core::Sample>()).max(4)
        }
        None => cadena_core::DEFAULT_BUFSIZE,
    };

    let combine = match matches
        .get_many::<String>("combine")
        .and_then(|mut v| v.next_back())
        .map(String::as_str)
    {
        Some("sequence") => CombineMode::Sequence,
        Some("concatenate") => CombineMode::Concatenate,
        Some("mix") => CombineMode::Mix,
        Some("merge") => CombineMode::Merge,
        Some(_) => unreachable!("checked by clap"),
        None => match personality {
            Personality::Play => CombineMode::Sequence,
            _ => CombineMode::Concatenate,
        },
    };

    let replay_gain = match matches.get_one::<String>("replay-gain").map(String::as_str) {
        Some("track") => ReplayGainMode::Track,
        Some("album") => ReplayGainMode::Album,
        Some("off") => ReplayGainMode::Off,
        Some(_) => unreachable!("checked by clap"),
        None => match personality {
            Personality::Play => ReplayGainMode::Track,
            _ => ReplayGainMode::Off,
        },
    };

    let plot = match matches.get_one::<String>("plot").map(String::as_str) {
        Some("octave") => Plot::Octave,
        Some("gnuplot") => Plot::Gnuplot,
        _ => Plot::Off,
    };

    let comment = match matches.get_one::<String>("comment-file") {
        Some(path) => Some(
            std::fs::read_to_string(path)
                .map_err(|e| usage(format!("cannot read comment file '{path}': {e}")))?,
        ),
        None => matches.get_one::<String>("comment").cloned(),
    };

    let show_progress = if matches.get_flag("quiet") {
        false
    } else if matches.get_flag("progress") {
        true
    } else {
        verbosity >= 2 && std::io::stderr().is_terminal()
    };

    let opts = GlobalOpts {
        buffer_samples,
        combine,
        interactive: matches.get_flag("interactive"),
        replay_gain,
        repeatable_rng: matches.get_flag("repeatable"),
        verbosity,
        show_progress,
        plot,
        comment,
    };

    // --- files ---
    let mut files = collect_files(timeline(&matches))?;

    // The global --endian default applies to every file without its own
    // byte-order option.
    if let Some(order) = matches.get_one::<String>("endian") {
        for file in &mut files {
            file.signal
                .reverse_bytes
                .get_or_insert(order_reverses(order));
        }
    }

    let (inputs, output) = match personality {
        Personality::Convert => {
            if files.len() < 2 {
                return Err(usage("needs at least one input file and one output file"));
            }
            let output = files.pop().expect("len checked");
            (files, output)
        }
        Personality::Play => {
            if files.is_empty() {
                return Err(usage("needs at least one input file"));
            }
            (files, FileEntry::device())
        }
        Personality::Rec => {
            if files.len() != 1 {
                return Err(usage("rec takes exactly one output file"));
            }
            let output = files.pop().expect("len checked");
            (vec![FileEntry::device()], output)
        }
    };

    if inputs.len() > MAX_INPUT_FILES {
        return Err(usage(format!("too many input files ({MAX_INPUT_FILES} max)")));
    }

    let effects = collect_effects(tail, &registry)?;

    Ok(Parsed::Run(Invocation {
        opts,
        inputs,
        output,
        effects,
        personality,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        std::iter::once("cadena")
            .chain(parts.iter().copied())
            .map(str::to_string)
            .collect()
    }

    fn run(parts: &[&str]) -> Invocation {
        match parse(&argv(parts)).unwrap() {
            Parsed::Run(invocation) => invocation,
            Parsed::Exit(_) => panic!("expected a run"),
        }
    }

    #[test]
    fn plain_convert_splits_inputs_and_output() {
        let inv = run(&["a.wav", "b.wav", "out.wav"]);
        assert_eq!(inv.inputs.len(), 2);
        assert_eq!(inv.inputs[0].filename, "a.wav");
        assert_eq!(inv.output.filename, "out.wav");
        assert_eq!(inv.opts.combine, CombineMode::Concatenate);
        assert!(inv.effects.is_empty());
    }

    #[test]
    fn fopts_bind_to_the_following_file() {
        let inv = run(&["-r", "8000", "-c", "1", "-s", "-2", "in.raw", "out.wav"]);
        let input = &inv.inputs[0];
        assert_eq!(input.signal.rate, Some(8000));
        assert_eq!(input.signal.channels, Some(1));
        assert_eq!(input.signal.encoding, Some(Encoding::Signed));
        assert_eq!(input.signal.size, Some(SampleSize::Two));
        assert_eq!(inv.output.signal.rate, None);
    }

    #[test]
    fn fopts_reset_between_files() {
        let inv = run(&["-r", "8000", "a.raw", "-r", "44100", "b.raw", "out.wav"]);
        assert_eq!(inv.inputs[0].signal.rate, Some(8000));
        assert_eq!(inv.inputs[1].signal.rate, Some(44100));
        assert_eq!(inv.output.signal.rate, None);
    }

    #[test]
    fn effects_section_starts_at_a_known_name() {
        let inv = run(&["in.wav", "out.wav", "vol", "0.5", "trim", "0", "10"]);
        assert_eq!(inv.effects.len(), 2);
        assert_eq!(inv.effects[0].name, "vol");
        assert_eq!(inv.effects[0].args, vec!["0.5"]);
        assert_eq!(inv.effects[1].name, "trim");
        assert_eq!(inv.effects[1].args, vec!["0", "10"]);
    }

    #[test]
    fn combine_shortcuts_work() {
        assert_eq!(
            run(&["-m", "a.wav", "b.wav", "o.wav"]).opts.combine,
            CombineMode::Mix
        );
        assert_eq!(
            run(&["-M", "a.wav", "b.wav", "o.wav"]).opts.combine,
            CombineMode::Merge
        );
        assert_eq!(
            run(&["--combine", "sequence", "a.wav", "b.wav", "o.wav"])
                .opts
                .combine,
            CombineMode::Sequence
        );
    }

    #[test]
    fn null_marker_creates_a_null_file() {
        let inv = run(&["-n", "out.wav", "pad", "1"]);
        assert_eq!(inv.inputs.len(), 1);
        assert_eq!(inv.inputs[0].filetype.as_deref(), Some("null"));
    }

    #[test]
    fn volume_accepts_negative_factors() {
        let inv = run(&["-v", "-0.5", "in.wav", "out.wav"]);
        assert_eq!(inv.inputs[0].volume, Some(-0.5));
    }

    #[test]
    fn verbosity_forms_are_normalized() {
        assert_eq!(run(&["-V4", "a.wav", "o.wav"]).opts.verbosity, 4);
        assert_eq!(run(&["-V", "a.wav", "o.wav"]).opts.verbosity, 3);
        assert_eq!(run(&["a.wav", "o.wav"]).opts.verbosity, 2);
    }

    #[test]
    fn byte_order_flags_reach_the_signal() {
        let inv = run(&["-x", "in.raw", "out.wav"]);
        assert_eq!(inv.inputs[0].signal.reverse_bytes, Some(true));
    }

    #[test]
    fn missing_output_is_a_usage_error() {
        assert!(matches!(
            parse(&argv(&["only.wav"])),
            Err(AppError::Usage(_))
        ));
    }

    #[test]
    fn unregistered_trailing_word_is_a_file_not_an_effect() {
        // Only registered names start the effects section; anything else
        // stays in the file list.
        let inv = run(&["in.wav", "out.wav", "reverb"]);
        assert_eq!(inv.output.filename, "reverb");
        assert_eq!(inv.inputs.len(), 2);
        assert!(inv.effects.is_empty());
    }

    #[test]
    fn buffer_floor_is_enforced() {
        assert!(matches!(
            parse(&argv(&["--buffer", "16", "a.wav", "o.wav"])),
            Err(AppError::Usage(_))
        ));
        let inv = run(&["--buffer", "65536", "a.wav", "o.wav"]);
        assert_eq!(inv.opts.buffer_samples, 16384);
    }

    #[test]
    fn play_personality_appends_a_device_output() {
        let argv: Vec<String> = vec!["play".to_string(), "a.wav".to_string()];
        let Parsed::Run(inv) = parse(&argv).unwrap() else {
            panic!("expected a run");
        };
        assert_eq!(inv.personality, Personality::Play);
        assert!(inv.output.is_device());
        assert_eq!(inv.opts.combine, CombineMode::Sequence);
        assert_eq!(inv.opts.replay_gain, ReplayGainMode::Track);
    }

    #[test]
    fn rec_personality_prepends_a_device_input() {
        let argv: Vec<String> = vec!["rec".to_string(), "take.wav".to_string()];
        let Parsed::Run(inv) = parse(&argv).unwrap() else {
            panic!("expected a run");
        };
        assert!(inv.inputs[0].is_device());
        assert_eq!(inv.output.filename, "take.wav");
    }

    #[test]
    fn effect_args_are_validated_early() {
        assert!(matches!(
            parse(&argv(&["in.wav", "out.wav", "vol", "loud"])),
            Err(AppError::Usage(_))
        ));
    }

    #[test]
    fn global_endian_fills_unset_files_only() {
        let inv = run(&["--endian", "big", "-L", "a.raw", "b.raw", "out.wav"]);
        let little = Some(cfg!(target_endian = "big"));
        let big = Some(!cfg!(target_endian = "big"));
        assert_eq!(inv.inputs[0].signal.reverse_bytes, little);
        assert_eq!(inv.inputs[1].signal.reverse_bytes, big);
    }
}
