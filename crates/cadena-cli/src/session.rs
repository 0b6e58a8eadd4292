//! The per-session driver loop.
//!
//! A session opens its inputs, plans and builds the effect chain, opens
//! the output with the signal derived from the combiner, then runs the
//! progress loop: combiner tick → chain pull → write, until the combiner
//! or the chain reports EOF, the user aborts, or the sink fails. Sequence
//! mode wraps all of this in an outer loop, one session per input, with
//! the output reopened each time.

use std::fs;
use std::io::{IsTerminal, Write as _};
use std::path::Path;

use anyhow::anyhow;
use cadena_core::{
    CombineMode, Combiner, EffectChain, Encoding, PlannedEffect, PullStatus, Sample, SampleSink,
    SampleSource, SampleSize, StreamInfo, build_chain, extract_speed, plan_chain,
};
use cadena_effects::{Registry, trim_start_offset};
use cadena_io::{FormatReader, FormatWriter, open_read, open_write};

use crate::AppError;
use crate::args::{FileEntry, GlobalOpts, Invocation, Plot};
use crate::interrupt::Interrupt;
use crate::progress::Progress;
use crate::replaygain;

/// Run a scanned invocation to completion.
pub fn run(invocation: Invocation) -> Result<(), AppError> {
    let interrupt = Interrupt::install().map_err(|e| AppError::Runtime(e.into()))?;
    let registry = Registry::new();

    let mut effects = invocation.effects;
    let speed = extract_speed(&mut effects).map_err(AppError::from_core)?;

    if invocation.opts.plot != Plot::Off {
        tracing::warn!("no built-in effect emits plot scripts; --plot ignored");
    }
    if invocation.opts.repeatable_rng {
        tracing::debug!("repeatable random sequence requested");
    }

    let session = Session {
        opts: &invocation.opts,
        output: &invocation.output,
        effects: &effects,
        speed,
        registry: &registry,
        interrupt: &interrupt,
    };

    if invocation.opts.combine == CombineMode::Sequence {
        // One session per input; the output closes and reopens between
        // them, and consecutive inputs must carry the same signal.
        let mut segue: Option<StreamInfo> = None;
        for input in &invocation.inputs {
            let proceed = session.run_one(std::slice::from_ref(input), &mut segue)?;
            if !proceed || interrupt.aborted() {
                break;
            }
        }
    } else {
        session.run_one(&invocation.inputs, &mut None)?;
    }

    if interrupt.aborted() {
        eprintln!("Aborted.");
    }
    Ok(())
}

/// Everything a single session needs besides its input list.
struct Session<'a> {
    opts: &'a GlobalOpts,
    output: &'a FileEntry,
    effects: &'a [PlannedEffect],
    speed: f64,
    registry: &'a Registry,
    interrupt: &'a Interrupt,
}

/// Adapts an opened reader to the combiner's source contract.
struct ReaderSource {
    reader: Box<dyn FormatReader>,
    info: StreamInfo,
}

impl SampleSource for ReaderSource {
    fn info(&self) -> StreamInfo {
        self.info
    }
    fn read(&mut self, buf: &mut [Sample]) -> cadena_core::Result<usize> {
        self.reader
            .read(buf)
            .map_err(|e| cadena_core::Error::Source(e.to_string()))
    }
    fn clips(&self) -> u64 {
        self.reader.clips()
    }
}

/// Adapts the opened writer to the scheduler's sink contract.
struct WriterSink<'a> {
    writer: &'a mut dyn FormatWriter,
}

impl SampleSink for WriterSink<'_> {
    fn write(&mut self, buf: &[Sample]) -> cadena_core::Result<usize> {
        self.writer
            .write(buf)
            .map_err(|e| cadena_core::Error::Sink(e.to_string()))
    }
}

/// Removes a created output file unless disarmed by a successful session.
struct OutputGuard {
    path: Option<String>,
}

impl OutputGuard {
    fn disarm(&mut self) {
        self.path = None;
    }
}

impl Drop for OutputGuard {
    fn drop(&mut self) {
        if let Some(path) = &self.path {
            if fs::metadata(path).map(|m| m.is_file()).unwrap_or(false) {
                let _ = fs::remove_file(path);
            }
        }
    }
}

fn open_error(path: &str, err: cadena_io::Error) -> AppError {
    match AppError::from_io(err) {
        AppError::Usage(message) => AppError::Usage(format!("{path}: {message}")),
        AppError::Runtime(err) => AppError::Runtime(err.context(format!("cannot open '{path}'"))),
    }
}

fn total_clips(combiner: &Combiner, chain: &EffectChain, writer: &dyn FormatWriter) -> u64 {
    combiner.source_clips()
        + combiner.volume_clips()
        + combiner.mixing_clips()
        + chain.effect_clips()
        + writer.clips()
}

impl Session<'_> {
    /// Run one session over `inputs`. Returns false when a sequence
    /// outer loop should stop (the next input cannot segue).
    fn run_one(
        &self,
        inputs: &[FileEntry],
        segue: &mut Option<StreamInfo>,
    ) -> Result<bool, AppError> {
        // Opening phase: interrupts are ignored.
        self.interrupt.leave_session();

        // Open inputs in reverse order.
        let count = inputs.len();
        let mut opened: Vec<Option<Box<dyn FormatReader>>> = Vec::new();
        opened.resize_with(count, || None);
        for i in (0..count).rev() {
            let entry = &inputs[i];
            let reader = open_read(&entry.filename, &entry.signal, entry.filetype.as_deref())
                .map_err(|e| open_error(&entry.filename, e))?;
            opened[i] = Some(reader);
        }
        let mut readers: Vec<Box<dyn FormatReader>> =
            opened.into_iter().map(|r| r.expect("all opened")).collect();

        let mut infos = Vec::with_capacity(count);
        for (reader, entry) in readers.iter().zip(inputs) {
            let info = reader.signal().stream().ok_or_else(|| {
                AppError::Runtime(anyhow!(
                    "'{}': format layer did not resolve rate and channels",
                    entry.filename
                ))
            })?;
            infos.push(info);
        }
        let first_signal = readers[0].signal().clone();

        // Sequence segue: consecutive inputs must match in rate and
        // channel count.
        if let Some(previous) = segue {
            if *previous != infos[0] {
                tracing::warn!(
                    file = inputs[0].filename.as_str(),
                    "input signal differs from the previous one; cannot segue"
                );
                return Ok(false);
            }
        } else {
            *segue = Some(infos[0]);
        }

        // Input lengths in wide samples, for progress and the output
        // length derivation.
        let lengths: Vec<Option<u64>> = readers
            .iter()
            .zip(&infos)
            .map(|(r, info)| {
                r.length_samples()
                    .filter(|len| *len > 0)
                    .map(|len| len / u64::from(info.channels))
            })
            .collect();
        let total_wide: Option<u64> = match self.opts.combine {
            CombineMode::Sequence | CombineMode::Concatenate => {
                lengths.iter().copied().try_fold(0u64, |acc, len| {
                    len.map(|l| acc + l)
                })
            }
            CombineMode::Mix | CombineMode::Merge => lengths
                .iter()
                .copied()
                .try_fold(0u64, |acc, len| len.map(|l| acc.max(l))),
        };

        let combiner_rate = (f64::from(infos[0].rate) * self.speed).round() as u32;

        // Seek optimization: a leading trim over a single seekable input
        // skips by seeking, and the trim's start collapses to zero.
        let mut effects = self.effects.to_vec();
        let mut initial_read_wide = 0u64;
        if let Some(first) = effects.first_mut() {
            if first.name == "trim" && count == 1 && readers[0].seekable() {
                if let Some(start_wide) = trim_start_offset(&first.args, combiner_rate) {
                    if start_wide > 0 {
                        match readers[0].seek(start_wide * u64::from(infos[0].channels)) {
                            Ok(()) => {
                                tracing::debug!(start_wide, "seeked past the trim start");
                                initial_read_wide = start_wide;
                                first.args[0] = "0s".to_string();
                            }
                            Err(err) => {
                                tracing::debug!(%err, "seek failed; trimming in-band");
                            }
                        }
                    }
                }
            }
        }

        // Per-input volumes: explicit -v, else 1/n for mix (keeps the
        // plain sum from clipping), else unity; replay gain folds in.
        let auto_volume = if self.opts.combine == CombineMode::Mix {
            Some(1.0 / count as f64)
        } else {
            None
        };
        let mut sources: Vec<(Box<dyn SampleSource>, f64)> = Vec::with_capacity(count);
        for ((reader, entry), info) in readers.drain(..).zip(inputs).zip(&infos) {
            let gain_db = replaygain::resolve(reader.comment(), self.opts.replay_gain);
            let mut volume = entry.volume.unwrap_or(auto_volume.unwrap_or(1.0));
            if let Some(db) = gain_db {
                tracing::debug!(file = entry.filename.as_str(), db, "applying replay gain");
                volume *= replaygain::to_linear(db);
            }
            sources.push((Box::new(ReaderSource { reader, info: *info }), volume));
        }

        let bufsize = self.opts.buffer_samples;
        let mut combiner = Combiner::new(self.opts.combine, sources, self.speed, bufsize)
            .map_err(AppError::from_core)?;
        combiner.set_read_wide_samples(initial_read_wide);
        let combined = combiner.info();

        // Plan the chain against the requested output signal.
        let out_target = StreamInfo {
            rate: self.output.signal.rate.unwrap_or(combined.rate),
            channels: self.output.signal.channels.unwrap_or(combined.channels),
        };
        let plan =
            plan_chain(&effects, self.registry, combined, out_target).map_err(AppError::from_core)?;

        // Output length, unless some effect makes it unknowable.
        let known_out_flat: Option<u64> = if plan.changes_length {
            None
        } else {
            total_wide.map(|wide| {
                let scaled = wide as f64 * f64::from(out_target.rate) / f64::from(combined.rate);
                scaled.round() as u64 * u64::from(out_target.channels)
            })
        };

        // Derive the output's unset fields: rate/channels from the
        // combiner, width and encoding from the first input. Companded
        // inputs decode to 16-bit linear, so they suggest that instead.
        let mut out_signal = self.output.signal.clone();
        out_signal.rate.get_or_insert(out_target.rate);
        out_signal.channels.get_or_insert(out_target.channels);
        match first_signal.encoding {
            Some(Encoding::Ulaw | Encoding::Alaw) => {
                out_signal.size.get_or_insert(SampleSize::Two);
                out_signal.encoding.get_or_insert(Encoding::Signed);
            }
            _ => {
                if let Some(size) = first_signal.size {
                    out_signal.size.get_or_insert(size);
                }
                if let Some(encoding) = first_signal.encoding {
                    out_signal.encoding.get_or_insert(encoding);
                }
            }
        }

        self.confirm_overwrite()?;

        let mut writer = open_write(
            &self.output.filename,
            &out_signal,
            self.output.filetype.as_deref(),
            known_out_flat,
            self.opts.comment.as_deref(),
        )
        .map_err(|e| open_error(&self.output.filename, e))?;

        let mut guard = OutputGuard {
            path: (!self.output.is_device() && self.output.filename != "-")
                .then(|| self.output.filename.clone()),
        };

        let mut chain = build_chain(&plan.entries, self.registry, combined, out_target, bufsize)
            .map_err(AppError::from_core)?;

        // The session proper.
        let skippable = self.opts.combine.is_serial() && self.opts.show_progress;
        self.interrupt.enter_session(skippable);
        let mut progress = Progress::new(self.opts.show_progress, combined.rate, total_wide);
        let mut sink = WriterSink {
            writer: writer.as_mut(),
        };

        let looped: Result<(), AppError> = loop {
            if self.interrupt.aborted() {
                break Ok(());
            }
            if self.interrupt.take_skip() {
                tracing::info!("skipping the current input");
                match self.opts.combine {
                    CombineMode::Sequence => break Ok(()),
                    CombineMode::Concatenate => {
                        if !combiner.skip_current() {
                            break Ok(());
                        }
                    }
                    CombineMode::Mix | CombineMode::Merge => {}
                }
            }

            let channels = chain.input_info().channels as usize;
            let wide = {
                let buf = chain.input_buf_mut();
                match combiner.combine_next(buf) {
                    Ok(wide) => wide,
                    Err(err) => break Err(AppError::from_core(err)),
                }
            };
            chain.input_produced(wide * channels);
            if wide == 0 {
                break Ok(());
            }

            progress.update(
                combiner.read_wide_samples(),
                chain.output_wide_samples(),
                total_clips(&combiner, &chain, &*sink.writer),
            );

            match chain.flow_out(&mut sink, self.interrupt.abort_flag()) {
                Ok(PullStatus::NeedInput) => {}
                Ok(PullStatus::Eof) => break Ok(()),
                Err(err) => break Err(AppError::from_core(err)),
            }
        };

        // A runtime failure skips the drain; cleanup still happens.
        let drained: Result<(), AppError> = if looped.is_ok() {
            chain
                .drain_out(&mut sink, self.interrupt.abort_flag())
                .map_err(AppError::from_core)
        } else {
            Ok(())
        };

        chain.stop_all();
        let clips = total_clips(&combiner, &chain, &*sink.writer);
        progress.finish(
            combiner.read_wide_samples(),
            chain.output_wide_samples(),
            clips,
        );
        drop(sink);

        let finalized = writer
            .finalize()
            .map_err(|e| AppError::Runtime(anyhow!(e).context("closing the output failed")));
        self.interrupt.leave_session();

        let result = looped.and(drained).and(finalized);
        if result.is_ok() {
            guard.disarm();
            if clips > 0 {
                tracing::warn!(clips, "audio was clipped; consider lowering the volume");
            }
        }
        result.map(|()| true)
    }

    fn confirm_overwrite(&self) -> Result<(), AppError> {
        if !self.opts.interactive
            || self.output.is_device()
            || self.output.filename == "-"
            || !Path::new(&self.output.filename).exists()
            || !std::io::stdin().is_terminal()
        {
            return Ok(());
        }
        eprint!(
            "cadena: '{}' exists; overwrite? (y/n) ",
            self.output.filename
        );
        let _ = std::io::stderr().flush();
        let mut answer = String::new();
        let _ = std::io::stdin().read_line(&mut answer);
        if answer.trim_start().starts_with(['y', 'Y']) {
            Ok(())
        } else {
            Err(AppError::Usage(format!(
                "not overwriting '{}'",
                self.output.filename
            )))
        }
    }
}
