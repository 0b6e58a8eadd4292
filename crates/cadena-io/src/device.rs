//! Default audio device input/output via cpal.
//!
//! The engine is synchronous: reads and writes block. cpal delivers audio
//! on its own callback thread, so both directions are bridged over a
//! bounded channel — the bound is what gives the engine backpressure
//! against a device that consumes slower than the pipeline produces.

use std::collections::VecDeque;
use std::sync::mpsc::{Receiver, SyncSender, TryRecvError, sync_channel};

use cadena_core::{Sample, SignalInfo, sample_from_f64, sample_to_f64};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::format::{FormatReader, FormatWriter};
use crate::{Error, Result};

/// Blocks of samples in flight between the engine and the callback.
const QUEUE_BLOCKS: usize = 8;

fn stream_error(err: impl std::fmt::Display) -> Error {
    Error::Stream(err.to_string())
}

/// An opened capture stream on the default input device.
pub struct DeviceInput {
    signal: SignalInfo,
    rx: Receiver<Vec<f32>>,
    pending: VecDeque<f32>,
    clips: u64,
    _stream: cpal::Stream,
}

/// Open the default input device for reading.
pub fn open_read(hints: &SignalInfo) -> Result<Box<dyn FormatReader>> {
    let host = cpal::default_host();
    let device = host.default_input_device().ok_or(Error::NoDevice)?;
    let default = device.default_input_config().map_err(stream_error)?;

    let rate = hints.rate.unwrap_or(default.sample_rate());
    let channels = hints.channels.unwrap_or(u32::from(default.channels()));
    let config = cpal::StreamConfig {
        channels: channels as u16,
        sample_rate: rate,
        buffer_size: cpal::BufferSize::Default,
    };

    let (tx, rx) = sync_channel::<Vec<f32>>(QUEUE_BLOCKS);
    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                // Capture must never block the callback; drop on overrun.
                if tx.try_send(data.to_vec()).is_err() {
                    tracing::warn!("input overrun; dropping a capture block");
                }
            },
            |err| tracing::error!(%err, "input stream error"),
            None,
        )
        .map_err(stream_error)?;
    stream.play().map_err(stream_error)?;

    let signal = SignalInfo {
        rate: Some(rate),
        channels: Some(channels),
        ..SignalInfo::default()
    };

    Ok(Box::new(DeviceInput {
        signal,
        rx,
        pending: VecDeque::new(),
        clips: 0,
        _stream: stream,
    }))
}

impl FormatReader for DeviceInput {
    fn signal(&self) -> &SignalInfo {
        &self.signal
    }

    fn length_samples(&self) -> Option<u64> {
        None
    }

    fn is_device(&self) -> bool {
        true
    }

    fn read(&mut self, buf: &mut [Sample]) -> Result<usize> {
        // Block for the first sample, then take whatever has arrived.
        if self.pending.is_empty() {
            match self.rx.recv() {
                Ok(block) => self.pending.extend(block),
                Err(_) => return Ok(0),
            }
        }
        loop {
            match self.rx.try_recv() {
                Ok(block) => self.pending.extend(block),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        let n = buf.len().min(self.pending.len());
        for slot in &mut buf[..n] {
            let v = self.pending.pop_front().unwrap_or(0.0);
            *slot = sample_from_f64(f64::from(v), &mut self.clips);
        }
        Ok(n)
    }

    fn clips(&self) -> u64 {
        self.clips
    }
}

/// An opened playback stream on the default output device.
pub struct DeviceOutput {
    signal: SignalInfo,
    tx: Option<SyncSender<Vec<f32>>>,
    _stream: cpal::Stream,
}

/// Open the default output device for writing.
pub fn open_write(signal: &SignalInfo) -> Result<Box<dyn FormatWriter>> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(Error::NoDevice)?;
    let default = device.default_output_config().map_err(stream_error)?;

    let rate = signal.rate.unwrap_or(default.sample_rate());
    let channels = signal.channels.unwrap_or(u32::from(default.channels()));
    let config = cpal::StreamConfig {
        channels: channels as u16,
        sample_rate: rate,
        buffer_size: cpal::BufferSize::Default,
    };

    let (tx, rx) = sync_channel::<Vec<f32>>(QUEUE_BLOCKS);
    let mut pending: VecDeque<f32> = VecDeque::new();
    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for slot in data.iter_mut() {
                    if pending.is_empty() {
                        match rx.try_recv() {
                            Ok(block) => pending.extend(block),
                            Err(_) => {}
                        }
                    }
                    *slot = pending.pop_front().unwrap_or(0.0);
                }
            },
            |err| tracing::error!(%err, "output stream error"),
            None,
        )
        .map_err(stream_error)?;
    stream.play().map_err(stream_error)?;

    let resolved = SignalInfo {
        rate: Some(rate),
        channels: Some(channels),
        ..SignalInfo::default()
    };

    Ok(Box::new(DeviceOutput {
        signal: resolved,
        tx: Some(tx),
        _stream: stream,
    }))
}

impl FormatWriter for DeviceOutput {
    fn signal(&self) -> &SignalInfo {
        &self.signal
    }

    fn is_device(&self) -> bool {
        true
    }

    fn write(&mut self, buf: &[Sample]) -> Result<usize> {
        let block: Vec<f32> = buf.iter().map(|&s| sample_to_f64(s) as f32).collect();
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| Error::Stream("write after finalize".to_string()))?;
        // Blocks when the queue is full: playback pace is the
        // pipeline's backpressure.
        tx.send(block)
            .map_err(|_| Error::Stream("output device went away".to_string()))?;
        Ok(buf.len())
    }

    fn finalize(&mut self) -> Result<()> {
        // Closing the channel lets the callback drain what is queued;
        // give the tail a moment to play out.
        if let Some(tx) = self.tx.take() {
            drop(tx);
            std::thread::sleep(std::time::Duration::from_millis(200));
        }
        Ok(())
    }
}
