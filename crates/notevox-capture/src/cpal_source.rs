use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use notevox_foundation::CaptureError;

use crate::source::{AudioSource, FrameSink};

/// `AudioSource` backed by a cpal input device.
///
/// The stream handle never leaves this struct; the session sees only the
/// trait surface. `pause` leaves the stream open but gates delivery with
/// an atomic flag (some backends do not support `Stream::pause`, so the
/// flag is the guarantee and the backend pause is best-effort).
pub struct CpalAudioSource {
    preferred_device: Option<String>,
    stream: Option<Stream>,
    delivering: Arc<AtomicBool>,
}

impl Default for CpalAudioSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CpalAudioSource {
    pub fn new() -> Self {
        Self {
            preferred_device: None,
            stream: None,
            delivering: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_device(name: impl Into<String>) -> Self {
        Self {
            preferred_device: Some(name.into()),
            ..Self::new()
        }
    }

    fn open_device(&self) -> Result<cpal::Device, CaptureError> {
        let host = cpal::default_host();
        match &self.preferred_device {
            Some(name) => host
                .input_devices()
                .map_err(acquisition)?
                .find(|d| d.name().map(|n| &n == name).unwrap_or(false))
                .ok_or_else(|| {
                    CaptureError::Acquisition(format!("input device {:?} not found", name))
                }),
            None => host
                .default_input_device()
                .ok_or_else(|| CaptureError::Acquisition("no default input device".to_string())),
        }
    }
}

impl AudioSource for CpalAudioSource {
    fn open(&mut self, sink: FrameSink) -> Result<u32, CaptureError> {
        if self.stream.is_some() {
            return Err(CaptureError::Acquisition(
                "audio stream already open".to_string(),
            ));
        }

        let device = self.open_device()?;
        if let Ok(name) = device.name() {
            tracing::info!("selected input device: {}", name);
        }
        let (config, sample_format) = negotiate_config(&device)?;
        let sample_rate = config.sample_rate.0;
        let channels = config.channels;

        let delivering = Arc::clone(&self.delivering);
        delivering.store(true, Ordering::SeqCst);
        let sink = Arc::new(Mutex::new(sink));

        let err_fn = |err: cpal::StreamError| {
            tracing::error!("audio stream error: {}", err);
        };

        // Conversion scratch is reused across callbacks so the audio thread
        // does not grow allocations in steady state.
        let mut scratch: Vec<f32> = Vec::new();

        let stream = match sample_format {
            SampleFormat::F32 => device
                .build_input_stream(
                    &config,
                    move |data: &[f32], _: &_| {
                        if !delivering.load(Ordering::SeqCst) {
                            return;
                        }
                        downmix_f32(data, channels, &mut scratch);
                        (sink.lock())(&scratch);
                    },
                    err_fn,
                    None,
                )
                .map_err(acquisition)?,
            SampleFormat::I16 => device
                .build_input_stream(
                    &config,
                    move |data: &[i16], _: &_| {
                        if !delivering.load(Ordering::SeqCst) {
                            return;
                        }
                        downmix_i16(data, channels, &mut scratch);
                        (sink.lock())(&scratch);
                    },
                    err_fn,
                    None,
                )
                .map_err(acquisition)?,
            SampleFormat::U16 => device
                .build_input_stream(
                    &config,
                    move |data: &[u16], _: &_| {
                        if !delivering.load(Ordering::SeqCst) {
                            return;
                        }
                        downmix_u16(data, channels, &mut scratch);
                        (sink.lock())(&scratch);
                    },
                    err_fn,
                    None,
                )
                .map_err(acquisition)?,
            other => {
                return Err(CaptureError::Acquisition(format!(
                    "unsupported sample format: {:?}",
                    other
                )));
            }
        };

        if let Err(e) = stream.play() {
            // Drop the stream before surfacing: no partial acquisition.
            drop(stream);
            self.delivering.store(false, Ordering::SeqCst);
            return Err(acquisition(e));
        }

        self.stream = Some(stream);
        tracing::info!(
            sample_rate,
            channels,
            format = ?sample_format,
            "audio stream opened"
        );
        Ok(sample_rate)
    }

    fn pause(&mut self) {
        self.delivering.store(false, Ordering::SeqCst);
        if let Some(stream) = &self.stream {
            if let Err(e) = stream.pause() {
                tracing::warn!("backend does not support stream pause: {}", e);
            }
        }
    }

    fn resume(&mut self) {
        if let Some(stream) = &self.stream {
            if let Err(e) = stream.play() {
                tracing::error!("failed to restart audio stream: {}", e);
            }
        }
        self.delivering.store(true, Ordering::SeqCst);
    }

    fn close(&mut self) {
        self.delivering.store(false, Ordering::SeqCst);
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::info!("audio stream closed");
        }
    }
}

fn acquisition<E: std::fmt::Display>(err: E) -> CaptureError {
    CaptureError::Acquisition(err.to_string())
}

fn negotiate_config(
    device: &cpal::Device,
) -> Result<(StreamConfig, SampleFormat), CaptureError> {
    // Prefer the device default; fall back to the first supported config.
    if let Ok(default_config) = device.default_input_config() {
        return Ok((
            StreamConfig {
                channels: default_config.channels(),
                sample_rate: default_config.sample_rate(),
                buffer_size: cpal::BufferSize::Default,
            },
            default_config.sample_format(),
        ));
    }

    if let Ok(mut configs) = device.supported_input_configs() {
        if let Some(config) = configs.next() {
            return Ok((config.with_max_sample_rate().into(), config.sample_format()));
        }
    }

    Err(CaptureError::Acquisition(
        "no supported input configuration".to_string(),
    ))
}

fn downmix_f32(data: &[f32], channels: u16, out: &mut Vec<f32>) {
    out.clear();
    if channels <= 1 {
        out.extend_from_slice(data);
        return;
    }
    let ch = channels as usize;
    out.reserve(data.len() / ch);
    for frame in data.chunks_exact(ch) {
        out.push(frame.iter().sum::<f32>() / ch as f32);
    }
}

fn downmix_i16(data: &[i16], channels: u16, out: &mut Vec<f32>) {
    out.clear();
    let ch = channels.max(1) as usize;
    out.reserve(data.len() / ch);
    for frame in data.chunks_exact(ch) {
        let sum: f32 = frame.iter().map(|&s| s as f32 / 32768.0).sum();
        out.push(sum / ch as f32);
    }
}

fn downmix_u16(data: &[u16], channels: u16, out: &mut Vec<f32>) {
    out.clear();
    let ch = channels.max(1) as usize;
    out.reserve(data.len() / ch);
    for frame in data.chunks_exact(ch) {
        // Center unsigned [0, 65535] before normalizing.
        let sum: f32 = frame
            .iter()
            .map(|&s| (s as f32 - 32768.0) / 32768.0)
            .sum();
        out.push(sum / ch as f32);
    }
}
