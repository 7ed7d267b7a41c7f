use std::sync::atomic::{AtomicBool, AtomicI16, AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{Result, RetroError};
use crate::resampler::{LinearResampler, Resampler, SincResampler};
use crate::ring_buffer::RingBuffer;

/// Requested shape of the device output stream. Format is always
/// interleaved stereo i16.
#[derive(Debug, Clone, Copy)]
pub struct OutputStreamConfig {
    pub channels: u16,
    pub sample_rate: u32,
    pub low_latency: bool,
}

/// Pull side of an output stream: the device thread fills its buffer from
/// here. Implemented by [`PcmQueue`]; embedder backends only forward calls.
pub trait AudioSource: Send + Sync {
    fn on_ready(&self, output: &mut [i16]);
}

/// A started OS stream. Dropping the handle closes the stream.
pub trait StreamHandle: Send {
    fn start(&mut self) -> Result<()>;
    fn stop(&mut self) -> Result<()>;
}

/// Factory over the platform audio output. The crate never talks to the OS
/// directly; the embedder supplies this at `create`.
pub trait AudioBackend: Send {
    fn preferred_sample_rate(&self) -> u32;

    fn open_output(
        &self,
        config: OutputStreamConfig,
        source: Arc<dyn AudioSource>,
    ) -> Result<Box<dyn StreamHandle>>;
}

const LATENCY_MS: u64 = 128;
const LOW_LATENCY_MS: u64 = 32;

// Drift controller gains. Error is the fill deviation as a fraction of
// capacity, so the proportional term alone stays within ±4%.
const DRIFT_KP: f64 = 0.08;
const DRIFT_KI: f64 = 0.0002;
const DRIFT_ADJUST_EVERY: u32 = 10;

const MULTIPLIER_MIN: f64 = 0.95;
const MULTIPLIER_MAX: f64 = 1.05;

/// Shared state between the core thread (writer) and the device callback
/// thread (reader). The ring buffer is the only synchronization point.
pub struct PcmQueue {
    ring: RingBuffer,
    enabled: AtomicBool,
    last_left: AtomicI16,
    last_right: AtomicI16,
    underruns: AtomicU64,
}

impl PcmQueue {
    fn new(capacity_samples: usize) -> Self {
        Self {
            ring: RingBuffer::new(capacity_samples),
            enabled: AtomicBool::new(true),
            last_left: AtomicI16::new(0),
            last_right: AtomicI16::new(0),
            underruns: AtomicU64::new(0),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
        if !enabled {
            self.ring.clear();
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }

    /// Queued frames (one frame = two samples).
    pub fn fill_frames(&self) -> usize {
        self.ring.len() / 2
    }
}

impl AudioSource for PcmQueue {
    /// Realtime path: copy what is queued, hold the last frame over any
    /// underrun. Must not block or allocate.
    fn on_ready(&self, output: &mut [i16]) {
        if !self.enabled.load(Ordering::Relaxed) {
            output.fill(0);
            return;
        }

        let read = self.ring.read(output);

        if read >= 2 {
            self.last_left.store(output[read - 2], Ordering::Relaxed);
            self.last_right.store(output[read - 1], Ordering::Relaxed);
        }

        if read < output.len() {
            self.underruns.fetch_add(1, Ordering::Relaxed);
            let left = self.last_left.load(Ordering::Relaxed);
            let right = self.last_right.load(Ordering::Relaxed);
            for frame in output[read..].chunks_mut(2) {
                frame[0] = left;
                if frame.len() > 1 {
                    frame[1] = right;
                }
            }
        }
    }
}

/// Owns the output stream and the producer half of the PCM path.
///
/// The core thread calls [`write`](Audio::write) with whatever
/// `retro_audio_sample_batch` delivers; samples are rate-converted to the
/// device rate with a drift-compensating multiplier that keeps the queue
/// near half full.
pub struct Audio {
    queue: Arc<PcmQueue>,
    stream: Box<dyn StreamHandle>,
    resampler: Box<dyn Resampler>,
    input_rate: f64,
    output_rate: f64,
    capacity_frames: usize,
    multiplier: f64,
    integral_error: f64,
    time_stretch: f64,
    writes_since_adjust: u32,
    scratch: Vec<i16>,
}

impl Audio {
    pub fn new(
        backend: &dyn AudioBackend,
        input_sample_rate: f64,
        low_latency: bool,
    ) -> Result<Self> {
        if input_sample_rate <= 0.0 {
            return Err(RetroError::Generic(format!(
                "core reported invalid sample rate {input_sample_rate}"
            )));
        }

        let output_rate = backend.preferred_sample_rate();
        let latency_ms = if low_latency { LOW_LATENCY_MS } else { LATENCY_MS };
        let capacity_frames = (output_rate as u64 * latency_ms / 1000).max(256) as usize;

        info!(
            input_sample_rate,
            output_rate, capacity_frames, low_latency, "initializing audio"
        );

        let queue = Arc::new(PcmQueue::new(capacity_frames * 2));

        let config = OutputStreamConfig {
            channels: 2,
            sample_rate: output_rate,
            low_latency,
        };
        let source: Arc<dyn AudioSource> = Arc::clone(&queue) as Arc<dyn AudioSource>;
        let stream = match backend.open_output(config, source) {
            Ok(stream) => stream,
            Err(err) if low_latency => {
                // Low-latency streams are best effort.
                debug!(%err, "low-latency stream rejected, retrying default");
                let config = OutputStreamConfig {
                    low_latency: false,
                    ..config
                };
                backend.open_output(config, Arc::clone(&queue) as Arc<dyn AudioSource>)?
            }
            Err(err) => return Err(err),
        };

        Ok(Self {
            queue,
            stream,
            resampler: choose_resampler(low_latency),
            input_rate: input_sample_rate,
            output_rate: output_rate as f64,
            capacity_frames,
            multiplier: 1.0,
            integral_error: 0.0,
            time_stretch: 1.0,
            writes_since_adjust: 0,
            scratch: Vec::new(),
        })
    }

    pub fn start(&mut self) -> Result<()> {
        self.stream.start()
    }

    pub fn stop(&mut self) -> Result<()> {
        self.stream.stop()
    }

    pub fn queue(&self) -> Arc<PcmQueue> {
        Arc::clone(&self.queue)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.queue.set_enabled(enabled);
    }

    /// Frame-pacing feedback from the scheduler; biases the effective input
    /// rate so produced and consumed totals agree over long windows.
    pub fn set_time_stretch(&mut self, factor: f64) {
        self.time_stretch = factor.clamp(MULTIPLIER_MIN, MULTIPLIER_MAX);
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Core-thread write path for one `retro_audio_sample_batch`.
    pub fn write(&mut self, samples: &[i16]) {
        if samples.len() < 2 || !self.queue.enabled() {
            return;
        }

        self.maybe_adjust_multiplier();

        let input_frames = samples.len() / 2;
        let effective_input_rate = self.input_rate * self.multiplier / self.time_stretch;
        let output_frames =
            ((input_frames as f64 * self.output_rate / effective_input_rate).round() as usize)
                .max(1);

        self.scratch.resize(output_frames * 2, 0);
        self.resampler
            .resample(&samples[..input_frames * 2], &mut self.scratch);

        let dropped = self.queue.ring.write(&self.scratch);
        if dropped > 0 {
            debug!(dropped, "audio queue overflow");
        }
    }

    /// PI controller over the queue depth: target is half capacity, output
    /// is a sample-rate multiplier clamped to ±5%.
    fn maybe_adjust_multiplier(&mut self) {
        self.writes_since_adjust += 1;
        if self.writes_since_adjust < DRIFT_ADJUST_EVERY {
            return;
        }
        self.writes_since_adjust = 0;

        let fill = self.queue.fill_frames() as f64;
        let target = self.capacity_frames as f64 / 2.0;
        let error = (fill - target) / self.capacity_frames as f64;

        self.integral_error += error;
        self.multiplier = (1.0 + DRIFT_KP * error + DRIFT_KI * self.integral_error)
            .clamp(MULTIPLIER_MIN, MULTIPLIER_MAX);
    }
}

fn choose_resampler(low_latency: bool) -> Box<dyn Resampler> {
    // Sinc costs taps× more CPU per sample; keep the cheap path when the
    // embedder asked for minimum latency.
    if low_latency {
        Box::new(LinearResampler)
    } else {
        Box::new(SincResampler::new(8))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct FakeBackend {
        sample_rate: u32,
        source: Mutex<Option<Arc<dyn AudioSource>>>,
        reject_low_latency: bool,
    }

    impl FakeBackend {
        fn new(sample_rate: u32) -> Arc<Self> {
            Arc::new(Self {
                sample_rate,
                source: Mutex::new(None),
                reject_low_latency: false,
            })
        }

        fn pull(&self, frames: usize) -> Vec<i16> {
            let mut out = vec![0i16; frames * 2];
            self.source
                .lock()
                .as_ref()
                .expect("stream not opened")
                .on_ready(&mut out);
            out
        }
    }

    struct FakeStream;

    impl StreamHandle for FakeStream {
        fn start(&mut self) -> Result<()> {
            Ok(())
        }
        fn stop(&mut self) -> Result<()> {
            Ok(())
        }
    }

    impl AudioBackend for Arc<FakeBackend> {
        fn preferred_sample_rate(&self) -> u32 {
            self.sample_rate
        }

        fn open_output(
            &self,
            config: OutputStreamConfig,
            source: Arc<dyn AudioSource>,
        ) -> Result<Box<dyn StreamHandle>> {
            if config.low_latency && self.reject_low_latency {
                return Err(RetroError::Generic("no low latency stream".into()));
            }
            *self.source.lock() = Some(source);
            Ok(Box::new(FakeStream))
        }
    }

    fn constant_frames(value: i16, frames: usize) -> Vec<i16> {
        let mut out = Vec::with_capacity(frames * 2);
        for _ in 0..frames {
            out.push(value);
            out.push(value);
        }
        out
    }

    #[test]
    fn write_then_read_round_trips_at_equal_rates() {
        let backend = FakeBackend::new(48000);
        let mut audio = Audio::new(&backend, 48000.0, false).unwrap();

        audio.write(&constant_frames(1000, 480));
        let out = backend.pull(240);

        assert!(out.iter().all(|&s| (s - 1000).abs() <= 2), "{:?}", &out[..8]);
    }

    #[test]
    fn disabled_audio_reads_silence() {
        let backend = FakeBackend::new(48000);
        let audio = Audio::new(&backend, 48000.0, false).unwrap();

        audio.set_enabled(false);
        let out = backend.pull(128);
        assert!(out.iter().all(|&s| s == 0));
    }

    #[test]
    fn underrun_holds_last_sample() {
        let backend = FakeBackend::new(48000);
        let mut audio = Audio::new(&backend, 48000.0, false).unwrap();

        audio.write(&constant_frames(500, 4));
        let out = backend.pull(64);

        assert_eq!(audio.queue.underruns(), 1);
        // Tail of the pull is the held frame, not garbage.
        assert!(out[out.len() - 2..].iter().all(|&s| (s - 500).abs() <= 2));
    }

    #[test]
    fn resampling_scales_produced_frame_count() {
        let backend = FakeBackend::new(48000);
        let mut audio = Audio::new(&backend, 32000.0, false).unwrap();

        // 320 input frames at 32 kHz should queue ~480 output frames.
        audio.write(&constant_frames(100, 320));
        let fill = audio.queue.fill_frames();
        assert!((478..=482).contains(&fill), "queued {fill}");
    }

    #[test]
    fn multiplier_rises_when_queue_runs_full_and_stays_clamped() {
        let backend = FakeBackend::new(48000);
        let mut audio = Audio::new(&backend, 48000.0, false).unwrap();

        for _ in 0..200 {
            audio.write(&constant_frames(0, 512));
        }

        assert!(audio.multiplier() > 1.0);
        assert!(audio.multiplier() <= MULTIPLIER_MAX);
    }

    #[test]
    fn multiplier_falls_when_queue_runs_dry() {
        let backend = FakeBackend::new(48000);
        let mut audio = Audio::new(&backend, 48000.0, false).unwrap();

        for _ in 0..40 {
            audio.write(&constant_frames(0, 16));
            let _ = backend.pull(512);
        }

        assert!(audio.multiplier() < 1.0);
        assert!(audio.multiplier() >= MULTIPLIER_MIN);
    }

    #[test]
    fn low_latency_falls_back_when_rejected() {
        let backend = Arc::new(FakeBackend {
            sample_rate: 44100,
            source: Mutex::new(None),
            reject_low_latency: true,
        });
        let audio = Audio::new(&backend, 44100.0, true);
        assert!(audio.is_ok());
    }

    #[test]
    fn low_latency_uses_smaller_queue() {
        let backend = FakeBackend::new(48000);
        let normal = Audio::new(&backend, 48000.0, false).unwrap();
        let low = Audio::new(&backend, 48000.0, true).unwrap();
        assert!(low.capacity_frames < normal.capacity_frames);
    }
}
