use std::ffi::{c_int, c_uint};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::audio::StreamHandle;
use crate::error::Result;
use crate::ffi;
use crate::ring_buffer::RingBuffer;

/// Requested shape of a device input stream: mono i16, generic preset,
/// exclusive sharing where the platform supports it.
#[derive(Debug, Clone, Copy)]
pub struct MicStreamConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub exclusive: bool,
}

/// Factory over the platform audio input, supplied by the embedder when
/// microphone support is enabled.
pub trait MicrophoneBackend: Send {
    fn open_input(
        &self,
        config: MicStreamConfig,
        sink: Arc<MicQueue>,
    ) -> Result<Box<dyn StreamHandle>>;
}

static BACKEND: Lazy<Mutex<Option<Box<dyn MicrophoneBackend>>>> =
    Lazy::new(|| Mutex::new(None));

pub fn install_backend(backend: Option<Box<dyn MicrophoneBackend>>) {
    *BACKEND.lock() = backend;
}

/// Capture fifo between the device input thread (writer) and the core
/// thread (reader, through `read_mic`).
pub struct MicQueue {
    ring: RingBuffer,
    running: AtomicBool,
}

impl MicQueue {
    fn new(capacity_samples: usize) -> Self {
        Self {
            ring: RingBuffer::new(capacity_samples),
            running: AtomicBool::new(false),
        }
    }

    /// Device-thread entry point; drops oldest capture on overflow.
    pub fn push(&self, samples: &[i16]) {
        if self.running.load(Ordering::Relaxed) {
            self.ring.write(samples);
        }
    }
}

/// One microphone opened by the core. Handed across the ABI as an opaque
/// pointer; the vtable functions reconstitute the box.
pub struct Microphone {
    queue: Arc<MicQueue>,
    stream: Option<Box<dyn StreamHandle>>,
    sample_rate: u32,
}

impl Microphone {
    fn open(sample_rate: u32) -> Option<Self> {
        let backend = BACKEND.lock();
        let Some(backend) = backend.as_ref() else {
            warn!("core opened a microphone but no input backend is installed");
            return None;
        };

        // Half a second of capture, as much as a core may sanely lag.
        let queue = Arc::new(MicQueue::new((sample_rate / 2).max(256) as usize));

        let config = MicStreamConfig {
            sample_rate,
            channels: 1,
            exclusive: true,
        };

        let stream = match backend.open_input(config, Arc::clone(&queue)) {
            Ok(stream) => stream,
            Err(err) => {
                warn!(%err, "failed to open microphone stream");
                return None;
            }
        };

        info!(sample_rate, "microphone opened");

        Some(Self {
            queue,
            stream: Some(stream),
            sample_rate,
        })
    }

    fn set_running(&mut self, running: bool) -> bool {
        let Some(stream) = self.stream.as_mut() else {
            return false;
        };

        let result = if running { stream.start() } else { stream.stop() };
        if let Err(err) = result {
            warn!(%err, running, "microphone state change failed");
            return false;
        }

        self.queue.running.store(running, Ordering::Relaxed);
        true
    }

    fn is_running(&self) -> bool {
        self.queue.running.load(Ordering::Relaxed)
    }

    fn read(&self, samples: &mut [i16]) -> usize {
        self.queue.ring.read(samples)
    }
}

/// Vtable written into the core's `retro_microphone_interface` struct.
pub fn interface() -> ffi::MicrophoneInterface {
    ffi::MicrophoneInterface {
        interface_version: ffi::MICROPHONE_INTERFACE_VERSION,
        open_mic: mic_open,
        close_mic: mic_close,
        get_params: mic_get_params,
        set_mic_state: mic_set_state,
        get_mic_state: mic_get_state,
        read_mic: mic_read,
    }
}

unsafe extern "C" fn mic_open(params: *const ffi::MicrophoneParams) -> *mut ffi::MicrophoneHandle {
    let rate = params.as_ref().map(|p| p.rate).unwrap_or(44100);

    match Microphone::open(rate) {
        Some(microphone) => Box::into_raw(Box::new(microphone)).cast(),
        None => std::ptr::null_mut(),
    }
}

unsafe extern "C" fn mic_close(microphone: *mut ffi::MicrophoneHandle) {
    if microphone.is_null() {
        return;
    }
    let mut microphone = Box::from_raw(microphone.cast::<Microphone>());
    microphone.set_running(false);
    info!("microphone closed");
}

unsafe extern "C" fn mic_get_params(
    microphone: *const ffi::MicrophoneHandle,
    params: *mut ffi::MicrophoneParams,
) -> bool {
    let (Some(microphone), Some(params)) =
        (microphone.cast::<Microphone>().as_ref(), params.as_mut())
    else {
        return false;
    };

    params.rate = microphone.sample_rate as c_uint;
    true
}

unsafe extern "C" fn mic_set_state(microphone: *mut ffi::MicrophoneHandle, state: bool) -> bool {
    match microphone.cast::<Microphone>().as_mut() {
        Some(microphone) => microphone.set_running(state),
        None => false,
    }
}

unsafe extern "C" fn mic_get_state(microphone: *const ffi::MicrophoneHandle) -> bool {
    match microphone.cast::<Microphone>().as_ref() {
        Some(microphone) => microphone.is_running(),
        None => false,
    }
}

unsafe extern "C" fn mic_read(
    microphone: *mut ffi::MicrophoneHandle,
    samples: *mut i16,
    num_samples: usize,
) -> c_int {
    let Some(microphone) = microphone.cast::<Microphone>().as_mut() else {
        return -1;
    };
    if samples.is_null() {
        return -1;
    }

    let out = std::slice::from_raw_parts_mut(samples, num_samples);
    microphone.read(out) as c_int
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RetroError;

    struct FakeStream;

    impl StreamHandle for FakeStream {
        fn start(&mut self) -> Result<()> {
            Ok(())
        }
        fn stop(&mut self) -> Result<()> {
            Ok(())
        }
    }

    struct FakeMicBackend {
        sink: Mutex<Option<Arc<MicQueue>>>,
    }

    impl MicrophoneBackend for Arc<FakeMicBackend> {
        fn open_input(
            &self,
            config: MicStreamConfig,
            sink: Arc<MicQueue>,
        ) -> Result<Box<dyn StreamHandle>> {
            assert_eq!(config.channels, 1);
            *self.sink.lock() = Some(sink);
            Ok(Box::new(FakeStream))
        }
    }

    struct FailingBackend;

    impl MicrophoneBackend for FailingBackend {
        fn open_input(
            &self,
            _config: MicStreamConfig,
            _sink: Arc<MicQueue>,
        ) -> Result<Box<dyn StreamHandle>> {
            Err(RetroError::Generic("no device".into()))
        }
    }

    // One test body: the backend registry is process-global, so the phases
    // must not interleave with each other.
    #[test]
    fn microphone_lifecycle() {
        install_backend(None);
        assert!(Microphone::open(48000).is_none());

        install_backend(Some(Box::new(FailingBackend)));
        assert!(Microphone::open(48000).is_none());

        let backend = Arc::new(FakeMicBackend {
            sink: Mutex::new(None),
        });
        install_backend(Some(Box::new(Arc::clone(&backend))));

        let mut microphone = Microphone::open(16000).unwrap();
        let sink = backend.sink.lock().clone().unwrap();

        // Not running yet: capture is discarded.
        sink.push(&[1, 2, 3]);
        let mut out = [0i16; 8];
        assert_eq!(microphone.read(&mut out), 0);

        assert!(microphone.set_running(true));
        assert!(microphone.is_running());
        sink.push(&[4, 5, 6]);
        assert_eq!(microphone.read(&mut out), 3);
        assert_eq!(&out[..3], &[4, 5, 6]);

        assert!(microphone.set_running(false));
        assert!(!microphone.is_running());

        install_backend(None);
    }
}
