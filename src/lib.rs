//! Embeddable libretro frontend runtime.
//!
//! Loads a core shared object, mediates every callback of the libretro ABI,
//! paces the frame loop against the display, renders frames through a GL
//! shader chain and keeps core audio in sync with the device stream. The
//! embedding application supplies the OS pieces (GL context, audio streams,
//! vibration, file descriptors) behind small traits and drives the
//! [`runtime::Runtime`] façade.

pub mod audio;
pub mod core;
pub mod environment;
pub mod error;
pub mod ffi;
pub mod fps_sync;
pub mod input;
pub mod microphone;
pub mod resampler;
pub mod ring_buffer;
pub mod rumble;
pub mod runtime;
pub mod vfs;
pub mod video;

pub use crate::core::SystemInfo;

pub use audio::{AudioBackend, AudioSource, OutputStreamConfig, StreamHandle};
pub use environment::{Controller, Variable};
pub use error::{Result, RetroError};
pub use input::{KeyAction, MotionSource};
pub use microphone::{MicStreamConfig, MicrophoneBackend};
pub use rumble::RumbleEvent;
pub use runtime::{Runtime, RuntimeConfig, RuntimeListener};
pub use vfs::VfsFile;
pub use video::layout::Viewport;
pub use video::renderer::GlVersion;
pub use video::shaders::{ShaderConfig, ShaderKind, ShaderParam};
