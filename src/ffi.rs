//! The parts of the libretro ABI that `libretro-sys` does not cover.
//!
//! `libretro-sys` stops at the 2016-era API surface. Hardware-render
//! negotiation, the rumble/log/disk vtables, VFS v2 and the microphone
//! interface are declared here as `#[repr(C)]` mirrors of `libretro.h`.
//! Layouts must stay byte-exact; cores dereference these blindly.

use std::ffi::{c_char, c_int, c_uint, c_void};

/// Commands with this bit set are not part of the stable libretro API.
pub const ENVIRONMENT_EXPERIMENTAL: u32 = 0x10000;

/// Sentinel frame pointer passed by hardware-rendered cores: the frame is
/// already in the framebuffer we handed out via `get_current_framebuffer`.
pub const HW_FRAME_BUFFER_VALID: *const c_void = usize::MAX as *const c_void;

// Input device classes and ids beyond the joypad constants that
// libretro-sys exposes.
pub const DEVICE_JOYPAD: c_uint = 1;
pub const DEVICE_ANALOG: c_uint = 5;
pub const DEVICE_POINTER: c_uint = 6;

pub const DEVICE_INDEX_ANALOG_LEFT: c_uint = 0;
pub const DEVICE_INDEX_ANALOG_RIGHT: c_uint = 1;
pub const DEVICE_ID_ANALOG_X: c_uint = 0;
pub const DEVICE_ID_ANALOG_Y: c_uint = 1;

pub const DEVICE_ID_POINTER_X: c_uint = 0;
pub const DEVICE_ID_POINTER_Y: c_uint = 1;
pub const DEVICE_ID_POINTER_PRESSED: c_uint = 2;

// retro_language values.
pub const LANGUAGE_ENGLISH: c_uint = 0;
pub const LANGUAGE_JAPANESE: c_uint = 1;
pub const LANGUAGE_FRENCH: c_uint = 2;
pub const LANGUAGE_SPANISH: c_uint = 3;
pub const LANGUAGE_GERMAN: c_uint = 4;
pub const LANGUAGE_ITALIAN: c_uint = 5;
pub const LANGUAGE_DUTCH: c_uint = 6;
pub const LANGUAGE_PORTUGUESE_BRAZIL: c_uint = 7;
pub const LANGUAGE_PORTUGUESE_PORTUGAL: c_uint = 8;
pub const LANGUAGE_RUSSIAN: c_uint = 9;
pub const LANGUAGE_KOREAN: c_uint = 10;
pub const LANGUAGE_CHINESE_TRADITIONAL: c_uint = 11;
pub const LANGUAGE_CHINESE_SIMPLIFIED: c_uint = 12;
pub const LANGUAGE_ESPERANTO: c_uint = 13;
pub const LANGUAGE_POLISH: c_uint = 14;
pub const LANGUAGE_VIETNAMESE: c_uint = 15;
pub const LANGUAGE_ARABIC: c_uint = 16;
pub const LANGUAGE_GREEK: c_uint = 17;
pub const LANGUAGE_TURKISH: c_uint = 18;

// retro_log_level values.
pub const LOG_DEBUG: c_uint = 0;
pub const LOG_INFO: c_uint = 1;
pub const LOG_WARN: c_uint = 2;
pub const LOG_ERROR: c_uint = 3;

// retro_rumble_effect values.
pub const RUMBLE_STRONG: c_uint = 0;
pub const RUMBLE_WEAK: c_uint = 1;

pub type HwContextResetFn = unsafe extern "C" fn();
pub type HwGetCurrentFramebufferFn = unsafe extern "C" fn() -> usize;
pub type HwGetProcAddressFn = unsafe extern "C" fn(sym: *const c_char) -> *const c_void;

/// `retro_hw_render_callback`. The core fills in the request half, the host
/// fills in `get_current_framebuffer` and `get_proc_address` before
/// returning `true`.
#[repr(C)]
pub struct HwRenderCallback {
    pub context_type: c_uint,
    pub context_reset: Option<HwContextResetFn>,
    pub get_current_framebuffer: Option<HwGetCurrentFramebufferFn>,
    pub get_proc_address: Option<HwGetProcAddressFn>,
    pub depth: bool,
    pub stencil: bool,
    pub bottom_left_origin: bool,
    pub version_major: c_uint,
    pub version_minor: c_uint,
    pub cache_context: bool,
    pub context_destroy: Option<HwContextResetFn>,
    pub debug_context: bool,
}

/// `retro_log_printf_t`. Variadic on the C side; the host handler ignores
/// the format arguments (stable Rust cannot receive them) and logs the
/// format string as-is.
pub type LogPrintfFn = unsafe extern "C" fn(level: c_uint, fmt: *const c_char, ...);

#[repr(C)]
pub struct LogCallback {
    pub log: LogPrintfFn,
}

pub type SetRumbleStateFn =
    unsafe extern "C" fn(port: c_uint, effect: c_uint, strength: u16) -> bool;

#[repr(C)]
pub struct RumbleInterface {
    pub set_rumble_state: SetRumbleStateFn,
}

/// `retro_disk_control_callback`: every pointer lives inside the core.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct DiskControlCallback {
    pub set_eject_state: Option<unsafe extern "C" fn(ejected: bool) -> bool>,
    pub get_eject_state: Option<unsafe extern "C" fn() -> bool>,
    pub get_image_index: Option<unsafe extern "C" fn() -> c_uint>,
    pub set_image_index: Option<unsafe extern "C" fn(index: c_uint) -> bool>,
    pub get_num_images: Option<unsafe extern "C" fn() -> c_uint>,
    pub replace_image_index: Option<
        unsafe extern "C" fn(index: c_uint, info: *const libretro_sys::GameInfo) -> bool,
    >,
    pub add_image_index: Option<unsafe extern "C" fn() -> bool>,
}

#[repr(C)]
pub struct ControllerDescription {
    pub desc: *const c_char,
    pub id: c_uint,
}

#[repr(C)]
pub struct ControllerInfo {
    pub types: *const ControllerDescription,
    pub num_types: c_uint,
}

// VFS API, version 2.

pub const VFS_SUPPORTED_VERSION: u32 = 2;

pub const VFS_FILE_ACCESS_READ: c_uint = 1;
pub const VFS_FILE_ACCESS_WRITE: c_uint = 1 << 1;
pub const VFS_FILE_ACCESS_READ_WRITE: c_uint = VFS_FILE_ACCESS_READ | VFS_FILE_ACCESS_WRITE;
pub const VFS_FILE_ACCESS_UPDATE_EXISTING: c_uint = 1 << 2;

pub const VFS_SEEK_POSITION_START: c_int = 0;
pub const VFS_SEEK_POSITION_CURRENT: c_int = 1;
pub const VFS_SEEK_POSITION_END: c_int = 2;

/// Opaque to the core; the concrete type is [`crate::vfs::VfsStream`].
#[repr(C)]
pub struct VfsFileHandle {
    _opaque: [u8; 0],
}

#[repr(C)]
pub struct VfsInterfaceInfo {
    pub required_interface_version: u32,
    pub iface: *mut VfsInterface,
}

#[repr(C)]
pub struct VfsInterface {
    // VFS API v1
    pub get_path: unsafe extern "C" fn(stream: *mut VfsFileHandle) -> *const c_char,
    pub open: unsafe extern "C" fn(
        path: *const c_char,
        mode: c_uint,
        hints: c_uint,
    ) -> *mut VfsFileHandle,
    pub close: unsafe extern "C" fn(stream: *mut VfsFileHandle) -> c_int,
    pub size: unsafe extern "C" fn(stream: *mut VfsFileHandle) -> i64,
    pub tell: unsafe extern "C" fn(stream: *mut VfsFileHandle) -> i64,
    pub seek:
        unsafe extern "C" fn(stream: *mut VfsFileHandle, offset: i64, seek_position: c_int) -> i64,
    pub read: unsafe extern "C" fn(stream: *mut VfsFileHandle, s: *mut c_void, len: u64) -> i64,
    pub write: unsafe extern "C" fn(stream: *mut VfsFileHandle, s: *const c_void, len: u64) -> i64,
    pub flush: unsafe extern "C" fn(stream: *mut VfsFileHandle) -> c_int,
    pub remove: unsafe extern "C" fn(path: *const c_char) -> c_int,
    pub rename: unsafe extern "C" fn(old_path: *const c_char, new_path: *const c_char) -> c_int,
    // VFS API v2
    pub truncate: unsafe extern "C" fn(stream: *mut VfsFileHandle, length: i64) -> i64,
}

// Microphone API, version 1.

pub const MICROPHONE_INTERFACE_VERSION: c_uint = 1;

/// Opaque to the core; the concrete type is [`crate::microphone::Microphone`].
#[repr(C)]
pub struct MicrophoneHandle {
    _opaque: [u8; 0],
}

#[repr(C)]
pub struct MicrophoneParams {
    pub rate: c_uint,
}

#[repr(C)]
pub struct MicrophoneInterface {
    pub interface_version: c_uint,
    pub open_mic: unsafe extern "C" fn(params: *const MicrophoneParams) -> *mut MicrophoneHandle,
    pub close_mic: unsafe extern "C" fn(microphone: *mut MicrophoneHandle),
    pub get_params: unsafe extern "C" fn(
        microphone: *const MicrophoneHandle,
        params: *mut MicrophoneParams,
    ) -> bool,
    pub set_mic_state: unsafe extern "C" fn(microphone: *mut MicrophoneHandle, state: bool) -> bool,
    pub get_mic_state: unsafe extern "C" fn(microphone: *const MicrophoneHandle) -> bool,
    pub read_mic: unsafe extern "C" fn(
        microphone: *mut MicrophoneHandle,
        samples: *mut i16,
        num_samples: usize,
    ) -> c_int,
}
