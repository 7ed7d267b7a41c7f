use core::slice;
use std::ffi::{c_uint, CStr};
use std::os::raw::c_void;
use std::path::Path;

use libretro_sys::{GameGeometry, GameInfo, SystemAvInfo, SystemTiming};
use tracing::info;

use crate::error::{Result, RetroError};

mod api;
use api::Api;

const EXPECTED_LIB_RETRO_VERSION: u32 = 1;

/// A loaded core: the dynamic library plus its bound `retro_*` symbols.
///
/// Every method forwards into the core. None of them are reentrant and the
/// serialize family must never run concurrently with `run`; the runtime
/// enforces this by keeping the instance behind its run-lock mutex.
pub struct Core {
    api: Api,
}

/// Owned copy of `retro_get_system_info`.
#[derive(Debug, Clone)]
pub struct SystemInfo {
    pub library_name: String,
    pub library_version: String,
    pub valid_extensions: String,
    pub need_fullpath: bool,
    pub block_extract: bool,
}

impl Core {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let core = unsafe {
            let api = Api::load(path.as_ref())?;
            let core = Core { api };
            core.check_api_version()?;
            core
        };

        let system_info = core.system_info();
        info!(
            name = %system_info.library_name,
            version = %system_info.library_version,
            "core loaded"
        );

        Ok(core)
    }

    fn check_api_version(&self) -> Result<()> {
        let api_version = unsafe { (self.api.retro_api_version)() };

        if api_version != EXPECTED_LIB_RETRO_VERSION {
            return Err(RetroError::LoadLibrary(format!(
                "core was compiled against libretro version `{api_version}`, \
                 expected `{EXPECTED_LIB_RETRO_VERSION}`"
            )));
        }

        Ok(())
    }

    /// Installs the host callbacks. `retro_set_environment` must happen
    /// before `retro_init`; cores negotiate features from inside it.
    pub fn register_callbacks(
        &self,
        environment: libretro_sys::EnvironmentFn,
        video_refresh: libretro_sys::VideoRefreshFn,
        audio_sample: libretro_sys::AudioSampleFn,
        audio_sample_batch: libretro_sys::AudioSampleBatchFn,
        input_poll: libretro_sys::InputPollFn,
        input_state: libretro_sys::InputStateFn,
    ) {
        unsafe {
            (self.api.retro_set_environment)(environment);
            (self.api.retro_set_video_refresh)(video_refresh);
            (self.api.retro_set_audio_sample)(audio_sample);
            (self.api.retro_set_audio_sample_batch)(audio_sample_batch);
            (self.api.retro_set_input_poll)(input_poll);
            (self.api.retro_set_input_state)(input_state);
        }
    }

    pub fn init(&mut self) {
        unsafe { (self.api.retro_init)() }
    }

    pub fn deinit(&mut self) {
        unsafe { (self.api.retro_deinit)() }
    }

    pub fn run(&mut self) {
        unsafe { (self.api.retro_run)() }
    }

    pub fn reset(&mut self) {
        unsafe { (self.api.retro_reset)() }
    }

    pub fn system_info(&self) -> SystemInfo {
        let mut raw = libretro_sys::SystemInfo {
            library_name: std::ptr::null(),
            library_version: std::ptr::null(),
            valid_extensions: std::ptr::null(),
            need_fullpath: false,
            block_extract: false,
        };

        let to_string = |ptr: *const std::ffi::c_char| unsafe {
            ptr.as_ref()
                .map(|ptr| CStr::from_ptr(ptr).to_string_lossy().into_owned())
                .unwrap_or_default()
        };

        unsafe {
            (self.api.retro_get_system_info)(&mut raw);
        }

        SystemInfo {
            library_name: to_string(raw.library_name),
            library_version: to_string(raw.library_version),
            valid_extensions: to_string(raw.valid_extensions),
            need_fullpath: raw.need_fullpath,
            block_extract: raw.block_extract,
        }
    }

    pub fn system_av_info(&self) -> SystemAvInfo {
        let mut av_info = SystemAvInfo {
            geometry: GameGeometry {
                aspect_ratio: f32::NAN,
                base_width: 0,
                base_height: 0,
                max_width: 0,
                max_height: 0,
            },
            timing: SystemTiming {
                fps: 0.,
                sample_rate: 0.,
            },
        };

        unsafe {
            (self.api.retro_get_system_av_info)(&mut av_info);
        }

        av_info
    }

    /// # Safety
    /// Pointers inside `game_info` must stay valid for the duration of the
    /// call (and for the whole session for cores that keep them).
    pub unsafe fn load_game(&mut self, game_info: &GameInfo) -> Result<()> {
        if !(self.api.retro_load_game)(game_info) {
            return Err(RetroError::LoadGame);
        }
        Ok(())
    }

    pub fn unload_game(&mut self) {
        unsafe { (self.api.retro_unload_game)() }
    }

    pub fn serialize(&mut self) -> Result<Vec<u8>> {
        unsafe {
            let size = (self.api.retro_serialize_size)();
            if size == 0 {
                return Err(RetroError::Serialization(
                    "core does not support serialization".into(),
                ));
            }

            // `libretro_sys::CoreAPI::retro_serialize` is bound without its
            // `-> bool` return type (the real libretro ABI returns bool to
            // signal success/failure); correct the binding here.
            let retro_serialize: unsafe extern "C" fn(*mut c_void, usize) -> bool =
                core::mem::transmute(self.api.retro_serialize);

            let mut state = Vec::<u8>::with_capacity(size);
            if !retro_serialize(state.as_mut_ptr().cast::<c_void>(), size) {
                return Err(RetroError::Serialization("retro_serialize failed".into()));
            }
            state.set_len(size);

            Ok(state)
        }
    }

    pub fn unserialize(&mut self, state: &[u8]) -> Result<()> {
        unsafe {
            if !(self.api.retro_unserialize)(state.as_ptr().cast::<c_void>(), state.len()) {
                return Err(RetroError::Serialization("retro_unserialize failed".into()));
            }
        }
        Ok(())
    }

    pub fn cheat_set(&mut self, index: u32, enabled: bool, code: &CStr) {
        unsafe { (self.api.retro_cheat_set)(index, enabled, code.as_ptr()) }
    }

    pub fn cheat_reset(&mut self) {
        unsafe { (self.api.retro_cheat_reset)() }
    }

    pub fn set_controller_port_device(&mut self, port: c_uint, device: c_uint) {
        unsafe { (self.api.retro_set_controller_port_device)(port, device) }
    }

    pub fn save_ram(&self) -> &[u8] {
        unsafe {
            let region = libretro_sys::MEMORY_SAVE_RAM;
            let ptr = (self.api.retro_get_memory_data)(region);
            let len = (self.api.retro_get_memory_size)(region);

            if ptr.is_null() || len == 0 {
                return &[];
            }

            slice::from_raw_parts(ptr.cast::<u8>(), len)
        }
    }

    pub fn save_ram_mut(&mut self) -> &mut [u8] {
        unsafe {
            let region = libretro_sys::MEMORY_SAVE_RAM;
            let ptr = (self.api.retro_get_memory_data)(region);
            let len = (self.api.retro_get_memory_size)(region);

            if ptr.is_null() || len == 0 {
                return &mut [];
            }

            slice::from_raw_parts_mut(ptr.cast::<u8>(), len)
        }
    }

    /// Copies `data` into the core's save RAM region. The sizes must match;
    /// a mismatched blob would corrupt the save.
    pub fn restore_save_ram(&mut self, data: &[u8]) -> Result<()> {
        let save_ram = self.save_ram_mut();

        if save_ram.len() != data.len() {
            return Err(RetroError::Serialization(format!(
                "SRAM size mismatch: core region is {} bytes, blob is {}",
                save_ram.len(),
                data.len()
            )));
        }

        save_ram.copy_from_slice(data);
        Ok(())
    }
}
