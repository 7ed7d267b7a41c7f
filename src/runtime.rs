use std::ffi::{c_uint, c_void, CString};
use std::path::PathBuf;
use std::slice;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::audio::{Audio, AudioBackend};
use crate::core::{Core, SystemInfo};
use crate::environment::{self, Controller, EnvironmentInit, Variable};
use crate::error::{Result, RetroError};
use crate::ffi;
use crate::fps_sync::FpsSync;
use crate::input::{Input, KeyAction, MotionSource};
use crate::microphone::{self, MicrophoneBackend};
use crate::rumble::{Rumble, RumbleEvent};
use crate::vfs::{self, VfsFile};
use crate::video::layout::{VideoLayout, Viewport};
use crate::video::renderer::{FramebufferRenderer, GlVersion, ImageRenderer, Renderer};
use crate::video::shaders::{ShaderChain, ShaderConfig};
use crate::video::Video;

/// Callbacks from the runtime back to the embedder, invoked during `step`.
pub trait RuntimeListener: Send {
    /// The presented image's shape changed; re-query [`Runtime::aspect_ratio`].
    fn refresh_aspect_ratio(&self) {}

    fn rumble_event(&self, event: RumbleEvent) {
        let _ = event;
    }
}

/// Everything `create` needs up front.
pub struct RuntimeConfig {
    pub gl_version: GlVersion,
    pub core_path: PathBuf,
    pub system_directory: String,
    pub saves_directory: String,
    pub variables: Vec<Variable>,
    pub shader_config: ShaderConfig,
    pub screen_refresh_rate: f64,
    pub low_latency_audio: bool,
    pub enable_vfs: bool,
    pub enable_microphone: bool,
    pub skip_duplicate_frames: bool,
    pub ambient_mode: bool,
    pub language: String,
    /// GL symbol resolver handed to hardware-rendered cores
    /// (e.g. `eglGetProcAddress`). Without it `SET_HW_RENDER` is refused.
    pub gl_get_proc_address: Option<ffi::HwGetProcAddressFn>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LifecycleState {
    Created,
    GameLoaded,
    Running,
    Paused,
    Destroyed,
}

#[derive(Clone, Copy)]
struct AvSummary {
    fps: f64,
    sample_rate: f64,
    base_width: u32,
    base_height: u32,
}

// Process-wide component slots. The core ABI's callbacks carry no context
// pointer, so the trampolines below reach these instead; `Runtime` is the
// sole writer of the slots. The CORE mutex doubles as the run lock: holding
// it serializes retro_run against (un)serialize, cheats, reset and loading.
static CORE: Lazy<Mutex<Option<Core>>> = Lazy::new(|| Mutex::new(None));
static VIDEO: Lazy<Mutex<Option<Video>>> = Lazy::new(|| Mutex::new(None));
static AUDIO: Lazy<Mutex<Option<Audio>>> = Lazy::new(|| Mutex::new(None));
static INPUT: Lazy<Input> = Lazy::new(Input::default);

static RUNTIME_ALIVE: AtomicBool = AtomicBool::new(false);

/// The façade the embedder drives.
///
/// One instance per process. Embedder threads may call lifecycle and state
/// operations concurrently with the frame loop; everything that touches the
/// core goes through the run lock.
pub struct Runtime {
    state: LifecycleState,
    gl_version: GlVersion,
    screen_refresh_rate: f64,
    low_latency_audio: bool,
    skip_duplicate_frames: bool,
    ambient_mode: bool,
    shader_config: ShaderConfig,
    viewport: Viewport,
    frame_speed: u32,
    audio_enabled: bool,
    rumble_enabled: bool,
    default_aspect_ratio: f32,
    system_info: SystemInfo,
    av_info: Option<AvSummary>,
    fps_sync: Option<FpsSync>,
    rumble: Option<Rumble>,
    listener: Box<dyn RuntimeListener>,
    audio_backend: Box<dyn AudioBackend>,
    // Kept alive for cores that hold on to the pointers passed at load.
    game_path: Option<CString>,
    rom_data: Option<Vec<u8>>,
}

impl Runtime {
    /// Binds the core, installs the host callbacks and runs `retro_init`.
    pub fn create(
        config: RuntimeConfig,
        listener: Box<dyn RuntimeListener>,
        audio_backend: Box<dyn AudioBackend>,
        microphone_backend: Option<Box<dyn MicrophoneBackend>>,
    ) -> Result<Self> {
        if RUNTIME_ALIVE.swap(true, Ordering::SeqCst) {
            return Err(RetroError::Generic(
                "a runtime instance already exists in this process".into(),
            ));
        }

        match Self::create_inner(config, listener, audio_backend, microphone_backend) {
            Ok(runtime) => Ok(runtime),
            Err(err) => {
                RUNTIME_ALIVE.store(false, Ordering::SeqCst);
                Err(err)
            }
        }
    }

    fn create_inner(
        config: RuntimeConfig,
        listener: Box<dyn RuntimeListener>,
        audio_backend: Box<dyn AudioBackend>,
        microphone_backend: Option<Box<dyn MicrophoneBackend>>,
    ) -> Result<Self> {
        info!(core = %config.core_path.display(), "creating runtime");

        vfs::reset();
        INPUT.reset();
        microphone::install_backend(microphone_backend);

        environment::lock().initialize(EnvironmentInit {
            system_directory: config.system_directory,
            saves_directory: config.saves_directory,
            language: config.language,
            enable_vfs: config.enable_vfs,
            enable_microphone: config.enable_microphone,
            variable_overrides: config.variables,
            get_current_framebuffer: Some(callback_get_current_framebuffer),
            get_proc_address: config.gl_get_proc_address,
        });

        let mut core = Core::open(&config.core_path)?;
        core.register_callbacks(
            environment::environment_callback,
            callback_video_refresh,
            callback_audio_sample,
            callback_audio_sample_batch,
            callback_input_poll,
            callback_input_state,
        );
        core.init();

        let system_info = core.system_info();
        *CORE.lock() = Some(core);

        Ok(Self {
            state: LifecycleState::Created,
            gl_version: config.gl_version,
            screen_refresh_rate: config.screen_refresh_rate,
            low_latency_audio: config.low_latency_audio,
            skip_duplicate_frames: config.skip_duplicate_frames,
            ambient_mode: config.ambient_mode,
            shader_config: config.shader_config,
            viewport: Viewport::default(),
            frame_speed: 1,
            audio_enabled: true,
            rumble_enabled: false,
            default_aspect_ratio: 1.0,
            system_info,
            av_info: None,
            fps_sync: None,
            rumble: None,
            listener,
            audio_backend,
            game_path: None,
            rom_data: None,
        })
    }

    fn expect_state(&self, states: &[LifecycleState], operation: &str) -> Result<()> {
        if states.contains(&self.state) {
            Ok(())
        } else {
            Err(RetroError::Generic(format!(
                "{operation} is not legal in state {:?}",
                self.state
            )))
        }
    }

    pub fn load_game_from_path(&mut self, game_path: &str) -> Result<()> {
        self.expect_state(&[LifecycleState::Created], "load_game")?;

        if self.system_info.need_fullpath {
            self.game_path = Some(
                CString::new(game_path)
                    .map_err(|_| RetroError::Generic("game path contains NUL".into()))?,
            );
            self.rom_data = None;
        } else {
            self.rom_data = Some(std::fs::read(game_path).map_err(|err| {
                RetroError::Generic(format!("failed to read game {game_path}: {err}"))
            })?);
            self.game_path = None;
        }

        self.load_prepared_game()
    }

    pub fn load_game_from_bytes(&mut self, data: Vec<u8>) -> Result<()> {
        self.expect_state(&[LifecycleState::Created], "load_game")?;

        self.rom_data = Some(data);
        self.game_path = None;
        self.load_prepared_game()
    }

    /// Registers `files` in the VFS and loads the first one as the game.
    pub fn load_game_from_virtual_files(&mut self, files: Vec<VfsFile>) -> Result<()> {
        self.expect_state(&[LifecycleState::Created], "load_game")?;

        let Some(first) = files.first() else {
            return Err(RetroError::LoadGame);
        };
        let virtual_path = first.virtual_path().to_owned();

        if self.system_info.need_fullpath {
            self.game_path = Some(
                CString::new(virtual_path)
                    .map_err(|_| RetroError::Generic("virtual path contains NUL".into()))?,
            );
            self.rom_data = None;
            vfs::register(files);
        } else {
            vfs::register(files);
            self.rom_data = Some(vfs::read_virtual(&virtual_path).ok_or_else(|| {
                RetroError::Generic(format!("cannot read virtual file {virtual_path}"))
            })?);
            self.game_path = None;
        }

        self.load_prepared_game()
    }

    fn load_prepared_game(&mut self) -> Result<()> {
        let game_info = libretro_sys::GameInfo {
            path: self
                .game_path
                .as_ref()
                .map(|path| path.as_ptr())
                .unwrap_or(std::ptr::null()),
            data: self
                .rom_data
                .as_ref()
                .map(|data| data.as_ptr().cast::<c_void>())
                .unwrap_or(std::ptr::null()),
            size: self.rom_data.as_ref().map(Vec::len).unwrap_or(0),
            meta: std::ptr::null(),
        };

        {
            let mut core = CORE.lock();
            let core = core.as_mut().ok_or_else(no_core)?;
            unsafe { core.load_game(&game_info)? };

            let av_info = core.system_av_info();
            let geometry = av_info.geometry;

            self.default_aspect_ratio = if geometry.aspect_ratio > 0.0 {
                geometry.aspect_ratio
            } else if geometry.base_height > 0 {
                geometry.base_width as f32 / geometry.base_height as f32
            } else {
                1.0
            };

            self.av_info = Some(AvSummary {
                fps: av_info.timing.fps,
                sample_rate: av_info.timing.sample_rate,
                base_width: geometry.base_width,
                base_height: geometry.base_height,
            });

            info!(
                fps = av_info.timing.fps,
                sample_rate = av_info.timing.sample_rate,
                width = geometry.base_width,
                height = geometry.base_height,
                aspect = self.default_aspect_ratio,
                "game loaded"
            );
        }

        self.state = LifecycleState::GameLoaded;
        Ok(())
    }

    /// (Re)builds the video pipeline on the GL thread. Issues the core's
    /// context-destroy/context-reset pair around surface loss.
    pub fn on_surface_created(&mut self, gl: glow::Context) -> Result<()> {
        let av_info = self.av_info.ok_or_else(|| {
            RetroError::Generic("surface created before a game was loaded".into())
        })?;

        let (hw_render, pixel_format, rotation) = {
            let env = environment::lock();
            (env.hw_render(), env.pixel_format(), env.screen_rotation())
        };

        // Losing the previous surface invalidates the core's GL objects.
        let had_video = {
            let mut video = VIDEO.lock();
            match video.take() {
                Some(mut old) => {
                    old.destroy();
                    true
                }
                None => false,
            }
        };
        if had_video {
            if let Some(context_destroy) = hw_render.and_then(|ctx| ctx.context_destroy) {
                unsafe { context_destroy() };
            }
        }

        let gl = Arc::new(gl);
        let chain = ShaderChain::from_config(&self.shader_config);

        let (renderer, bottom_left_origin): (Box<dyn Renderer>, bool) = match hw_render {
            Some(ctx) => (
                Box::new(FramebufferRenderer::new(
                    &gl,
                    self.gl_version,
                    av_info.base_width.max(1),
                    av_info.base_height.max(1),
                    ctx.use_depth,
                    ctx.use_stencil,
                    chain.clone(),
                )?),
                ctx.bottom_left_origin,
            ),
            None => (
                Box::new(ImageRenderer::new(self.gl_version, pixel_format, chain.clone())),
                false,
            ),
        };

        let mut layout = VideoLayout::new(rotation, self.viewport);
        layout.update_aspect_ratio(self.current_aspect_ratio());

        let video = Video::new(
            gl,
            self.gl_version,
            renderer,
            chain,
            layout,
            bottom_left_origin,
            self.skip_duplicate_frames,
            self.ambient_mode,
        )?;
        *VIDEO.lock() = Some(video);

        if let Some(context_reset) = hw_render.and_then(|ctx| ctx.context_reset) {
            unsafe { context_reset() };
        }

        Ok(())
    }

    pub fn on_surface_changed(&mut self, width: u32, height: u32) {
        let mut video = VIDEO.lock();
        if let Some(video) = video.as_mut() {
            video.update_screen_size(width, height);
        }
    }

    /// Spins up audio, input, pacing and rumble.
    pub fn resume(&mut self) -> Result<()> {
        self.expect_state(
            &[LifecycleState::GameLoaded, LifecycleState::Paused],
            "resume",
        )?;
        let av_info = self.av_info.ok_or_else(no_core)?;

        INPUT.reset();

        let mut audio = Audio::new(
            self.audio_backend.as_ref(),
            av_info.sample_rate,
            self.low_latency_audio,
        )?;
        audio.set_enabled(self.audio_enabled);
        audio.start()?;
        *AUDIO.lock() = Some(audio);

        self.fps_sync = Some(FpsSync::new(av_info.fps, self.screen_refresh_rate));
        self.rumble = Some(Rumble::default());

        self.state = LifecycleState::Running;
        Ok(())
    }

    /// Runs the core for one display tick, draws one frame and paces.
    pub fn step(&mut self) -> Result<()> {
        self.expect_state(&[LifecycleState::Running], "step")?;

        let fps_sync = self
            .fps_sync
            .as_mut()
            .ok_or_else(|| RetroError::Generic("step without frame pacing".into()))?;

        let frames = fps_sync.advance_frames() * self.frame_speed.max(1);

        {
            // Run lock: callbacks fired by retro_run touch VIDEO / AUDIO /
            // INPUT / ENVIRONMENT, never CORE.
            let mut core = CORE.lock();
            let core = core.as_mut().ok_or_else(no_core)?;
            for _ in 0..frames {
                core.run();
            }
        }

        {
            let mut video = VIDEO.lock();
            if let Some(video) = video.as_mut() {
                video.render_frame();
            }
        }

        fps_sync.wait();

        let stretch = fps_sync.time_stretch_factor();
        if let Some(audio) = AUDIO.lock().as_mut() {
            audio.set_time_stretch(stretch);
        }

        self.apply_video_updates();

        if self.rumble_enabled {
            let states = environment::lock().rumble_states();
            if let Some(rumble) = self.rumble.as_mut() {
                rumble.fetch(&states);
                let listener = self.listener.as_ref();
                rumble.handle_updates(|event| listener.rumble_event(event));
            }
        }

        Ok(())
    }

    /// Propagates geometry / rotation changes a core made during the last
    /// `retro_run` burst, then tells the embedder to re-query the aspect.
    fn apply_video_updates(&mut self) {
        let (geometry_updated, rotation_updated, rotation, geometry_size, game_aspect) = {
            let mut env = environment::lock();
            let (geometry_updated, rotation_updated) = env.take_video_updates();
            (
                geometry_updated,
                rotation_updated,
                env.screen_rotation(),
                env.geometry_size(),
                env.game_specific_aspect_ratio(),
            )
        };

        if !geometry_updated && !rotation_updated {
            return;
        }

        debug!(geometry_updated, rotation_updated, "video layout refresh");

        {
            let mut video = VIDEO.lock();
            if let Some(video) = video.as_mut() {
                if rotation_updated {
                    video.update_rotation(rotation);
                }
                if geometry_updated {
                    if let Some((width, height)) = geometry_size {
                        video.update_rendered_resolution(width, height);
                    }
                    video.update_aspect_ratio(
                        game_aspect.unwrap_or(self.default_aspect_ratio),
                    );
                }
            }
        }

        self.listener.refresh_aspect_ratio();
    }

    /// Tears down audio, input, pacing and rumble; the core stays loaded.
    pub fn pause(&mut self) -> Result<()> {
        self.expect_state(&[LifecycleState::Running], "pause")?;

        if let Some(mut audio) = AUDIO.lock().take() {
            if let Err(err) = audio.stop() {
                warn!(%err, "audio stream refused to stop");
            }
        }
        self.fps_sync = None;
        self.rumble = None;
        INPUT.reset();

        self.state = LifecycleState::Paused;
        Ok(())
    }

    /// Full teardown. After this only dropping the runtime is legal.
    pub fn destroy(&mut self) {
        if self.state == LifecycleState::Destroyed {
            return;
        }
        info!("destroying runtime");

        // Copy the pointer out first; the core may call back into the
        // environment from inside context_destroy.
        let context_destroy = environment::lock().hw_render().and_then(|ctx| ctx.context_destroy);
        if let Some(context_destroy) = context_destroy {
            unsafe { context_destroy() };
        }

        if let Some(mut audio) = AUDIO.lock().take() {
            let _ = audio.stop();
        }
        if let Some(mut video) = VIDEO.lock().take() {
            video.destroy();
        }
        if let Some(mut core) = CORE.lock().take() {
            if self.state != LifecycleState::Created {
                core.unload_game();
            }
            core.deinit();
        }

        environment::lock().deinitialize();
        vfs::reset();
        microphone::install_backend(None);
        INPUT.reset();

        self.fps_sync = None;
        self.rumble = None;
        self.rom_data = None;
        self.game_path = None;

        self.state = LifecycleState::Destroyed;
        RUNTIME_ALIVE.store(false, Ordering::SeqCst);
    }

    pub fn reset(&mut self) -> Result<()> {
        let mut core = CORE.lock();
        core.as_mut().ok_or_else(no_core)?.reset();
        Ok(())
    }

    // State and SRAM both go through the run lock so they can never overlap
    // retro_run.

    pub fn serialize_state(&mut self) -> Result<Vec<u8>> {
        let mut core = CORE.lock();
        core.as_mut().ok_or_else(no_core)?.serialize()
    }

    pub fn unserialize_state(&mut self, state: &[u8]) -> Result<()> {
        let mut core = CORE.lock();
        core.as_mut().ok_or_else(no_core)?.unserialize(state)
    }

    pub fn serialize_sram(&mut self) -> Result<Vec<u8>> {
        let core = CORE.lock();
        Ok(core.as_ref().ok_or_else(no_core)?.save_ram().to_vec())
    }

    pub fn unserialize_sram(&mut self, data: &[u8]) -> Result<()> {
        let mut core = CORE.lock();
        core.as_mut().ok_or_else(no_core)?.restore_save_ram(data)
    }

    pub fn set_cheat(&mut self, index: u32, enabled: bool, code: &str) -> Result<()> {
        let code = CString::new(code)
            .map_err(|_| RetroError::Cheat("cheat code contains NUL".into()))?;

        let mut core = CORE.lock();
        core.as_mut().ok_or_else(no_core)?.cheat_set(index, enabled, &code);
        Ok(())
    }

    pub fn reset_cheat(&mut self) -> Result<()> {
        let mut core = CORE.lock();
        core.as_mut().ok_or_else(no_core)?.cheat_reset();
        Ok(())
    }

    pub fn available_disks(&self) -> u32 {
        // The environment lock must be released before calling into the
        // core's disk-control table.
        let get_num_images = environment::lock()
            .disk_control()
            .and_then(|control| control.get_num_images);
        get_num_images
            .map(|get_num_images| unsafe { get_num_images() })
            .unwrap_or(0)
    }

    pub fn current_disk(&self) -> u32 {
        let get_image_index = environment::lock()
            .disk_control()
            .and_then(|control| control.get_image_index);
        get_image_index
            .map(|get_image_index| unsafe { get_image_index() })
            .unwrap_or(0)
    }

    /// Ejects, swaps to `index`, reinserts.
    pub fn change_disk(&mut self, index: u32) {
        let Some(control) = environment::lock().disk_control() else {
            return;
        };
        let (Some(set_eject_state), Some(set_image_index)) =
            (control.set_eject_state, control.set_image_index)
        else {
            return;
        };

        if index >= self.available_disks() {
            warn!(index, "disk index out of range");
            return;
        }

        unsafe {
            set_eject_state(true);
            set_image_index(index);
            set_eject_state(false);
        }
    }

    pub fn set_controller_type(&mut self, port: u32, device: u32) -> Result<()> {
        let mut core = CORE.lock();
        core.as_mut()
            .ok_or_else(no_core)?
            .set_controller_port_device(port as c_uint, device as c_uint);
        Ok(())
    }

    pub fn update_variable(&mut self, key: &str, value: &str) {
        environment::lock().update_variable(key, value);
    }

    pub fn variables(&self) -> Vec<Variable> {
        environment::lock().variables()
    }

    pub fn controllers(&self) -> Vec<Vec<Controller>> {
        environment::lock().controllers()
    }

    pub fn on_key_event(&self, port: usize, action: KeyAction, key_code: i32) -> bool {
        INPUT.on_key_event(port, action, key_code)
    }

    pub fn on_motion_event(&self, port: usize, source: MotionSource, x: f32, y: f32) -> bool {
        INPUT.on_motion_event(port, source, x, y)
    }

    /// `x`, `y` are screen-normalized ([0, 1]², origin top-left). The
    /// position is mapped onto the foreground quad before reaching cores.
    pub fn on_touch_event(&self, x: f32, y: f32) {
        let clip_x = x * 2.0 - 1.0;
        let clip_y = 1.0 - y * 2.0;

        let relative = {
            let video = VIDEO.lock();
            video
                .as_ref()
                .map(|video| video.layout().relative_position(clip_x, clip_y))
                .unwrap_or(crate::input::TOUCH_SENTINEL)
        };

        INPUT.on_touch_event(relative.0, relative.1);
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        let mut video = VIDEO.lock();
        if let Some(video) = video.as_mut() {
            video.update_viewport(viewport);
        }
    }

    /// Pushes the current aspect ratio into the layout; pairs with the
    /// `refresh_aspect_ratio` listener callback.
    pub fn refresh_aspect_ratio(&mut self) {
        let aspect = self.current_aspect_ratio();
        let mut video = VIDEO.lock();
        if let Some(video) = video.as_mut() {
            video.update_aspect_ratio(aspect);
        }
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.current_aspect_ratio()
    }

    fn current_aspect_ratio(&self) -> f32 {
        environment::lock()
            .game_specific_aspect_ratio()
            .unwrap_or(self.default_aspect_ratio)
    }

    /// Fast-forward: run `n × advance_frames()` core frames per step.
    pub fn set_frame_speed(&mut self, speed: u32) {
        self.frame_speed = speed.max(1);
    }

    pub fn set_audio_enabled(&mut self, enabled: bool) {
        self.audio_enabled = enabled;
        if let Some(audio) = AUDIO.lock().as_ref() {
            audio.set_enabled(enabled);
        }
    }

    pub fn set_rumble_enabled(&mut self, enabled: bool) {
        self.rumble_enabled = enabled;
    }

    pub fn rumble_enabled(&self) -> bool {
        self.rumble_enabled
    }

    /// Applied on the next rendered frame, never mid-frame.
    pub fn set_shader_config(&mut self, config: ShaderConfig) {
        let chain = ShaderChain::from_config(&config);
        self.shader_config = config;

        let mut video = VIDEO.lock();
        if let Some(video) = video.as_mut() {
            video.set_shader_chain(chain);
        }
    }

    pub fn system_info(&self) -> &SystemInfo {
        &self.system_info
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn no_core() -> RetroError {
    RetroError::Generic("no core is loaded".into())
}

// Trampolines registered with the core. The ABI gives them no context
// pointer; they reach the component slots directly. None of them may touch
// CORE: they run while retro_run holds it.

unsafe extern "C" fn callback_video_refresh(
    data: *const c_void,
    width: c_uint,
    height: c_uint,
    pitch: usize,
) {
    let mut video = VIDEO.lock();
    let Some(video) = video.as_mut() else {
        return;
    };

    if data.is_null() {
        video.on_duplicate_frame();
    } else if data == ffi::HW_FRAME_BUFFER_VALID {
        video.on_hardware_frame(width, height);
    } else {
        let frame = slice::from_raw_parts(data.cast::<u8>(), pitch * height as usize);
        video.on_software_frame(frame, width, height, pitch);
    }
}

unsafe extern "C" fn callback_audio_sample(left: i16, right: i16) {
    let mut audio = AUDIO.lock();
    if let Some(audio) = audio.as_mut() {
        audio.write(&[left, right]);
    }
}

unsafe extern "C" fn callback_audio_sample_batch(data: *const i16, frames: usize) -> usize {
    if !data.is_null() {
        let samples = slice::from_raw_parts(data, frames * 2);
        let mut audio = AUDIO.lock();
        if let Some(audio) = audio.as_mut() {
            audio.write(samples);
        }
    }
    frames
}

unsafe extern "C" fn callback_input_poll() {
    // State is updated eagerly by embedder events; nothing to poll.
}

unsafe extern "C" fn callback_input_state(
    port: c_uint,
    device: c_uint,
    index: c_uint,
    id: c_uint,
) -> i16 {
    INPUT.state(port, device, index, id)
}

unsafe extern "C" fn callback_get_current_framebuffer() -> usize {
    let video = VIDEO.lock();
    video
        .as_ref()
        .map(|video| video.current_framebuffer_id())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioSource, OutputStreamConfig, StreamHandle};

    struct NullListener;
    impl RuntimeListener for NullListener {}

    struct NullBackend;

    struct NullStream;
    impl StreamHandle for NullStream {
        fn start(&mut self) -> Result<()> {
            Ok(())
        }
        fn stop(&mut self) -> Result<()> {
            Ok(())
        }
    }

    impl AudioBackend for NullBackend {
        fn preferred_sample_rate(&self) -> u32 {
            48000
        }

        fn open_output(
            &self,
            _config: OutputStreamConfig,
            _source: std::sync::Arc<dyn AudioSource>,
        ) -> Result<Box<dyn StreamHandle>> {
            Ok(Box::new(NullStream))
        }
    }

    fn test_config(core_path: &str) -> RuntimeConfig {
        RuntimeConfig {
            gl_version: GlVersion::Es3,
            core_path: core_path.into(),
            system_directory: "/tmp/system".into(),
            saves_directory: "/tmp/saves".into(),
            variables: Vec::new(),
            shader_config: ShaderConfig::default(),
            screen_refresh_rate: 60.0,
            low_latency_audio: false,
            enable_vfs: false,
            enable_microphone: false,
            skip_duplicate_frames: false,
            ambient_mode: false,
            language: "en".into(),
            gl_get_proc_address: None,
        }
    }

    #[test]
    fn create_with_missing_core_reports_load_library() {
        let result = Runtime::create(
            test_config("/definitely/not/a/core.so"),
            Box::new(NullListener),
            Box::new(NullBackend),
            None,
        );

        let err = result.err().expect("create against a missing core must fail");
        assert!(matches!(err, RetroError::LoadLibrary(_)), "{err:?}");
        assert_eq!(err.code(), crate::error::ERROR_LOAD_LIBRARY);

        // A failed create releases the singleton slot.
        assert!(!RUNTIME_ALIVE.load(Ordering::SeqCst));
    }

    #[test]
    fn callbacks_survive_empty_component_slots() {
        unsafe {
            callback_video_refresh(std::ptr::null(), 320, 240, 640);
            callback_audio_sample(0, 0);
            assert_eq!(callback_audio_sample_batch(std::ptr::null(), 64), 64);
            assert_eq!(callback_input_state(0, ffi::DEVICE_JOYPAD, 0, 0), 0);
            assert_eq!(callback_get_current_framebuffer(), 0);
        }
    }
}
