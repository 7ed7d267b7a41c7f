use std::ffi::{c_char, c_uint, c_void, CStr, CString};
use std::iter;

use indexmap::IndexMap;
use libretro_sys::PixelFormat;
use once_cell::sync::Lazy;
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use crate::ffi;
use crate::microphone;
use crate::rumble::{RumbleState, RUMBLE_PORTS};
use crate::vfs;

mod command;
pub use command::EnvironmentCommand;

/// A core option as exposed to the embedder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub key: String,
    pub value: String,
    pub description: String,
}

/// A controller type supported on one port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Controller {
    pub id: u32,
    pub description: String,
}

/// Hardware-render request captured from `SET_HW_RENDER`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HwRenderContext {
    pub use_depth: bool,
    pub use_stencil: bool,
    pub bottom_left_origin: bool,
    pub context_reset: Option<ffi::HwContextResetFn>,
    pub context_destroy: Option<ffi::HwContextResetFn>,
}

struct VariableEntry {
    value: CString,
    description: String,
}

/// State negotiated between a core and the host through the environment
/// callback.
///
/// The callback signature carries no context pointer, so this lives in a
/// process-wide singleton ([`lock`]) that `Runtime::create` resets.
/// Everything else in the crate reaches it through narrow accessors rather
/// than holding the guard.
pub struct Environment {
    system_directory: Option<CString>,
    saves_directory: Option<CString>,
    language: c_uint,
    enable_vfs: bool,
    enable_microphone: bool,

    pixel_format: PixelFormat,
    hw_render: Option<HwRenderContext>,
    get_current_framebuffer: Option<ffi::HwGetCurrentFramebufferFn>,
    get_proc_address: Option<ffi::HwGetProcAddressFn>,

    screen_rotation: f32,
    rotation_updated: bool,

    geometry_width: u32,
    geometry_height: u32,
    geometry_aspect_ratio: f32,
    geometry_updated: bool,

    rumble_states: [RumbleState; RUMBLE_PORTS],

    variables: IndexMap<String, VariableEntry>,
    overrides: IndexMap<String, String>,
    dirty_variables: bool,

    controllers: Vec<Vec<Controller>>,
    disk_control: Option<ffi::DiskControlCallback>,
}

static ENVIRONMENT: Lazy<Mutex<Environment>> = Lazy::new(|| Mutex::new(Environment::new()));

pub fn lock() -> MutexGuard<'static, Environment> {
    ENVIRONMENT.lock()
}

/// Settings applied when the runtime is created.
pub struct EnvironmentInit {
    pub system_directory: String,
    pub saves_directory: String,
    pub language: String,
    pub enable_vfs: bool,
    pub enable_microphone: bool,
    pub variable_overrides: Vec<Variable>,
    pub get_current_framebuffer: Option<ffi::HwGetCurrentFramebufferFn>,
    pub get_proc_address: Option<ffi::HwGetProcAddressFn>,
}

impl Environment {
    fn new() -> Self {
        Self {
            system_directory: None,
            saves_directory: None,
            language: ffi::LANGUAGE_ENGLISH,
            enable_vfs: false,
            enable_microphone: false,
            pixel_format: PixelFormat::RGB565,
            hw_render: None,
            get_current_framebuffer: None,
            get_proc_address: None,
            screen_rotation: 0.0,
            rotation_updated: false,
            geometry_width: 0,
            geometry_height: 0,
            geometry_aspect_ratio: -1.0,
            geometry_updated: false,
            rumble_states: [RumbleState::default(); RUMBLE_PORTS],
            variables: IndexMap::new(),
            overrides: IndexMap::new(),
            dirty_variables: false,
            controllers: Vec::new(),
            disk_control: None,
        }
    }

    pub fn initialize(&mut self, init: EnvironmentInit) {
        *self = Self::new();

        self.system_directory = CString::new(init.system_directory).ok();
        self.saves_directory = CString::new(init.saves_directory).ok();
        self.language = language_from_locale(&init.language);
        self.enable_vfs = init.enable_vfs;
        self.enable_microphone = init.enable_microphone;
        self.get_current_framebuffer = init.get_current_framebuffer;
        self.get_proc_address = init.get_proc_address;

        for variable in init.variable_overrides {
            self.overrides.insert(variable.key, variable.value);
        }
    }

    pub fn deinitialize(&mut self) {
        *self = Self::new();
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    pub fn hw_render(&self) -> Option<HwRenderContext> {
        self.hw_render
    }

    pub fn uses_hw_acceleration(&self) -> bool {
        self.hw_render.is_some()
    }

    pub fn screen_rotation(&self) -> f32 {
        self.screen_rotation
    }

    /// Aspect ratio published by a geometry update, if it was positive.
    pub fn game_specific_aspect_ratio(&self) -> Option<f32> {
        (self.geometry_aspect_ratio > 0.0).then_some(self.geometry_aspect_ratio)
    }

    pub fn geometry_size(&self) -> Option<(u32, u32)> {
        (self.geometry_width > 0 && self.geometry_height > 0)
            .then_some((self.geometry_width, self.geometry_height))
    }

    /// Consumes the geometry/rotation change flags. The runtime polls this
    /// once per step to decide whether the video layout must be rebuilt.
    pub fn take_video_updates(&mut self) -> (bool, bool) {
        let updates = (self.geometry_updated, self.rotation_updated);
        self.geometry_updated = false;
        self.rotation_updated = false;
        updates
    }

    pub fn rumble_states(&self) -> [RumbleState; RUMBLE_PORTS] {
        self.rumble_states
    }

    pub fn disk_control(&self) -> Option<ffi::DiskControlCallback> {
        self.disk_control
    }

    pub fn variables(&self) -> Vec<Variable> {
        self.variables
            .iter()
            .map(|(key, entry)| Variable {
                key: key.clone(),
                value: entry.value.to_string_lossy().into_owned(),
                description: entry.description.clone(),
            })
            .collect()
    }

    pub fn controllers(&self) -> Vec<Vec<Controller>> {
        self.controllers.clone()
    }

    /// Applies an embedder-side variable change. The core notices through
    /// `GET_VARIABLE_UPDATE` on its next poll.
    pub fn update_variable(&mut self, key: &str, value: &str) {
        self.overrides.insert(key.to_owned(), value.to_owned());

        if let Some(entry) = self.variables.get_mut(key) {
            match CString::new(value) {
                Ok(value) => {
                    entry.value = value;
                    self.dirty_variables = true;
                }
                Err(_) => warn!(key, "variable value contains an interior NUL, ignored"),
            }
        }
    }

    #[cfg(test)]
    fn variables_dirty(&self) -> bool {
        self.dirty_variables
    }

    fn handle_set_variables(&mut self, received: *const libretro_sys::Variable) -> bool {
        self.variables.clear();

        let mut cursor = received;
        let raw_variables = iter::from_fn(|| unsafe {
            let variable = cursor.as_ref()?;
            let key = CStr::from_ptr(variable.key.as_ref()?);
            let value = CStr::from_ptr(variable.value.as_ref()?);
            cursor = cursor.add(1);
            Some((key.to_string_lossy(), value.to_string_lossy()))
        })
        .fuse();

        for (key, description) in raw_variables {
            let Some(default) = parse_default_value(&description) else {
                warn!(%key, "malformed variable description, skipped");
                continue;
            };

            let value = self
                .overrides
                .get(key.as_ref())
                .cloned()
                .unwrap_or_else(|| default.to_owned());

            debug!(%key, %value, "core variable registered");

            let Ok(value) = CString::new(value) else {
                continue;
            };

            self.variables.insert(
                key.into_owned(),
                VariableEntry {
                    value,
                    description: description.into_owned(),
                },
            );
        }

        true
    }

    fn handle_get_variable(&self, requested: &mut libretro_sys::Variable) -> bool {
        let Some(key) = (unsafe { requested.key.as_ref() }) else {
            return false;
        };
        let key = unsafe { CStr::from_ptr(key) }.to_string_lossy();

        match self.variables.get(key.as_ref()) {
            Some(entry) => {
                requested.value = entry.value.as_ptr();
                true
            }
            None => {
                debug!(%key, "core requested unknown variable");
                false
            }
        }
    }

    fn handle_set_hw_render(&mut self, callback: &mut ffi::HwRenderCallback) -> bool {
        let Some(get_proc_address) = self.get_proc_address else {
            warn!("core requested hardware rendering but no GL loader was configured");
            return false;
        };

        self.hw_render = Some(HwRenderContext {
            use_depth: callback.depth,
            use_stencil: callback.stencil,
            bottom_left_origin: callback.bottom_left_origin,
            context_reset: callback.context_reset,
            context_destroy: callback.context_destroy,
        });

        callback.get_current_framebuffer = self.get_current_framebuffer;
        callback.get_proc_address = Some(get_proc_address);

        info!(
            depth = callback.depth,
            stencil = callback.stencil,
            bottom_left_origin = callback.bottom_left_origin,
            "hardware rendering negotiated"
        );

        true
    }

    fn handle_set_controller_info(&mut self, received: *const ffi::ControllerInfo) -> bool {
        self.controllers.clear();

        let mut cursor = received;
        loop {
            let info = match unsafe { cursor.as_ref() } {
                Some(info) if !info.types.is_null() => info,
                _ => break,
            };

            let mut port = Vec::with_capacity(info.num_types as usize);
            for i in 0..info.num_types as usize {
                let description = unsafe { &*info.types.add(i) };
                if description.desc.is_null() {
                    continue;
                }
                port.push(Controller {
                    id: description.id,
                    description: unsafe { CStr::from_ptr(description.desc) }
                        .to_string_lossy()
                        .into_owned(),
                });
            }

            self.controllers.push(port);
            cursor = unsafe { cursor.add(1) };
        }

        true
    }
}

/// The default value is the text between the first `"; "` and the first
/// following `"|"`; the whole string stays around as the description.
fn parse_default_value(description: &str) -> Option<&str> {
    let (_, options) = description.split_once("; ")?;
    Some(options.split('|').next().unwrap_or(options))
}

fn language_from_locale(locale: &str) -> c_uint {
    match locale {
        "en" => ffi::LANGUAGE_ENGLISH,
        "jp" => ffi::LANGUAGE_JAPANESE,
        "fr" => ffi::LANGUAGE_FRENCH,
        "es" => ffi::LANGUAGE_SPANISH,
        "de" => ffi::LANGUAGE_GERMAN,
        "it" => ffi::LANGUAGE_ITALIAN,
        "nl" => ffi::LANGUAGE_DUTCH,
        "pt" => ffi::LANGUAGE_PORTUGUESE_PORTUGAL,
        "ru" => ffi::LANGUAGE_RUSSIAN,
        "ko" => ffi::LANGUAGE_KOREAN,
        "zh" => ffi::LANGUAGE_CHINESE_TRADITIONAL,
        "eo" => ffi::LANGUAGE_ESPERANTO,
        "pl" => ffi::LANGUAGE_POLISH,
        "vi" => ffi::LANGUAGE_VIETNAMESE,
        "ar" => ffi::LANGUAGE_ARABIC,
        "el" => ffi::LANGUAGE_GREEK,
        "tr" => ffi::LANGUAGE_TURKISH,
        _ => ffi::LANGUAGE_ENGLISH,
    }
}

/// The `retro_environment_t` entry point registered with every core.
///
/// # Safety
/// `data` must match the layout the command dictates; this is the core's
/// contract, not ours.
pub unsafe extern "C" fn environment_callback(cmd: c_uint, data: *mut c_void) -> bool {
    let Some(command) = EnvironmentCommand::from_repr(cmd) else {
        debug!(cmd, "unknown environment command");
        return false;
    };

    let mut env = ENVIRONMENT.lock();

    match command {
        EnvironmentCommand::GetCanDupe => {
            if !data.is_null() {
                *data.cast::<bool>() = true;
            }
            true
        }

        EnvironmentCommand::GetSystemDirectory => match &env.system_directory {
            Some(dir) => {
                *data.cast::<*const c_char>() = dir.as_ptr();
                true
            }
            None => false,
        },

        EnvironmentCommand::GetSaveDirectory => match &env.saves_directory {
            Some(dir) => {
                *data.cast::<*const c_char>() = dir.as_ptr();
                true
            }
            None => false,
        },

        EnvironmentCommand::SetPixelFormat => {
            let raw = *data.cast_const().cast::<c_uint>();
            let Some(pixel_format) = PixelFormat::from_uint(raw) else {
                warn!(raw, "core requested unknown pixel format");
                return false;
            };
            debug!(?pixel_format, "pixel format set");
            env.pixel_format = pixel_format;
            true
        }

        EnvironmentCommand::SetHwRender => {
            env.handle_set_hw_render(&mut *data.cast::<ffi::HwRenderCallback>())
        }

        EnvironmentCommand::SetVariables => {
            env.handle_set_variables(data.cast_const().cast::<libretro_sys::Variable>())
        }

        EnvironmentCommand::GetVariable => {
            env.handle_get_variable(&mut *data.cast::<libretro_sys::Variable>())
        }

        EnvironmentCommand::GetVariableUpdate => {
            *data.cast::<bool>() = env.dirty_variables;
            env.dirty_variables = false;
            true
        }

        EnvironmentCommand::SetGeometry => {
            let geometry = &*data.cast_const().cast::<libretro_sys::GameGeometry>();
            env.geometry_width = geometry.base_width;
            env.geometry_height = geometry.base_height;
            env.geometry_aspect_ratio = geometry.aspect_ratio;
            env.geometry_updated = true;
            true
        }

        EnvironmentCommand::SetRotation => {
            let index = *data.cast_const().cast::<c_uint>();
            env.screen_rotation = index as f32 * -std::f32::consts::FRAC_PI_2;
            env.rotation_updated = true;
            true
        }

        EnvironmentCommand::SetDiskControlInterface => {
            env.disk_control = Some(*data.cast_const().cast::<ffi::DiskControlCallback>());
            true
        }

        EnvironmentCommand::GetRumbleInterface => {
            (*data.cast::<ffi::RumbleInterface>()).set_rumble_state = rumble_set_state_callback;
            true
        }

        EnvironmentCommand::GetLogInterface => {
            (*data.cast::<ffi::LogCallback>()).log = log_printf_fn();
            true
        }

        EnvironmentCommand::GetLanguage => {
            *data.cast::<c_uint>() = env.language;
            true
        }

        EnvironmentCommand::GetVfsInterface => {
            if !env.enable_vfs {
                return false;
            }
            let info = &mut *data.cast::<ffi::VfsInterfaceInfo>();
            if info.required_interface_version > ffi::VFS_SUPPORTED_VERSION {
                debug!(
                    requested = info.required_interface_version,
                    "unsupported VFS version"
                );
                return false;
            }
            info.required_interface_version = ffi::VFS_SUPPORTED_VERSION;
            info.iface = vfs::interface();
            true
        }

        EnvironmentCommand::GetMicrophoneInterface => {
            if !env.enable_microphone {
                return false;
            }
            *data.cast::<ffi::MicrophoneInterface>() = microphone::interface();
            true
        }

        EnvironmentCommand::SetControllerInfo => {
            env.handle_set_controller_info(data.cast_const().cast::<ffi::ControllerInfo>())
        }

        // Ingesting descriptors is optional; refusing makes cores fall back
        // to their defaults.
        EnvironmentCommand::SetInputDescriptors => false,

        other => {
            debug!(?other, "environment command not supported");
            false
        }
    }
}

unsafe extern "C" fn rumble_set_state_callback(
    port: c_uint,
    effect: c_uint,
    strength: u16,
) -> bool {
    if port as usize >= RUMBLE_PORTS {
        return false;
    }

    let mut env = ENVIRONMENT.lock();
    let state = &mut env.rumble_states[port as usize];
    match effect {
        ffi::RUMBLE_STRONG => state.strong = strength,
        ffi::RUMBLE_WEAK => state.weak = strength,
        _ => return false,
    }

    true
}

/// Receiver for the core's log interface. The C signature is variadic; the
/// format arguments are unreachable from stable Rust, so the format string
/// is logged verbatim.
unsafe extern "C" fn log_printf(level: c_uint, fmt: *const c_char) {
    if fmt.is_null() {
        return;
    }
    let message = CStr::from_ptr(fmt).to_string_lossy();
    let message = message.trim_end_matches('\n');

    match level {
        ffi::LOG_DEBUG => debug!(target: "libretro_core", "{message}"),
        ffi::LOG_INFO => info!(target: "libretro_core", "{message}"),
        ffi::LOG_WARN => warn!(target: "libretro_core", "{message}"),
        _ => error!(target: "libretro_core", "{message}"),
    }
}

fn log_printf_fn() -> ffi::LogPrintfFn {
    // Same ABI up to the fixed arguments; the handler never touches varargs.
    unsafe {
        std::mem::transmute::<unsafe extern "C" fn(c_uint, *const c_char), ffi::LogPrintfFn>(
            log_printf,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;

    fn test_init(overrides: Vec<Variable>) -> EnvironmentInit {
        EnvironmentInit {
            system_directory: "/system".into(),
            saves_directory: "/saves".into(),
            language: "en".into(),
            enable_vfs: false,
            enable_microphone: false,
            variable_overrides: overrides,
            get_current_framebuffer: None,
            get_proc_address: None,
        }
    }

    fn set_variables(env: &mut Environment, entries: &[(&CStr, &CStr)]) {
        let mut raw: Vec<libretro_sys::Variable> = entries
            .iter()
            .map(|(key, value)| libretro_sys::Variable {
                key: key.as_ptr(),
                value: value.as_ptr(),
            })
            .collect();
        raw.push(libretro_sys::Variable {
            key: ptr::null(),
            value: ptr::null(),
        });

        assert!(env.handle_set_variables(raw.as_ptr()));
    }

    #[test]
    fn default_value_is_first_option() {
        assert_eq!(
            parse_default_value("Speed hack; disabled|enabled"),
            Some("disabled")
        );
        assert_eq!(parse_default_value("Region; auto"), Some("auto"));
        assert_eq!(parse_default_value("garbage"), None);
    }

    #[test]
    fn set_variables_takes_defaults_and_overrides() {
        let mut env = Environment::new();
        env.initialize(test_init(vec![Variable {
            key: "k".into(),
            value: "v1".into(),
            description: String::new(),
        }]));

        let key = CString::new("k").unwrap();
        let desc = CString::new("desc; v0|v1|v2").unwrap();
        let other_key = CString::new("other").unwrap();
        let other_desc = CString::new("other desc; a|b").unwrap();
        set_variables(
            &mut env,
            &[(&key, &desc), (&other_key, &other_desc)],
        );

        let variables = env.variables();
        assert_eq!(variables.len(), 2);
        assert_eq!(variables[0].key, "k");
        assert_eq!(variables[0].value, "v1");
        assert_eq!(variables[0].description, "desc; v0|v1|v2");
        assert_eq!(variables[1].value, "a");
    }

    #[test]
    fn dirty_flag_lifecycle() {
        let mut env = Environment::new();
        env.initialize(test_init(Vec::new()));

        let key = CString::new("k").unwrap();
        let desc = CString::new("desc; v0|v1").unwrap();
        set_variables(&mut env, &[(&key, &desc)]);
        assert!(!env.variables_dirty());

        env.update_variable("k", "v1");
        assert!(env.variables_dirty());
        assert_eq!(env.variables()[0].value, "v1");

        // GET_VARIABLE_UPDATE clears the flag.
        let dirty = env.dirty_variables;
        env.dirty_variables = false;
        assert!(dirty);
        assert!(!env.variables_dirty());
    }

    #[test]
    fn update_variable_ignores_unknown_keys_but_records_override() {
        let mut env = Environment::new();
        env.initialize(test_init(Vec::new()));

        env.update_variable("later", "x");
        assert!(!env.variables_dirty());

        let key = CString::new("later").unwrap();
        let desc = CString::new("desc; a|x").unwrap();
        set_variables(&mut env, &[(&key, &desc)]);
        assert_eq!(env.variables()[0].value, "x");
    }

    #[test]
    fn get_variable_returns_pointer_into_table() {
        let mut env = Environment::new();
        env.initialize(test_init(Vec::new()));

        let key = CString::new("k").unwrap();
        let desc = CString::new("desc; v0|v1").unwrap();
        set_variables(&mut env, &[(&key, &desc)]);

        let mut request = libretro_sys::Variable {
            key: key.as_ptr(),
            value: ptr::null(),
        };
        assert!(env.handle_get_variable(&mut request));
        let value = unsafe { CStr::from_ptr(request.value) };
        assert_eq!(value.to_str().unwrap(), "v0");

        let missing = CString::new("missing").unwrap();
        let mut request = libretro_sys::Variable {
            key: missing.as_ptr(),
            value: ptr::null(),
        };
        assert!(!env.handle_get_variable(&mut request));
    }

    #[test]
    fn rotation_is_quarter_turns_clockwise_negative() {
        let mut env = Environment::new();
        env.initialize(test_init(Vec::new()));
        env.screen_rotation = 3.0 * -std::f32::consts::FRAC_PI_2;
        assert!((env.screen_rotation() + 3.0 * std::f32::consts::FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn locale_mapping_defaults_to_english() {
        assert_eq!(language_from_locale("jp"), ffi::LANGUAGE_JAPANESE);
        assert_eq!(language_from_locale("fr"), ffi::LANGUAGE_FRENCH);
        assert_eq!(language_from_locale("xx"), ffi::LANGUAGE_ENGLISH);
    }

    #[test]
    fn hw_render_requires_a_loader() {
        let mut env = Environment::new();
        env.initialize(test_init(Vec::new()));

        let mut callback = ffi::HwRenderCallback {
            context_type: 0,
            context_reset: None,
            get_current_framebuffer: None,
            get_proc_address: None,
            depth: true,
            stencil: false,
            bottom_left_origin: true,
            version_major: 0,
            version_minor: 0,
            cache_context: false,
            context_destroy: None,
            debug_context: false,
        };

        assert!(!env.handle_set_hw_render(&mut callback));
        assert!(env.hw_render().is_none());
    }

    #[test]
    fn geometry_update_flags_are_consumed_once() {
        let mut env = Environment::new();
        env.initialize(test_init(Vec::new()));
        env.geometry_updated = true;

        assert_eq!(env.take_video_updates(), (true, false));
        assert_eq!(env.take_video_updates(), (false, false));
    }
}
