use std::ffi::c_uint;
use std::sync::atomic::{AtomicBool, AtomicI16, AtomicI32, AtomicU32, Ordering};

use enumset::{EnumSet, EnumSetType};

use crate::ffi;

pub const MAX_PORTS: usize = 4;

const ANALOG_MAX_RANGE: f32 = 0x7FFF as f32;

/// Touch coordinates outside the foreground quad.
pub const TOUCH_SENTINEL: (f32, f32) = (-10.0, -10.0);

#[derive(Debug, EnumSetType)]
pub enum Button {
    Up,
    Down,
    Left,
    Right,
    A,
    B,
    X,
    Y,
    Start,
    Select,
    L,
    L2,
    L3,
    R,
    R2,
    R3,
}

impl Button {
    pub fn from_joypad_id(id: c_uint) -> Option<Self> {
        Some(match id {
            libretro_sys::DEVICE_ID_JOYPAD_UP => Button::Up,
            libretro_sys::DEVICE_ID_JOYPAD_DOWN => Button::Down,
            libretro_sys::DEVICE_ID_JOYPAD_LEFT => Button::Left,
            libretro_sys::DEVICE_ID_JOYPAD_RIGHT => Button::Right,
            libretro_sys::DEVICE_ID_JOYPAD_A => Button::A,
            libretro_sys::DEVICE_ID_JOYPAD_B => Button::B,
            libretro_sys::DEVICE_ID_JOYPAD_X => Button::X,
            libretro_sys::DEVICE_ID_JOYPAD_Y => Button::Y,
            libretro_sys::DEVICE_ID_JOYPAD_SELECT => Button::Select,
            libretro_sys::DEVICE_ID_JOYPAD_START => Button::Start,
            libretro_sys::DEVICE_ID_JOYPAD_L => Button::L,
            libretro_sys::DEVICE_ID_JOYPAD_L2 => Button::L2,
            libretro_sys::DEVICE_ID_JOYPAD_L3 => Button::L3,
            libretro_sys::DEVICE_ID_JOYPAD_R => Button::R,
            libretro_sys::DEVICE_ID_JOYPAD_R2 => Button::R2,
            libretro_sys::DEVICE_ID_JOYPAD_R3 => Button::R3,
            _ => return None,
        })
    }

    /// Gamepad key codes as delivered by the embedder (Android key codes).
    /// A↔B and X↔Y are intentionally crossed: physical layout and libretro
    /// labels disagree on those faces.
    pub fn from_key_code(key_code: i32) -> Option<Self> {
        Some(match key_code {
            KEYCODE_BUTTON_A => Button::B,
            KEYCODE_BUTTON_B => Button::A,
            KEYCODE_BUTTON_X => Button::Y,
            KEYCODE_BUTTON_Y => Button::X,
            KEYCODE_BUTTON_START => Button::Start,
            KEYCODE_BUTTON_SELECT => Button::Select,
            KEYCODE_BUTTON_L1 => Button::L,
            KEYCODE_BUTTON_L2 => Button::L2,
            KEYCODE_BUTTON_R1 => Button::R,
            KEYCODE_BUTTON_R2 => Button::R2,
            KEYCODE_BUTTON_THUMBL => Button::L3,
            KEYCODE_BUTTON_THUMBR => Button::R3,
            _ => return None,
        })
    }
}

const KEYCODE_BUTTON_A: i32 = 96;
const KEYCODE_BUTTON_B: i32 = 97;
const KEYCODE_BUTTON_X: i32 = 99;
const KEYCODE_BUTTON_Y: i32 = 100;
const KEYCODE_BUTTON_L1: i32 = 102;
const KEYCODE_BUTTON_R1: i32 = 103;
const KEYCODE_BUTTON_L2: i32 = 104;
const KEYCODE_BUTTON_R2: i32 = 105;
const KEYCODE_BUTTON_THUMBL: i32 = 106;
const KEYCODE_BUTTON_THUMBR: i32 = 107;
const KEYCODE_BUTTON_START: i32 = 108;
const KEYCODE_BUTTON_SELECT: i32 = 109;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Down,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionSource {
    Dpad,
    AnalogLeft,
    AnalogRight,
}

impl MotionSource {
    pub fn from_raw(source: u32) -> Option<Self> {
        Some(match source {
            0 => MotionSource::Dpad,
            1 => MotionSource::AnalogLeft,
            2 => MotionSource::AnalogRight,
            _ => return None,
        })
    }
}

/// One port worth of state. Written by embedder threads, read by the core
/// thread inside the input-state callback; every field is a single atomic so
/// readers never block. A reader may see values one frame stale, and reads
/// across fields are not required to be mutually consistent.
#[derive(Default)]
struct PortState {
    buttons: AtomicU32,
    dpad_x: AtomicI32,
    dpad_y: AtomicI32,
    analog_left_x: AtomicI16,
    analog_left_y: AtomicI16,
    analog_right_x: AtomicI16,
    analog_right_y: AtomicI16,
}

#[derive(Default)]
struct TouchState {
    valid: AtomicBool,
    // f32 bit patterns of the relative position in [0, 1]².
    x: AtomicU32,
    y: AtomicU32,
}

#[derive(Default)]
pub struct Input {
    ports: [PortState; MAX_PORTS],
    touch: TouchState,
}

impl Input {
    pub fn reset(&self) {
        for port in &self.ports {
            port.buttons.store(0, Ordering::Relaxed);
            port.dpad_x.store(0, Ordering::Relaxed);
            port.dpad_y.store(0, Ordering::Relaxed);
            port.analog_left_x.store(0, Ordering::Relaxed);
            port.analog_left_y.store(0, Ordering::Relaxed);
            port.analog_right_x.store(0, Ordering::Relaxed);
            port.analog_right_y.store(0, Ordering::Relaxed);
        }
        self.touch.valid.store(false, Ordering::Relaxed);
    }

    /// Returns `false` for key codes that have no libretro mapping so the
    /// caller can fall through to app-level handling.
    pub fn on_key_event(&self, port: usize, action: KeyAction, key_code: i32) -> bool {
        let Some(button) = Button::from_key_code(key_code) else {
            return false;
        };
        let Some(state) = self.ports.get(port) else {
            return false;
        };

        let bit = EnumSet::only(button).as_u32();
        match action {
            KeyAction::Down => state.buttons.fetch_or(bit, Ordering::Relaxed),
            KeyAction::Up => state.buttons.fetch_and(!bit, Ordering::Relaxed),
        };

        true
    }

    pub fn on_motion_event(&self, port: usize, source: MotionSource, x: f32, y: f32) -> bool {
        let Some(state) = self.ports.get(port) else {
            return false;
        };

        match source {
            MotionSource::Dpad => {
                state
                    .dpad_x
                    .store(x.round().clamp(-1.0, 1.0) as i32, Ordering::Relaxed);
                state
                    .dpad_y
                    .store(y.round().clamp(-1.0, 1.0) as i32, Ordering::Relaxed);
            }
            MotionSource::AnalogLeft => {
                state.analog_left_x.store(scale_analog(x), Ordering::Relaxed);
                state.analog_left_y.store(scale_analog(y), Ordering::Relaxed);
            }
            MotionSource::AnalogRight => {
                state.analog_right_x.store(scale_analog(x), Ordering::Relaxed);
                state.analog_right_y.store(scale_analog(y), Ordering::Relaxed);
            }
        }

        true
    }

    /// Stores a touch position already mapped to the foreground quad
    /// ([0, 1]², or the sentinel when outside it).
    pub fn on_touch_event(&self, x: f32, y: f32) {
        if (x, y) == TOUCH_SENTINEL {
            self.touch.valid.store(false, Ordering::Relaxed);
            return;
        }

        self.touch.x.store(x.to_bits(), Ordering::Relaxed);
        self.touch.y.store(y.to_bits(), Ordering::Relaxed);
        self.touch.valid.store(true, Ordering::Relaxed);
    }

    /// Answers `retro_input_state`.
    pub fn state(&self, port: c_uint, device: c_uint, index: c_uint, id: c_uint) -> i16 {
        let Some(state) = self.ports.get(port as usize) else {
            return 0;
        };

        match device {
            ffi::DEVICE_JOYPAD => match id {
                libretro_sys::DEVICE_ID_JOYPAD_LEFT => {
                    (state.dpad_x.load(Ordering::Relaxed) == -1) as i16
                }
                libretro_sys::DEVICE_ID_JOYPAD_RIGHT => {
                    (state.dpad_x.load(Ordering::Relaxed) == 1) as i16
                }
                libretro_sys::DEVICE_ID_JOYPAD_UP => {
                    (state.dpad_y.load(Ordering::Relaxed) == -1) as i16
                }
                libretro_sys::DEVICE_ID_JOYPAD_DOWN => {
                    (state.dpad_y.load(Ordering::Relaxed) == 1) as i16
                }
                _ => {
                    let Some(button) = Button::from_joypad_id(id) else {
                        return 0;
                    };
                    let set = EnumSet::from_u32_truncated(state.buttons.load(Ordering::Relaxed));
                    set.contains(button) as i16
                }
            },

            ffi::DEVICE_ANALOG => match (index, id) {
                (ffi::DEVICE_INDEX_ANALOG_LEFT, ffi::DEVICE_ID_ANALOG_X) => {
                    state.analog_left_x.load(Ordering::Relaxed)
                }
                (ffi::DEVICE_INDEX_ANALOG_LEFT, ffi::DEVICE_ID_ANALOG_Y) => {
                    state.analog_left_y.load(Ordering::Relaxed)
                }
                (ffi::DEVICE_INDEX_ANALOG_RIGHT, ffi::DEVICE_ID_ANALOG_X) => {
                    state.analog_right_x.load(Ordering::Relaxed)
                }
                (ffi::DEVICE_INDEX_ANALOG_RIGHT, ffi::DEVICE_ID_ANALOG_Y) => {
                    state.analog_right_y.load(Ordering::Relaxed)
                }
                _ => 0,
            },

            ffi::DEVICE_POINTER => {
                if !self.touch.valid.load(Ordering::Relaxed) {
                    return 0;
                }
                match id {
                    ffi::DEVICE_ID_POINTER_X => {
                        let x = f32::from_bits(self.touch.x.load(Ordering::Relaxed));
                        ((x * 2.0 - 1.0) * ANALOG_MAX_RANGE) as i16
                    }
                    ffi::DEVICE_ID_POINTER_Y => {
                        let y = f32::from_bits(self.touch.y.load(Ordering::Relaxed));
                        ((y * 2.0 - 1.0) * ANALOG_MAX_RANGE) as i16
                    }
                    ffi::DEVICE_ID_POINTER_PRESSED => 1,
                    _ => 0,
                }
            }

            _ => 0,
        }
    }
}

fn scale_analog(value: f32) -> i16 {
    (value.clamp(-1.0, 1.0) * ANALOG_MAX_RANGE) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn face_buttons_are_crossed() {
        let input = Input::default();
        assert!(input.on_key_event(0, KeyAction::Down, KEYCODE_BUTTON_A));

        // Physical A reports as libretro B.
        assert_eq!(
            input.state(0, ffi::DEVICE_JOYPAD, 0, libretro_sys::DEVICE_ID_JOYPAD_B),
            1
        );
        assert_eq!(
            input.state(0, ffi::DEVICE_JOYPAD, 0, libretro_sys::DEVICE_ID_JOYPAD_A),
            0
        );

        assert!(input.on_key_event(0, KeyAction::Up, KEYCODE_BUTTON_A));
        assert_eq!(
            input.state(0, ffi::DEVICE_JOYPAD, 0, libretro_sys::DEVICE_ID_JOYPAD_B),
            0
        );
    }

    #[test]
    fn unknown_key_code_falls_through() {
        let input = Input::default();
        assert!(!input.on_key_event(0, KeyAction::Down, 12345));
    }

    #[test]
    fn dpad_snaps_to_unit_steps() {
        let input = Input::default();
        assert!(input.on_motion_event(0, MotionSource::Dpad, -0.7, 0.9));

        assert_eq!(
            input.state(0, ffi::DEVICE_JOYPAD, 0, libretro_sys::DEVICE_ID_JOYPAD_LEFT),
            1
        );
        assert_eq!(
            input.state(0, ffi::DEVICE_JOYPAD, 0, libretro_sys::DEVICE_ID_JOYPAD_RIGHT),
            0
        );
        assert_eq!(
            input.state(0, ffi::DEVICE_JOYPAD, 0, libretro_sys::DEVICE_ID_JOYPAD_DOWN),
            1
        );
    }

    #[test]
    fn analog_saturates_at_full_range() {
        let input = Input::default();
        input.on_motion_event(0, MotionSource::AnalogLeft, 2.0, -2.0);

        assert_eq!(
            input.state(
                0,
                ffi::DEVICE_ANALOG,
                ffi::DEVICE_INDEX_ANALOG_LEFT,
                ffi::DEVICE_ID_ANALOG_X
            ),
            0x7FFF
        );
        assert_eq!(
            input.state(
                0,
                ffi::DEVICE_ANALOG,
                ffi::DEVICE_INDEX_ANALOG_LEFT,
                ffi::DEVICE_ID_ANALOG_Y
            ),
            -0x7FFF
        );
    }

    #[test]
    fn ports_are_isolated() {
        let input = Input::default();
        input.on_key_event(1, KeyAction::Down, KEYCODE_BUTTON_START);

        assert_eq!(
            input.state(0, ffi::DEVICE_JOYPAD, 0, libretro_sys::DEVICE_ID_JOYPAD_START),
            0
        );
        assert_eq!(
            input.state(1, ffi::DEVICE_JOYPAD, 0, libretro_sys::DEVICE_ID_JOYPAD_START),
            1
        );
    }

    #[test]
    fn out_of_range_port_and_device_return_zero() {
        let input = Input::default();
        assert_eq!(input.state(7, ffi::DEVICE_JOYPAD, 0, 0), 0);
        assert_eq!(input.state(0, 99, 0, 0), 0);
    }

    #[test]
    fn touch_sentinel_clears_pointer() {
        let input = Input::default();
        input.on_touch_event(0.5, 0.5);
        assert_eq!(
            input.state(0, ffi::DEVICE_POINTER, 0, ffi::DEVICE_ID_POINTER_PRESSED),
            1
        );
        assert_eq!(input.state(0, ffi::DEVICE_POINTER, 0, ffi::DEVICE_ID_POINTER_X), 0);

        input.on_touch_event(TOUCH_SENTINEL.0, TOUCH_SENTINEL.1);
        assert_eq!(
            input.state(0, ffi::DEVICE_POINTER, 0, ffi::DEVICE_ID_POINTER_PRESSED),
            0
        );
    }

    #[test]
    fn touch_corners_map_to_full_range() {
        let input = Input::default();
        input.on_touch_event(1.0, 0.0);
        assert_eq!(
            input.state(0, ffi::DEVICE_POINTER, 0, ffi::DEVICE_ID_POINTER_X),
            0x7FFF
        );
        assert_eq!(
            input.state(0, ffi::DEVICE_POINTER, 0, ffi::DEVICE_ID_POINTER_Y),
            -0x7FFF
        );
    }
}
