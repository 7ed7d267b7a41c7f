use strum::FromRepr;

use crate::ffi::ENVIRONMENT_EXPERIMENTAL;

/// Environment command codes a core may send through `retro_environment_t`.
///
/// Only codes the host recognizes are listed; anything else fails
/// `from_repr` and is answered with `false` without allocating.
#[derive(FromRepr, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum EnvironmentCommand {
    // unsigned *: quarter-turn screen rotation index (counter-clockwise).
    SetRotation = 1,
    GetOverscan = 2,
    // bool *: frontend supports frame duping (NULL video frames).
    GetCanDupe = 3,
    SetMessage = 6,
    Shutdown = 7,
    SetPerformanceLevel = 8,
    // const char **: BIOS / system asset directory.
    GetSystemDirectory = 9,
    SetPixelFormat = 10,
    SetInputDescriptors = 11,
    SetKeyboardCallback = 12,
    SetDiskControlInterface = 13,
    // struct retro_hw_render_callback *: negotiate GL rendering.
    SetHwRender = 14,
    GetVariable = 15,
    // Array terminated by { NULL, NULL }; first option is the default.
    SetVariables = 16,
    // bool *: variables changed since the last query; cleared on read.
    GetVariableUpdate = 17,
    SetSupportNoGame = 18,
    GetLibretroPath = 19,
    SetFrameTimeCallback = 21,
    SetAudioCallback = 22,
    GetRumbleInterface = 23,
    GetInputDeviceCapabilities = 24,
    GetSensorInterface = 25 | ENVIRONMENT_EXPERIMENTAL,
    GetCameraInterface = 26 | ENVIRONMENT_EXPERIMENTAL,
    GetLogInterface = 27,
    GetPerfInterface = 28,
    GetLocationInterface = 29,
    GetCoreAssetsDirectory = 30,
    GetSaveDirectory = 31,
    SetSystemAvInfo = 32,
    SetProcAddressCallback = 33,
    SetSubsystemInfo = 34,
    // Supported controller types per port, for the embedder's UI.
    SetControllerInfo = 35,
    SetMemoryMaps = 36 | ENVIRONMENT_EXPERIMENTAL,
    // Soft geometry change; must complete in constant time.
    SetGeometry = 37,
    GetUsername = 38,
    GetLanguage = 39,
    GetCurrentSoftwareFramebuffer = 40 | ENVIRONMENT_EXPERIMENTAL,
    GetHwRenderInterface = 41 | ENVIRONMENT_EXPERIMENTAL,
    SetSupportAchievements = 42 | ENVIRONMENT_EXPERIMENTAL,
    GetVfsInterface = 45 | ENVIRONMENT_EXPERIMENTAL,
    GetLedInterface = 46 | ENVIRONMENT_EXPERIMENTAL,
    GetAudioVideoEnable = 47 | ENVIRONMENT_EXPERIMENTAL,
    GetInputBitmasks = 51 | ENVIRONMENT_EXPERIMENTAL,
    GetCoreOptionsVersion = 52,
    SetCoreOptionsDisplay = 55,
    GetDiskControlInterfaceVersion = 57,
    GetMicrophoneInterface = 75 | ENVIRONMENT_EXPERIMENTAL,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_resolve() {
        assert_eq!(EnvironmentCommand::from_repr(3), Some(EnvironmentCommand::GetCanDupe));
        assert_eq!(
            EnvironmentCommand::from_repr(10),
            Some(EnvironmentCommand::SetPixelFormat)
        );
        assert_eq!(
            EnvironmentCommand::from_repr(45 | ENVIRONMENT_EXPERIMENTAL),
            Some(EnvironmentCommand::GetVfsInterface)
        );
        assert_eq!(
            EnvironmentCommand::from_repr(75 | ENVIRONMENT_EXPERIMENTAL),
            Some(EnvironmentCommand::GetMicrophoneInterface)
        );
    }

    #[test]
    fn experimental_bit_is_part_of_the_code() {
        // 45 without the experimental bit is not the VFS command.
        assert_eq!(EnvironmentCommand::from_repr(45), None);
    }

    #[test]
    fn unknown_codes_fail() {
        assert_eq!(EnvironmentCommand::from_repr(0), None);
        assert_eq!(EnvironmentCommand::from_repr(9999), None);
    }
}
