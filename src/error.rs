use thiserror::Error;

/// Errors surfaced to the embedder.
///
/// Every variant maps to a stable integer code so bridges that only speak
/// numbers can round-trip the failure class.
#[derive(Debug, Error)]
pub enum RetroError {
    #[error("failed to load core library: {0}")]
    LoadLibrary(String),

    #[error("core refused to load the game")]
    LoadGame,

    #[error("renderer not compatible with the current GL context: {0}")]
    GlNotCompatible(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("cheat rejected: {0}")]
    Cheat(String),

    #[error("{0}")]
    Generic(String),
}

pub const ERROR_LOAD_LIBRARY: i32 = 0;
pub const ERROR_LOAD_GAME: i32 = 1;
pub const ERROR_GL_NOT_COMPATIBLE: i32 = 2;
pub const ERROR_SERIALIZATION: i32 = 3;
pub const ERROR_CHEAT: i32 = 4;
pub const ERROR_GENERIC: i32 = -1;

impl RetroError {
    pub fn code(&self) -> i32 {
        match self {
            RetroError::LoadLibrary(_) => ERROR_LOAD_LIBRARY,
            RetroError::LoadGame => ERROR_LOAD_GAME,
            RetroError::GlNotCompatible(_) => ERROR_GL_NOT_COMPATIBLE,
            RetroError::Serialization(_) => ERROR_SERIALIZATION,
            RetroError::Cheat(_) => ERROR_CHEAT,
            RetroError::Generic(_) => ERROR_GENERIC,
        }
    }
}

pub type Result<T> = std::result::Result<T, RetroError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(RetroError::LoadLibrary(String::new()).code(), 0);
        assert_eq!(RetroError::LoadGame.code(), 1);
        assert_eq!(RetroError::GlNotCompatible(String::new()).code(), 2);
        assert_eq!(RetroError::Serialization(String::new()).code(), 3);
        assert_eq!(RetroError::Cheat(String::new()).code(), 4);
        assert_eq!(RetroError::Generic(String::new()).code(), -1);
    }
}
