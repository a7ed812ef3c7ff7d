/*!
Error taxonomy for the host bridge.

- Load errors: the VM rejected a cartridge. Recoverable and user-facing; the
  handle is left without a cartridge rather than half-loaded.
- Resource errors: the module ran out of memory. Fatal for the session.
- Traps: a call into the module aborted. Fatal for the session; the scheduler
  pauses instead of ticking a possibly-corrupt VM.
- Not loaded: execution was requested while the handle holds no cartridge
  (never loaded, or the last load failed). Recoverable by loading one.

Protocol violations (dimension mismatches, views outside the arena) are not
represented here: they are programming errors and fail fast through `assert!`.
*/

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BridgeError>;

/// A call into the VM module aborted before returning a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("vm module trapped: {message}")]
pub struct Trap {
    message: String,
}

impl Trap {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Cartridge rejection reported by the VM's load entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("cartridge type is not supported")]
    UnsupportedCartridge,
    #[error("cartridge size is invalid")]
    InvalidSize,
    #[error("cartridge RAM configuration is invalid")]
    InvalidRamConfig,
    #[error("cartridge load failed with unknown status {0}")]
    Unknown(i32),
}

impl LoadError {
    /// Map a load status code to an error. `0` is success and maps to `None`.
    pub fn from_status(status: i32) -> Option<Self> {
        match status {
            0 => None,
            1 => Some(LoadError::UnsupportedCartridge),
            2 => Some(LoadError::InvalidSize),
            3 => Some(LoadError::InvalidRamConfig),
            other => Some(LoadError::Unknown(other)),
        }
    }

    /// The status code this error was decoded from.
    pub fn status(&self) -> i32 {
        match self {
            LoadError::UnsupportedCartridge => 1,
            LoadError::InvalidSize => 2,
            LoadError::InvalidRamConfig => 3,
            LoadError::Unknown(code) => *code,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("vm module out of memory (requested {requested} bytes)")]
    OutOfMemory { requested: u32 },

    #[error(transparent)]
    Trap(#[from] Trap),

    #[error("no cartridge loaded")]
    NotLoaded,
}

impl BridgeError {
    /// Whether the session must be reset before the VM is used again.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, BridgeError::Load(_) | BridgeError::NotLoaded)
    }
}
