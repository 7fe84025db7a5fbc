use std::fmt;

/// Errors raised by the HMD session, the frame compositor and the experimentation layer.
#[derive(Debug, thiserror::Error)]
pub enum RiftlagError {
    #[error("Unable to create HMD session: no device available")]
    DeviceNotFound,

    #[error("An HMD session is already active in this process")]
    SessionAlreadyActive,

    #[error("HMD session has been destroyed")]
    SessionDestroyed,

    #[error("Failed to create swap textures: {0}")]
    SwapChainCreation(String),

    #[error("Unable to count swap chain textures")]
    SwapChainEmpty,

    #[error("Could not create mirror texture: {0}")]
    MirrorTextureCreation(String),

    #[error("Device call failed: {0}")]
    Device(String),

    #[error("Frame compositor used before GPU resources were initialized")]
    NotInitialized,

    #[error("Ring buffer capacity must be at least 1")]
    InvalidCapacity,

    #[error("Command queue disconnected")]
    CommandQueueDisconnected,

    #[error("Invalid {kind} value: {value}")]
    InvalidEnumValue { kind: &'static str, value: i32 },
}

/// Thread-safe last-error storage for the C FFI layer.
pub(crate) struct LastError {
    message: std::sync::Mutex<String>,
}

impl LastError {
    pub const fn new() -> Self {
        Self {
            message: std::sync::Mutex::new(String::new()),
        }
    }

    pub fn set(&self, err: &RiftlagError) {
        if let Ok(mut msg) = self.message.lock() {
            *msg = fmt::format(format_args!("{}\0", err));
        }
    }

    pub fn as_ptr(&self) -> *const std::ffi::c_char {
        match self.message.lock() {
            Ok(msg) if !msg.is_empty() => msg.as_ptr() as *const std::ffi::c_char,
            _ => std::ptr::null(),
        }
    }
}
