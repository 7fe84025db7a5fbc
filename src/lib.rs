//! # riftlag - HMD frame submission and tracking-latency lab
//!
//! Drives a head-mounted display through a swap-chain compositor while letting an experimenter
//! degrade tracking on purpose. Provides:
//! - A single-session HMD device abstraction and per-eye render setup
//! - A per-frame pipeline that renders with poses from N frames ago (lag) and skips drawing on
//!   all but every (D+1)-th frame (delay), while always submitting the tracked pose
//! - Runtime IPD adjustment and eye render modes (mono, single eye, swapped eyes)
//! - A single-writer command queue for adjusting all of the above from another thread
//! - C FFI over the experimentation state for C/C++ renderers
//!
//! ## Quick Start
//! ```no_run
//! use riftlag::mock::{MockHmd, RecordingGpu, RecordingScene};
//! use riftlag::{LabConfig, RiftApp};
//!
//! let config = LabConfig::from_env().unwrap();
//! let mut app = RiftApp::new(
//!     || Ok(MockHmd::new()),
//!     RecordingGpu::new().close_after(90),
//!     &config,
//!     Box::new(RecordingScene::new()),
//! )
//! .unwrap();
//! app.increase_lag();
//! let frames = app.run().unwrap();
//! println!("drew {} frames", frames);
//! ```

pub mod error;
pub mod types;
pub mod ring;
pub mod latency;
pub mod ipd;
pub mod render_mode;
pub mod device;
pub mod descriptor;
pub mod input;
pub mod config;
pub mod compositor;
pub mod app;
pub mod mock;
pub mod ffi;

pub use app::{RiftApp, WindowContext};
pub use compositor::{
    AvatarUpdater, FrameCompositor, FrameReport, GpuContext, InputHandler, SceneRenderer,
};
pub use config::LabConfig;
pub use device::{DeviceSession, HmdDevice};
pub use error::RiftlagError;
pub use input::{Command, CommandSender};
pub use render_mode::EyeRenderMode;
pub use ring::{PoseRingBuffer, RingBuffer};
pub use types::*;

/// Result type alias for riftlag operations.
pub type Result<T> = std::result::Result<T, RiftlagError>;
