//! C FFI layer for the latency experimentation state.
//!
//! Lets a C/C++ renderer that owns its own HMD loop use the pose history, lag/delay gate,
//! IPD adjustment and eye render modes. The generated C header is written to
//! `include/riftlag.h` by cbindgen.

use crate::error::LastError;
use crate::input::{Command, Controls};
use crate::ipd::ViewScaleDesc;
use crate::latency::LatencyController;
use crate::render_mode::EyeRenderMode;
use crate::ring::PoseRingBuffer;
use crate::types::{Eye, EyePoses, Pose};
use crate::RiftlagError;
use glam::{Quat, Vec3};
use std::ffi::{c_char, c_int};

static LAST_ERROR: LastError = LastError::new();

/// Opaque experimentation state for C consumers.
pub struct RlLab {
    history: PoseRingBuffer,
    controls: Controls,
}

/// Pose in C-compatible layout.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RlPose {
    /// Quaternion [x, y, z, w].
    pub orientation: [f32; 4],
    /// Position [x, y, z] in meters.
    pub position: [f32; 3],
}

impl From<Pose> for RlPose {
    fn from(pose: Pose) -> Self {
        RlPose {
            orientation: pose.orientation.to_array(),
            position: pose.position.to_array(),
        }
    }
}

impl From<RlPose> for Pose {
    fn from(pose: RlPose) -> Self {
        Pose::new(
            Quat::from_array(pose.orientation).normalize(),
            Vec3::from_array(pose.position),
        )
    }
}

/// Create experimentation state with a pose history of `capacity` frames.
///
/// `left_eye_x` and `right_eye_x` are the device's horizontal head-to-eye offsets, used as the
/// IPD reset point. Returns NULL on error (check `rl_last_error()`).
#[no_mangle]
pub extern "C" fn rl_lab_new(capacity: usize, left_eye_x: f32, right_eye_x: f32) -> *mut RlLab {
    let history = match PoseRingBuffer::with_capacity(capacity) {
        Ok(history) => history,
        Err(e) => {
            LAST_ERROR.set(&e);
            return std::ptr::null_mut();
        }
    };

    let mut base = ViewScaleDesc::default();
    base.hmd_to_eye_pose[Eye::Left.index()].position.x = left_eye_x;
    base.hmd_to_eye_pose[Eye::Right.index()].position.x = right_eye_x;

    Box::into_raw(Box::new(RlLab {
        history,
        controls: Controls::new(base, LatencyController::default()),
    }))
}

/// Free experimentation state.
///
/// # Safety
/// `lab` must be a pointer returned by `rl_lab_new`, or null.
#[no_mangle]
pub unsafe extern "C" fn rl_lab_free(lab: *mut RlLab) {
    if !lab.is_null() {
        drop(Box::from_raw(lab));
    }
}

/// Record this frame's left/right poses.
/// Returns 0 on success, -1 on a null argument.
///
/// # Safety
/// `lab` must be a valid handle or null. `poses` must point to two `RlPose` values (left
/// then right), or be null.
#[no_mangle]
pub unsafe extern "C" fn rl_lab_record(lab: *mut RlLab, poses: *const RlPose) -> c_int {
    if lab.is_null() || poses.is_null() {
        return -1;
    }
    let lab = &mut *lab;
    let pair: EyePoses = [(*poses).into(), (*poses.add(1)).into()];
    lab.history.record(pair);
    0
}

/// Write the poses recorded `lag` frames ago (the current lag setting) into `out`.
/// Returns 0 on success, 1 if that frame has not been recorded yet, -1 on a null argument.
///
/// # Safety
/// `lab` must be a valid handle or null. `out` must point to space for two `RlPose`
/// values, or be null.
#[no_mangle]
pub unsafe extern "C" fn rl_lab_read_delayed(lab: *const RlLab, out: *mut RlPose) -> c_int {
    if lab.is_null() || out.is_null() {
        return -1;
    }
    let lab = &*lab;
    match lab.history.read_delayed(lab.controls.lag() as usize) {
        Some(pair) => {
            out.write(pair[0].into());
            out.add(1).write(pair[1].into());
            0
        }
        None => 1,
    }
}

/// Forget every recorded pose.
///
/// # Safety
/// `lab` must be a valid handle, or null.
#[no_mangle]
pub unsafe extern "C" fn rl_lab_reset_history(lab: *mut RlLab) {
    if let Some(lab) = lab.as_mut() {
        lab.history.reset();
    }
}

/// Advance the delay gate once. Call exactly once per frame.
///
/// # Safety
/// `lab` must be a valid handle, or null.
#[no_mangle]
pub unsafe extern "C" fn rl_lab_should_render(lab: *mut RlLab) -> bool {
    match lab.as_mut() {
        Some(lab) => lab.controls.latency_mut().should_render(),
        None => false,
    }
}

/// Apply one IPD, lag, delay, render-mode or recenter adjustment.
/// `command` is a `Command` discriminant.
/// Returns 0 on success, -1 on a null handle or an unknown command.
///
/// # Safety
/// `lab` must be a valid handle, or null.
#[no_mangle]
pub unsafe extern "C" fn rl_lab_apply(lab: *mut RlLab, command: c_int) -> c_int {
    let Some(lab) = lab.as_mut() else {
        return -1;
    };
    match decode::<Command>(command) {
        Some(command) => {
            lab.controls.apply(command);
            0
        }
        None => -1,
    }
}

/// # Safety
/// `lab` must be a valid handle, or null.
#[no_mangle]
pub unsafe extern "C" fn rl_lab_lag(lab: *const RlLab) -> u32 {
    lab.as_ref().map_or(0, |lab| lab.controls.lag())
}

/// # Safety
/// `lab` must be a valid handle, or null.
#[no_mangle]
pub unsafe extern "C" fn rl_lab_delay(lab: *const RlLab) -> u32 {
    lab.as_ref().map_or(0, |lab| lab.controls.delay())
}

/// # Safety
/// `lab` must be a valid handle, or null.
#[no_mangle]
pub unsafe extern "C" fn rl_lab_render_mode(lab: *const RlLab) -> EyeRenderMode {
    lab.as_ref()
        .map_or(EyeRenderMode::default(), |lab| lab.controls.render_mode())
}

/// Whether the current render mode draws into `eye`'s viewport.
/// `eye`: 0 = left, 1 = right. Returns false for an unknown eye.
///
/// # Safety
/// `lab` must be a valid handle, or null.
#[no_mangle]
pub unsafe extern "C" fn rl_lab_draws_eye(lab: *const RlLab, eye: c_int) -> bool {
    let Some(lab) = lab.as_ref() else {
        return false;
    };
    decode::<Eye>(eye).is_some_and(|eye| lab.controls.render_mode().draws(eye))
}

/// Eye whose pose and projection fill `eye`'s viewport in the current render mode.
/// Returns 0 = left, 1 = right, or -1 on a null handle or an unknown eye.
///
/// # Safety
/// `lab` must be a valid handle, or null.
#[no_mangle]
pub unsafe extern "C" fn rl_lab_source_eye(lab: *const RlLab, eye: c_int) -> c_int {
    let Some(lab) = lab.as_ref() else {
        return -1;
    };
    match decode::<Eye>(eye) {
        Some(eye) => lab.controls.render_mode().source_eye(eye) as c_int,
        None => -1,
    }
}

/// Current horizontal head-to-eye offset of `eye`, to pass to the device's view scale.
/// Returns 0.0 for an unknown eye.
///
/// # Safety
/// `lab` must be a valid handle, or null.
#[no_mangle]
pub unsafe extern "C" fn rl_lab_eye_offset(lab: *const RlLab, eye: c_int) -> f32 {
    let Some(lab) = lab.as_ref() else {
        return 0.0;
    };
    decode::<Eye>(eye).map_or(0.0, |eye| lab.controls.view_scale().eye_offset(eye))
}

/// Returns true once after a recenter command was applied.
///
/// # Safety
/// `lab` must be a valid handle, or null.
#[no_mangle]
pub unsafe extern "C" fn rl_lab_take_recenter_request(lab: *mut RlLab) -> bool {
    lab.as_mut()
        .is_some_and(|lab| lab.controls.take_recenter_request())
}

/// Convert a raw enum value from C, recording the error if it is out of range.
fn decode<T>(raw: c_int) -> Option<T>
where
    T: TryFrom<i32, Error = RiftlagError>,
{
    match T::try_from(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            LAST_ERROR.set(&e);
            None
        }
    }
}

/// Get the last error message. Returns NULL if no error.
/// The returned pointer is valid until the next riftlag API call.
#[no_mangle]
pub extern "C" fn rl_last_error() -> *const c_char {
    LAST_ERROR.as_ptr()
}
