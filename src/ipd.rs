use crate::types::{Eye, EyePoses, Pose};

/// Per-step change of each eye's horizontal offset, in meters.
pub const IPD_STEP: f32 = 0.005;
/// Lower bound on the right eye offset.
pub const MIN_IPD: f32 = -0.1;
/// Upper bound on the right eye offset.
pub const MAX_IPD: f32 = 0.3;

/// Eye-to-head transforms handed to pose acquisition and frame submission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewScaleDesc {
    pub hmd_to_eye_pose: EyePoses,
    pub hmd_space_to_world_scale_in_meters: f32,
}

impl Default for ViewScaleDesc {
    fn default() -> Self {
        Self {
            hmd_to_eye_pose: [Pose::IDENTITY; 2],
            hmd_space_to_world_scale_in_meters: 1.0,
        }
    }
}

/// Runtime-adjustable stereo separation with a snapshot of the initial values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewScale {
    current: ViewScaleDesc,
    base: ViewScaleDesc,
}

impl ViewScale {
    pub fn new(base: ViewScaleDesc) -> Self {
        Self {
            current: base,
            base,
        }
    }

    pub fn desc(&self) -> &ViewScaleDesc {
        &self.current
    }

    pub fn base(&self) -> &ViewScaleDesc {
        &self.base
    }

    pub fn eye_offset(&self, eye: Eye) -> f32 {
        self.current.hmd_to_eye_pose[eye.index()].position.x
    }

    /// Move the eyes apart. Once the right eye passes [`MAX_IPD`] both snap to `±MAX_IPD`.
    pub fn increase(&mut self) {
        self.shift(IPD_STEP);
        if self.eye_offset(Eye::Right) > MAX_IPD {
            self.snap(MAX_IPD);
        }
        log::debug!("IPD offsets: {:?}", self.offsets());
    }

    /// Move the eyes together. Once the right eye passes [`MIN_IPD`] both snap to `∓MIN_IPD`.
    pub fn decrease(&mut self) {
        self.shift(-IPD_STEP);
        if self.eye_offset(Eye::Right) < MIN_IPD {
            self.snap(MIN_IPD);
        }
        log::debug!("IPD offsets: {:?}", self.offsets());
    }

    pub fn reset(&mut self) {
        self.current = self.base;
        log::debug!("IPD reset to {:?}", self.offsets());
    }

    fn offsets(&self) -> [f32; 2] {
        [self.eye_offset(Eye::Left), self.eye_offset(Eye::Right)]
    }

    fn shift(&mut self, step: f32) {
        self.current.hmd_to_eye_pose[Eye::Left.index()].position.x -= step;
        self.current.hmd_to_eye_pose[Eye::Right.index()].position.x += step;
    }

    // The right eye gets `bound`, the left its mirror, whichever bound was crossed.
    fn snap(&mut self, bound: f32) {
        self.current.hmd_to_eye_pose[Eye::Left.index()].position.x = -bound;
        self.current.hmd_to_eye_pose[Eye::Right.index()].position.x = bound;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};

    fn base() -> ViewScaleDesc {
        ViewScaleDesc {
            hmd_to_eye_pose: [
                Pose::new(Quat::IDENTITY, Vec3::new(-0.032, 0.0, 0.0)),
                Pose::new(Quat::IDENTITY, Vec3::new(0.032, 0.0, 0.0)),
            ],
            hmd_space_to_world_scale_in_meters: 1.0,
        }
    }

    #[test]
    fn test_increase_then_decrease_returns_to_base() {
        let mut scale = ViewScale::new(base());
        scale.increase();
        assert!((scale.eye_offset(Eye::Right) - 0.037).abs() < 1e-6);
        assert!((scale.eye_offset(Eye::Left) + 0.037).abs() < 1e-6);

        scale.decrease();
        assert!((scale.eye_offset(Eye::Right) - 0.032).abs() < 1e-6);
        assert!((scale.eye_offset(Eye::Left) + 0.032).abs() < 1e-6);
    }

    #[test]
    fn test_repeated_increase_saturates() {
        let mut scale = ViewScale::new(base());
        for _ in 0..200 {
            scale.increase();
        }
        assert_eq!(scale.eye_offset(Eye::Right), MAX_IPD);
        assert_eq!(scale.eye_offset(Eye::Left), -MAX_IPD);
    }

    #[test]
    fn test_repeated_decrease_snaps_to_mirrored_min() {
        let mut scale = ViewScale::new(base());
        for _ in 0..200 {
            scale.decrease();
        }
        assert_eq!(scale.eye_offset(Eye::Right), MIN_IPD);
        assert_eq!(scale.eye_offset(Eye::Left), -MIN_IPD);
    }

    #[test]
    fn test_reset_restores_snapshot() {
        let mut scale = ViewScale::new(base());
        for _ in 0..5 {
            scale.increase();
        }
        scale.reset();
        assert_eq!(scale.desc(), &base());
        assert_eq!(scale.base(), &base());
    }

    #[test]
    fn test_world_scale_default() {
        assert_eq!(ViewScaleDesc::default().hmd_space_to_world_scale_in_meters, 1.0);
    }
}
