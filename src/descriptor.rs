use crate::device::{DeviceSession, HmdDevice};
use crate::ipd::ViewScaleDesc;
use crate::types::{Eye, EyeRenderDesc, FovPort, Recti};
use crate::Result;
use glam::{IVec2, Mat4, UVec2, Vec4};

/// Near clip plane, in device units.
pub const NEAR_CLIP: f32 = 0.01;
/// Far clip plane, in device units.
pub const FAR_CLIP: f32 = 1000.0;
/// The on-screen mirror is this many times smaller than the render target on each axis.
pub const MIRROR_DIVISOR: u32 = 4;

/// Right-handed projection with an OpenGL clip range (-w..w) for an off-center FOV.
pub fn fov_projection(fov: FovPort, near: f32, far: f32) -> Mat4 {
    let x_scale = 2.0 / (fov.left_tan + fov.right_tan);
    let x_offset = (fov.left_tan - fov.right_tan) * x_scale * 0.5;
    let y_scale = 2.0 / (fov.up_tan + fov.down_tan);
    let y_offset = (fov.up_tan - fov.down_tan) * y_scale * 0.5;

    let rows = Mat4::from_cols(
        Vec4::new(x_scale, 0.0, -x_offset, 0.0),
        Vec4::new(0.0, y_scale, y_offset, 0.0),
        Vec4::new(0.0, 0.0, (far + near) / (near - far), 2.0 * far * near / (near - far)),
        Vec4::new(0.0, 0.0, -1.0, 0.0),
    );
    rows.transpose()
}

/// Combined render target with the eyes packed side by side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTargetLayout {
    pub size: UVec2,
    pub viewports: [Recti; 2],
    pub mirror_size: UVec2,
}

impl RenderTargetLayout {
    /// Place each eye right of the previous one; height is the tallest eye.
    pub fn pack(eye_sizes: [UVec2; 2]) -> Self {
        let mut size = UVec2::ZERO;
        let mut viewports = [Recti::default(); 2];
        for eye in Eye::ALL {
            let eye_size = eye_sizes[eye.index()];
            viewports[eye.index()] = Recti {
                pos: IVec2::new(size.x as i32, 0),
                size: eye_size,
            };
            size.y = size.y.max(eye_size.y);
            size.x += eye_size.x;
        }
        Self {
            size,
            viewports,
            mirror_size: size / MIRROR_DIVISOR,
        }
    }

    pub fn viewport(&self, eye: Eye) -> Recti {
        self.viewports[eye.index()]
    }
}

/// Per-eye projection, layout and eye offsets, computed once at startup.
#[derive(Debug, Clone)]
pub struct EyeRenderSetup {
    render_descs: [EyeRenderDesc; 2],
    projections: [Mat4; 2],
    layout: RenderTargetLayout,
    view_scale: ViewScaleDesc,
}

impl EyeRenderSetup {
    pub fn new<D: HmdDevice>(
        session: &DeviceSession<D>,
        pixels_per_display_pixel: f32,
    ) -> Result<Self> {
        let left = session.eye_descriptor(Eye::Left, pixels_per_display_pixel)?;
        let right = session.eye_descriptor(Eye::Right, pixels_per_display_pixel)?;

        let render_descs = [left.render_desc, right.render_desc];
        let projections =
            render_descs.map(|desc| fov_projection(desc.fov, NEAR_CLIP, FAR_CLIP));
        let layout = RenderTargetLayout::pack([
            left.recommended_texture_size,
            right.recommended_texture_size,
        ]);
        let view_scale = ViewScaleDesc {
            hmd_to_eye_pose: render_descs.map(|desc| desc.hmd_to_eye_pose),
            ..Default::default()
        };

        log::info!(
            "Render target {}x{}, mirror {}x{}, viewports {:?}",
            layout.size.x,
            layout.size.y,
            layout.mirror_size.x,
            layout.mirror_size.y,
            layout.viewports
        );

        Ok(Self {
            render_descs,
            projections,
            layout,
            view_scale,
        })
    }

    pub fn render_desc(&self, eye: Eye) -> &EyeRenderDesc {
        &self.render_descs[eye.index()]
    }

    pub fn projection(&self, eye: Eye) -> &Mat4 {
        &self.projections[eye.index()]
    }

    pub fn fov(&self, eye: Eye) -> FovPort {
        self.render_descs[eye.index()].fov
    }

    pub fn layout(&self) -> &RenderTargetLayout {
        &self.layout
    }

    /// Eye offsets as reported by the device, before any IPD adjustment.
    pub fn base_view_scale(&self) -> ViewScaleDesc {
        self.view_scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{session_lock, MockHmd};
    use glam::{Vec3, Vec4Swizzles};

    fn project(m: &Mat4, p: Vec3) -> Vec3 {
        let clip = *m * p.extend(1.0);
        clip.xyz() / clip.w
    }

    #[test]
    fn test_projection_depth_range() {
        let m = fov_projection(FovPort::symmetric(1.0), NEAR_CLIP, FAR_CLIP);
        assert!((project(&m, Vec3::new(0.0, 0.0, -NEAR_CLIP)).z + 1.0).abs() < 1e-4);
        assert!((project(&m, Vec3::new(0.0, 0.0, -FAR_CLIP)).z - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_projection_asymmetric_edges() {
        let fov = FovPort {
            up_tan: 1.2,
            down_tan: 0.8,
            left_tan: 1.1,
            right_tan: 0.7,
        };
        let m = fov_projection(fov, NEAR_CLIP, FAR_CLIP);
        let right = project(&m, Vec3::new(fov.right_tan, 0.0, -1.0));
        let left = project(&m, Vec3::new(-fov.left_tan, 0.0, -1.0));
        let up = project(&m, Vec3::new(0.0, fov.up_tan, -1.0));
        let down = project(&m, Vec3::new(0.0, -fov.down_tan, -1.0));
        assert!((right.x - 1.0).abs() < 1e-5);
        assert!((left.x + 1.0).abs() < 1e-5);
        assert!((up.y - 1.0).abs() < 1e-5);
        assert!((down.y + 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_pack_side_by_side() {
        let layout = RenderTargetLayout::pack([UVec2::new(1200, 1400), UVec2::new(1180, 1432)]);
        assert_eq!(layout.size, UVec2::new(2380, 1432));
        assert_eq!(layout.viewport(Eye::Left).pos, IVec2::new(0, 0));
        assert_eq!(layout.viewport(Eye::Right).pos, IVec2::new(1200, 0));
        assert_eq!(layout.viewport(Eye::Right).size, UVec2::new(1180, 1432));
        // integer division
        assert_eq!(layout.mirror_size, UVec2::new(595, 358));
    }

    #[test]
    fn test_setup_from_session() {
        let _guard = session_lock();
        let session = DeviceSession::create(|| Ok(MockHmd::new())).unwrap();
        let setup = EyeRenderSetup::new(&session, 1.0).unwrap();

        let eye = MockHmd::EYE_TEXTURE_SIZE;
        assert_eq!(setup.layout().size, UVec2::new(eye.x * 2, eye.y));
        assert_eq!(setup.layout().mirror_size, setup.layout().size / 4);

        let scale = setup.base_view_scale();
        assert_eq!(scale.hmd_space_to_world_scale_in_meters, 1.0);
        assert!(scale.hmd_to_eye_pose[0].position.x < 0.0);
        assert!(scale.hmd_to_eye_pose[1].position.x > 0.0);
        assert_eq!(
            *setup.projection(Eye::Left),
            fov_projection(setup.fov(Eye::Left), NEAR_CLIP, FAR_CLIP)
        );
    }
}
