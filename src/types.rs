use crate::{Result, RiftlagError};
use glam::{IVec2, Mat4, Quat, UVec2, Vec2, Vec3};

/// Eye selector. The discriminant doubles as the index into per-eye arrays.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Eye {
    Left = 0,
    Right = 1,
}

impl Eye {
    /// Both eyes in the fixed render enumeration order.
    pub const ALL: [Eye; 2] = [Eye::Left, Eye::Right];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn other(self) -> Eye {
        match self {
            Eye::Left => Eye::Right,
            Eye::Right => Eye::Left,
        }
    }
}

impl TryFrom<i32> for Eye {
    type Error = RiftlagError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(Eye::Left),
            1 => Ok(Eye::Right),
            _ => Err(RiftlagError::InvalidEnumValue { kind: "eye", value }),
        }
    }
}

/// Rigid transform sampled for one eye (or the head) at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// Unit quaternion.
    pub orientation: Quat,
    /// Position in meters.
    pub position: Vec3,
}

impl Pose {
    pub const IDENTITY: Pose = Pose {
        orientation: Quat::IDENTITY,
        position: Vec3::ZERO,
    };

    pub fn new(orientation: Quat, position: Vec3) -> Self {
        Self {
            orientation,
            position,
        }
    }

    /// Pose as a rigid-body matrix (rotation then translation).
    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.orientation, self.position)
    }

    /// Orientation applied to -Z.
    pub fn forward(&self) -> Vec3 {
        self.orientation * Vec3::NEG_Z
    }

    /// Orientation applied to +Y.
    pub fn up(&self) -> Vec3 {
        self.orientation * Vec3::Y
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Left/right pose pair, indexed by [`Eye::index`].
pub type EyePoses = [Pose; 2];

/// Field of view as tangents of the half angles.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FovPort {
    pub up_tan: f32,
    pub down_tan: f32,
    pub left_tan: f32,
    pub right_tan: f32,
}

impl FovPort {
    pub fn symmetric(tan: f32) -> Self {
        Self {
            up_tan: tan,
            down_tan: tan,
            left_tan: tan,
            right_tan: tan,
        }
    }
}

/// Integer rectangle in render-target pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Recti {
    pub pos: IVec2,
    pub size: UVec2,
}

/// Corner-to-corner blit rectangle. `to` below `from` on an axis mirrors that axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlitRegion {
    pub from: IVec2,
    pub to: IVec2,
}

impl BlitRegion {
    /// `(0, 0)` to `(w, h)`.
    pub fn covering(size: UVec2) -> Self {
        Self {
            from: IVec2::ZERO,
            to: size.as_ivec2(),
        }
    }

    pub fn flipped_y(self) -> Self {
        Self {
            from: IVec2::new(self.from.x, self.to.y),
            to: IVec2::new(self.to.x, self.from.y),
        }
    }
}

bitflags::bitflags! {
    /// HMD capability bits reported by the device description.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HmdCaps: u32 {
        const DEBUG_DEVICE = 1 << 4;
    }
}

bitflags::bitflags! {
    /// Tracking capability bits reported by the device description.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TrackingCaps: u32 {
        const ORIENTATION        = 1 << 4;
        const MAG_YAW_CORRECTION = 1 << 5;
        const POSITION           = 1 << 6;
    }
}

bitflags::bitflags! {
    /// Compositor layer header flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LayerFlags: u32 {
        const HIGH_QUALITY                  = 1 << 0;
        const TEXTURE_ORIGIN_AT_BOTTOM_LEFT = 1 << 1;
        const HEAD_LOCKED                   = 1 << 2;
    }
}

/// Static description of the connected HMD.
#[derive(Debug, Clone)]
pub struct HmdDesc {
    pub product_name: String,
    pub resolution: UVec2,
    pub display_refresh_rate: f32,
    pub default_eye_fov: [FovPort; 2],
    pub max_eye_fov: [FovPort; 2],
    pub available_hmd_caps: HmdCaps,
    pub available_tracking_caps: TrackingCaps,
}

/// Identifier of the graphics adapter the HMD is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GraphicsLuid(pub [u8; 8]);

/// Per-eye rendering description returned by the device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeRenderDesc {
    pub eye: Eye,
    pub fov: FovPort,
    pub distorted_viewport: Recti,
    pub pixels_per_tan_angle_at_center: Vec2,
    /// Eye-to-head transform; its x offset is the IPD half-distance.
    pub hmd_to_eye_pose: Pose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    R8G8B8A8UnormSrgb,
}

/// Texture swap chain parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapChainDesc {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub array_size: u32,
    pub mip_levels: u32,
    pub sample_count: u32,
    pub static_image: bool,
}

impl SwapChainDesc {
    /// Single-layer sRGB color chain of the given size.
    pub fn color(size: UVec2) -> Self {
        Self {
            width: size.x,
            height: size.y,
            format: TextureFormat::R8G8B8A8UnormSrgb,
            array_size: 1,
            mip_levels: 1,
            sample_count: 1,
            static_image: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MirrorTextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwapChainId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MirrorTextureId(pub u32);

/// GPU texture name backing a swap chain slot or the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FramebufferId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderbufferId(pub u32);

/// Eye-FOV compositor layer submitted every frame.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerEyeFov {
    pub flags: LayerFlags,
    pub color_texture: Option<SwapChainId>,
    pub viewport: [Recti; 2],
    pub fov: [FovPort; 2],
    pub render_pose: EyePoses,
    pub sensor_sample_time: f64,
}

impl Default for LayerEyeFov {
    fn default() -> Self {
        Self {
            flags: LayerFlags::TEXTURE_ORIGIN_AT_BOTTOM_LEFT,
            color_texture: None,
            viewport: [Recti::default(); 2],
            fov: [FovPort::symmetric(1.0); 2],
            render_pose: [Pose::IDENTITY; 2],
            sensor_sample_time: 0.0,
        }
    }
}
