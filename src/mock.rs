//! In-process stand-ins for the HMD and the GPU context.
//!
//! `MockHmd` simulates a headset with a deterministic head path and records every swap-chain
//! commit, submission and recenter. `RecordingGpu` records GPU calls as values. Both drive
//! the tests and the demos.

use crate::app::WindowContext;
use crate::compositor::{AvatarUpdater, GpuContext, SceneRenderer};
use crate::device::HmdDevice;
use crate::ipd::ViewScaleDesc;
use crate::types::{
    BlitRegion, Eye, EyePoses, EyeRenderDesc, FovPort, FramebufferId, GraphicsLuid, HmdCaps,
    HmdDesc, LayerEyeFov, MirrorTextureDesc, MirrorTextureId, Pose, Recti, RenderbufferId,
    SwapChainDesc, SwapChainId, TextureId, TrackingCaps,
};
use crate::{Result, RiftlagError};
use glam::{IVec2, Mat4, Quat, UVec2, Vec2, Vec3};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Serializes tests that open a device session.
#[cfg(test)]
pub(crate) fn session_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

/// One `submit_frame` call as seen by the mock.
#[derive(Debug, Clone)]
pub struct SubmittedFrame {
    pub frame_index: u64,
    pub view_scale: ViewScaleDesc,
    pub layer: LayerEyeFov,
}

const SWAP_TEXTURE_BASE: u32 = 100;
const MIRROR_TEXTURE: u32 = 900;

/// Simulated headset.
pub struct MockHmd {
    desc: HmdDesc,
    swap_chain_length: usize,
    swap_chain: Option<(SwapChainId, SwapChainDesc)>,
    current_index: usize,
    mirror: Option<MirrorTextureDesc>,
    fail_swap_chain: bool,
    fail_mirror: bool,
    fail_poses_at: Option<u64>,
    fail_submit_at: Option<u64>,
    fail_acquire_at: Option<u64>,
    fail_mirror_at: Option<u64>,
    pose_requests: Vec<u64>,
    submitted: Vec<SubmittedFrame>,
    commits: usize,
    recenters: usize,
    destroy_calls: Rc<Cell<usize>>,
}

impl MockHmd {
    /// Recommended texture size for each eye.
    pub const EYE_TEXTURE_SIZE: UVec2 = UVec2::new(1344, 1600);
    /// Default horizontal eye offset from the head center, in meters.
    pub const EYE_OFFSET: f32 = 0.032;
    const REFRESH_RATE: f32 = 90.0;

    pub fn new() -> Self {
        let fov = FovPort {
            up_tan: 1.33,
            down_tan: 1.33,
            left_tan: 1.05,
            right_tan: 1.09,
        };
        let mirrored = FovPort {
            left_tan: fov.right_tan,
            right_tan: fov.left_tan,
            ..fov
        };
        Self {
            desc: HmdDesc {
                product_name: "Mock HMD".into(),
                resolution: UVec2::new(2160, 1200),
                display_refresh_rate: Self::REFRESH_RATE,
                default_eye_fov: [fov, mirrored],
                max_eye_fov: [fov, mirrored],
                available_hmd_caps: HmdCaps::DEBUG_DEVICE,
                available_tracking_caps: TrackingCaps::all(),
            },
            swap_chain_length: 3,
            swap_chain: None,
            current_index: 0,
            mirror: None,
            fail_swap_chain: false,
            fail_mirror: false,
            fail_poses_at: None,
            fail_submit_at: None,
            fail_acquire_at: None,
            fail_mirror_at: None,
            pose_requests: Vec::new(),
            submitted: Vec::new(),
            commits: 0,
            recenters: 0,
            destroy_calls: Rc::new(Cell::new(0)),
        }
    }

    pub fn with_swap_chain_length(mut self, length: usize) -> Self {
        self.swap_chain_length = length;
        self
    }

    pub fn failing_swap_chain(mut self) -> Self {
        self.fail_swap_chain = true;
        self
    }

    pub fn failing_mirror(mut self) -> Self {
        self.fail_mirror = true;
        self
    }

    pub fn fail_poses_at(mut self, frame_index: u64) -> Self {
        self.fail_poses_at = Some(frame_index);
        self
    }

    pub fn fail_submit_at(mut self, frame_index: u64) -> Self {
        self.fail_submit_at = Some(frame_index);
        self
    }

    /// Fail swap-chain index lookup during `frame_index`.
    pub fn fail_acquire_at(mut self, frame_index: u64) -> Self {
        self.fail_acquire_at = Some(frame_index);
        self
    }

    /// Fail mirror texture lookup during `frame_index`.
    pub fn fail_mirror_at(mut self, frame_index: u64) -> Self {
        self.fail_mirror_at = Some(frame_index);
        self
    }

    /// Head pose for a frame: slow walk along +X while turning about +Y.
    pub fn head_pose(frame_index: u64) -> Pose {
        let t = frame_index as f32;
        Pose::new(
            Quat::from_rotation_y(t * 0.01),
            Vec3::new(t * 0.01, 1.6, 0.0),
        )
    }

    /// Pose of `eye` for a frame, `half_ipd` meters from the head center.
    pub fn eye_pose(frame_index: u64, eye: Eye, half_ipd: f32) -> Pose {
        let offset = match eye {
            Eye::Left => -half_ipd,
            Eye::Right => half_ipd,
        };
        compose(
            Self::head_pose(frame_index),
            Pose::new(Quat::IDENTITY, Vec3::new(offset, 0.0, 0.0)),
        )
    }

    pub fn pose_requests(&self) -> &[u64] {
        &self.pose_requests
    }

    pub fn submitted(&self) -> &[SubmittedFrame] {
        &self.submitted
    }

    pub fn commit_count(&self) -> usize {
        self.commits
    }

    pub fn recenter_count(&self) -> usize {
        self.recenters
    }

    /// Shared count of `destroy` calls, readable after the mock has been dropped.
    pub fn destroy_counter(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.destroy_calls)
    }

    pub fn swap_chain_desc(&self) -> Option<SwapChainDesc> {
        self.swap_chain.map(|(_, desc)| desc)
    }

    pub fn mirror_desc(&self) -> Option<MirrorTextureDesc> {
        self.mirror
    }

    /// Frame of the most recent pose request.
    fn current_frame(&self) -> Option<u64> {
        self.pose_requests.last().copied()
    }

    fn check_chain(&self, chain: SwapChainId) -> Result<()> {
        match self.swap_chain {
            Some((id, _)) if id == chain => Ok(()),
            _ => Err(RiftlagError::Device(format!("unknown swap chain {:?}", chain))),
        }
    }
}

impl Default for MockHmd {
    fn default() -> Self {
        Self::new()
    }
}

fn compose(parent: Pose, child: Pose) -> Pose {
    Pose::new(
        parent.orientation * child.orientation,
        parent.position + parent.orientation * child.position,
    )
}

impl HmdDevice for MockHmd {
    fn hmd_desc(&self) -> HmdDesc {
        self.desc.clone()
    }

    fn graphics_luid(&self) -> GraphicsLuid {
        GraphicsLuid([0x4d, 0x4f, 0x43, 0x4b, 0, 0, 0, 1])
    }

    fn render_desc(&self, eye: Eye, fov: FovPort) -> EyeRenderDesc {
        let offset = match eye {
            Eye::Left => -Self::EYE_OFFSET,
            Eye::Right => Self::EYE_OFFSET,
        };
        EyeRenderDesc {
            eye,
            fov,
            distorted_viewport: Recti {
                pos: IVec2::new(eye.index() as i32 * 1080, 0),
                size: UVec2::new(1080, 1200),
            },
            pixels_per_tan_angle_at_center: Vec2::new(549.6, 549.6),
            hmd_to_eye_pose: Pose::new(Quat::IDENTITY, Vec3::new(offset, 0.0, 0.0)),
        }
    }

    fn fov_texture_size(&self, _eye: Eye, _fov: FovPort, pixels_per_display_pixel: f32) -> UVec2 {
        (Self::EYE_TEXTURE_SIZE.as_vec2() * pixels_per_display_pixel)
            .round()
            .as_uvec2()
    }

    fn eye_poses(&mut self, frame_index: u64, hmd_to_eye: &EyePoses) -> Result<(EyePoses, f64)> {
        self.pose_requests.push(frame_index);
        if self.fail_poses_at == Some(frame_index) {
            return Err(RiftlagError::Device("tracking lost".into()));
        }
        let head = Self::head_pose(frame_index);
        let poses = [compose(head, hmd_to_eye[0]), compose(head, hmd_to_eye[1])];
        Ok((poses, frame_index as f64 / Self::REFRESH_RATE as f64))
    }

    fn create_swap_chain(&mut self, desc: &SwapChainDesc) -> Result<SwapChainId> {
        if self.fail_swap_chain {
            return Err(RiftlagError::Device("out of texture memory".into()));
        }
        let id = SwapChainId(1);
        self.swap_chain = Some((id, *desc));
        Ok(id)
    }

    fn swap_chain_length(&self, chain: SwapChainId) -> Result<usize> {
        self.check_chain(chain)?;
        Ok(self.swap_chain_length)
    }

    fn swap_chain_current_index(&self, chain: SwapChainId) -> Result<usize> {
        self.check_chain(chain)?;
        if self.fail_acquire_at.is_some() && self.fail_acquire_at == self.current_frame() {
            return Err(RiftlagError::Device("swap chain index unavailable".into()));
        }
        Ok(self.current_index)
    }

    fn swap_chain_buffer(&self, chain: SwapChainId, index: usize) -> Result<TextureId> {
        self.check_chain(chain)?;
        if index >= self.swap_chain_length {
            return Err(RiftlagError::Device(format!("swap chain index {} out of range", index)));
        }
        Ok(TextureId(SWAP_TEXTURE_BASE + index as u32))
    }

    fn commit_swap_chain(&mut self, chain: SwapChainId) -> Result<()> {
        self.check_chain(chain)?;
        self.commits += 1;
        self.current_index = (self.current_index + 1) % self.swap_chain_length.max(1);
        Ok(())
    }

    fn submit_frame(
        &mut self,
        frame_index: u64,
        view_scale: &ViewScaleDesc,
        layer: &LayerEyeFov,
    ) -> Result<()> {
        if self.fail_submit_at == Some(frame_index) {
            return Err(RiftlagError::Device("display lost".into()));
        }
        self.submitted.push(SubmittedFrame {
            frame_index,
            view_scale: *view_scale,
            layer: layer.clone(),
        });
        Ok(())
    }

    fn create_mirror_texture(&mut self, desc: &MirrorTextureDesc) -> Result<MirrorTextureId> {
        if self.fail_mirror {
            return Err(RiftlagError::Device("mirror unsupported".into()));
        }
        self.mirror = Some(*desc);
        Ok(MirrorTextureId(1))
    }

    fn mirror_texture_buffer(&self, mirror: MirrorTextureId) -> Result<TextureId> {
        if self.fail_mirror_at.is_some() && self.fail_mirror_at == self.current_frame() {
            return Err(RiftlagError::Device("mirror texture unavailable".into()));
        }
        match self.mirror {
            Some(_) if mirror == MirrorTextureId(1) => Ok(TextureId(MIRROR_TEXTURE)),
            _ => Err(RiftlagError::Device(format!("unknown mirror {:?}", mirror))),
        }
    }

    fn recenter_tracking_origin(&mut self) -> Result<()> {
        self.recenters += 1;
        Ok(())
    }

    fn destroy(&mut self) {
        self.destroy_calls.set(self.destroy_calls.get() + 1);
    }
}

/// GPU call captured by [`RecordingGpu`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuCall {
    SwapInterval(i32),
    ConfigureSwapTexture(TextureId),
    CreateFramebuffer(FramebufferId),
    CreateDepthBuffer(FramebufferId, UVec2),
    BindDrawFramebuffer(Option<FramebufferId>),
    AttachDrawColor(Option<TextureId>),
    Clear,
    Viewport(Recti),
    BlitMirror {
        framebuffer: FramebufferId,
        texture: TextureId,
        src: BlitRegion,
        dst: BlitRegion,
    },
    CreateWindow(UVec2),
    SwapBuffers,
}

/// GPU and window context that only records what it is asked to do.
#[derive(Debug, Default)]
pub struct RecordingGpu {
    calls: Vec<GpuCall>,
    next_name: u32,
    close_after: Option<usize>,
    swaps: usize,
}

impl RecordingGpu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report the window as closed after `frames` buffer swaps.
    pub fn close_after(mut self, frames: usize) -> Self {
        self.close_after = Some(frames);
        self
    }

    pub fn calls(&self) -> &[GpuCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    fn next_name(&mut self) -> u32 {
        self.next_name += 1;
        self.next_name
    }
}

impl GpuContext for RecordingGpu {
    fn set_swap_interval(&mut self, interval: i32) {
        self.calls.push(GpuCall::SwapInterval(interval));
    }

    fn configure_swap_texture(&mut self, texture: TextureId) {
        self.calls.push(GpuCall::ConfigureSwapTexture(texture));
    }

    fn create_framebuffer(&mut self) -> FramebufferId {
        let id = FramebufferId(self.next_name());
        self.calls.push(GpuCall::CreateFramebuffer(id));
        id
    }

    fn create_depth_buffer(&mut self, framebuffer: FramebufferId, size: UVec2) -> RenderbufferId {
        self.calls.push(GpuCall::CreateDepthBuffer(framebuffer, size));
        RenderbufferId(self.next_name())
    }

    fn bind_draw_framebuffer(&mut self, framebuffer: Option<FramebufferId>) {
        self.calls.push(GpuCall::BindDrawFramebuffer(framebuffer));
    }

    fn attach_draw_color(&mut self, texture: Option<TextureId>) {
        self.calls.push(GpuCall::AttachDrawColor(texture));
    }

    fn clear(&mut self) {
        self.calls.push(GpuCall::Clear);
    }

    fn set_viewport(&mut self, viewport: Recti) {
        self.calls.push(GpuCall::Viewport(viewport));
    }

    fn blit_mirror(
        &mut self,
        framebuffer: FramebufferId,
        texture: TextureId,
        src: BlitRegion,
        dst: BlitRegion,
    ) {
        self.calls.push(GpuCall::BlitMirror {
            framebuffer,
            texture,
            src,
            dst,
        });
    }
}

impl WindowContext for RecordingGpu {
    fn create_mirror_window(&mut self, size: UVec2) -> Result<()> {
        self.calls.push(GpuCall::CreateWindow(size));
        Ok(())
    }

    fn swap_buffers(&mut self) {
        self.swaps += 1;
        self.calls.push(GpuCall::SwapBuffers);
    }

    fn should_close(&self) -> bool {
        self.close_after.is_some_and(|frames| self.swaps >= frames)
    }
}

/// One `render_scene_for_eye` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneCall {
    pub projection: Mat4,
    pub head_pose: Mat4,
    pub eye: Eye,
}

/// Scene renderer that records its calls. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingScene {
    calls: Rc<RefCell<Vec<SceneCall>>>,
}

impl RecordingScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<SceneCall> {
        self.calls.borrow().clone()
    }
}

impl SceneRenderer for RecordingScene {
    fn render_scene(&mut self, projection: &Mat4, head_pose: &Mat4) {
        self.render_scene_for_eye(projection, head_pose, Eye::Left);
    }

    fn render_scene_for_eye(&mut self, projection: &Mat4, head_pose: &Mat4, eye: Eye) {
        self.calls.borrow_mut().push(SceneCall {
            projection: *projection,
            head_pose: *head_pose,
            eye,
        });
    }
}

/// One `update_avatar` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AvatarCall {
    pub projection: Mat4,
    pub view: Mat4,
    pub eye_world: Vec3,
}

/// Avatar updater that records its calls. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingAvatar {
    calls: Rc<RefCell<Vec<AvatarCall>>>,
}

impl RecordingAvatar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<AvatarCall> {
        self.calls.borrow().clone()
    }
}

impl AvatarUpdater for RecordingAvatar {
    fn update_avatar(&mut self, projection: &Mat4, view: &Mat4, eye_world: Vec3) {
        self.calls.borrow_mut().push(AvatarCall {
            projection: *projection,
            view: *view,
            eye_world,
        });
    }
}
