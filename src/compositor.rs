//! Per-frame HMD compositor pipeline.
//!
//! One call to [`FrameCompositor::draw_frame`] acquires eye poses, records them in the pose
//! history, substitutes lagged poses for rendering, applies the delay gate, renders each
//! active eye into the current swap-chain image, submits the eye-FOV layer and blits the
//! mirror texture to the window.

use crate::config::LabConfig;
use crate::descriptor::EyeRenderSetup;
use crate::device::{DeviceSession, HmdDevice};
use crate::input::Controls;
use crate::latency::LatencyController;
use crate::ring::PoseRingBuffer;
use crate::types::{
    BlitRegion, Eye, EyePoses, FramebufferId, LayerEyeFov, LayerFlags, MirrorTextureDesc,
    MirrorTextureId, Recti, RenderbufferId, SwapChainDesc, SwapChainId, TextureFormat, TextureId,
};
use crate::{Result, RiftlagError};
use glam::{Mat4, UVec2, Vec3};

/// GPU operations the compositor issues against the rendering context.
pub trait GpuContext {
    fn set_swap_interval(&mut self, interval: i32);

    /// Linear min/mag filtering and clamp-to-edge wrapping for a swap-chain texture.
    fn configure_swap_texture(&mut self, texture: TextureId);

    fn create_framebuffer(&mut self) -> FramebufferId;

    /// 16-bit depth renderbuffer attached to `framebuffer`.
    fn create_depth_buffer(&mut self, framebuffer: FramebufferId, size: UVec2) -> RenderbufferId;

    /// `None` binds the default framebuffer.
    fn bind_draw_framebuffer(&mut self, framebuffer: Option<FramebufferId>);

    /// Color attachment 0 of the bound draw framebuffer. `None` detaches.
    fn attach_draw_color(&mut self, texture: Option<TextureId>);

    /// Clear color and depth.
    fn clear(&mut self);

    fn set_viewport(&mut self, viewport: Recti);

    /// Read `src` of `texture` through `framebuffer` and blit it to `dst` of the default
    /// framebuffer with nearest filtering.
    fn blit_mirror(
        &mut self,
        framebuffer: FramebufferId,
        texture: TextureId,
        src: BlitRegion,
        dst: BlitRegion,
    );
}

/// Scene content drawn per eye.
pub trait SceneRenderer {
    fn render_scene(&mut self, projection: &Mat4, head_pose: &Mat4);

    fn render_scene_for_eye(&mut self, projection: &Mat4, head_pose: &Mat4, eye: Eye) {
        let _ = eye;
        self.render_scene(projection, head_pose);
    }
}

/// Avatar and hand update, run before the scene for every drawn eye.
pub trait AvatarUpdater {
    fn update_avatar(&mut self, projection: &Mat4, view: &Mat4, eye_world: Vec3);
}

/// Invoked once per frame after pose acquisition.
pub trait InputHandler {
    fn handle_input(&mut self, controls: &mut Controls);
}

/// Input handler that does nothing.
pub struct NoInput;

impl InputHandler for NoInput {
    fn handle_input(&mut self, _controls: &mut Controls) {}
}

/// Avatar updater that does nothing.
pub struct NoAvatar;

impl AvatarUpdater for NoAvatar {
    fn update_avatar(&mut self, _projection: &Mat4, _view: &Mat4, _eye_world: Vec3) {}
}

/// Step of the frame that a device failure cut short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStage {
    PoseAcquisition,
    SwapChainAcquire,
    Submit,
    Mirror,
}

/// One drawn viewport and the eye whose data filled it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawnEye {
    pub viewport: Eye,
    pub source: Eye,
}

/// What happened during one call to [`FrameCompositor::draw_frame`].
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub frame_index: u64,
    /// Delay gate result; false means the target was left untouched.
    pub rendered: bool,
    pub drawn: Vec<DrawnEye>,
    pub lag: u32,
    pub delay: u32,
    /// Whether rendering used poses from the history rather than this frame's.
    pub lagged_poses: bool,
    pub submitted: bool,
    pub failed_stage: Option<FrameStage>,
}

impl FrameReport {
    fn new(frame_index: u64, latency: &LatencyController) -> Self {
        Self {
            frame_index,
            rendered: false,
            drawn: Vec::new(),
            lag: latency.lag(),
            delay: latency.delay(),
            lagged_poses: false,
            submitted: false,
            failed_stage: None,
        }
    }

    fn fail(&mut self, stage: FrameStage) {
        if self.failed_stage.is_none() {
            self.failed_stage = Some(stage);
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct GpuResources {
    swap_chain: SwapChainId,
    framebuffer: FramebufferId,
    depth_buffer: RenderbufferId,
    mirror_texture: MirrorTextureId,
    mirror_framebuffer: FramebufferId,
}

/// Per-frame pipeline state: pose history, experiment controls, layer and GPU handles.
pub struct FrameCompositor {
    setup: EyeRenderSetup,
    controls: Controls,
    history: PoseRingBuffer,
    layer: LayerEyeFov,
    resources: Option<GpuResources>,
    frame_index: u64,
}

impl FrameCompositor {
    pub fn new(setup: EyeRenderSetup, config: &LabConfig) -> Result<Self> {
        let history = PoseRingBuffer::with_capacity(config.ring_capacity)?;
        let controls = Controls::new(
            setup.base_view_scale(),
            LatencyController::new(config.initial_lag, config.initial_delay),
        );

        let mut layer = LayerEyeFov {
            flags: LayerFlags::TEXTURE_ORIGIN_AT_BOTTOM_LEFT,
            ..Default::default()
        };
        for eye in Eye::ALL {
            layer.fov[eye.index()] = setup.fov(eye);
            layer.viewport[eye.index()] = setup.layout().viewport(eye);
        }

        Ok(Self {
            setup,
            controls,
            history,
            layer,
            resources: None,
            frame_index: 0,
        })
    }

    /// Create the swap chain, framebuffers and mirror texture. Any failure here is fatal.
    pub fn init_gpu<D, G>(
        &mut self,
        session: &mut DeviceSession<D>,
        gpu: &mut G,
        swap_interval: i32,
    ) -> Result<()>
    where
        D: HmdDevice,
        G: GpuContext + ?Sized,
    {
        let layout = *self.setup.layout();
        let device = session.device_mut()?;

        gpu.set_swap_interval(swap_interval);

        let swap_chain = device
            .create_swap_chain(&SwapChainDesc::color(layout.size))
            .map_err(|e| RiftlagError::SwapChainCreation(e.to_string()))?;
        self.layer.color_texture = Some(swap_chain);

        let length = device
            .swap_chain_length(swap_chain)
            .map_err(|_| RiftlagError::SwapChainEmpty)?;
        if length == 0 {
            return Err(RiftlagError::SwapChainEmpty);
        }
        for index in 0..length {
            let texture = device.swap_chain_buffer(swap_chain, index)?;
            gpu.configure_swap_texture(texture);
        }

        let framebuffer = gpu.create_framebuffer();
        let depth_buffer = gpu.create_depth_buffer(framebuffer, layout.size);

        let mirror_texture = device
            .create_mirror_texture(&MirrorTextureDesc {
                width: layout.mirror_size.x,
                height: layout.mirror_size.y,
                format: TextureFormat::R8G8B8A8UnormSrgb,
            })
            .map_err(|e| RiftlagError::MirrorTextureCreation(e.to_string()))?;
        let mirror_framebuffer = gpu.create_framebuffer();

        log::info!(
            "Swap chain ready: {} textures of {}x{}, mirror {}x{}",
            length,
            layout.size.x,
            layout.size.y,
            layout.mirror_size.x,
            layout.mirror_size.y
        );

        self.resources = Some(GpuResources {
            swap_chain,
            framebuffer,
            depth_buffer,
            mirror_texture,
            mirror_framebuffer,
        });
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.resources.is_some()
    }

    pub fn setup(&self) -> &EyeRenderSetup {
        &self.setup
    }

    pub fn controls(&self) -> &Controls {
        &self.controls
    }

    pub fn controls_mut(&mut self) -> &mut Controls {
        &mut self.controls
    }

    pub fn history(&self) -> &PoseRingBuffer {
        &self.history
    }

    /// Layer as submitted by the last frame.
    pub fn layer(&self) -> &LayerEyeFov {
        &self.layer
    }

    /// Index the next frame will use for pose prediction and submission.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn depth_buffer(&self) -> Option<RenderbufferId> {
        self.resources.map(|r| r.depth_buffer)
    }

    /// Run one frame.
    ///
    /// Device failures after initialization are logged and cut the frame short; they are
    /// reported in the returned [`FrameReport`] rather than as an error. The frame index
    /// advances either way.
    pub fn draw_frame<D, G>(
        &mut self,
        session: &mut DeviceSession<D>,
        gpu: &mut G,
        input: &mut dyn InputHandler,
        avatar: &mut dyn AvatarUpdater,
        scene: &mut dyn SceneRenderer,
    ) -> Result<FrameReport>
    where
        D: HmdDevice,
        G: GpuContext + ?Sized,
    {
        let resources = self.resources.ok_or(RiftlagError::NotInitialized)?;
        let frame_index = self.frame_index;
        self.frame_index += 1;

        let hmd_to_eye = self.controls.view_scale().desc().hmd_to_eye_pose;
        let (mut eye_poses, sample_time) =
            match session.device_mut()?.eye_poses(frame_index, &hmd_to_eye) {
                Ok(sampled) => sampled,
                Err(e) => {
                    log::warn!("Frame {}: pose acquisition failed, skipping: {}", frame_index, e);
                    let mut report = FrameReport::new(frame_index, self.controls.latency());
                    report.fail(FrameStage::PoseAcquisition);
                    return Ok(report);
                }
            };
        self.layer.sensor_sample_time = sample_time;
        let true_poses: EyePoses = eye_poses;

        input.handle_input(&mut self.controls);
        if self.controls.take_recenter_request() {
            if let Err(e) = session.recenter() {
                log::warn!("Frame {}: recenter failed: {}", frame_index, e);
            }
        }

        let lag = self.controls.lag();
        log::trace!("Tracking lag: {} frames", lag);
        log::trace!("Rendering delay: {} frames", self.controls.delay());

        let mut report = FrameReport::new(frame_index, self.controls.latency());

        self.history.record(eye_poses);
        if let Some(delayed) = self.history.read_delayed(lag as usize) {
            eye_poses = *delayed;
            report.lagged_poses = lag > 0;
        }

        let render = self.controls.latency_mut().should_render();
        report.rendered = render;

        let device = session.device_mut()?;
        let texture = match device
            .swap_chain_current_index(resources.swap_chain)
            .and_then(|index| device.swap_chain_buffer(resources.swap_chain, index))
        {
            Ok(texture) => texture,
            Err(e) => {
                log::warn!("Frame {}: swap chain acquire failed, skipping: {}", frame_index, e);
                report.rendered = false;
                report.fail(FrameStage::SwapChainAcquire);
                return Ok(report);
            }
        };

        gpu.bind_draw_framebuffer(Some(resources.framebuffer));
        gpu.attach_draw_color(Some(texture));

        if render {
            gpu.clear();
            let mode = self.controls.render_mode();
            for eye in Eye::ALL {
                if !mode.draws(eye) {
                    continue;
                }

                gpu.set_viewport(self.setup.layout().viewport(eye));

                let source = mode.source_eye(eye);
                // Submission always carries the tracked pose, never the lagged one.
                self.layer.render_pose[source.index()] = true_poses[source.index()];

                let pose = eye_poses[source.index()];
                let projection = self.setup.projection(source);
                let view = Mat4::look_at_rh(pose.position, pose.position + pose.forward(), pose.up());
                avatar.update_avatar(projection, &view, pose.position);
                scene.render_scene_for_eye(projection, &pose.to_mat4(), source);

                report.drawn.push(DrawnEye {
                    viewport: eye,
                    source,
                });
            }
        }

        gpu.attach_draw_color(None);
        gpu.bind_draw_framebuffer(None);

        let view_scale = *self.controls.view_scale().desc();
        let submitted = device
            .commit_swap_chain(resources.swap_chain)
            .and_then(|_| device.submit_frame(frame_index, &view_scale, &self.layer));
        match submitted {
            Ok(()) => report.submitted = true,
            Err(e) => {
                log::warn!("Frame {}: submit failed: {}", frame_index, e);
                report.fail(FrameStage::Submit);
            }
        }

        match device.mirror_texture_buffer(resources.mirror_texture) {
            Ok(mirror) => {
                // The mirror texture has its origin at the top left.
                let src = BlitRegion::covering(self.setup.layout().mirror_size);
                gpu.blit_mirror(resources.mirror_framebuffer, mirror, src, src.flipped_y());
            }
            Err(e) => {
                log::warn!("Frame {}: mirror texture unavailable: {}", frame_index, e);
                report.fail(FrameStage::Mirror);
            }
        }

        Ok(report)
    }
}
