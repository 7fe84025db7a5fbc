//! Application composition: one HMD session, one mirror window, one frame compositor.

use crate::compositor::{
    AvatarUpdater, FrameCompositor, FrameReport, GpuContext, InputHandler, NoAvatar, NoInput,
    SceneRenderer,
};
use crate::config::LabConfig;
use crate::descriptor::EyeRenderSetup;
use crate::device::{DeviceSession, HmdDevice};
use crate::input::{command_queue, CommandQueue, CommandSender, Controls};
use crate::Result;
use glam::UVec2;

/// Desktop window that shows the mirror texture.
pub trait WindowContext {
    /// Open the window at `size`. The GL context must be current afterwards.
    fn create_mirror_window(&mut self, size: UVec2) -> Result<()>;

    fn swap_buffers(&mut self);

    fn should_close(&self) -> bool;
}

/// HMD lab application.
///
/// Fields drop in declaration order: GPU-side state first, the device session last.
pub struct RiftApp<D: HmdDevice, W: GpuContext + WindowContext> {
    compositor: FrameCompositor,
    commands: CommandQueue,
    sender: Option<CommandSender>,
    input: Box<dyn InputHandler>,
    avatar: Box<dyn AvatarUpdater>,
    scene: Box<dyn SceneRenderer>,
    window: W,
    session: DeviceSession<D>,
}

impl<D: HmdDevice, W: GpuContext + WindowContext> RiftApp<D, W> {
    /// Connect the HMD, open the mirror window and create every GPU resource.
    ///
    /// Any failure is fatal and releases the session before returning.
    pub fn new<F>(
        connect: F,
        mut window: W,
        config: &LabConfig,
        scene: Box<dyn SceneRenderer>,
    ) -> Result<Self>
    where
        F: FnOnce() -> Result<D>,
    {
        let mut session = DeviceSession::create(connect)?;
        let setup = EyeRenderSetup::new(&session, config.pixels_per_display_pixel)?;

        window.create_mirror_window(setup.layout().mirror_size)?;

        let mut compositor = FrameCompositor::new(setup, config)?;
        compositor.init_gpu(&mut session, &mut window, config.swap_interval)?;

        let (sender, commands) = command_queue(config.command_queue_capacity);

        Ok(RiftApp {
            compositor,
            commands,
            sender: Some(sender),
            input: Box::new(NoInput),
            avatar: Box::new(NoAvatar),
            scene,
            window,
            session,
        })
    }

    pub fn with_input(mut self, input: Box<dyn InputHandler>) -> Self {
        self.input = input;
        self
    }

    pub fn with_avatar(mut self, avatar: Box<dyn AvatarUpdater>) -> Self {
        self.avatar = avatar;
        self
    }

    /// Writing end of the command queue. Returns `None` once taken.
    pub fn take_command_sender(&mut self) -> Option<CommandSender> {
        self.sender.take()
    }

    /// Apply queued commands, draw one frame and present the mirror window.
    pub fn run_frame(&mut self) -> Result<FrameReport> {
        let applied = self.commands.drain_into(self.compositor.controls_mut());
        if applied > 0 {
            log::debug!("Applied {} queued commands", applied);
        }

        let report = self.compositor.draw_frame(
            &mut self.session,
            &mut self.window,
            self.input.as_mut(),
            self.avatar.as_mut(),
            self.scene.as_mut(),
        )?;
        self.window.swap_buffers();
        Ok(report)
    }

    /// Draw frames until the window asks to close. Returns the number of frames drawn.
    pub fn run(&mut self) -> Result<u64> {
        let mut frames = 0;
        while !self.window.should_close() {
            self.run_frame()?;
            frames += 1;
        }
        log::info!("Window closed after {} frames", frames);
        Ok(frames)
    }

    pub fn compositor(&self) -> &FrameCompositor {
        &self.compositor
    }

    pub fn controls(&self) -> &Controls {
        self.compositor.controls()
    }

    pub fn controls_mut(&mut self) -> &mut Controls {
        self.compositor.controls_mut()
    }

    pub fn session(&self) -> &DeviceSession<D> {
        &self.session
    }

    pub fn window(&self) -> &W {
        &self.window
    }

    pub fn increase_ipd(&mut self) {
        self.controls_mut().increase_ipd();
    }

    pub fn decrease_ipd(&mut self) {
        self.controls_mut().decrease_ipd();
    }

    pub fn reset_ipd(&mut self) {
        self.controls_mut().reset_ipd();
    }

    pub fn increase_lag(&mut self) {
        self.controls_mut().increase_lag();
    }

    pub fn decrease_lag(&mut self) {
        self.controls_mut().decrease_lag();
    }

    pub fn reset_lag(&mut self) {
        self.controls_mut().reset_lag();
    }

    pub fn lag(&self) -> u32 {
        self.controls().lag()
    }

    pub fn increase_delay(&mut self) {
        self.controls_mut().increase_delay();
    }

    pub fn decrease_delay(&mut self) {
        self.controls_mut().decrease_delay();
    }

    pub fn cycle_eye_render_mode(&mut self) {
        self.controls_mut().cycle_render_mode();
    }

    /// Reset the tracking origin now rather than at the next frame.
    pub fn recenter(&mut self) -> Result<()> {
        self.session.recenter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Command;
    use crate::mock::{session_lock, GpuCall, MockHmd, RecordingGpu, RecordingScene};
    use crate::render_mode::EyeRenderMode;
    use crate::RiftlagError;

    fn app(gpu: RecordingGpu) -> RiftApp<MockHmd, RecordingGpu> {
        RiftApp::new(
            || Ok(MockHmd::new()),
            gpu,
            &LabConfig::default(),
            Box::new(RecordingScene::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_window_opened_at_mirror_size() {
        let _guard = session_lock();
        let app = app(RecordingGpu::new());
        let mirror = app.compositor().setup().layout().mirror_size;
        assert_eq!(app.window().calls()[0], GpuCall::CreateWindow(mirror));
        assert_eq!(
            app.session().device().unwrap().mirror_desc().unwrap().width,
            mirror.x
        );
        assert!(app.compositor().is_initialized());
    }

    #[test]
    fn test_run_until_window_closes() {
        let _guard = session_lock();
        let scene = RecordingScene::new();
        let mut app = RiftApp::new(
            || Ok(MockHmd::new()),
            RecordingGpu::new().close_after(3),
            &LabConfig::default(),
            Box::new(scene.clone()),
        )
        .unwrap();

        assert_eq!(app.run().unwrap(), 3);
        assert_eq!(app.session().device().unwrap().submitted().len(), 3);
        assert_eq!(scene.calls().len(), 6);
        let swaps = app
            .window()
            .calls()
            .iter()
            .filter(|c| **c == GpuCall::SwapBuffers)
            .count();
        assert_eq!(swaps, 3);
    }

    #[test]
    fn test_queued_commands_apply_at_frame_start() {
        let _guard = session_lock();
        let mut app = app(RecordingGpu::new());
        let sender = app.take_command_sender().unwrap();
        assert!(app.take_command_sender().is_none());

        sender.send(Command::IncreaseLag).unwrap();
        sender.send(Command::IncreaseLag).unwrap();
        sender.send(Command::CycleEyeRenderMode).unwrap();
        sender.send(Command::Recenter).unwrap();
        assert_eq!(app.lag(), 0);

        let report = app.run_frame().unwrap();
        assert_eq!(report.lag, 2);
        assert_eq!(app.controls().render_mode(), EyeRenderMode::Mono);
        assert_eq!(app.session().device().unwrap().recenter_count(), 1);
    }

    #[test]
    fn test_delegating_mutators() {
        let _guard = session_lock();
        let mut app = app(RecordingGpu::new());
        app.increase_lag();
        app.increase_lag();
        app.decrease_lag();
        assert_eq!(app.lag(), 1);
        app.reset_lag();
        assert_eq!(app.lag(), 0);

        app.increase_delay();
        app.increase_delay();
        app.decrease_delay();
        assert_eq!(app.controls().delay(), 1);

        app.increase_ipd();
        app.decrease_ipd();
        app.decrease_ipd();
        app.reset_ipd();
        let view_scale = app.controls().view_scale();
        assert_eq!(view_scale.desc(), view_scale.base());

        app.cycle_eye_render_mode();
        assert_eq!(app.controls().render_mode(), EyeRenderMode::Mono);

        app.recenter().unwrap();
        assert_eq!(app.session().device().unwrap().recenter_count(), 1);
    }

    #[test]
    fn test_init_failure_releases_session() {
        let _guard = session_lock();
        let result = RiftApp::new(
            || Ok(MockHmd::new().failing_mirror()),
            RecordingGpu::new(),
            &LabConfig::default(),
            Box::new(RecordingScene::new()),
        );
        assert!(matches!(result, Err(RiftlagError::MirrorTextureCreation(_))));

        // the failed app must not keep the device claimed
        let app = app(RecordingGpu::new());
        assert!(app.session().is_active());
    }

    #[test]
    fn test_drop_destroys_session() {
        let _guard = session_lock();
        drop(app(RecordingGpu::new()));
        assert!(DeviceSession::create(|| Ok(MockHmd::new())).is_ok());
    }
}
