use crate::ipd::ViewScaleDesc;
use crate::types::{
    Eye, EyePoses, EyeRenderDesc, FovPort, GraphicsLuid, HmdDesc, LayerEyeFov, MirrorTextureDesc,
    MirrorTextureId, SwapChainDesc, SwapChainId, TextureId,
};
use crate::{Result, RiftlagError};
use glam::UVec2;
use std::sync::atomic::{AtomicBool, Ordering};

/// Set while a [`DeviceSession`] holds the HMD connection.
static SESSION_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Holds the session slot while connecting; releases it on drop unless disarmed.
struct SessionClaim {
    armed: bool,
}

impl Drop for SessionClaim {
    fn drop(&mut self) {
        if self.armed {
            SESSION_ACTIVE.store(false, Ordering::Release);
        }
    }
}

/// Tracking/compositor device consumed by the session.
///
/// Calls may block inside the driver until the compositor is ready; no timeout is
/// exposed at this level.
pub trait HmdDevice {
    fn hmd_desc(&self) -> HmdDesc;

    fn graphics_luid(&self) -> GraphicsLuid;

    fn render_desc(&self, eye: Eye, fov: FovPort) -> EyeRenderDesc;

    /// Recommended texture size for rendering `eye` with `fov`.
    fn fov_texture_size(&self, eye: Eye, fov: FovPort, pixels_per_display_pixel: f32) -> UVec2;

    /// Eye poses predicted for `frame_index`, offset by `hmd_to_eye`, plus the sensor
    /// sample time they were derived from.
    fn eye_poses(&mut self, frame_index: u64, hmd_to_eye: &EyePoses) -> Result<(EyePoses, f64)>;

    fn create_swap_chain(&mut self, desc: &SwapChainDesc) -> Result<SwapChainId>;

    fn swap_chain_length(&self, chain: SwapChainId) -> Result<usize>;

    fn swap_chain_current_index(&self, chain: SwapChainId) -> Result<usize>;

    fn swap_chain_buffer(&self, chain: SwapChainId, index: usize) -> Result<TextureId>;

    fn commit_swap_chain(&mut self, chain: SwapChainId) -> Result<()>;

    fn submit_frame(
        &mut self,
        frame_index: u64,
        view_scale: &ViewScaleDesc,
        layer: &LayerEyeFov,
    ) -> Result<()>;

    fn create_mirror_texture(&mut self, desc: &MirrorTextureDesc) -> Result<MirrorTextureId>;

    fn mirror_texture_buffer(&self, mirror: MirrorTextureId) -> Result<TextureId>;

    fn recenter_tracking_origin(&mut self) -> Result<()>;

    /// Release the connection. Called exactly once by the owning session.
    fn destroy(&mut self);
}

/// What the session reports about one eye before any rendering setup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeDescriptor {
    pub render_desc: EyeRenderDesc,
    pub recommended_texture_size: UVec2,
}

/// Owner of the single HMD connection of the process.
pub struct DeviceSession<D: HmdDevice> {
    device: Option<D>,
    hmd_desc: HmdDesc,
    luid: GraphicsLuid,
}

impl<D: HmdDevice> DeviceSession<D> {
    /// Connect to the device.
    ///
    /// Fails with [`RiftlagError::SessionAlreadyActive`] if another session is live, or with
    /// whatever `connect` reports (normally [`RiftlagError::DeviceNotFound`]).
    pub fn create<F>(connect: F) -> Result<Self>
    where
        F: FnOnce() -> Result<D>,
    {
        if SESSION_ACTIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(RiftlagError::SessionAlreadyActive);
        }

        let mut claim = SessionClaim { armed: true };
        let device = connect()?;
        claim.armed = false;

        let hmd_desc = device.hmd_desc();
        let luid = device.graphics_luid();

        log::info!(
            "Opened HMD session: product={} resolution={}x{} refresh={}Hz caps={:?} tracking={:?}",
            hmd_desc.product_name,
            hmd_desc.resolution.x,
            hmd_desc.resolution.y,
            hmd_desc.display_refresh_rate,
            hmd_desc.available_hmd_caps,
            hmd_desc.available_tracking_caps
        );

        Ok(DeviceSession {
            device: Some(device),
            hmd_desc,
            luid,
        })
    }

    pub fn hmd_desc(&self) -> &HmdDesc {
        &self.hmd_desc
    }

    pub fn graphics_luid(&self) -> GraphicsLuid {
        self.luid
    }

    pub fn is_active(&self) -> bool {
        self.device.is_some()
    }

    pub fn device(&self) -> Result<&D> {
        self.device.as_ref().ok_or(RiftlagError::SessionDestroyed)
    }

    pub fn device_mut(&mut self) -> Result<&mut D> {
        self.device.as_mut().ok_or(RiftlagError::SessionDestroyed)
    }

    /// Render description and recommended texture size for `eye` at its default FOV.
    pub fn eye_descriptor(&self, eye: Eye, pixels_per_display_pixel: f32) -> Result<EyeDescriptor> {
        let device = self.device()?;
        let render_desc = device.render_desc(eye, self.hmd_desc.default_eye_fov[eye.index()]);
        let recommended_texture_size =
            device.fov_texture_size(eye, render_desc.fov, pixels_per_display_pixel);
        Ok(EyeDescriptor {
            render_desc,
            recommended_texture_size,
        })
    }

    /// Reset the tracking origin to the current head pose.
    pub fn recenter(&mut self) -> Result<()> {
        log::info!("Recentering tracking origin");
        self.device_mut()?.recenter_tracking_origin()
    }

    /// Release the connection. Safe to call more than once.
    pub fn destroy(&mut self) {
        if let Some(mut device) = self.device.take() {
            device.destroy();
            SESSION_ACTIVE.store(false, Ordering::Release);
            log::info!("Closed HMD session");
        }
    }
}

impl<D: HmdDevice> Drop for DeviceSession<D> {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{session_lock, MockHmd};
    use std::panic;

    #[test]
    fn test_create_and_destroy() {
        let _guard = session_lock();
        let mut session = DeviceSession::create(|| Ok(MockHmd::new())).unwrap();
        assert!(session.is_active());
        assert_eq!(session.hmd_desc().product_name, "Mock HMD");

        session.destroy();
        assert!(!session.is_active());
        assert!(matches!(session.device(), Err(RiftlagError::SessionDestroyed)));

        // second destroy is a no-op
        session.destroy();
    }

    #[test]
    fn test_only_one_live_session() {
        let _guard = session_lock();
        let first = DeviceSession::create(|| Ok(MockHmd::new())).unwrap();
        let second = DeviceSession::create(|| Ok(MockHmd::new()));
        assert!(matches!(second, Err(RiftlagError::SessionAlreadyActive)));

        drop(first);
        let third = DeviceSession::create(|| Ok(MockHmd::new()));
        assert!(third.is_ok());
    }

    #[test]
    fn test_connect_failure_releases_slot() {
        let _guard = session_lock();
        let failed = DeviceSession::<MockHmd>::create(|| Err(RiftlagError::DeviceNotFound));
        assert!(matches!(failed, Err(RiftlagError::DeviceNotFound)));

        assert!(DeviceSession::create(|| Ok(MockHmd::new())).is_ok());
    }

    #[test]
    fn test_connect_panic_releases_slot() {
        let _guard = session_lock();
        let result = panic::catch_unwind(|| {
            DeviceSession::<MockHmd>::create(|| panic!("driver crashed"))
        });
        assert!(result.is_err());

        assert!(DeviceSession::create(|| Ok(MockHmd::new())).is_ok());
    }

    #[test]
    fn test_destroy_reaches_device_once() {
        let _guard = session_lock();
        let hmd = MockHmd::new();
        let calls = hmd.destroy_counter();
        let mut session = DeviceSession::create(|| Ok(hmd)).unwrap();
        session.destroy();
        session.destroy();
        drop(session);
        assert_eq!(calls.get(), 1);

        let hmd = MockHmd::new();
        let calls = hmd.destroy_counter();
        let session = DeviceSession::create(|| Ok(hmd)).unwrap();
        assert_eq!(calls.get(), 0);
        drop(session);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_eye_descriptor_uses_default_fov() {
        let _guard = session_lock();
        let session = DeviceSession::create(|| Ok(MockHmd::new())).unwrap();
        let left = session.eye_descriptor(Eye::Left, 1.0).unwrap();
        assert_eq!(left.render_desc.eye, Eye::Left);
        assert_eq!(left.render_desc.fov, session.hmd_desc().default_eye_fov[0]);
        assert_eq!(left.recommended_texture_size, MockHmd::EYE_TEXTURE_SIZE);
    }

    #[test]
    fn test_recenter_reaches_device() {
        let _guard = session_lock();
        let mut session = DeviceSession::create(|| Ok(MockHmd::new())).unwrap();
        session.recenter().unwrap();
        session.recenter().unwrap();
        assert_eq!(session.device().unwrap().recenter_count(), 2);
    }
}
