use crate::ipd::{ViewScale, ViewScaleDesc};
use crate::latency::LatencyController;
use crate::render_mode::EyeRenderMode;
use crate::{Result, RiftlagError};
use crossbeam_channel::{Receiver, Sender, TrySendError};

/// Runtime adjustment requested by the input layer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    IncreaseIpd,
    DecreaseIpd,
    ResetIpd,
    IncreaseLag,
    DecreaseLag,
    ResetLag,
    IncreaseDelay,
    DecreaseDelay,
    CycleEyeRenderMode,
    Recenter,
}

impl TryFrom<i32> for Command {
    type Error = RiftlagError;

    /// Discriminants follow declaration order, starting at 0.
    fn try_from(value: i32) -> Result<Self> {
        let command = match value {
            0 => Command::IncreaseIpd,
            1 => Command::DecreaseIpd,
            2 => Command::ResetIpd,
            3 => Command::IncreaseLag,
            4 => Command::DecreaseLag,
            5 => Command::ResetLag,
            6 => Command::IncreaseDelay,
            7 => Command::DecreaseDelay,
            8 => Command::CycleEyeRenderMode,
            9 => Command::Recenter,
            _ => return Err(RiftlagError::InvalidEnumValue { kind: "command", value }),
        };
        Ok(command)
    }
}

impl Command {
    /// Default key binding. Keys are matched case-insensitively.
    pub fn for_key(key: char) -> Option<Command> {
        match key.to_ascii_lowercase() {
            'r' => Some(Command::Recenter),
            ']' => Some(Command::IncreaseIpd),
            '[' => Some(Command::DecreaseIpd),
            '\\' => Some(Command::ResetIpd),
            '.' => Some(Command::IncreaseLag),
            ',' => Some(Command::DecreaseLag),
            '/' => Some(Command::ResetLag),
            '=' => Some(Command::IncreaseDelay),
            '-' => Some(Command::DecreaseDelay),
            'e' => Some(Command::CycleEyeRenderMode),
            _ => None,
        }
    }
}

/// Mutable experiment state touched by input handling between frames.
#[derive(Debug, Clone)]
pub struct Controls {
    view_scale: ViewScale,
    latency: LatencyController,
    mode: EyeRenderMode,
    recenter_requested: bool,
}

impl Controls {
    pub fn new(base_view_scale: ViewScaleDesc, latency: LatencyController) -> Self {
        Self {
            view_scale: ViewScale::new(base_view_scale),
            latency,
            mode: EyeRenderMode::default(),
            recenter_requested: false,
        }
    }

    pub fn apply(&mut self, command: Command) {
        match command {
            Command::IncreaseIpd => self.increase_ipd(),
            Command::DecreaseIpd => self.decrease_ipd(),
            Command::ResetIpd => self.reset_ipd(),
            Command::IncreaseLag => self.increase_lag(),
            Command::DecreaseLag => self.decrease_lag(),
            Command::ResetLag => self.reset_lag(),
            Command::IncreaseDelay => self.increase_delay(),
            Command::DecreaseDelay => self.decrease_delay(),
            Command::CycleEyeRenderMode => self.cycle_render_mode(),
            Command::Recenter => self.request_recenter(),
        }
    }

    pub fn increase_ipd(&mut self) {
        self.view_scale.increase();
    }

    pub fn decrease_ipd(&mut self) {
        self.view_scale.decrease();
    }

    pub fn reset_ipd(&mut self) {
        self.view_scale.reset();
    }

    pub fn increase_lag(&mut self) {
        self.latency.increase_lag();
    }

    pub fn decrease_lag(&mut self) {
        self.latency.decrease_lag();
    }

    pub fn reset_lag(&mut self) {
        self.latency.reset_lag();
    }

    pub fn lag(&self) -> u32 {
        self.latency.lag()
    }

    pub fn increase_delay(&mut self) {
        self.latency.increase_delay();
    }

    pub fn decrease_delay(&mut self) {
        self.latency.decrease_delay();
    }

    pub fn delay(&self) -> u32 {
        self.latency.delay()
    }

    pub fn cycle_render_mode(&mut self) {
        self.mode = self.mode.next();
        log::debug!("Eye render mode: {:?}", self.mode);
    }

    pub fn render_mode(&self) -> EyeRenderMode {
        self.mode
    }

    pub fn request_recenter(&mut self) {
        self.recenter_requested = true;
    }

    /// Returns whether a recenter was requested since the last call.
    pub fn take_recenter_request(&mut self) -> bool {
        std::mem::take(&mut self.recenter_requested)
    }

    pub fn view_scale(&self) -> &ViewScale {
        &self.view_scale
    }

    pub fn latency(&self) -> &LatencyController {
        &self.latency
    }

    pub fn latency_mut(&mut self) -> &mut LatencyController {
        &mut self.latency
    }
}

/// Create the hand-off queue between an input thread and the render thread.
///
/// The sender is not `Clone`: the queue has exactly one writer and one reader.
pub fn command_queue(capacity: usize) -> (CommandSender, CommandQueue) {
    let (sender, receiver) = crossbeam_channel::bounded(capacity);
    (CommandSender { sender }, CommandQueue { receiver })
}

/// Writing end, owned by the input thread.
pub struct CommandSender {
    sender: Sender<Command>,
}

impl CommandSender {
    /// Queue a command without blocking. A full queue drops the command.
    pub fn send(&self, command: Command) -> Result<()> {
        match self.sender.try_send(command) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(command)) => {
                log::warn!("Command queue full, dropping {:?}", command);
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(RiftlagError::CommandQueueDisconnected),
        }
    }
}

/// Reading end, drained by the render thread at the start of each frame.
pub struct CommandQueue {
    receiver: Receiver<Command>,
}

impl CommandQueue {
    /// Apply every pending command in arrival order. Returns how many were applied.
    pub fn drain_into(&self, controls: &mut Controls) -> usize {
        let mut applied = 0;
        for command in self.receiver.try_iter() {
            controls.apply(command);
            applied += 1;
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Eye;

    fn controls() -> Controls {
        Controls::new(ViewScaleDesc::default(), LatencyController::default())
    }

    #[test]
    fn test_apply_commands() {
        let mut c = controls();
        c.apply(Command::IncreaseLag);
        c.apply(Command::IncreaseLag);
        c.apply(Command::DecreaseLag);
        c.apply(Command::IncreaseDelay);
        c.apply(Command::CycleEyeRenderMode);
        c.apply(Command::IncreaseIpd);

        assert_eq!(c.lag(), 1);
        assert_eq!(c.delay(), 1);
        assert_eq!(c.render_mode(), EyeRenderMode::Mono);
        assert!((c.view_scale().eye_offset(Eye::Right) - 0.005).abs() < 1e-6);

        c.apply(Command::ResetLag);
        c.apply(Command::ResetIpd);
        assert_eq!(c.lag(), 0);
        assert_eq!(c.view_scale().eye_offset(Eye::Right), 0.0);
    }

    #[test]
    fn test_recenter_request_is_taken_once() {
        let mut c = controls();
        assert!(!c.take_recenter_request());
        c.apply(Command::Recenter);
        assert!(c.take_recenter_request());
        assert!(!c.take_recenter_request());
    }

    #[test]
    fn test_key_bindings() {
        assert_eq!(Command::for_key('R'), Some(Command::Recenter));
        assert_eq!(Command::for_key('r'), Some(Command::Recenter));
        assert_eq!(Command::for_key('e'), Some(Command::CycleEyeRenderMode));
        assert_eq!(Command::for_key('q'), None);
    }

    #[test]
    fn test_command_from_raw_matches_discriminant() {
        for raw in 0..10 {
            let command = Command::try_from(raw).unwrap();
            assert_eq!(command as i32, raw);
        }
        assert!(matches!(
            Command::try_from(10),
            Err(RiftlagError::InvalidEnumValue { kind: "command", value: 10 })
        ));
    }

    #[test]
    fn test_queue_preserves_order_across_threads() {
        let (sender, queue) = command_queue(16);
        let handle = std::thread::spawn(move || {
            for _ in 0..3 {
                sender.send(Command::IncreaseDelay).unwrap();
            }
            sender.send(Command::DecreaseDelay).unwrap();
        });
        handle.join().unwrap();

        let mut c = controls();
        assert_eq!(queue.drain_into(&mut c), 4);
        assert_eq!(c.delay(), 2);
        assert_eq!(queue.drain_into(&mut c), 0);
    }

    #[test]
    fn test_full_queue_drops_command() {
        let (sender, queue) = command_queue(1);
        sender.send(Command::IncreaseLag).unwrap();
        sender.send(Command::IncreaseLag).unwrap();

        let mut c = controls();
        assert_eq!(queue.drain_into(&mut c), 1);
        assert_eq!(c.lag(), 1);
    }

    #[test]
    fn test_disconnected_queue() {
        let (sender, queue) = command_queue(4);
        drop(queue);
        assert!(matches!(
            sender.send(Command::Recenter),
            Err(RiftlagError::CommandQueueDisconnected)
        ));
    }
}
