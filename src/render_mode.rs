use crate::types::Eye;

/// Diagnostic selector for which eye(s) get drawn and with whose data.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EyeRenderMode {
    #[default]
    Both = 0,
    /// Right viewport shows the left eye.
    Mono = 1,
    Right = 2,
    Left = 3,
    /// Each viewport shows the other eye.
    Switched = 4,
}

impl EyeRenderMode {
    pub const ALL: [EyeRenderMode; 5] = [
        EyeRenderMode::Both,
        EyeRenderMode::Mono,
        EyeRenderMode::Right,
        EyeRenderMode::Left,
        EyeRenderMode::Switched,
    ];

    /// Successor in the fixed cycle Both → Mono → Right → Left → Switched → Both.
    pub fn next(self) -> Self {
        match self {
            EyeRenderMode::Both => EyeRenderMode::Mono,
            EyeRenderMode::Mono => EyeRenderMode::Right,
            EyeRenderMode::Right => EyeRenderMode::Left,
            EyeRenderMode::Left => EyeRenderMode::Switched,
            EyeRenderMode::Switched => EyeRenderMode::Both,
        }
    }

    /// Whether the viewport of `eye` is drawn at all.
    pub fn draws(self, eye: Eye) -> bool {
        !matches!(
            (self, eye),
            (EyeRenderMode::Right, Eye::Left) | (EyeRenderMode::Left, Eye::Right)
        )
    }

    /// Eye whose projection, pose and identity are used to draw the viewport of `eye`.
    pub fn source_eye(self, eye: Eye) -> Eye {
        match (self, eye) {
            (EyeRenderMode::Switched, eye) => eye.other(),
            (EyeRenderMode::Mono, Eye::Right) => Eye::Left,
            (_, eye) => eye,
        }
    }
}
