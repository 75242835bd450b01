use std::collections::HashSet;

use winit::event::{ElementState, KeyEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

use crate::camera::CameraMotion;

/// Keys applied every tick for as long as they are held.
const MOTION_BINDINGS: &[(KeyCode, CameraMotion)] = &[
    (KeyCode::KeyW, CameraMotion::Forward),
    (KeyCode::KeyS, CameraMotion::Backward),
    (KeyCode::KeyA, CameraMotion::StrafeLeft),
    (KeyCode::KeyD, CameraMotion::StrafeRight),
    (KeyCode::ShiftLeft, CameraMotion::Rise),
    (KeyCode::Space, CameraMotion::Sink),
    (KeyCode::KeyQ, CameraMotion::RollLeft),
    (KeyCode::KeyE, CameraMotion::RollRight),
    (KeyCode::ArrowLeft, CameraMotion::YawLeft),
    (KeyCode::ArrowRight, CameraMotion::YawRight),
    (KeyCode::ArrowUp, CameraMotion::PitchUp),
    (KeyCode::ArrowDown, CameraMotion::PitchDown),
    (KeyCode::KeyR, CameraMotion::SpeedUp),
    (KeyCode::KeyF, CameraMotion::SlowDown),
    (KeyCode::KeyN, CameraMotion::WidenFov),
    (KeyCode::KeyM, CameraMotion::NarrowFov),
];

/// One-shot actions fired on key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    Screenshot,
    GifSweep,
    StartVideo,
    AddKeyframe,
    ClearKeyframes,
    SaveCamera,
    LoadCamera,
    Quit,
}

impl AppCommand {
    fn from_key(code: KeyCode) -> Option<Self> {
        let command = match code {
            KeyCode::KeyP => AppCommand::Screenshot,
            KeyCode::KeyG => AppCommand::GifSweep,
            KeyCode::KeyO => AppCommand::StartVideo,
            KeyCode::KeyJ => AppCommand::AddKeyframe,
            KeyCode::KeyH => AppCommand::ClearKeyframes,
            KeyCode::KeyL => AppCommand::SaveCamera,
            KeyCode::KeyK => AppCommand::LoadCamera,
            KeyCode::Escape => AppCommand::Quit,
            _ => return None,
        };
        Some(command)
    }
}

#[derive(Debug, Default)]
pub struct KeyboardState {
    held: HashSet<KeyCode>,
}

impl KeyboardState {
    pub fn handle_event(&mut self, event: &KeyEvent) -> Option<AppCommand> {
        let PhysicalKey::Code(code) = event.physical_key else {
            return None;
        };
        self.handle_key(code, event.state, event.repeat)
    }

    /// Tracks held keys and returns the command bound to a fresh press.
    pub fn handle_key(
        &mut self,
        code: KeyCode,
        state: ElementState,
        repeat: bool,
    ) -> Option<AppCommand> {
        match state {
            ElementState::Pressed => {
                let fresh = self.held.insert(code) && !repeat;
                if fresh {
                    AppCommand::from_key(code)
                } else {
                    None
                }
            }
            ElementState::Released => {
                self.held.remove(&code);
                None
            }
        }
    }

    /// Motions for every held key, in binding-table order.
    pub fn motions(&self) -> Vec<CameraMotion> {
        MOTION_BINDINGS
            .iter()
            .filter(|(code, _)| self.held.contains(code))
            .map(|(_, motion)| *motion)
            .collect()
    }

    /// Focus loss drops release events, so forget everything held.
    pub fn clear(&mut self) {
        self.held.clear();
    }
}
