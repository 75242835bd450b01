use glam::{DQuat, DVec3};

/// Radians per second applied by roll/yaw/pitch motions.
const TURN_SPEED: f64 = 1.0;

/// Longest tick a single motion step may cover. Keeps speed and fov scaling
/// factors positive when a tick stalls, e.g. while a video frame renders.
const MAX_STEP_SECONDS: f64 = 0.5;

/// Camera snapshot handed to the compute kernel.
///
/// `look` and `up` are kept unit length and orthogonal by every constructor and
/// by [`CameraState::apply_motions`]. Export jobs copy this struct by value, so
/// later interactive mutation never leaks into a running capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub position: DVec3,
    pub look: DVec3,
    pub up: DVec3,
    pub move_speed: f64,
    /// Accumulation frame: progressive sample count, reset on any movement.
    pub frame: u32,
    pub fov: f64,
}

impl Default for CameraState {
    fn default() -> Self {
        Self::new(
            DVec3::new(10.0, 0.0, 0.0),
            DVec3::new(-1.0, 0.0, 0.0),
            DVec3::Y,
            1.0,
            0,
            1.0,
        )
    }
}

/// One held-key camera motion, applied scaled by the tick's delta time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraMotion {
    Forward,
    Backward,
    StrafeLeft,
    StrafeRight,
    Rise,
    Sink,
    RollLeft,
    RollRight,
    YawLeft,
    YawRight,
    PitchUp,
    PitchDown,
    SpeedUp,
    SlowDown,
    WidenFov,
    NarrowFov,
}

impl CameraState {
    /// Builds a camera, normalising `look` and projecting `up` orthogonal to it.
    pub fn new(
        position: DVec3,
        look: DVec3,
        up: DVec3,
        move_speed: f64,
        frame: u32,
        fov: f64,
    ) -> Self {
        let look = look.normalize();
        let up = look.cross(up.normalize()).cross(look).normalize();
        Self {
            position,
            look,
            up,
            move_speed,
            frame,
            fov,
        }
    }

    /// Re-orthonormalises `look`/`up` as `up = normalize(look × up × look)`.
    pub fn orthonormalize(&mut self) {
        self.up = self.look.cross(self.up).cross(self.look);
        self.look = self.look.normalize();
        self.up = self.up.normalize();
    }

    pub fn orthonormalized(mut self) -> Self {
        self.orthonormalize();
        self
    }

    /// Unit vector pointing to the camera's left (`up × look`).
    pub fn left(&self) -> DVec3 {
        self.up.cross(self.look)
    }

    pub fn reset_accumulation(&mut self) {
        self.frame = 0;
    }

    /// Applies every held motion for this tick.
    ///
    /// Returns `true` when anything moved, in which case the accumulation frame
    /// has been reset to 0. The basis is re-orthonormalised either way.
    pub fn apply_motions<I>(&mut self, motions: I, dt: f64) -> bool
    where
        I: IntoIterator<Item = CameraMotion>,
    {
        let dt = dt.clamp(0.0, MAX_STEP_SECONDS);
        let mut moved = false;
        for motion in motions {
            self.apply_motion(motion, dt);
            moved = true;
        }
        if moved {
            self.reset_accumulation();
        }
        self.orthonormalize();
        moved
    }

    fn apply_motion(&mut self, motion: CameraMotion, dt: f64) {
        let step = dt * self.move_speed;
        let turn = TURN_SPEED * dt;
        match motion {
            CameraMotion::Forward => self.position += self.look * step,
            CameraMotion::Backward => self.position -= self.look * step,
            CameraMotion::StrafeLeft => self.position += self.left() * step,
            CameraMotion::StrafeRight => self.position -= self.left() * step,
            CameraMotion::Rise => self.position += self.up * step,
            CameraMotion::Sink => self.position -= self.up * step,
            CameraMotion::RollLeft => self.up = rotate(self.up, self.look, turn),
            CameraMotion::RollRight => self.up = rotate(self.up, self.look, -turn),
            CameraMotion::YawLeft => self.look = rotate(self.look, self.up, turn * self.fov),
            CameraMotion::YawRight => self.look = rotate(self.look, self.up, -turn * self.fov),
            CameraMotion::PitchUp => self.look = rotate(self.look, self.left(), turn * self.fov),
            CameraMotion::PitchDown => {
                self.look = rotate(self.look, self.left(), -turn * self.fov)
            }
            CameraMotion::SpeedUp => self.move_speed *= 1.0 + dt,
            CameraMotion::SlowDown => self.move_speed *= 1.0 - dt,
            CameraMotion::WidenFov => self.fov *= 1.0 + dt,
            CameraMotion::NarrowFov => self.fov *= 1.0 - dt,
        }
    }

    /// `[x, y, z, 0]` padded vector as the kernel expects it.
    pub(crate) fn padded(vector: DVec3) -> [f32; 4] {
        [vector.x as f32, vector.y as f32, vector.z as f32, 0.0]
    }
}

fn rotate(vector: DVec3, axis: DVec3, angle: f64) -> DVec3 {
    let axis = axis.normalize_or_zero();
    if axis == DVec3::ZERO {
        return vector;
    }
    DQuat::from_axis_angle(axis, angle) * vector
}
