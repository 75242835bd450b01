//! Catmull-Rom evaluation over a camera keyframe path.
//!
//! Keyframes are stored in insertion order, which is also temporal order.
//! Segment `i` runs from keyframe `i` to `i + 1`; the outer control points are
//! clamped to the first and last keyframes at either end of the path.

use glam::DVec3;

use crate::camera::CameraState;

/// Accumulation frame stamped onto keyframes when they are recorded. Video
/// frames inherit it from the segment's starting keyframe.
pub const KEYFRAME_ACCUMULATION: u32 = 10;

/// Interpolates between `p1` and `p2` at `t ∈ [0, 1)`.
///
/// Position, look, up, move speed and fov are blended independently. The
/// resulting `look`/`up` are not renormalised; callers must call
/// [`CameraState::orthonormalized`] before handing the camera to a kernel.
/// The accumulation frame is copied from `p1`.
pub fn catmull_rom(
    p0: &CameraState,
    p1: &CameraState,
    p2: &CameraState,
    p3: &CameraState,
    t: f64,
) -> CameraState {
    CameraState {
        position: blend_vec(p0.position, p1.position, p2.position, p3.position, t),
        look: blend_vec(p0.look, p1.look, p2.look, p3.look, t),
        up: blend_vec(p0.up, p1.up, p2.up, p3.up, t),
        move_speed: blend(p0.move_speed, p1.move_speed, p2.move_speed, p3.move_speed, t),
        frame: p1.frame,
        fov: blend(p0.fov, p1.fov, p2.fov, p3.fov, t),
    }
}

fn blend(p0: f64, p1: f64, p2: f64, p3: f64, t: f64) -> f64 {
    let t2 = t * t;
    let t3 = t2 * t;
    0.5 * ((2.0 * p1)
        + (-p0 + p2) * t
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
        + (-p0 + 3.0 * p1 - 3.0 * p2 + p3) * t3)
}

fn blend_vec(p0: DVec3, p1: DVec3, p2: DVec3, p3: DVec3, t: f64) -> DVec3 {
    let t2 = t * t;
    let t3 = t2 * t;
    0.5 * ((2.0 * p1)
        + (-p0 + p2) * t
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
        + (-p0 + 3.0 * p1 - 3.0 * p2 + p3) * t3)
}

/// Control points for segment `index`, with both ends clamped.
///
/// Returns `None` when the path has fewer than two keyframes or `index` is past
/// the last segment.
pub fn segment(
    keyframes: &[CameraState],
    index: usize,
) -> Option<(&CameraState, &CameraState, &CameraState, &CameraState)> {
    if keyframes.len() < 2 || index + 1 >= keyframes.len() {
        return None;
    }
    let last = keyframes.len() - 1;
    let p0 = &keyframes[index.saturating_sub(1)];
    let p1 = &keyframes[index];
    let p2 = &keyframes[index + 1];
    let p3 = &keyframes[(index + 2).min(last)];
    Some((p0, p1, p2, p3))
}

/// Total output frames for a path: `(keyframes - 1) * steps_per_point`.
pub fn path_frame_count(keyframes: usize, steps_per_point: u32) -> u32 {
    (keyframes.saturating_sub(1) as u32).saturating_mul(steps_per_point)
}

/// Camera for output frame `frame` of the path, already renormalised.
///
/// Returns `None` once `frame` runs past the final segment.
pub fn sample_path(
    keyframes: &[CameraState],
    frame: u32,
    steps_per_point: u32,
) -> Option<CameraState> {
    let steps = steps_per_point.max(1);
    let index = (frame / steps) as usize;
    let (p0, p1, p2, p3) = segment(keyframes, index)?;
    let t = f64::from(frame % steps) / f64::from(steps);
    Some(catmull_rom(p0, p1, p2, p3, t).orthonormalized())
}

/// Ordered keyframe list mutated only through explicit add/clear.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyframeTrack {
    frames: Vec<CameraState>,
}

impl KeyframeTrack {
    pub fn new(frames: Vec<CameraState>) -> Self {
        Self { frames }
    }

    /// Records `camera`, stamping the video accumulation target onto it.
    pub fn add(&mut self, camera: CameraState) {
        self.frames.push(CameraState {
            frame: KEYFRAME_ACCUMULATION,
            ..camera
        });
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[CameraState] {
        &self.frames
    }

    /// Copy of the path for a job that must not observe later edits.
    pub fn snapshot(&self) -> Vec<CameraState> {
        self.frames.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyframe(x: f64, look: DVec3, speed: f64, frame: u32) -> CameraState {
        CameraState::new(DVec3::new(x, 0.0, 0.0), look, DVec3::Y, speed, frame, 1.0)
    }

    fn path() -> Vec<CameraState> {
        vec![
            keyframe(0.0, DVec3::Z, 1.0, 3),
            keyframe(1.0, DVec3::X, 2.0, 5),
            keyframe(4.0, DVec3::NEG_Z, 3.0, 7),
            keyframe(9.0, DVec3::NEG_X, 4.0, 9),
        ]
    }

    #[test]
    fn start_of_segment_matches_p1() {
        let frames = path();
        let (p0, p1, p2, p3) = segment(&frames, 1).unwrap();
        let camera = catmull_rom(p0, p1, p2, p3, 0.0);
        assert!((camera.position - p1.position).length() < 1e-12);
        assert!((camera.look - p1.look).length() < 1e-12);
        assert!((camera.move_speed - p1.move_speed).abs() < 1e-12);
        assert_eq!(camera.frame, p1.frame);
    }

    #[test]
    fn end_of_segment_approaches_p2() {
        let frames = path();
        let (p0, p1, p2, p3) = segment(&frames, 1).unwrap();
        let camera = catmull_rom(p0, p1, p2, p3, 0.999_999);
        assert!((camera.position - p2.position).length() < 1e-4);
        assert!((camera.fov - p2.fov).abs() < 1e-4);
        assert_eq!(camera.frame, p1.frame, "frame is inherited, not blended");
    }

    #[test]
    fn first_and_last_segments_clamp_outer_points() {
        let frames = path();
        let (p0, p1, _, _) = segment(&frames, 0).unwrap();
        assert_eq!(p0, p1);
        let (_, _, p2, p3) = segment(&frames, 2).unwrap();
        assert_eq!(p2, &frames[3]);
        assert_eq!(p3, &frames[3]);
        assert!(segment(&frames, 3).is_none());
    }

    #[test]
    fn blended_orientation_is_not_renormalised() {
        let frames = path();
        let (p0, p1, p2, p3) = segment(&frames, 0).unwrap();
        let raw = catmull_rom(p0, p1, p2, p3, 0.5);
        assert!(raw.look.length() < 0.99);
        let fixed = raw.orthonormalized();
        assert!((fixed.look.length() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn sample_path_covers_every_output_frame() {
        let frames = path();
        let total = path_frame_count(frames.len(), 60);
        assert_eq!(total, 180);
        for frame in 0..total {
            assert!(sample_path(&frames, frame, 60).is_some());
        }
        assert!(sample_path(&frames, total, 60).is_none());
        assert!(sample_path(&frames[..1], 0, 60).is_none());
    }

    #[test]
    fn adding_a_keyframe_stamps_the_video_quality() {
        let mut track = KeyframeTrack::default();
        track.add(CameraState::default());
        assert_eq!(track.frames()[0].frame, KEYFRAME_ACCUMULATION);
        track.clear();
        assert!(track.is_empty());
    }
}
