//! TOML records for the saved camera and the keyframe path.

use std::fs;
use std::path::Path;

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::camera::CameraState;
use crate::error::RenderError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl From<DVec3> for VectorRecord {
    fn from(value: DVec3) -> Self {
        Self {
            x: value.x,
            y: value.y,
            z: value.z,
        }
    }
}

impl From<VectorRecord> for DVec3 {
    fn from(value: VectorRecord) -> Self {
        DVec3::new(value.x, value.y, value.z)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraRecord {
    pub position: VectorRecord,
    pub lookat: VectorRecord,
    pub up: VectorRecord,
    pub movespeed: f64,
    pub frame: u32,
    pub fov: f64,
}

impl From<&CameraState> for CameraRecord {
    fn from(camera: &CameraState) -> Self {
        Self {
            position: camera.position.into(),
            lookat: camera.look.into(),
            up: camera.up.into(),
            movespeed: camera.move_speed,
            frame: camera.frame,
            fov: camera.fov,
        }
    }
}

impl From<CameraRecord> for CameraState {
    fn from(record: CameraRecord) -> Self {
        CameraState::new(
            record.position.into(),
            record.lookat.into(),
            record.up.into(),
            record.movespeed,
            record.frame,
            record.fov,
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct KeyframeFile {
    #[serde(default)]
    keyframes: Vec<CameraRecord>,
}

/// Loads the saved camera; `Ok(None)` when nothing has been saved yet.
pub fn load_camera(path: &Path) -> Result<Option<CameraState>, RenderError> {
    let Some(contents) = read_if_exists(path)? else {
        return Ok(None);
    };
    let record: CameraRecord = toml::from_str(&contents).map_err(|err| persist_error(path, err))?;
    Ok(Some(record.into()))
}

pub fn save_camera(path: &Path, camera: &CameraState) -> Result<(), RenderError> {
    write_toml(path, &CameraRecord::from(camera))
}

/// Loads the keyframe path; a missing file is an empty path.
pub fn load_keyframes(path: &Path) -> Result<Vec<CameraState>, RenderError> {
    let Some(contents) = read_if_exists(path)? else {
        return Ok(Vec::new());
    };
    let file: KeyframeFile = toml::from_str(&contents).map_err(|err| persist_error(path, err))?;
    Ok(file.keyframes.into_iter().map(CameraState::from).collect())
}

pub fn save_keyframes(path: &Path, keyframes: &[CameraState]) -> Result<(), RenderError> {
    let file = KeyframeFile {
        keyframes: keyframes.iter().map(CameraRecord::from).collect(),
    };
    write_toml(path, &file)
}

fn read_if_exists(path: &Path) -> Result<Option<String>, RenderError> {
    if !path.exists() {
        return Ok(None);
    }
    fs::read_to_string(path)
        .map(Some)
        .map_err(|err| persist_error(path, err))
}

fn write_toml<T: Serialize>(path: &Path, value: &T) -> Result<(), RenderError> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|err| persist_error(dir, err))?;
    }
    let serialized = toml::to_string_pretty(value).map_err(|err| persist_error(path, err))?;
    fs::write(path, serialized).map_err(|err| persist_error(path, err))
}

fn persist_error(path: &Path, err: impl std::fmt::Display) -> RenderError {
    RenderError::Persist {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}
