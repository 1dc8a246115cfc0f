use serde::{Deserialize, Serialize};

use crate::camera::{OrbitConfig, OrbitState};
use crate::render::{AxesSpec, GridSpec};

/// Perspective parameters used when building [`crate::render::CameraParams`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    pub fov_degrees: f64,
    pub near: f64,
    pub far: f64,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 45.0,
            near: 1.0,
            far: 10_000.0,
        }
    }
}

/// Settings for one viewer session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub orbit: OrbitConfig,
    pub initial_camera: OrbitState,
    pub projection: ProjectionConfig,
    pub grid: GridSpec,
    pub axes: AxesSpec,
    pub export_file_name: String,
    pub viewport: (u32, u32),
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            orbit: OrbitConfig::default(),
            initial_camera: OrbitState::default(),
            projection: ProjectionConfig::default(),
            grid: GridSpec::default(),
            axes: AxesSpec::default(),
            export_file_name: "model.stl".to_string(),
            viewport: (1280, 720),
        }
    }
}
