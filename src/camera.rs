//! Orbit camera math.
//!
//! The camera is parameterized by azimuth, elevation and distance around a
//! look-at target. Elevation is kept away from the poles so the Z-up view
//! transform never degenerates, and distance is held inside a configured
//! range. Every operation is pure: it takes a state and returns a new one.

use std::f64::consts::{FRAC_PI_2, TAU};

const MIN_ELEVATION_MARGIN: f64 = 1e-6;

use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Spherical camera parameters around `target`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrbitState {
    pub azimuth: f64,
    pub elevation: f64,
    pub distance: f64,
    pub target: DVec3,
}

impl Default for OrbitState {
    fn default() -> Self {
        Self {
            azimuth: 0.0,
            elevation: 0.0,
            distance: 150.0,
            target: DVec3::ZERO,
        }
    }
}

/// Renderable eye placement derived from an [`OrbitState`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraView {
    pub eye: DVec3,
    pub target: DVec3,
}

/// Inclusive bounds for the orbit distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceRange {
    pub min: f64,
    pub max: f64,
}

impl DistanceRange {
    /// Inverted bounds are treated as swapped; a NaN bound is ignored.
    pub fn clamp(&self, distance: f64) -> f64 {
        let low = self.min.min(self.max);
        let high = self.max.max(self.min);
        distance.max(low).min(high)
    }
}

impl OrbitState {
    /// Orbits around the target. Elevation stays within `margin` of the poles.
    pub fn rotated(self, delta_x: f64, delta_y: f64, sensitivity: f64, margin: f64) -> Self {
        Self {
            azimuth: (self.azimuth + finite(delta_x) * finite(sensitivity)).rem_euclid(TAU),
            elevation: clamp_elevation(
                self.elevation + finite(delta_y) * finite(sensitivity),
                margin,
            ),
            ..self
        }
    }

    /// Slides the target across the view plane.
    ///
    /// A positive horizontal delta moves the target left on screen, a
    /// positive vertical delta moves it up.
    pub fn panned(self, delta_x: f64, delta_y: f64, pan_scale: f64) -> Self {
        let (right, up) = self.view_axes();
        let target =
            self.target - right * finite(delta_x) * pan_scale + up * finite(delta_y) * pan_scale;
        Self { target, ..self }
    }

    /// Scales the distance by `1 + wheel_delta * zoom_scale`, clamped to `range`.
    pub fn zoomed(self, wheel_delta: f64, zoom_scale: f64, range: &DistanceRange) -> Self {
        let factor = 1.0 + finite(wheel_delta) * zoom_scale;
        Self {
            distance: range.clamp(self.distance * factor),
            ..self
        }
    }

    pub fn resolve_view(&self) -> CameraView {
        let (sin_el, cos_el) = self.elevation.sin_cos();
        let (sin_az, cos_az) = self.azimuth.sin_cos();
        let offset = DVec3::new(cos_el * cos_az, cos_el * sin_az, sin_el) * self.distance;
        CameraView {
            eye: self.target + offset,
            target: self.target,
        }
    }

    /// Screen-aligned right and up axes of the current view.
    fn view_axes(&self) -> (DVec3, DVec3) {
        let view = self.resolve_view();
        let forward = (view.target - view.eye).normalize_or_zero();
        let right = forward.cross(DVec3::Z).normalize_or_zero();
        let up = right.cross(forward).normalize_or_zero();
        (right, up)
    }
}

/// Keeps elevation strictly inside the poles, at least `margin` away from them.
fn clamp_elevation(elevation: f64, margin: f64) -> f64 {
    let limit = FRAC_PI_2 - margin.max(MIN_ELEVATION_MARGIN).min(FRAC_PI_2);
    elevation.max(-limit).min(limit)
}

fn finite(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Tuning constants for turning pointer deltas into camera motion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitConfig {
    pub rotate_sensitivity: f64,
    pub pan_scale: f64,
    pub zoom_scale: f64,
    pub min_distance: f64,
    pub max_distance: f64,
    pub elevation_margin: f64,
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            rotate_sensitivity: 0.01,
            pan_scale: 0.5,
            zoom_scale: 0.001,
            min_distance: 10.0,
            max_distance: 1000.0,
            elevation_margin: 0.01,
        }
    }
}

impl OrbitConfig {
    pub fn distance_range(&self) -> DistanceRange {
        DistanceRange {
            min: self.min_distance,
            max: self.max_distance,
        }
    }
}

/// How a pointer drag should move the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DragMode {
    Rotate,
    Pan,
}

/// Applies configured drag and scroll gestures to an [`OrbitState`].
#[derive(Debug, Clone, Copy, Default)]
pub struct OrbitController {
    config: OrbitConfig,
}

impl OrbitController {
    pub fn new(config: OrbitConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OrbitConfig {
        &self.config
    }

    pub fn drag(&self, state: OrbitState, delta_x: f64, delta_y: f64, mode: DragMode) -> OrbitState {
        match mode {
            DragMode::Rotate => state.rotated(
                delta_x,
                delta_y,
                self.config.rotate_sensitivity,
                self.config.elevation_margin,
            ),
            DragMode::Pan => state.panned(delta_x, delta_y, self.config.pan_scale),
        }
    }

    pub fn scroll(&self, state: OrbitState, wheel_delta: f64) -> OrbitState {
        state.zoomed(
            wheel_delta,
            self.config.zoom_scale,
            &self.config.distance_range(),
        )
    }

    /// Clamps an externally supplied state into the configured ranges.
    pub fn sanitize(&self, state: OrbitState) -> OrbitState {
        OrbitState {
            azimuth: finite(state.azimuth).rem_euclid(TAU),
            elevation: clamp_elevation(finite(state.elevation), self.config.elevation_margin),
            distance: self
                .config
                .distance_range()
                .clamp(if state.distance.is_finite() {
                    state.distance
                } else {
                    self.config.min_distance
                }),
            ..state
        }
    }
}
