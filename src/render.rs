use anyhow::Result;
use glam::{DMat4, DVec3};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::camera::CameraView;
use crate::config::ProjectionConfig;
use crate::geometry::Solid;

/// Camera parameters handed to the renderer every frame.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraParams {
    pub view_proj: DMat4,
    pub position: DVec3,
}

impl CameraParams {
    /// Builds a Z-up perspective transform for `view`.
    pub fn from_view(view: &CameraView, aspect: f64, projection: &ProjectionConfig) -> Self {
        let view_matrix = DMat4::look_at_rh(view.eye, view.target, DVec3::Z);
        let proj_matrix = DMat4::perspective_rh_gl(
            projection.fov_degrees.to_radians(),
            aspect.max(0.01),
            projection.near,
            projection.far,
        );
        Self {
            view_proj: proj_matrix * view_matrix,
            position: view.eye,
        }
    }
}

/// Reference grid drawn under the model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub size: [f64; 2],
    pub ticks: [f64; 2],
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            size: [400.0, 400.0],
            ticks: [25.0, 5.0],
        }
    }
}

/// Coordinate axes drawn at the origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxesSpec {
    pub size: f64,
}

impl Default for AxesSpec {
    fn default() -> Self {
        Self { size: 200.0 }
    }
}

/// One item of the per-frame draw list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Drawable<'a, E> {
    Grid(GridSpec),
    Axes(AxesSpec),
    Mesh(&'a E),
}

/// Rasterizer the viewer session drives. The entity type is owned by the backend.
pub trait RenderBackend {
    type Entity;

    /// Converts solids into backend-native drawable entities.
    fn entities_from_solids(&mut self, solids: &[Solid]) -> Vec<Self::Entity>;

    /// Called whenever the display surface changes size.
    fn resize(&mut self, width: u32, height: u32);

    fn draw(&mut self, camera: &CameraParams, drawables: &[Drawable<'_, Self::Entity>])
        -> Result<()>;
}

/// Per-frame breakdown recorded by [`HeadlessRenderer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub grids: usize,
    pub axes: usize,
    pub meshes: usize,
}

impl FrameStats {
    pub fn total(&self) -> usize {
        self.grids + self.axes + self.meshes
    }
}

/// Mesh entity produced by the headless backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadlessMesh {
    pub polygons: usize,
}

/// Renderer that draws nothing and records what it was asked to draw.
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    frames: usize,
    size: (u32, u32),
    last_frame: FrameStats,
    last_camera: Option<CameraParams>,
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn last_frame(&self) -> FrameStats {
        self.last_frame
    }

    pub fn last_camera(&self) -> Option<&CameraParams> {
        self.last_camera.as_ref()
    }
}

impl RenderBackend for HeadlessRenderer {
    type Entity = HeadlessMesh;

    fn entities_from_solids(&mut self, solids: &[Solid]) -> Vec<Self::Entity> {
        solids
            .iter()
            .map(|solid| HeadlessMesh {
                polygons: solid.polygon_count(),
            })
            .collect()
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    fn draw(
        &mut self,
        camera: &CameraParams,
        drawables: &[Drawable<'_, Self::Entity>],
    ) -> Result<()> {
        let mut stats = FrameStats::default();
        for drawable in drawables {
            match drawable {
                Drawable::Grid(_) => stats.grids += 1,
                Drawable::Axes(_) => stats.axes += 1,
                Drawable::Mesh(_) => stats.meshes += 1,
            }
        }
        self.frames += 1;
        self.last_frame = stats;
        self.last_camera = Some(camera.clone());
        debug!(
            "frame {} drew {} item(s) from eye ({:.2}, {:.2}, {:.2})",
            self.frames,
            stats.total(),
            camera.position.x,
            camera.position.y,
            camera.position.z
        );
        Ok(())
    }
}
