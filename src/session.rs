use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::{debug, info, warn};

use crate::camera::{CameraView, OrbitController, OrbitState};
use crate::config::ViewerConfig;
use crate::geometry::SolidCollection;
use crate::input::{Gesture, PointerEvent, PointerTracker};
use crate::render::{CameraParams, Drawable, RenderBackend};
use crate::scripting::{BasicModeling, Console, ModelingApi, ScriptResult, ScriptSandbox};
use crate::stl;

/// MIME type attached to exported meshes.
pub const STL_MIME_TYPE: &str = "text/plain";

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No script has run yet.
    Idle,
    /// Frames draw the current collection; stays here after every run.
    Rendering,
}

/// A serialized mesh ready to be handed to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub file_name: String,
    pub mime_type: String,
    pub contents: String,
}

/// Delivers exported files, e.g. as a browser download or a file on disk.
pub trait Downloader {
    fn download(&mut self, file: &ExportFile) -> Result<()>;
}

/// Writes exports to disk.
///
/// When the target is an existing directory the export keeps its own file
/// name inside it; otherwise the target is used as the file path.
#[derive(Debug, Clone)]
pub struct FileDownloader {
    target: PathBuf,
    last_written: Option<PathBuf>,
}

impl FileDownloader {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            last_written: None,
        }
    }

    pub fn last_written(&self) -> Option<&Path> {
        self.last_written.as_deref()
    }
}

impl Downloader for FileDownloader {
    fn download(&mut self, file: &ExportFile) -> Result<()> {
        let path = if self.target.is_dir() {
            self.target.join(&file.file_name)
        } else {
            self.target.clone()
        };
        fs::write(&path, &file.contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!("wrote {} ({} bytes)", path.display(), file.contents.len());
        self.last_written = Some(path);
        Ok(())
    }
}

/// One long-lived viewer: script runs, camera interaction, frames and export.
///
/// The current collection is only ever replaced as a whole, so a frame never
/// sees a partially built result.
pub struct ViewerSession<R: RenderBackend> {
    config: ViewerConfig,
    controller: OrbitController,
    orbit: OrbitState,
    tracker: PointerTracker,
    sandbox: ScriptSandbox,
    api: Arc<dyn ModelingApi>,
    renderer: R,
    solids: SolidCollection,
    entities: Vec<R::Entity>,
    source: String,
    viewport: (u32, u32),
    phase: SessionPhase,
}

impl<R: RenderBackend> ViewerSession<R> {
    pub fn new(renderer: R, config: ViewerConfig) -> Self {
        Self::with_api(renderer, config, Arc::new(BasicModeling))
    }

    /// Creates a session whose scripts see `api` as their modeling global.
    pub fn with_api(mut renderer: R, config: ViewerConfig, api: Arc<dyn ModelingApi>) -> Self {
        let controller = OrbitController::new(config.orbit);
        let orbit = controller.sanitize(config.initial_camera);
        let viewport = clamp_viewport(config.viewport.0, config.viewport.1);
        renderer.resize(viewport.0, viewport.1);
        Self {
            config,
            controller,
            orbit,
            tracker: PointerTracker::new(),
            sandbox: ScriptSandbox::new(Console::new()),
            api,
            renderer,
            solids: SolidCollection::empty(),
            entities: Vec::new(),
            source: String::new(),
            viewport,
            phase: SessionPhase::Idle,
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn orbit(&self) -> OrbitState {
        self.orbit
    }

    pub fn camera_view(&self) -> CameraView {
        self.orbit.resolve_view()
    }

    pub fn solids(&self) -> &SolidCollection {
        &self.solids
    }

    pub fn console(&self) -> &Console {
        self.sandbox.console()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Replaces the script source and runs it.
    ///
    /// A failed run leaves the previous collection on screen and returns the
    /// report. The session is in [`SessionPhase::Rendering`] either way.
    pub fn run_script(&mut self, source: impl Into<String>) -> ScriptResult {
        self.source = source.into();
        self.execute()
    }

    /// Runs the stored source again.
    pub fn rerun(&mut self) -> ScriptResult {
        self.execute()
    }

    pub fn import_source(&mut self, text: impl Into<String>) -> ScriptResult {
        self.run_script(text)
    }

    /// Loads a script file, makes it the current source and runs it.
    ///
    /// The outer result only fails when the file cannot be read.
    pub fn import_file(&mut self, path: impl AsRef<Path>) -> Result<ScriptResult> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read script {}", path.display()))?;
        info!("imported {} ({} bytes)", path.display(), text.len());
        Ok(self.import_source(text))
    }

    fn execute(&mut self) -> ScriptResult {
        self.sandbox.console().clear();
        let result = self.sandbox.run(&self.source, &*self.api);
        match &result {
            Ok(solids) => {
                self.entities = self.renderer.entities_from_solids(solids);
                self.solids = solids.clone();
            }
            Err(_) => debug!(
                "keeping {} solid(s) from the previous run",
                self.solids.len()
            ),
        }
        self.phase = SessionPhase::Rendering;
        result
    }

    /// Routes pointer input to the orbit camera.
    pub fn handle_pointer(&mut self, event: PointerEvent) {
        let Some(gesture) = self.tracker.handle(event) else {
            return;
        };
        self.orbit = match gesture {
            Gesture::Drag {
                delta_x,
                delta_y,
                mode,
            } => self.controller.drag(self.orbit, delta_x, delta_y, mode),
            Gesture::Scroll { delta } => self.controller.scroll(self.orbit, delta),
        };
        debug!(
            "camera az={:.3} el={:.3} dist={:.1}",
            self.orbit.azimuth, self.orbit.elevation, self.orbit.distance
        );
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport = clamp_viewport(width, height);
        self.renderer.resize(self.viewport.0, self.viewport.1);
    }

    /// Draws the grid, axes and current solids from the current camera.
    pub fn render_frame(&mut self) -> Result<()> {
        let aspect = self.viewport.0 as f64 / self.viewport.1 as f64;
        let camera = CameraParams::from_view(
            &self.orbit.resolve_view(),
            aspect,
            &self.config.projection,
        );
        let mut drawables = Vec::with_capacity(self.entities.len() + 2);
        drawables.push(Drawable::Grid(self.config.grid));
        drawables.push(Drawable::Axes(self.config.axes));
        drawables.extend(self.entities.iter().map(Drawable::Mesh));
        self.renderer
            .draw(&camera, &drawables)
            .context("failed to draw frame")
    }

    /// Serializes the current collection as STL.
    pub fn export_file(&self) -> Result<ExportFile> {
        if self.solids.is_empty() {
            warn!("export requested with no solids");
            bail!("No solids to export.");
        }
        Ok(ExportFile {
            file_name: self.config.export_file_name.clone(),
            mime_type: STL_MIME_TYPE.to_string(),
            contents: stl::serialize(&self.solids),
        })
    }

    /// Serializes the current collection and hands it to `downloader`.
    pub fn export(&self, downloader: &mut dyn Downloader) -> Result<ExportFile> {
        let file = self.export_file()?;
        downloader
            .download(&file)
            .with_context(|| format!("failed to export {}", file.file_name))?;
        info!(
            "exported {} facet(s) as {}",
            stl::facet_count(&self.solids),
            file.file_name
        );
        Ok(file)
    }
}

fn clamp_viewport(width: u32, height: u32) -> (u32, u32) {
    (width.max(1), height.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{FrameStats, HeadlessRenderer};
    use crate::scripting::ErrorKind;
    use once_cell::sync::Lazy;
    use tempfile::tempdir;

    static TWO_CUBES: Lazy<String> = Lazy::new(|| {
        r#"
        function main()
            local p = modeling.primitives
            local t = modeling.transforms
            return { p.cube({ size = 10 }), t.translate({ 20, 0, 0 }, p.cube({ size = 10 })) }
        end
        "#
        .to_string()
    });

    #[derive(Default)]
    struct MemoryDownloader {
        files: Vec<ExportFile>,
    }

    impl Downloader for MemoryDownloader {
        fn download(&mut self, file: &ExportFile) -> Result<()> {
            self.files.push(file.clone());
            Ok(())
        }
    }

    fn session() -> ViewerSession<HeadlessRenderer> {
        ViewerSession::new(HeadlessRenderer::new(), ViewerConfig::default())
    }

    #[test]
    fn starts_idle_with_default_camera() {
        let session = session();
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert_eq!(session.orbit(), OrbitState::default());
        assert!(session.solids().is_empty());
        assert_eq!(session.renderer().size(), (1280, 720));
    }

    #[test]
    fn successful_run_replaces_the_collection() {
        let mut session = session();
        let solids = session.run_script(TWO_CUBES.as_str()).unwrap();
        assert_eq!(solids.len(), 2);
        assert_eq!(session.phase(), SessionPhase::Rendering);
        assert!(session.solids().ptr_eq(&solids));
        assert_eq!(session.console().lines(), vec!["Generated 2 solids".to_string()]);
    }

    #[test]
    fn failed_run_keeps_the_previous_collection() {
        let mut session = session();
        let before = session.run_script(TWO_CUBES.as_str()).unwrap();
        let report = session
            .run_script("function main() error('broken') end")
            .unwrap_err();
        assert_eq!(report.kind, ErrorKind::Runtime);
        assert_eq!(session.phase(), SessionPhase::Rendering);
        assert!(session.solids().ptr_eq(&before));
        assert!(session.console().text().starts_with("ERROR: runtime error"));
    }

    #[test]
    fn compile_and_load_errors_keep_the_previous_collection() {
        let mut session = session();
        let before = session.run_script(TWO_CUBES.as_str()).unwrap();
        session.render_frame().unwrap();

        let report = session.run_script("function main(").unwrap_err();
        assert_eq!(report.kind, ErrorKind::Compile);
        assert!(session.solids().ptr_eq(&before));
        assert!(session.console().text().starts_with("ERROR: compile error"));

        let report = session
            .run_script("error('top') function main() end")
            .unwrap_err();
        assert_eq!(report.kind, ErrorKind::Runtime);
        assert!(report.message.contains("top"));
        assert!(session.solids().ptr_eq(&before));
        assert_eq!(session.phase(), SessionPhase::Rendering);
        assert!(session.console().text().starts_with("ERROR: runtime error"));

        session.render_frame().unwrap();
        assert_eq!(session.renderer().last_frame().meshes, 2);
    }

    #[test]
    fn failure_on_first_run_still_enters_rendering() {
        let mut session = session();
        assert!(session.run_script("function main(").is_err());
        assert_eq!(session.phase(), SessionPhase::Rendering);
        assert!(session.solids().is_empty());
    }

    #[test]
    fn rerun_uses_stored_source() {
        let mut session = session();
        session.import_source(TWO_CUBES.as_str()).unwrap();
        let first = session.solids().clone();
        let second = session.rerun().unwrap();
        assert_eq!(session.source(), TWO_CUBES.as_str());
        assert_eq!(first.solids(), second.solids());
        assert!(!first.ptr_eq(&second));
    }

    #[test]
    fn import_file_reads_and_runs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("part.lua");
        fs::write(&path, "function main() return modeling.primitives.cube() end").unwrap();
        let mut session = session();
        let result = session.import_file(&path).unwrap();
        assert_eq!(result.unwrap().len(), 1);
        assert!(session.import_file(dir.path().join("missing.lua")).is_err());
    }

    #[test]
    fn pointer_events_move_the_camera() {
        let mut session = session();
        session.handle_pointer(PointerEvent::Move {
            x: 50.0,
            y: 0.0,
            pan: false,
        });
        assert_eq!(session.orbit(), OrbitState::default());

        session.handle_pointer(PointerEvent::Down { x: 0.0, y: 0.0 });
        session.handle_pointer(PointerEvent::Move {
            x: 10.0,
            y: 0.0,
            pan: false,
        });
        assert!((session.orbit().azimuth - 0.1).abs() < 1e-12);

        session.handle_pointer(PointerEvent::Up);
        session.handle_pointer(PointerEvent::Wheel { delta: 100.0 });
        assert!((session.orbit().distance - 165.0).abs() < 1e-9);
        assert_eq!(session.camera_view(), session.orbit().resolve_view());
    }

    #[test]
    fn frames_include_grid_axes_and_meshes() {
        let mut session = session();
        session.render_frame().unwrap();
        assert_eq!(
            session.renderer().last_frame(),
            FrameStats {
                grids: 1,
                axes: 1,
                meshes: 0
            }
        );
        session.run_script(TWO_CUBES.as_str()).unwrap();
        session.render_frame().unwrap();
        assert_eq!(session.renderer().last_frame().meshes, 2);
        assert_eq!(session.renderer().frames(), 2);
    }

    #[test]
    fn resize_clamps_to_one_pixel() {
        let mut session = session();
        session.resize(0, 300);
        assert_eq!(session.viewport(), (1, 300));
        assert_eq!(session.renderer().size(), (1, 300));
        session.render_frame().unwrap();
    }

    #[test]
    fn export_without_solids_is_refused() {
        let mut session = session();
        let mut downloader = MemoryDownloader::default();
        let err = session.export(&mut downloader).unwrap_err();
        assert_eq!(err.to_string(), "No solids to export.");
        assert!(downloader.files.is_empty());

        session.run_script("function main() end").unwrap();
        assert!(session.export(&mut downloader).is_err());
    }

    #[test]
    fn export_hands_stl_to_downloader() {
        let mut session = session();
        session.run_script(TWO_CUBES.as_str()).unwrap();
        let mut downloader = MemoryDownloader::default();
        let file = session.export(&mut downloader).unwrap();
        assert_eq!(file.file_name, "model.stl");
        assert_eq!(file.mime_type, "text/plain");
        assert!(file.contents.starts_with("solid model\n"));
        // Two cubes, six quads each, two facets per quad.
        assert_eq!(file.contents.matches("endfacet").count(), 24);
        assert_eq!(downloader.files, vec![file]);
    }

    #[test]
    fn file_downloader_writes_into_directory() {
        let dir = tempdir().unwrap();
        let mut session = session();
        session.run_script(TWO_CUBES.as_str()).unwrap();
        let mut downloader = FileDownloader::new(dir.path());
        let file = session.export(&mut downloader).unwrap();
        let written = downloader.last_written().unwrap().to_path_buf();
        assert_eq!(written, dir.path().join("model.stl"));
        assert_eq!(fs::read_to_string(written).unwrap(), file.contents);
    }
}
