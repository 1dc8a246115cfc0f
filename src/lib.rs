//! Runtime for a scripted parametric-solid viewer.
//!
//! User scripts written in Lua build solids through an injected modeling API.
//! The crate runs them in a sandbox, keeps an orbit camera over the result,
//! feeds a pluggable renderer every frame and exports the current solids as
//! ASCII STL. Rasterization and windowing stay outside the crate so the
//! session can be driven headless from tests and tooling.

pub mod camera;
pub mod config;
pub mod geometry;
pub mod input;
pub mod render;
pub mod scripting;
pub mod session;
pub mod stl;

pub use camera::{CameraView, DragMode, OrbitConfig, OrbitController, OrbitState};
pub use config::{ProjectionConfig, ViewerConfig};
pub use geometry::{Polygon, Solid, SolidCollection, Vertex};
pub use input::{Gesture, PointerEvent, PointerTracker};
pub use render::{CameraParams, Drawable, HeadlessRenderer, RenderBackend};
pub use scripting::{
    BasicModeling, Console, ErrorKind, ErrorReport, ModelingApi, ScriptResult, ScriptSandbox,
};
pub use session::{Downloader, ExportFile, FileDownloader, SessionPhase, ViewerSession};
