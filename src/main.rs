use std::env;
use std::fs;

use anyhow::{anyhow, Context, Result};

use solidscript_runtime::{stl, FileDownloader, HeadlessRenderer, ViewerConfig, ViewerSession};

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse()?;
    let source = fs::read_to_string(&options.path)
        .with_context(|| format!("failed to read script {}", options.path))?;
    println!("Loaded script {} ({} bytes)", options.path, source.len());

    let mut session = ViewerSession::new(HeadlessRenderer::new(), ViewerConfig::default());
    let solids = match session.run_script(source) {
        Ok(solids) => solids,
        Err(report) => {
            eprintln!("ERROR: {report}");
            if let Some(stack) = &report.stack {
                eprintln!("{stack}");
            }
            std::process::exit(1);
        }
    };

    for line in session.console().lines() {
        println!("{line}");
    }
    for (index, solid) in solids.iter().enumerate() {
        println!(" - solid {}: {} polygons", index + 1, solid.polygon_count());
    }

    if !options.summary_only && options.frames > 0 {
        for _ in 0..options.frames {
            session.render_frame()?;
        }
        println!(
            "Rendered {} frame(s) with {} drawable(s)",
            session.renderer().frames(),
            session.renderer().last_frame().total()
        );
    }

    if let Some(path) = &options.export {
        let mut downloader = FileDownloader::new(path);
        session.export(&mut downloader)?;
        let written = downloader
            .last_written()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| path.clone());
        println!(
            "Exported {} facets to {written}",
            stl::facet_count(session.solids())
        );
    }

    Ok(())
}

struct CliOptions {
    path: String,
    export: Option<String>,
    frames: usize,
    summary_only: bool,
}

impl CliOptions {
    fn parse() -> Result<Self> {
        let mut args = env::args().skip(1);
        let Some(path) = args.next() else {
            return Err(anyhow!(
                "Usage: solidscript-runtime <script.lua> [--export <path>] [--frames <n>] [--summary-only]"
            ));
        };
        let mut export = None;
        let mut frames = 1;
        let mut summary_only = false;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--export" => {
                    export = Some(args.next().context("--export expects a path")?);
                }
                "--frames" => {
                    let value = args.next().context("--frames expects a count")?;
                    frames = value
                        .parse()
                        .with_context(|| format!("invalid frame count: {value}"))?;
                }
                "--summary-only" => summary_only = true,
                other => {
                    return Err(anyhow!(
                        "Unknown argument: {other}. Expected --export, --frames or --summary-only"
                    ));
                }
            }
        }
        Ok(Self {
            path,
            export,
            frames,
            summary_only,
        })
    }
}
