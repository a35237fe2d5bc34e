//! mapcutter: split a GPS track into print-ready map sheets.
//!
//! Loads a GPX, KML or GeoJSON track, plans the cutouts for the chosen
//! scale and paper format, and prints the route summary with one
//! caption per sheet. Optionally writes the map layers as GeoJSON, an
//! overview SVG, and a PDF with one rendered page per sheet.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin mapcutter -- [OPTIONS] <TRACK>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{ArgAction, Parser};
use mapcutter_core::{PaperFormat, PrintOptions, Session, SlopeOptions};
use mapcutter_export::{PdfDocument, SvgMetadata, overview_svg};
use mapcutter_print::{CancelToken, PrintJob, PrintOrchestrator, PrintOutcome, SketchMap};
use tracing::Level;

/// Split a GPS track into print-ready map sheets.
///
/// Prints the route details and the caption of every planned sheet.
#[derive(Parser)]
#[command(name = "mapcutter", version)]
struct Cli {
    /// Path to the track file (.gpx, .kml or .geojson).
    track: PathBuf,

    /// Paper format (a3, a4, a5, a6, letter or legal).
    #[arg(long, default_value_t = PrintOptions::DEFAULT_FORMAT)]
    format: PaperFormat,

    /// Scale denominator, e.g. 50000 for 1:50000.
    #[arg(long, default_value_t = PrintOptions::DEFAULT_SCALE)]
    scale: f64,

    /// Blank border around the map image in mm.
    #[arg(long, default_value_t = PrintOptions::DEFAULT_MARGIN)]
    margin: f64,

    /// Clearance between the route and the sheet edge in mm.
    #[arg(long, default_value_t = PrintOptions::DEFAULT_PADDING)]
    padding: f64,

    /// Print resolution in dots per inch.
    #[arg(long, default_value_t = PrintOptions::DEFAULT_DPI)]
    dpi: f64,

    /// Place a milemarker every KM kilometres.
    #[arg(long, value_name = "KM")]
    milemarkers: Option<f64>,

    /// Detect slope sections steeper than RATIO (0.08 is 8 %).
    #[arg(long, value_name = "RATIO")]
    slope_min: Option<f64>,

    /// Elevation smoothing strength for slope detection, in (0, 1].
    #[arg(long, value_name = "L")]
    lambda: Option<f64>,

    /// Merge slope sections separated by at most this many meters.
    #[arg(long, value_name = "METERS")]
    slope_merge: Option<f64>,

    /// Full print options as a JSON string.
    ///
    /// When provided, the individual print option flags are ignored.
    /// The JSON must be a valid `PrintOptions` serialization.
    #[arg(long)]
    options_json: Option<String>,

    /// Write one GeoJSON file per map layer into this directory.
    #[arg(long, value_name = "DIR")]
    geojson: Option<PathBuf>,

    /// Write an overview SVG of route and sheets to this file.
    #[arg(long, value_name = "FILE")]
    svg: Option<PathBuf>,

    /// Render every sheet into a PDF. A directory gets a file named
    /// after the route.
    #[arg(long, value_name = "FILE")]
    pdf: Option<PathBuf>,

    /// Longest wait for one sheet to render, in seconds.
    #[arg(long, default_value_t = PrintOrchestrator::DEFAULT_FRAME_TIMEOUT.as_secs())]
    timeout_secs: u64,

    /// Print the report as JSON instead of text.
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

/// Build [`PrintOptions`] from CLI arguments.
///
/// If `--options-json` is provided, the JSON is parsed directly and the
/// individual print option flags are ignored.
fn print_options(cli: &Cli) -> Result<PrintOptions, String> {
    let options = if let Some(ref json) = cli.options_json {
        serde_json::from_str(json).map_err(|e| format!("Error parsing --options-json: {e}"))?
    } else {
        PrintOptions {
            format: cli.format,
            margin: cli.margin,
            scale: cli.scale,
            dpi: cli.dpi,
            padding: cli.padding,
        }
    };
    options.validate().map_err(|e| e.to_string())?;
    Ok(options)
}

/// Slope detection options, or `None` when no slope flag was given.
fn slope_options(cli: &Cli) -> Option<SlopeOptions> {
    if cli.slope_min.is_none() && cli.lambda.is_none() && cli.slope_merge.is_none() {
        return None;
    }
    Some(SlopeOptions {
        lambda: cli.lambda.unwrap_or(SlopeOptions::DEFAULT_LAMBDA),
        min_slope: cli.slope_min.unwrap_or(SlopeOptions::DEFAULT_MIN_SLOPE),
        merge_distance: cli.slope_merge,
        ..SlopeOptions::default()
    })
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let options = print_options(cli)?;

    let raw = std::fs::read_to_string(&cli.track)
        .map_err(|e| format!("Error reading {}: {e}", cli.track.display()))?;
    let filename = cli
        .track
        .file_name()
        .map_or_else(|| cli.track.to_string_lossy(), |name| name.to_string_lossy());
    let mut session = Session::open(&raw, &filename, options)
        .map_err(|e| format!("Error loading {}: {e}", cli.track.display()))?;
    if let Some(km) = cli.milemarkers {
        session.update_milemarkers(km);
    }
    if let Some(slopes) = slope_options(cli) {
        session.update_slopes(slopes);
    }
    tracing::info!(
        name = session.name(),
        sheets = session.cutouts().len(),
        slopes = session.slopes().len(),
        "track loaded"
    );

    report(&session, cli.json)?;

    if let Some(ref dir) = cli.geojson {
        write_layers(&session, dir)?;
    }
    if let Some(ref path) = cli.svg {
        write_svg(&session, path)?;
    }
    if let Some(ref path) = cli.pdf {
        print_pdf(&session, path, Duration::from_secs(cli.timeout_secs))?;
    }
    Ok(())
}

fn report(session: &Session, json: bool) -> Result<(), String> {
    let details = session.details();
    let captions = session.captions();

    if json {
        let value = serde_json::json!({
            "details": details,
            "options": session.options(),
            "cutouts": session.cutouts(),
            "captions": captions.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "slopes": session.slopes(),
        });
        let text = serde_json::to_string_pretty(&value)
            .map_err(|e| format!("Error serializing report: {e}"))?;
        println!("{text}");
    } else {
        println!("{details}");
        println!();
        for caption in &captions {
            println!("{caption}");
        }
    }
    Ok(())
}

fn write_layers(session: &Session, dir: &Path) -> Result<(), String> {
    std::fs::create_dir_all(dir).map_err(|e| format!("Error creating {}: {e}", dir.display()))?;
    for layer in session.layers() {
        let path = dir.join(format!("{}.geojson", layer.kind.id()));
        let text = serde_json::to_string_pretty(&layer.data)
            .map_err(|e| format!("Error serializing {} layer: {e}", layer.kind))?;
        std::fs::write(&path, text)
            .map_err(|e| format!("Error writing {}: {e}", path.display()))?;
        tracing::debug!(
            layer = %layer.kind,
            features = layer.data.features.len(),
            path = %path.display(),
            "wrote layer"
        );
    }
    eprintln!("Layers written to {}", dir.display());
    Ok(())
}

fn write_svg(session: &Session, path: &Path) -> Result<(), String> {
    let options = session.options();
    let options_json = serde_json::to_string(options)
        .map_err(|e| format!("Error serializing print options: {e}"))?;
    let description = format!(
        "{} sheets, {} at 1:{}",
        session.cutouts().len(),
        options.format,
        options.scale
    );
    let metadata = SvgMetadata {
        title: Some(session.name()),
        description: Some(&description),
        options_json: Some(&options_json),
    };
    let svg = overview_svg(
        session.route(),
        session.cutouts(),
        session.waypoints(),
        &metadata,
    );
    std::fs::write(path, svg).map_err(|e| format!("Error writing {}: {e}", path.display()))?;
    eprintln!("SVG written to {}", path.display());
    Ok(())
}

fn print_pdf(session: &Session, path: &Path, frame_timeout: Duration) -> Result<(), String> {
    let job = PrintJob::from_session(session);
    let path = if path.is_dir() {
        path.join(job.file_name())
    } else {
        path.to_path_buf()
    };

    let runtime =
        tokio::runtime::Runtime::new().map_err(|e| format!("Error starting runtime: {e}"))?;
    let outcome = runtime
        .block_on(async {
            let cancel = CancelToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupted, stopping after the current sheet");
                    on_interrupt.cancel();
                }
            });

            let mut widget = SketchMap::new();
            let mut document = PdfDocument::new();
            PrintOrchestrator::new(frame_timeout)
                .print(&mut widget, &mut document, &job, &path, &cancel, |p| {
                    eprintln!(
                        "Sheet {}/{} ({:.0}%)",
                        p.current,
                        p.total,
                        p.fraction() * 100.0
                    );
                })
                .await
        })
        .map_err(|e| format!("Error printing {}: {e}", path.display()))?;

    match outcome {
        PrintOutcome::Completed { sheets, path } => {
            eprintln!("PDF with {sheets} sheets written to {}", path.display());
            Ok(())
        }
        PrintOutcome::Canceled { completed, total } => Err(format!(
            "Printing canceled after {completed} of {total} sheets, nothing written"
        )),
    }
}
