//! Sequential rendering of every sheet into one document.
//!
//! A run moves through `Idle -> Rendering(0..N) -> Canceled | Completed`.
//! The widget is exclusively borrowed for the whole run: sheets share
//! its camera, so each one must settle before the next starts. The
//! cancel token is polled before each sheet; the sheet in flight always
//! finishes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use mapcutter_core::{CutterError, Cutout, PaperFormat, PrintOptions, SheetCaption, paper};
use mapcutter_export::{DocumentBuilder, DocumentError};

use crate::cancel::{CancelToken, Progress};
use crate::job::PrintJob;
use crate::widget::{MapWidget, mm_to_css_px};

/// Margin in mm below which the caption is drawn inside the image.
const MIN_CAPTION_MARGIN_MM: f64 = 4.0;

/// Errors that abort a print run.
#[derive(Debug, thiserror::Error)]
pub enum PrintError {
    /// The widget cannot produce rasters large enough for printing.
    #[error("rendering unsupported: {0}")]
    RenderingUnsupported(String),

    /// The widget reported an error while rendering a sheet.
    #[error("sheet {sheet}: rendering failed: {message}")]
    RenderSurface {
        /// One-based sheet number.
        sheet: usize,
        /// The widget's message.
        message: String,
    },

    /// The widget did not signal a rendered frame in time.
    #[error("sheet {sheet}: no rendered frame after {waited:?}")]
    RenderTimeout {
        /// One-based sheet number.
        sheet: usize,
        /// How long the run waited.
        waited: Duration,
    },

    /// The document could not be assembled or saved.
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// The job's print options are invalid.
    #[error(transparent)]
    Options(#[from] CutterError),
}

/// How a print run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrintOutcome {
    /// Every sheet was rendered and the document saved.
    Completed {
        /// Number of pages written.
        sheets: usize,
        /// Where the document was saved.
        path: PathBuf,
    },
    /// The run stopped early on request; nothing was saved.
    Canceled {
        /// Sheets rendered before stopping.
        completed: usize,
        /// Sheets in the run.
        total: usize,
    },
}

/// Formats the widget can render at `options.dpi`.
///
/// # Errors
///
/// Returns [`PrintError::RenderingUnsupported`] if no paper format fits
/// the widget's maximum raster size, or the selected format does not.
pub fn check_rendering_support<W: MapWidget>(
    widget: &W,
    options: &PrintOptions,
) -> Result<Vec<PaperFormat>, PrintError> {
    let max_px = widget.max_raster_size();
    let max_side_mm = f64::from(max_px) / options.dpi * mapcutter_core::options::MM_PER_INCH;
    let formats = paper::valid_formats(max_side_mm);
    if formats.is_empty() {
        return Err(PrintError::RenderingUnsupported(format!(
            "maximum raster size {max_px}px is below the smallest paper format at {} dpi",
            options.dpi
        )));
    }
    if !formats.contains(&options.format) {
        let names: Vec<_> = formats.iter().map(|f| f.name()).collect();
        return Err(PrintError::RenderingUnsupported(format!(
            "{} does not fit the maximum raster size {max_px}px at {} dpi, use one of: {}",
            options.format,
            options.dpi,
            names.join(", ")
        )));
    }
    Ok(formats)
}

/// Drives a widget through a print job.
#[derive(Debug, Clone)]
pub struct PrintOrchestrator {
    /// Longest wait for one rendered frame.
    pub frame_timeout: Duration,
}

impl Default for PrintOrchestrator {
    fn default() -> Self {
        Self {
            frame_timeout: Self::DEFAULT_FRAME_TIMEOUT,
        }
    }
}

/// Result of the rendering loop before the document is saved.
enum Rendered {
    All,
    Canceled { completed: usize },
}

impl PrintOrchestrator {
    /// Default wait for one rendered frame.
    pub const DEFAULT_FRAME_TIMEOUT: Duration = Duration::from_secs(60);

    /// An orchestrator that waits at most `frame_timeout` per sheet.
    #[must_use]
    pub const fn new(frame_timeout: Duration) -> Self {
        Self { frame_timeout }
    }

    /// Render every sheet of `job` into `document` and save it to
    /// `path`.
    ///
    /// The widget's pixel ratio is raised to the print resolution for
    /// the run and restored afterwards. `progress` is called after each
    /// sheet and once more at the end; a canceled run reports
    /// `canceled: true` and saves nothing.
    ///
    /// # Errors
    ///
    /// Returns [`PrintError::Options`] for invalid options,
    /// [`PrintError::RenderingUnsupported`] if the widget cannot render
    /// the paper format, [`PrintError::RenderSurface`] or
    /// [`PrintError::RenderTimeout`] if a sheet fails, and
    /// [`PrintError::Document`] if the document cannot be assembled or
    /// saved. The widget is released on sheet failures and no document
    /// is written.
    pub async fn print<W, D>(
        &self,
        widget: &mut W,
        document: &mut D,
        job: &PrintJob,
        path: &Path,
        cancel: &CancelToken,
        mut progress: impl FnMut(Progress),
    ) -> Result<PrintOutcome, PrintError>
    where
        W: MapWidget,
        D: DocumentBuilder,
    {
        job.options.validate()?;
        check_rendering_support(widget, &job.options)?;

        let total = job.len();
        let original_ratio = widget.pixel_ratio();
        widget.set_pixel_ratio(job.options.pixel_ratio());
        for layer in &job.layers {
            widget.set_layer_data(layer);
        }
        tracing::info!(
            sheets = total,
            dpi = job.options.dpi,
            format = %job.options.format,
            "starting print run"
        );

        let rendered = self
            .render_sheets(widget, document, job, cancel, &mut progress)
            .await;
        widget.set_pixel_ratio(original_ratio);

        match rendered {
            Ok(Rendered::All) => {
                document.save(path)?;
                progress(Progress {
                    current: total,
                    total,
                    canceled: false,
                });
                tracing::info!(sheets = total, path = %path.display(), "print run completed");
                Ok(PrintOutcome::Completed {
                    sheets: total,
                    path: path.to_path_buf(),
                })
            }
            Ok(Rendered::Canceled { completed }) => {
                progress(Progress {
                    current: completed,
                    total,
                    canceled: true,
                });
                tracing::warn!(completed, total, "print run canceled");
                Ok(PrintOutcome::Canceled { completed, total })
            }
            Err(err) => {
                widget.release();
                tracing::error!(error = %err, "print run failed");
                Err(err)
            }
        }
    }

    async fn render_sheets<W, D>(
        &self,
        widget: &mut W,
        document: &mut D,
        job: &PrintJob,
        cancel: &CancelToken,
        progress: &mut impl FnMut(Progress),
    ) -> Result<Rendered, PrintError>
    where
        W: MapWidget,
        D: DocumentBuilder,
    {
        let total = job.len();
        for (i, cutout) in job.cutouts.iter().enumerate() {
            if cancel.is_canceled() {
                return Ok(Rendered::Canceled { completed: i });
            }
            let caption = job.captions.get(i);
            self.render_sheet(widget, document, &job.options, cutout, i + 1, caption)
                .await?;
            progress(Progress {
                current: i + 1,
                total,
                canceled: false,
            });
        }
        Ok(Rendered::All)
    }

    async fn render_sheet<W, D>(
        &self,
        widget: &mut W,
        document: &mut D,
        options: &PrintOptions,
        cutout: &Cutout,
        sheet: usize,
        caption: Option<&SheetCaption>,
    ) -> Result<(), PrintError>
    where
        W: MapWidget,
        D: DocumentBuilder,
    {
        let orientation = cutout.orientation();
        let (width, height) = paper::dimensions(options.format, options.margin, orientation);

        widget.resize_surface(mm_to_css_px(width), mm_to_css_px(height));
        widget.set_center(cutout.extent.center());
        widget.fit_bounds(&cutout.extent);

        match tokio::time::timeout(self.frame_timeout, widget.frame_rendered()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                return Err(PrintError::RenderSurface {
                    sheet,
                    message: err.0,
                });
            }
            Err(_) => {
                tracing::warn!(sheet, timeout = ?self.frame_timeout, "frame render timed out");
                return Err(PrintError::RenderTimeout {
                    sheet,
                    waited: self.frame_timeout,
                });
            }
        }
        let image = widget.snapshot().map_err(|err| PrintError::RenderSurface {
            sheet,
            message: err.0,
        })?;

        document.add_page(options.format, orientation);
        document.add_image(&image, options.margin, options.margin, width, height)?;
        if let Some(caption) = caption {
            let (x, y) = caption_position(options.margin, height);
            document.add_text(&caption.to_string(), x, y)?;
        }
        tracing::info!(
            sheet,
            ?orientation,
            width_px = image.width,
            height_px = image.height,
            "rendered sheet"
        );
        Ok(())
    }
}

/// Caption baseline in mm from the top-left page corner: in the bottom
/// margin when it is wide enough, otherwise inside the image.
fn caption_position(margin: f64, image_height: f64) -> (f64, f64) {
    if margin >= MIN_CAPTION_MARGIN_MM {
        (margin, margin.mul_add(1.6, image_height))
    } else {
        (margin + 2.0, margin + image_height - 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caption_sits_in_wide_margin() {
        let (x, y) = caption_position(5.0, 287.0);
        assert!((x - 5.0).abs() < f64::EPSILON);
        assert!(y > 292.0 && y < 297.0);
    }

    #[test]
    fn caption_moves_inside_narrow_margin() {
        let (_, y) = caption_position(0.0, 297.0);
        assert!(y < 297.0);
    }
}
