//! mapcutter-print: Render planned sheets and assemble them into a
//! document.
//!
//! The [`PrintOrchestrator`] drives a [`MapWidget`] through every
//! cutout of a [`PrintJob`] strictly in order: resize the surface to the
//! printable page, frame the cutout, wait for the frame, snapshot it and
//! append the snapshot and its caption as a new page. A [`CancelToken`]
//! is polled between sheets.
//!
//! [`SketchMap`] is a self-contained raster widget that draws the job's
//! layers without any external map service.

pub mod cancel;
pub mod job;
pub mod orchestrator;
pub mod sketch;
pub mod widget;

pub use cancel::{CancelToken, Progress};
pub use job::PrintJob;
pub use orchestrator::{PrintError, PrintOrchestrator, PrintOutcome, check_rendering_support};
pub use sketch::SketchMap;
pub use widget::{MapWidget, WidgetError};
