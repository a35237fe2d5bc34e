//! Everything a print run needs, detached from the session.

use mapcutter_core::{Cutout, Layer, PrintOptions, Session, SheetCaption};

/// A snapshot of a session ready for printing.
#[derive(Debug, Clone)]
pub struct PrintJob {
    /// Route name, used for the document file name.
    pub name: String,
    /// Options the cutouts were planned with.
    pub options: PrintOptions,
    /// Sheets in print order.
    pub cutouts: Vec<Cutout>,
    /// One caption per sheet.
    pub captions: Vec<SheetCaption>,
    /// Layers to hand to the widget before rendering.
    pub layers: Vec<Layer>,
}

impl PrintJob {
    /// Capture the current state of `session`.
    #[must_use]
    pub fn from_session(session: &Session) -> Self {
        Self {
            name: session.name().to_owned(),
            options: session.options().clone(),
            cutouts: session.cutouts().to_vec(),
            captions: session.captions(),
            layers: session.layers(),
        }
    }

    /// Number of sheets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cutouts.len()
    }

    /// Returns `true` if there is nothing to print.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cutouts.is_empty()
    }

    /// Document file name derived from the route name, e.g.
    /// `Alpine_Loop.pdf`.
    #[must_use]
    pub fn file_name(&self) -> String {
        let stem: String = self
            .name
            .trim()
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let stem = stem.trim_matches('.');
        if stem.is_empty() {
            "mapcutter.pdf".to_owned()
        } else {
            format!("{stem}.pdf")
        }
    }
}
