//! Map layers derived from a session and their display styles.
//!
//! Every layer kind maps to exactly one [`LayerStyle`] through
//! [`LayerKind::style`], so renderers never branch on layer names.

use std::fmt;

use geojson::{FeatureCollection, JsonObject};
use serde::{Deserialize, Serialize};

/// The data layers shown on the map, in draw order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    /// The track lines.
    Route,
    /// Sheet outlines.
    Cutouts,
    /// Distance markers along the route.
    Milemarkers,
    /// Points of interest from the track file.
    Waypoints,
    /// Steep sections of the route.
    Slopes,
}

impl LayerKind {
    /// All layers, bottom to top.
    pub const ALL: [Self; 5] = [
        Self::Route,
        Self::Slopes,
        Self::Cutouts,
        Self::Milemarkers,
        Self::Waypoints,
    ];

    /// Stable layer identifier.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Route => "route",
            Self::Cutouts => "cutouts",
            Self::Milemarkers => "milemarkers",
            Self::Waypoints => "waypoints",
            Self::Slopes => "slopes",
        }
    }

    /// Display style of the layer.
    #[must_use]
    pub const fn style(self) -> LayerStyle {
        match self {
            Self::Route => LayerStyle::line(Rgb(0xff, 0x69, 0xb4), 3.0, 0.6, None),
            Self::Cutouts => LayerStyle::line(Rgb(0x44, 0x44, 0x44), 2.0, 0.6, Some((3.0, 2.0))),
            Self::Slopes => LayerStyle::line(Rgb(0xe3, 0x4a, 0x33), 5.0, 0.8, None),
            Self::Milemarkers => LayerStyle::symbol(Rgb(0x22, 0x22, 0x22), "marker-11", "{title} km"),
            Self::Waypoints => LayerStyle::symbol(Rgb(0x1f, 0x78, 0xb4), "{symbol}", "{title}"),
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// An sRGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// CSS hex notation, e.g. `#ff69b4`.
    #[must_use]
    pub fn hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

/// How features of a layer are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Paint {
    /// Stroked line geometry.
    Line {
        /// Stroke width in CSS pixels.
        width: f32,
        /// Dash and gap length in multiples of the width.
        dash: Option<(f32, f32)>,
    },
    /// Point geometry drawn as an icon with a text label.
    Symbol {
        /// Icon name template.
        icon: &'static str,
        /// Label template.
        label: &'static str,
    },
}

/// Display style of one layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LayerStyle {
    /// Main color.
    pub color: Rgb,
    /// Opacity in `[0, 1]`.
    pub opacity: f32,
    /// Geometry paint.
    pub paint: Paint,
}

impl LayerStyle {
    const fn line(color: Rgb, width: f32, opacity: f32, dash: Option<(f32, f32)>) -> Self {
        Self {
            color,
            opacity,
            paint: Paint::Line { width, dash },
        }
    }

    const fn symbol(color: Rgb, icon: &'static str, label: &'static str) -> Self {
        Self {
            color,
            opacity: 1.0,
            paint: Paint::Symbol { icon, label },
        }
    }

    /// Label text for a feature with `properties`, or `None` for line
    /// layers.
    #[must_use]
    pub fn label(&self, properties: Option<&JsonObject>) -> Option<String> {
        match self.paint {
            Paint::Symbol { label, .. } => Some(expand_template(label, properties)),
            Paint::Line { .. } => None,
        }
    }
}

/// Replace `{key}` placeholders with property values. Missing keys
/// expand to the empty string.
#[must_use]
pub fn expand_template(template: &str, properties: Option<&JsonObject>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };
        let key = &after[..close];
        if let Some(value) = properties.and_then(|p| p.get(key)) {
            match value {
                serde_json::Value::String(s) => out.push_str(s),
                serde_json::Value::Null => {}
                other => out.push_str(&other.to_string()),
            }
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    out
}

/// Layer data ready to hand to a map widget.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    /// Which layer this is.
    pub kind: LayerKind,
    /// Features of the layer.
    pub data: FeatureCollection,
}

impl Layer {
    /// Style of this layer.
    #[must_use]
    pub const fn style(&self) -> LayerStyle {
        self.kind.style()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_a_unique_id() {
        let mut ids: Vec<_> = LayerKind::ALL.iter().map(|k| k.id()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), LayerKind::ALL.len());
    }

    #[test]
    fn route_and_cutout_styles() {
        let route = LayerKind::Route.style();
        assert_eq!(route.color.hex(), "#ff69b4");
        assert_eq!(route.paint, Paint::Line { width: 3.0, dash: None });

        let cutouts = LayerKind::Cutouts.style();
        assert_eq!(cutouts.color.hex(), "#444444");
        assert_eq!(
            cutouts.paint,
            Paint::Line {
                width: 2.0,
                dash: Some((3.0, 2.0))
            }
        );
    }

    #[test]
    fn milemarker_label_appends_unit() {
        let mut properties = JsonObject::new();
        properties.insert("title".into(), 12.5.into());
        assert_eq!(
            LayerKind::Milemarkers.style().label(Some(&properties)),
            Some("12.5 km".to_owned())
        );
        assert_eq!(LayerKind::Route.style().label(Some(&properties)), None);
    }

    #[test]
    fn template_expansion() {
        let mut properties = JsonObject::new();
        properties.insert("title".into(), "Hut".into());
        assert_eq!(expand_template("{title}", Some(&properties)), "Hut");
        assert_eq!(expand_template("{symbol}-x", Some(&properties)), "-x");
        assert_eq!(expand_template("a {b", None), "a {b");
        assert_eq!(expand_template("plain", None), "plain");
    }
}
