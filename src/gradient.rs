//! Gradient paint descriptors.

use serde::{Deserialize, Serialize};

use crate::color::Color;

/// A point in the unit square of the painted shape's bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub struct UnitPoint {
    pub x: f64,
    pub y: f64,
}

impl UnitPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Direction of a linear gradient, as start and stop points.
///
/// When a gradient has no orientation, renderers paint it vertically from
/// top to bottom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub struct Orientation {
    pub start: UnitPoint,
    pub stop: UnitPoint,
}

impl Orientation {
    /// Top-center to bottom-center.
    pub const VERTICAL: Self = Self {
        start: UnitPoint::new(0.5, 0.0),
        stop: UnitPoint::new(0.5, 1.0),
    };

    /// Center to bottom-center, used for layers recolored with a flat color.
    pub const CENTER_TO_BOTTOM: Self = Self {
        start: UnitPoint::new(0.5, 0.5),
        stop: UnitPoint::new(0.5, 1.0),
    };

    /// Parses the catalog's `"sx,sy - tx,ty"` notation.
    ///
    /// Returns `None` for absent separators or non-numeric components.
    ///
    /// ```
    /// use icon_recomposer::{Orientation, UnitPoint};
    ///
    /// let o = Orientation::parse("0.500,0.000 - 0.500,1.000").unwrap();
    /// assert_eq!(o.stop, UnitPoint::new(0.5, 1.0));
    /// assert!(Orientation::parse("diagonal").is_none());
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        let (start, stop) = s.split_once(" - ")?;
        Some(Self {
            start: parse_point(start)?,
            stop: parse_point(stop)?,
        })
    }
}

fn parse_point(s: &str) -> Option<UnitPoint> {
    let mut parts = s.trim().split(',');
    let x = parts.next()?.trim().parse().ok()?;
    let y = parts.next()?.trim().parse().ok()?;
    Some(UnitPoint::new(x, y))
}

/// A resolved linear gradient with at least two stops.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    stops: Vec<Color>,
    pub orientation: Option<Orientation>,
}

impl Gradient {
    /// Builds a gradient from resolved stops.
    ///
    /// A single stop is duplicated so the result is always a valid two-stop
    /// gradient; no stops yields `None`.
    pub fn from_stops(mut stops: Vec<Color>, orientation: Option<Orientation>) -> Option<Self> {
        match stops.len() {
            0 => None,
            1 => {
                stops.push(stops[0]);
                Some(Self { stops, orientation })
            }
            _ => Some(Self { stops, orientation }),
        }
    }

    /// A flat color expressed as a degenerate two-stop gradient.
    pub fn solid(color: Color, orientation: Option<Orientation>) -> Self {
        Self {
            stops: vec![color, color],
            orientation,
        }
    }

    pub fn stops(&self) -> &[Color] {
        &self.stops
    }

    pub fn into_stops(self) -> Vec<Color> {
        self.stops
    }

    /// True when every stop is an extended-gray color.
    pub fn is_gray(&self) -> bool {
        self.stops.iter().all(Color::is_gray)
    }
}
