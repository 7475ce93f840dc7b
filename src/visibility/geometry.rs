//! Rectangles, viewport margins and intersection ratios

use crate::error::MediaError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Axis-aligned rectangle in layout pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Whether a point lies inside or on the edge of this rectangle
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.x && x <= self.right() && y >= self.y && y <= self.bottom()
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if right < left || bottom < top {
            None
        } else {
            Some(Rect::new(left, top, right - left, bottom - top))
        }
    }
}

/// Fraction of `target` that lies within `root`, in `0.0..=1.0`
///
/// A zero-area target counts as fully visible when it sits inside `root`.
pub fn intersection_ratio(target: &Rect, root: &Rect) -> f64 {
    let area = target.area();
    if area == 0.0 {
        return if root.contains_point(target.x, target.y) {
            1.0
        } else {
            0.0
        };
    }

    target
        .intersection(root)
        .map_or(0.0, |overlap| (overlap.area() / area).clamp(0.0, 1.0))
}

/// One side of a root margin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MarginValue {
    Px(f64),
    /// Percentage of the viewport dimension on the same axis
    Percent(f64),
}

impl MarginValue {
    fn resolve(&self, extent: f64) -> f64 {
        match self {
            MarginValue::Px(px) => *px,
            MarginValue::Percent(pct) => extent * pct / 100.0,
        }
    }
}

impl fmt::Display for MarginValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarginValue::Px(px) => write!(f, "{}px", px),
            MarginValue::Percent(pct) => write!(f, "{}%", pct),
        }
    }
}

impl FromStr for MarginValue {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MediaError::Config(format!("invalid root margin value: {:?}", s));

        if let Some(px) = s.strip_suffix("px") {
            px.parse().map(MarginValue::Px).map_err(|_| invalid())
        } else if let Some(pct) = s.strip_suffix('%') {
            pct.parse().map(MarginValue::Percent).map_err(|_| invalid())
        } else if s.parse::<f64>().ok() == Some(0.0) {
            Ok(MarginValue::Px(0.0))
        } else {
            Err(invalid())
        }
    }
}

/// Viewport expansion in CSS margin order: top, right, bottom, left
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RootMargin {
    pub top: MarginValue,
    pub right: MarginValue,
    pub bottom: MarginValue,
    pub left: MarginValue,
}

impl RootMargin {
    pub const fn uniform_px(px: f64) -> Self {
        Self {
            top: MarginValue::Px(px),
            right: MarginValue::Px(px),
            bottom: MarginValue::Px(px),
            left: MarginValue::Px(px),
        }
    }

    /// Grow `viewport` by this margin (negative values shrink it)
    pub fn expand(&self, viewport: &Rect) -> Rect {
        let top = self.top.resolve(viewport.height);
        let bottom = self.bottom.resolve(viewport.height);
        let left = self.left.resolve(viewport.width);
        let right = self.right.resolve(viewport.width);

        Rect::new(
            viewport.x - left,
            viewport.y - top,
            (viewport.width + left + right).max(0.0),
            (viewport.height + top + bottom).max(0.0),
        )
    }
}

impl Default for RootMargin {
    fn default() -> Self {
        Self::uniform_px(0.0)
    }
}

impl FromStr for RootMargin {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split_whitespace()
            .map(str::parse)
            .collect::<Result<Vec<MarginValue>, _>>()?;

        let (top, right, bottom, left) = match values.as_slice() {
            [all] => (*all, *all, *all, *all),
            [vertical, horizontal] => (*vertical, *horizontal, *vertical, *horizontal),
            [top, horizontal, bottom] => (*top, *horizontal, *bottom, *horizontal),
            [top, right, bottom, left] => (*top, *right, *bottom, *left),
            _ => {
                return Err(MediaError::Config(format!(
                    "root margin must have 1 to 4 values: {:?}",
                    s
                )))
            }
        };

        Ok(Self {
            top,
            right,
            bottom,
            left,
        })
    }
}

impl fmt::Display for RootMargin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.top, self.right, self.bottom, self.left)
    }
}

impl TryFrom<String> for RootMargin {
    type Error = MediaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RootMargin> for String {
    fn from(margin: RootMargin) -> Self {
        margin.to_string()
    }
}
