//! Visibility-driven loading triggers
//!
//! Off-browser, the host application reports viewport and placeholder
//! geometry and [`VisibilityTracker`] decides when each placeholder has
//! entered the (margin-expanded) viewport.

pub mod geometry;
pub mod tracker;

pub use geometry::{intersection_ratio, MarginValue, Rect, RootMargin};
pub use tracker::{TriggerHandle, TriggerOptions, VisibilityTracker};
