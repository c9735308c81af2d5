//! Panel layout: topologies, geometry and resize gestures.
//!
//! - `topology`: Arrangement shapes (`Topology`)
//! - `geometry`: Rectangles, dividers and grid structure derivation
//! - `resize`: Pure clamp and weight arithmetic
//! - `record`: Per-topology persisted sizing (`LayoutRecords`)
//! - `engine`: Applied sizing and drag state machine (`LayoutEngine`)

mod engine;
mod geometry;
mod record;
mod resize;
mod topology;

pub use engine::{LayoutEngine, LayoutError};
pub use geometry::{
    Axis, Divider, GridAxis, GridStructure, PanelRect, Point, Rect, distribute, grid_dimensions,
};
pub use record::{GridSizes, LayoutRecord, LayoutRecords, LinearWeights};
pub use resize::{clamp_pair, normalize_to_smallest, pair_weights, to_fractions};
pub use topology::Topology;
