//! Panel geometry.
//!
//! Rectangles are measurement inputs for the resize algorithms. The model of
//! record is the visible panel order plus the topology; grid rows and columns
//! are derived from rectangles only for the duration of one gesture.

use crate::service::ServiceKey;

/// Coordinates closer than this are treated as the same grid line.
const EDGE_TOLERANCE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
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
}

/// Direction along which a linear layout distributes space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Horizontal,
    Vertical,
}

impl Axis {
    pub fn extent(self, rect: &Rect) -> f64 {
        match self {
            Self::Horizontal => rect.width,
            Self::Vertical => rect.height,
        }
    }

    pub fn start(self, rect: &Rect) -> f64 {
        match self {
            Self::Horizontal => rect.x,
            Self::Vertical => rect.y,
        }
    }

    pub fn coordinate(self, point: Point) -> f64 {
        match self {
            Self::Horizontal => point.x,
            Self::Vertical => point.y,
        }
    }
}

/// Which family of grid dividers a gesture moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridAxis {
    /// Vertical dividers between columns; moves along x.
    Columns,
    /// Horizontal dividers between rows; moves along y.
    Rows,
}

impl GridAxis {
    pub fn axis(self) -> Axis {
        match self {
            Self::Columns => Axis::Horizontal,
            Self::Rows => Axis::Vertical,
        }
    }
}

/// Rendered rectangle of one visible panel.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelRect {
    pub service: ServiceKey,
    pub rect: Rect,
}

/// A divider between two adjacent tracks (panels, columns or rows).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Divider {
    /// Index of the track before the divider.
    pub index: usize,
    pub axis: Axis,
    /// Coordinate of the divider along `axis`.
    pub position: f64,
}

/// Columns and rows of a grid as derived from panel corners.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GridStructure {
    /// Column left edges, ascending.
    pub column_starts: Vec<f64>,
    /// Column widths, parallel to `column_starts`.
    pub column_sizes: Vec<f64>,
    /// Row top edges, ascending.
    pub row_starts: Vec<f64>,
    /// Row heights, parallel to `row_starts`.
    pub row_sizes: Vec<f64>,
}

impl GridStructure {
    /// Reads the grid off the top-left corners of `rects`: distinct left edges
    /// are columns, distinct top edges are rows. A track's size is the largest
    /// extent of any panel starting on it.
    pub fn derive(rects: &[PanelRect]) -> Self {
        let (column_starts, column_sizes) =
            tracks(rects.iter().map(|r| (r.rect.x, r.rect.width)));
        let (row_starts, row_sizes) = tracks(rects.iter().map(|r| (r.rect.y, r.rect.height)));
        Self {
            column_starts,
            column_sizes,
            row_starts,
            row_sizes,
        }
    }

    pub fn sizes(&self, axis: GridAxis) -> &[f64] {
        match axis {
            GridAxis::Columns => &self.column_sizes,
            GridAxis::Rows => &self.row_sizes,
        }
    }

    pub fn columns(&self) -> usize {
        self.column_starts.len()
    }

    pub fn rows(&self) -> usize {
        self.row_starts.len()
    }
}

fn tracks(edges: impl Iterator<Item = (f64, f64)>) -> (Vec<f64>, Vec<f64>) {
    let mut pairs: Vec<(f64, f64)> = edges.collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut starts: Vec<f64> = Vec::new();
    let mut sizes: Vec<f64> = Vec::new();
    for (start, size) in pairs {
        match starts.last() {
            Some(last) if (start - last).abs() <= EDGE_TOLERANCE => {
                if let Some(current) = sizes.last_mut() {
                    *current = current.max(size);
                }
            }
            _ => {
                starts.push(start);
                sizes.push(size);
            }
        }
    }
    (starts, sizes)
}

/// Column and row counts for `panels` cells, filled row-major.
pub fn grid_dimensions(panels: usize) -> (usize, usize) {
    if panels == 0 {
        return (0, 0);
    }
    let columns = (panels as f64).sqrt().ceil() as usize;
    let rows = panels.div_ceil(columns);
    (columns, rows)
}

/// Splits `total` proportionally to `weights`.
pub fn distribute(total: f64, weights: &[f64]) -> Vec<f64> {
    let sum: f64 = weights.iter().sum();
    if weights.is_empty() || sum <= 0.0 {
        let count = weights.len().max(1) as f64;
        return vec![total / count; weights.len()];
    }
    weights.iter().map(|w| total * w / sum).collect()
}

/// Lays `extents` end to end along `axis` inside `container`.
pub fn stack(
    container: Rect,
    axis: Axis,
    services: &[ServiceKey],
    extents: &[f64],
) -> Vec<PanelRect> {
    let mut offset = axis.start(&container);
    services
        .iter()
        .zip(extents)
        .map(|(service, extent)| {
            let rect = match axis {
                Axis::Horizontal => Rect::new(offset, container.y, *extent, container.height),
                Axis::Vertical => Rect::new(container.x, offset, container.width, *extent),
            };
            offset += extent;
            PanelRect {
                service: service.clone(),
                rect,
            }
        })
        .collect()
}
