use super::geometry::{
    Axis, Divider, GridAxis, GridStructure, PanelRect, Point, Rect, distribute, grid_dimensions,
    stack,
};
use super::record::{GridSizes, LayoutRecord, LayoutRecords, LinearWeights};
use super::resize::{clamp_pair, normalize_to_smallest, pair_weights, to_fractions};
use super::topology::Topology;
use crate::config::AppConfig;
use crate::service::ServiceKey;
use crate::store::KeyValueStore;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Rejected resize gestures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    #[error("a resize drag is already in progress")]
    DragInProgress,

    #[error("no resize drag is in progress")]
    NoActiveDrag,

    #[error("gesture requires a {expected} layout but the active topology is {actual}")]
    TopologyMismatch {
        expected: &'static str,
        actual: Topology,
    },

    #[error("no divider at index {index}")]
    NoSuchDivider { index: usize },
}

/// Sizing currently applied on screen, as opposed to what is persisted.
#[derive(Debug, Clone, PartialEq)]
enum Applied {
    Equal,
    Linear(LinearWeights),
    Grid(GridSizes),
}

#[derive(Debug, Clone)]
enum ActiveDrag {
    Linear {
        axis: Axis,
        before: ServiceKey,
        after: ServiceKey,
        origin: f64,
        size_a: f64,
        size_b: f64,
    },
    Grid {
        axis: GridAxis,
        index: usize,
        origin: f64,
        sizes: Vec<f64>,
    },
}

/// Computes panel geometry and runs resize gestures for the active topology.
///
/// A gesture is `begin_*_drag` → any number of [`drag_to`](Self::drag_to) →
/// [`end_drag`](Self::end_drag). Only one gesture may be active and releasing
/// the pointer is the only way to finish it. Records are persisted at drag end
/// only.
pub struct LayoutEngine {
    records: LayoutRecords,
    topology: Topology,
    container: Rect,
    min_extent: f64,
    applied: Applied,
    drag: Option<ActiveDrag>,
}

impl LayoutEngine {
    pub fn new(store: Arc<dyn KeyValueStore>, config: &AppConfig, topology: Topology) -> Self {
        let records = LayoutRecords::new(store);
        let applied = applied_from(records.load(topology));
        Self {
            records,
            topology,
            container: Rect::default(),
            min_extent: config.min_panel_extent,
            applied,
            drag: None,
        }
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn container(&self) -> Rect {
        self.container
    }

    pub fn set_container(&mut self, container: Rect) {
        self.container = container;
    }

    pub fn min_extent(&self) -> f64 {
        self.min_extent
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn records(&self) -> &LayoutRecords {
        &self.records
    }

    /// Switches topology, dropping the applied sizing of the previous one
    /// and restoring the stored record of the new one (equal distribution
    /// when there is none). Persisted records are left untouched.
    pub fn set_topology(&mut self, topology: Topology) {
        if self.drag.take().is_some() {
            warn!("Topology changed mid-drag, drag discarded");
        }
        self.topology = topology;
        self.applied = applied_from(self.records.load(topology));
        debug!(%topology, restored = self.applied != Applied::Equal, "Layout topology set");
    }

    /// Current linear weights, if a linear record is applied.
    pub fn linear_weights(&self) -> Option<&LinearWeights> {
        match &self.applied {
            Applied::Linear(weights) => Some(weights),
            _ => None,
        }
    }

    /// Current grid sizes, if a grid record is applied.
    pub fn grid_sizes(&self) -> Option<&GridSizes> {
        match &self.applied {
            Applied::Grid(sizes) => Some(sizes),
            _ => None,
        }
    }

    // ============================================================================
    // Geometry
    // ============================================================================

    /// Rectangles for `visible` panels, in display order.
    pub fn panel_rects(&self, visible: &[ServiceKey]) -> Vec<PanelRect> {
        match self.topology {
            Topology::LinearHorizontal => self.linear_rects(visible, Axis::Horizontal),
            Topology::LinearVertical => self.linear_rects(visible, Axis::Vertical),
            Topology::Grid => self.grid_rects(visible),
        }
    }

    fn linear_rects(&self, visible: &[ServiceKey], axis: Axis) -> Vec<PanelRect> {
        let weights: Vec<f64> = visible
            .iter()
            .map(|service| match &self.applied {
                Applied::Linear(weights) => weights.get(service).copied().unwrap_or(1.0),
                _ => 1.0,
            })
            .collect();
        let extents = distribute(axis.extent(&self.container), &weights);
        stack(self.container, axis, visible, &extents)
    }

    fn grid_rects(&self, visible: &[ServiceKey]) -> Vec<PanelRect> {
        let (columns, rows) = grid_dimensions(visible.len());
        let (widths, heights) = self.grid_tracks(columns, rows);

        let column_starts = cumulative(self.container.x, &widths);
        let row_starts = cumulative(self.container.y, &heights);
        visible
            .iter()
            .enumerate()
            .map(|(i, service)| {
                let (row, column) = (i / columns, i % columns);
                PanelRect {
                    service: service.clone(),
                    rect: Rect::new(
                        column_starts[column],
                        row_starts[row],
                        widths[column],
                        heights[row],
                    ),
                }
            })
            .collect()
    }

    /// Pixel widths and heights of grid tracks; stored sizes apply only when
    /// they match the derived track counts.
    fn grid_tracks(&self, columns: usize, rows: usize) -> (Vec<f64>, Vec<f64>) {
        let (column_fr, row_fr) = match &self.applied {
            Applied::Grid(sizes) => (
                matching_or_equal(&sizes.column_sizes, columns),
                matching_or_equal(&sizes.row_sizes, rows),
            ),
            _ => (vec![1.0; columns], vec![1.0; rows]),
        };
        (
            distribute(self.container.width, &column_fr),
            distribute(self.container.height, &row_fr),
        )
    }

    /// Divider positions for the current geometry.
    ///
    /// Linear dividers sit at the trailing edge of each panel but the last.
    /// Grid dividers are recomputed from cumulative track sizes rather than
    /// tracked separately.
    pub fn dividers(&self, visible: &[ServiceKey]) -> Vec<Divider> {
        match self.topology {
            Topology::LinearHorizontal | Topology::LinearVertical => {
                let axis = linear_axis(self.topology);
                let rects = self.panel_rects(visible);
                rects
                    .iter()
                    .take(rects.len().saturating_sub(1))
                    .enumerate()
                    .map(|(index, panel)| Divider {
                        index,
                        axis,
                        position: axis.start(&panel.rect) + axis.extent(&panel.rect),
                    })
                    .collect()
            }
            Topology::Grid => {
                let (columns, rows) = grid_dimensions(visible.len());
                let (widths, heights) = self.grid_tracks(columns, rows);
                let mut dividers = inner_edges(self.container.x, &widths, Axis::Horizontal);
                dividers.extend(inner_edges(self.container.y, &heights, Axis::Vertical));
                dividers
            }
        }
    }

    // ============================================================================
    // Gestures
    // ============================================================================

    /// Starts dragging the divider after panel `divider` in a linear layout.
    ///
    /// `rects` are the rendered panel rectangles in display order.
    pub fn begin_linear_drag(
        &mut self,
        rects: &[PanelRect],
        divider: usize,
        pointer: Point,
    ) -> Result<(), LayoutError> {
        self.ensure_idle()?;
        if !self.topology.is_linear() {
            return Err(LayoutError::TopologyMismatch {
                expected: "linear",
                actual: self.topology,
            });
        }
        let (Some(a), Some(b)) = (rects.get(divider), rects.get(divider + 1)) else {
            return Err(LayoutError::NoSuchDivider { index: divider });
        };

        let axis = linear_axis(self.topology);
        let (size_a, size_b) = (axis.extent(&a.rect), axis.extent(&b.rect));

        // Rebase every weight on rendered extents so the dragged pair carries
        // a combined weight of 2 while siblings keep their pixel size.
        let pair = size_a + size_b;
        if pair > 0.0 {
            let weights = rects
                .iter()
                .map(|panel| (panel.service.clone(), axis.extent(&panel.rect) / pair * 2.0))
                .collect();
            self.applied = Applied::Linear(weights);
        }

        self.drag = Some(ActiveDrag::Linear {
            axis,
            before: a.service.clone(),
            after: b.service.clone(),
            origin: axis.coordinate(pointer),
            size_a,
            size_b,
        });
        debug!(divider, "Linear drag started");
        Ok(())
    }

    /// Starts dragging grid divider `divider` (between track `divider` and
    /// `divider + 1`) of the given family.
    pub fn begin_grid_drag(
        &mut self,
        rects: &[PanelRect],
        axis: GridAxis,
        divider: usize,
        pointer: Point,
    ) -> Result<(), LayoutError> {
        self.ensure_idle()?;
        if self.topology != Topology::Grid {
            return Err(LayoutError::TopologyMismatch {
                expected: "grid",
                actual: self.topology,
            });
        }
        let structure = GridStructure::derive(rects);
        let sizes = structure.sizes(axis).to_vec();
        if divider + 1 >= sizes.len() {
            return Err(LayoutError::NoSuchDivider { index: divider });
        }

        let measured = GridSizes {
            column_sizes: to_fractions(&structure.column_sizes),
            row_sizes: to_fractions(&structure.row_sizes),
        };
        match &self.applied {
            Applied::Grid(current)
                if current.column_sizes.len() == measured.column_sizes.len()
                    && current.row_sizes.len() == measured.row_sizes.len() => {}
            _ => self.applied = Applied::Grid(measured),
        }

        self.drag = Some(ActiveDrag::Grid {
            axis,
            index: divider,
            origin: axis.axis().coordinate(pointer),
            sizes,
        });
        debug!(divider, ?axis, "Grid drag started");
        Ok(())
    }

    /// Applies pointer movement to the active gesture.
    pub fn drag_to(&mut self, pointer: Point) -> Result<(), LayoutError> {
        let Some(drag) = &self.drag else {
            return Err(LayoutError::NoActiveDrag);
        };
        match drag {
            ActiveDrag::Linear {
                axis,
                before,
                after,
                origin,
                size_a,
                size_b,
            } => {
                let delta = axis.coordinate(pointer) - origin;
                let (a, b) = clamp_pair(*size_a, *size_b, delta, self.min_extent);
                let (weight_a, weight_b) = pair_weights(a, b);
                let (before, after) = (before.clone(), after.clone());

                if !matches!(self.applied, Applied::Linear(_)) {
                    self.applied = Applied::Linear(LinearWeights::new());
                }
                if let Applied::Linear(weights) = &mut self.applied {
                    weights.insert(before, weight_a);
                    weights.insert(after, weight_b);
                }
            }
            ActiveDrag::Grid {
                axis,
                index,
                origin,
                sizes,
            } => {
                let delta = axis.axis().coordinate(pointer) - origin;
                let (a, b) = clamp_pair(sizes[*index], sizes[*index + 1], delta, self.min_extent);
                let mut resized = sizes.clone();
                resized[*index] = a;
                resized[*index + 1] = b;
                let fractions = to_fractions(&resized);
                let axis = *axis;

                if let Applied::Grid(grid) = &mut self.applied {
                    match axis {
                        GridAxis::Columns => grid.column_sizes = fractions,
                        GridAxis::Rows => grid.row_sizes = fractions,
                    }
                }
            }
        }
        Ok(())
    }

    /// Finishes the active gesture and persists the topology's record.
    ///
    /// For linear layouts every visible panel's weight is recomputed from
    /// `rects` (its rendered extent), since siblings shift during a drag,
    /// and normalized so the smallest weight is 1. Persistence failures are
    /// logged; the applied layout stays in effect.
    pub fn end_drag(&mut self, rects: &[PanelRect]) -> Result<LayoutRecord, LayoutError> {
        let drag = self.drag.take().ok_or(LayoutError::NoActiveDrag)?;

        let record = match drag {
            ActiveDrag::Linear { axis, .. } => {
                let extents: Vec<(ServiceKey, f64)> = rects
                    .iter()
                    .map(|panel| (panel.service.clone(), axis.extent(&panel.rect)))
                    .collect();
                let weights = normalize_to_smallest(&extents);
                self.applied = Applied::Linear(weights.clone());
                LayoutRecord::Linear(weights)
            }
            ActiveDrag::Grid { .. } => match &self.applied {
                Applied::Grid(sizes) => LayoutRecord::Grid(sizes.clone()),
                _ => LayoutRecord::Grid(GridSizes::default()),
            },
        };

        if let Err(err) = self.records.save(self.topology, &record) {
            warn!(topology = %self.topology, error = %err, "Failed to persist layout record");
        }
        debug!(topology = %self.topology, "Drag finished");
        Ok(record)
    }

    /// Forgets the stored record of the active topology and returns to an
    /// equal distribution.
    pub fn reset(&mut self) {
        self.records.clear(self.topology);
        self.applied = Applied::Equal;
    }

    fn ensure_idle(&self) -> Result<(), LayoutError> {
        if self.drag.is_some() {
            return Err(LayoutError::DragInProgress);
        }
        Ok(())
    }
}

fn applied_from(record: Option<LayoutRecord>) -> Applied {
    match record {
        Some(LayoutRecord::Linear(weights)) => Applied::Linear(weights),
        Some(LayoutRecord::Grid(sizes)) => Applied::Grid(sizes),
        None => Applied::Equal,
    }
}

fn linear_axis(topology: Topology) -> Axis {
    match topology {
        Topology::LinearVertical => Axis::Vertical,
        Topology::LinearHorizontal | Topology::Grid => Axis::Horizontal,
    }
}

fn matching_or_equal(sizes: &[f64], count: usize) -> Vec<f64> {
    if sizes.len() == count && sizes.iter().all(|s| *s > 0.0) {
        sizes.to_vec()
    } else {
        vec![1.0; count]
    }
}

fn cumulative(start: f64, sizes: &[f64]) -> Vec<f64> {
    let mut offset = start;
    sizes
        .iter()
        .map(|size| {
            let current = offset;
            offset += size;
            current
        })
        .collect()
}

fn inner_edges(start: f64, sizes: &[f64], axis: Axis) -> Vec<Divider> {
    let mut offset = start;
    sizes
        .iter()
        .take(sizes.len().saturating_sub(1))
        .enumerate()
        .map(|(index, size)| {
            offset += size;
            Divider {
                index,
                axis,
                position: offset,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const EPS: f64 = 1e-6;

    #[derive(Default)]
    struct MapStore(Mutex<HashMap<String, String>>);

    impl KeyValueStore for MapStore {
        fn get(&self, key: &str) -> Option<String> {
            self.0.lock().unwrap().get(key).cloned()
        }

        fn set(&self, key: &str, value: &str) -> std::result::Result<(), StoreError> {
            self.0.lock().unwrap().insert(key.to_string(), value.to_string());
            Ok(())
        }

        fn remove(&self, key: &str) {
            self.0.lock().unwrap().remove(key);
        }
    }

    fn services(keys: &[&str]) -> Vec<ServiceKey> {
        keys.iter().map(|k| ServiceKey::new(*k)).collect()
    }

    fn engine(store: Arc<MapStore>, topology: Topology, container: Rect) -> LayoutEngine {
        let mut engine = LayoutEngine::new(store, &AppConfig::default(), topology);
        engine.set_container(container);
        engine
    }

    fn extents(rects: &[PanelRect], axis: Axis) -> Vec<f64> {
        rects.iter().map(|r| axis.extent(&r.rect)).collect()
    }

    #[test]
    fn test_equal_distribution_without_record() {
        let engine = engine(
            Arc::new(MapStore::default()),
            Topology::LinearHorizontal,
            Rect::new(0.0, 0.0, 900.0, 600.0),
        );
        let rects = engine.panel_rects(&services(&["a", "b", "c"]));
        assert_eq!(extents(&rects, Axis::Horizontal), vec![300.0, 300.0, 300.0]);
        assert_eq!(rects[2].rect.x, 600.0);
    }

    #[test]
    fn test_linear_drag_clamps_to_minimum() {
        let store = Arc::new(MapStore::default());
        let mut engine = engine(
            store.clone(),
            Topology::LinearHorizontal,
            Rect::new(0.0, 0.0, 1000.0, 600.0),
        );
        let visible = services(&["a", "b"]);
        let rects = engine.panel_rects(&visible);

        engine
            .begin_linear_drag(&rects, 0, Point::new(500.0, 300.0))
            .unwrap();
        engine.drag_to(Point::new(100.0, 300.0)).unwrap();

        let during = engine.panel_rects(&visible);
        assert!((during[0].rect.width - 150.0).abs() < EPS);
        assert!((during[1].rect.width - 850.0).abs() < EPS);
        let weights = engine.linear_weights().unwrap();
        let pair = weights[&ServiceKey::new("a")] + weights[&ServiceKey::new("b")];
        assert!((pair - 2.0).abs() < EPS);

        let record = engine.end_drag(&during).unwrap();
        let LayoutRecord::Linear(saved) = record else {
            panic!("expected linear record");
        };
        assert_eq!(saved[&ServiceKey::new("a")], 1.0);
        assert!((saved[&ServiceKey::new("b")] - 850.0 / 150.0).abs() < EPS);
        assert!(store.get("wrapper-sizes-horizontal").is_some());

        let after = engine.panel_rects(&visible);
        assert!((after[0].rect.width - 150.0).abs() < EPS);
    }

    #[test]
    fn test_linear_drag_sequence_respects_minimum() {
        let mut engine = engine(
            Arc::new(MapStore::default()),
            Topology::LinearVertical,
            Rect::new(0.0, 0.0, 800.0, 900.0),
        );
        let visible = services(&["a", "b", "c"]);

        for (divider, from, to) in [(0, 300.0, 20.0), (1, 600.0, 880.0), (0, 150.0, 700.0)] {
            let rects = engine.panel_rects(&visible);
            engine
                .begin_linear_drag(&rects, divider, Point::new(0.0, from))
                .unwrap();
            engine.drag_to(Point::new(0.0, to)).unwrap();
            let moved = engine.panel_rects(&visible);
            engine.end_drag(&moved).unwrap();

            let rects = engine.panel_rects(&visible);
            let heights = extents(&rects, Axis::Vertical);
            assert!((heights.iter().sum::<f64>() - 900.0).abs() < EPS);
            assert!(heights.iter().all(|h| *h >= 150.0 - EPS), "{heights:?}");
            let smallest = engine
                .linear_weights()
                .unwrap()
                .values()
                .copied()
                .fold(f64::INFINITY, f64::min);
            assert!((smallest - 1.0).abs() < EPS);
        }
    }

    #[test]
    fn test_linear_drag_on_narrow_pair_keeps_layout() {
        let mut engine = engine(
            Arc::new(MapStore::default()),
            Topology::LinearHorizontal,
            Rect::new(0.0, 0.0, 240.0, 600.0),
        );
        let visible = services(&["a", "b"]);
        let rects = engine.panel_rects(&visible);

        engine
            .begin_linear_drag(&rects, 0, Point::new(120.0, 300.0))
            .unwrap();
        engine.drag_to(Point::new(120.0, 300.0)).unwrap();
        assert_eq!(
            extents(&engine.panel_rects(&visible), Axis::Horizontal),
            vec![120.0, 120.0]
        );

        engine.drag_to(Point::new(20.0, 300.0)).unwrap();
        let during = engine.panel_rects(&visible);
        assert_eq!(extents(&during, Axis::Horizontal), vec![120.0, 120.0]);
        let weights = engine.linear_weights().unwrap();
        assert!(weights.values().all(|w| *w > 0.0));

        let LayoutRecord::Linear(saved) = engine.end_drag(&during).unwrap() else {
            panic!("expected linear record");
        };
        assert_eq!(saved[&ServiceKey::new("a")], 1.0);
        assert_eq!(saved[&ServiceKey::new("b")], 1.0);
    }

    #[test]
    fn test_linear_drag_in_crowded_container() {
        let mut engine = engine(
            Arc::new(MapStore::default()),
            Topology::LinearHorizontal,
            Rect::new(0.0, 0.0, 300.0, 600.0),
        );
        let visible = services(&["a", "b", "c"]);
        let rects = engine.panel_rects(&visible);

        engine
            .begin_linear_drag(&rects, 1, Point::new(200.0, 0.0))
            .unwrap();
        engine.drag_to(Point::new(290.0, 0.0)).unwrap();
        let widths = extents(&engine.panel_rects(&visible), Axis::Horizontal);
        for (width, expected) in widths.iter().zip([100.0, 100.0, 100.0]) {
            assert!((width - expected).abs() < EPS);
        }
        engine.end_drag(&rects).unwrap();

        // Room for both sides of the pair once the container grows.
        engine.set_container(Rect::new(0.0, 0.0, 480.0, 600.0));
        let rects = engine.panel_rects(&visible);
        engine
            .begin_linear_drag(&rects, 0, Point::new(160.0, 0.0))
            .unwrap();
        engine.drag_to(Point::new(400.0, 0.0)).unwrap();
        let widths = extents(&engine.panel_rects(&visible), Axis::Horizontal);
        assert!((widths[0] - 170.0).abs() < EPS);
        assert!((widths[1] - 150.0).abs() < EPS);
        assert!((widths[2] - 160.0).abs() < EPS);
    }

    #[test]
    fn test_grid_drag_on_narrow_columns_keeps_sizes() {
        let mut engine = engine(
            Arc::new(MapStore::default()),
            Topology::Grid,
            Rect::new(0.0, 0.0, 260.0, 400.0),
        );
        let visible = services(&["a", "b", "c", "d"]);
        let rects = engine.panel_rects(&visible);

        engine
            .begin_grid_drag(&rects, GridAxis::Columns, 0, Point::new(130.0, 0.0))
            .unwrap();
        engine.drag_to(Point::new(10.0, 0.0)).unwrap();
        let sizes = engine.grid_sizes().unwrap();
        assert_eq!(sizes.column_sizes, vec![1.0, 1.0]);

        let widths = extents(&engine.panel_rects(&visible), Axis::Horizontal);
        assert!(widths.iter().all(|w| (w - 130.0).abs() < EPS));
    }

    #[test]
    fn test_only_one_drag_at_a_time() {
        let mut engine = engine(
            Arc::new(MapStore::default()),
            Topology::LinearHorizontal,
            Rect::new(0.0, 0.0, 1000.0, 600.0),
        );
        let rects = engine.panel_rects(&services(&["a", "b", "c"]));
        assert!(!engine.is_dragging());
        engine.begin_linear_drag(&rects, 0, Point::default()).unwrap();
        assert!(engine.is_dragging());
        assert_eq!(
            engine.begin_linear_drag(&rects, 1, Point::default()),
            Err(LayoutError::DragInProgress)
        );
        assert_eq!(
            engine.begin_grid_drag(&rects, GridAxis::Columns, 0, Point::default()),
            Err(LayoutError::DragInProgress)
        );
        engine.end_drag(&rects).unwrap();
        assert!(!engine.is_dragging());
        assert_eq!(engine.drag_to(Point::default()), Err(LayoutError::NoActiveDrag));
        assert_eq!(
            engine.begin_linear_drag(&rects, 2, Point::default()),
            Err(LayoutError::NoSuchDivider { index: 2 })
        );
    }

    #[test]
    fn test_grid_column_drag_conserves_pair() {
        let store = Arc::new(MapStore::default());
        let mut engine = engine(store.clone(), Topology::Grid, Rect::new(0.0, 0.0, 900.0, 600.0));
        let visible = services(&["a", "b", "c", "d", "e"]);
        let rects = engine.panel_rects(&visible);
        assert_eq!(GridStructure::derive(&rects).columns(), 3);
        assert_eq!(GridStructure::derive(&rects).rows(), 2);

        engine
            .begin_grid_drag(&rects, GridAxis::Columns, 1, Point::new(600.0, 10.0))
            .unwrap();
        let before = engine.grid_sizes().unwrap().column_sizes.clone();
        engine.drag_to(Point::new(880.0, 10.0)).unwrap();
        let after = engine.grid_sizes().unwrap().column_sizes.clone();

        assert!((before[1] + before[2] - (after[1] + after[2])).abs() < EPS);
        assert!((after[0] - before[0]).abs() < EPS);

        let rects = engine.panel_rects(&visible);
        let structure = GridStructure::derive(&rects);
        assert!((structure.column_sizes[2] - 150.0).abs() < EPS);
        assert!((structure.column_sizes[1] - 450.0).abs() < EPS);

        let dividers = engine.dividers(&visible);
        let columns: Vec<f64> = dividers
            .iter()
            .filter(|d| d.axis == Axis::Horizontal)
            .map(|d| d.position)
            .collect();
        assert!((columns[0] - 300.0).abs() < EPS);
        assert!((columns[1] - 750.0).abs() < EPS);

        let record = engine.end_drag(&rects).unwrap();
        assert!(matches!(record, LayoutRecord::Grid(_)));
        assert!(store.get("wrapper-sizes-grid").unwrap().contains("columnSizes"));
    }

    #[test]
    fn test_grid_row_drag_moves_rows_only() {
        let mut engine = engine(
            Arc::new(MapStore::default()),
            Topology::Grid,
            Rect::new(0.0, 0.0, 800.0, 800.0),
        );
        let visible = services(&["a", "b", "c", "d"]);
        let rects = engine.panel_rects(&visible);
        engine
            .begin_grid_drag(&rects, GridAxis::Rows, 0, Point::new(10.0, 400.0))
            .unwrap();
        engine.drag_to(Point::new(10.0, 500.0)).unwrap();

        let sizes = engine.grid_sizes().unwrap();
        assert_eq!(sizes.column_sizes, vec![1.0, 1.0]);
        assert!((sizes.row_sizes[0] - 1.25).abs() < EPS);
        assert!((sizes.row_sizes[1] - 0.75).abs() < EPS);
    }

    #[test]
    fn test_topology_switch_restores_each_record() {
        let store = Arc::new(MapStore::default());
        let mut engine = engine(
            store.clone(),
            Topology::LinearHorizontal,
            Rect::new(0.0, 0.0, 1000.0, 1000.0),
        );
        let visible = services(&["a", "b"]);
        let rects = engine.panel_rects(&visible);
        engine.begin_linear_drag(&rects, 0, Point::new(500.0, 0.0)).unwrap();
        engine.drag_to(Point::new(700.0, 0.0)).unwrap();
        let moved = engine.panel_rects(&visible);
        engine.end_drag(&moved).unwrap();

        engine.set_topology(Topology::LinearVertical);
        assert!(engine.linear_weights().is_none());
        let rects = engine.panel_rects(&visible);
        assert_eq!(extents(&rects, Axis::Vertical), vec![500.0, 500.0]);

        engine.set_topology(Topology::LinearHorizontal);
        let rects = engine.panel_rects(&visible);
        assert!((rects[0].rect.width - 700.0).abs() < EPS);

        let reloaded = LayoutEngine::new(store, &AppConfig::default(), Topology::LinearHorizontal);
        assert_eq!(reloaded.linear_weights(), engine.linear_weights());
    }

    #[test]
    fn test_mismatched_grid_record_falls_back_to_equal() {
        let store = Arc::new(MapStore::default());
        store
            .set(
                "wrapper-sizes-grid",
                r#"{"columnSizes":[1.5,0.5],"rowSizes":[1.0]}"#,
            )
            .unwrap();
        let engine = engine(store, Topology::Grid, Rect::new(0.0, 0.0, 900.0, 900.0));

        let three = engine.panel_rects(&services(&["a", "b", "c", "d", "e"]));
        assert!((three[0].rect.width - 300.0).abs() < EPS);

        let two = engine.panel_rects(&services(&["a", "b"]));
        assert!((two[0].rect.width - 675.0).abs() < EPS);
    }

    #[test]
    fn test_gesture_requires_matching_topology() {
        let mut engine = engine(
            Arc::new(MapStore::default()),
            Topology::Grid,
            Rect::new(0.0, 0.0, 900.0, 900.0),
        );
        let rects = engine.panel_rects(&services(&["a", "b"]));
        assert!(matches!(
            engine.begin_linear_drag(&rects, 0, Point::default()),
            Err(LayoutError::TopologyMismatch { .. })
        ));
    }
}
