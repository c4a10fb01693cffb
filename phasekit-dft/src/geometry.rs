use ndarray::Array1;
use phasekit_core::{EosError, EosResult};

/// Smallest number of grid points of an axis.
const MIN_POINTS: usize = 8;

/// An equidistant, cell-centred cartesian axis.
///
/// Grid points sit in the middle of the cells, so the first point is
/// half a cell away from the edge at `z = 0`.
#[derive(Clone, Debug)]
pub struct Axis {
    pub grid: Array1<f64>,
    pub edges: Array1<f64>,
    integration_weights: Array1<f64>,
}

impl Axis {
    /// Create a new (equidistant) cartesian axis.
    pub fn new_cartesian(points: usize, length: f64) -> EosResult<Self> {
        if points < MIN_POINTS {
            return Err(EosError::InvalidGrid(format!(
                "at least {MIN_POINTS} grid points are required, got {points}"
            )));
        }
        if !(length.is_finite() && length > 0.0) {
            return Err(EosError::InvalidGrid(format!(
                "the length of the axis has to be positive, got {length}"
            )));
        }
        let cell_size = length / points as f64;
        let grid = Array1::linspace(0.5 * cell_size, length - 0.5 * cell_size, points);
        let edges = Array1::linspace(0.0, length, points + 1);
        let integration_weights = Array1::from_elem(points, cell_size);
        Ok(Self {
            grid,
            edges,
            integration_weights,
        })
    }

    /// Number of grid points.
    pub fn points(&self) -> usize {
        self.grid.len()
    }

    /// Returns the total length of the axis.
    pub fn length(&self) -> f64 {
        self.edges[self.grid.len()] - self.edges[0]
    }

    /// Width of a single cell.
    pub fn cell_size(&self) -> f64 {
        self.length() / self.points() as f64
    }

    pub fn integration_weights(&self) -> &Array1<f64> {
        &self.integration_weights
    }

    /// Integral of a function that is given at the grid points (midpoint rule).
    pub fn integrate(&self, f: &Array1<f64>) -> f64 {
        (f * &self.integration_weights).sum()
    }
}
