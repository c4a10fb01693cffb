use crate::geometry::Axis;
use ndarray::{Array1, ArrayView1};
use rustfft::num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use std::f64::consts::PI;
use std::sync::Arc;

/// Symmetry of a profile under reflection at the walls of the axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Parity {
    Even,
    Odd,
}

/// Discrete Fourier transform of a profile on a cell-centred grid.
///
/// The profile is mirrored at the edge of the last cell, so the
/// transform operates on `2N` points. Both FFT plans are created once
/// and shared between all convolutions.
pub(super) struct MirrorTransform {
    points: usize,
    fft: Arc<dyn Fft<f64>>,
    ifft: Arc<dyn Fft<f64>>,
}

impl MirrorTransform {
    /// Plan the transforms and return the wave numbers of the extended grid.
    pub(super) fn new(axis: &Axis) -> (Self, Array1<f64>) {
        let points = axis.points();
        let n = 2 * points;
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(n);
        let ifft = planner.plan_fft_inverse(n);
        let dk = PI / axis.length();
        let k = Array1::from_shape_fn(n, |m| {
            if m <= points {
                m as f64 * dk
            } else {
                (m as f64 - n as f64) * dk
            }
        });
        (Self { points, fft, ifft }, k)
    }

    /// Index of the Nyquist frequency in the wave number array.
    pub(super) fn nyquist(&self) -> usize {
        self.points
    }

    pub(super) fn forward(&self, f: ArrayView1<f64>, parity: Parity) -> Array1<Complex64> {
        let sign = match parity {
            Parity::Even => 1.0,
            Parity::Odd => -1.0,
        };
        let mut buffer: Vec<_> = f
            .iter()
            .map(|&x| Complex64::new(x, 0.0))
            .chain(f.iter().rev().map(|&x| Complex64::new(sign * x, 0.0)))
            .collect();
        self.fft.process(&mut buffer);
        Array1::from_vec(buffer)
    }

    /// Inverse transform, restricted to the original (unmirrored) grid.
    pub(super) fn back(&self, f_k: Array1<Complex64>) -> Array1<f64> {
        let mut buffer = f_k.into_raw_vec();
        self.ifft.process(&mut buffer);
        let norm = (2 * self.points) as f64;
        buffer[..self.points].iter().map(|c| c.re / norm).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn forward_and_back() -> phasekit_core::EosResult<()> {
        let axis = Axis::new_cartesian(16, 4.0)?;
        let (transform, k) = MirrorTransform::new(&axis);
        assert_eq!(k.len(), 32);
        assert_relative_eq!(k[16], PI * 4.0);
        assert_relative_eq!(k[31], -PI / 4.0);
        let f = axis.grid.mapv(|z| (-z * z).exp());
        for parity in [Parity::Even, Parity::Odd] {
            let f2 = transform.back(transform.forward(f.view(), parity));
            assert_relative_eq!(f, f2, epsilon = 1e-14);
        }
        Ok(())
    }
}
