use crate::geometry::Axis;
use crate::weight_functions::*;
use ndarray::prelude::*;
use ndarray::Zip;
use num_dual::DualNum;
use rustfft::num_complex::Complex64;
use std::sync::Arc;

mod transform;
use transform::{MirrorTransform, Parity};

/// Trait for numerical convolutions for DFT.
///
/// Covers calculation of weighted densities & functional derivatives
/// from density profiles & profiles of the partial derivatives of the
/// Helmholtz energy functional. All arrays are (segments or weighted
/// densities) × grid points.
pub trait Convolver<T>: Send + Sync {
    /// Calculate weighted densities via convolution from density profiles.
    fn weighted_densities(&self, density: &Array2<T>) -> Vec<Array2<T>>;

    /// Calculate the functional derivative via convolution from partial derivatives
    /// of the Helmholtz energy functional.
    fn functional_derivative(&self, partial_derivatives: &[Array2<T>]) -> Array2<T>;
}

/// Convolver for homogeneous systems.
///
/// Every grid point is treated as an independent bulk phase, i.e.,
/// the weight functions reduce to their weight constants.
pub struct BulkConvolver<T> {
    weight_constants: Vec<Array2<T>>,
}

impl<T: DualNum<f64> + Copy + Send + Sync + 'static> BulkConvolver<T> {
    pub fn new(weight_functions: Vec<WeightFunctionInfo<T>>) -> Arc<dyn Convolver<T>> {
        let weight_constants = weight_functions
            .into_iter()
            .map(|w| w.weight_constants(T::zero(), 0))
            .collect();
        Arc::new(Self { weight_constants })
    }
}

fn matmul<T: DualNum<f64> + Copy>(a: ArrayView2<T>, b: ArrayView2<T>) -> Array2<T> {
    Array2::from_shape_fn((a.nrows(), b.ncols()), |(i, j)| {
        a.row(i)
            .iter()
            .zip(b.column(j))
            .fold(T::zero(), |acc, (&x, &y)| acc + x * y)
    })
}

impl<T: DualNum<f64> + Copy + Send + Sync> Convolver<T> for BulkConvolver<T> {
    fn weighted_densities(&self, density: &Array2<T>) -> Vec<Array2<T>> {
        self.weight_constants
            .iter()
            .map(|w| matmul(w.view(), density.view()))
            .collect()
    }

    fn functional_derivative(&self, partial_derivatives: &[Array2<T>]) -> Array2<T> {
        let segments = self.weight_constants.first().map_or(0, |w| w.ncols());
        let points = partial_derivatives.first().map_or(0, |pd| pd.ncols());
        let mut functional_deriv = Array2::zeros((segments, points));
        for (w, pd) in self.weight_constants.iter().zip(partial_derivatives) {
            let df = matmul(w.t(), pd.view());
            Zip::from(&mut functional_deriv)
                .and(&df)
                .for_each(|f, &df| *f = *f + df);
        }
        functional_deriv
    }
}

/// Tabulated Fourier transforms of the weight functions of a single contribution.
struct FFTWeightFunctions {
    segments: usize,
    local_density: bool,
    scalar_component_weighted_densities: Vec<Array2<f64>>,
    vector_component_weighted_densities: Vec<Array2<f64>>,
    scalar_fmt_weighted_densities: Vec<Array2<f64>>,
    vector_fmt_weighted_densities: Vec<Array2<f64>>,
}

impl FFTWeightFunctions {
    fn n_weighted_densities(&self) -> usize {
        (if self.local_density { self.segments } else { 0 })
            + (self.scalar_component_weighted_densities.len()
                + self.vector_component_weighted_densities.len())
                * self.segments
            + self.scalar_fmt_weighted_densities.len()
            + self.vector_fmt_weighted_densities.len()
    }
}

/// Factor that turns the tabulated (real) weights into the complex kernel.
///
/// Vector kernels are odd and purely imaginary. Their adjoint, used in
/// the functional derivative, is the complex conjugate.
const SCALAR: Complex64 = Complex64::new(1.0, 0.0);
const VECTOR: Complex64 = Complex64::new(0.0, 1.0);
const VECTOR_ADJOINT: Complex64 = Complex64::new(0.0, -1.0);

fn add_product(
    acc: &mut Array1<Complex64>,
    f_k: &Array1<Complex64>,
    w: ArrayView1<f64>,
    factor: Complex64,
) {
    Zip::from(acc)
        .and(f_k)
        .and(w)
        .for_each(|a, &f, &w| *a += f * factor * w);
}

/// Convolver for planar 1-D systems that computes convolutions in
/// Fourier space.
///
/// The profiles are mirrored at both walls so that bulk phases at the
/// edges of the grid are continued smoothly.
pub struct ConvolverFFT {
    transform: MirrorTransform,
    weight_functions: Vec<FFTWeightFunctions>,
}

impl ConvolverFFT {
    /// Create the FFT convolver for the given axis.
    pub fn plan(axis: &Axis, weight_functions: &[WeightFunctionInfo<f64>]) -> Arc<dyn Convolver<f64>> {
        let (transform, k) = MirrorTransform::new(axis);
        let nyquist = transform.nyquist();
        let tabulate = |wf: &WeightFunction<f64>| {
            let mut w = Array2::zeros((wf.kernel_radius.len(), k.len()));
            for (mut w_k, &k) in w.columns_mut().into_iter().zip(k.iter()) {
                w_k.assign(&wf.fourier_transform(k));
            }
            if wf.shape.is_vector() {
                w.column_mut(nyquist).fill(0.0);
            }
            w
        };
        let weight_functions = weight_functions
            .iter()
            .map(|wf| FFTWeightFunctions {
                segments: wf.segments(),
                local_density: wf.local_density,
                scalar_component_weighted_densities: wf
                    .scalar_component_weighted_densities
                    .iter()
                    .map(tabulate)
                    .collect(),
                vector_component_weighted_densities: wf
                    .vector_component_weighted_densities
                    .iter()
                    .map(tabulate)
                    .collect(),
                scalar_fmt_weighted_densities: wf
                    .scalar_fmt_weighted_densities
                    .iter()
                    .map(tabulate)
                    .collect(),
                vector_fmt_weighted_densities: wf
                    .vector_fmt_weighted_densities
                    .iter()
                    .map(tabulate)
                    .collect(),
            })
            .collect();
        Arc::new(Self {
            transform,
            weight_functions,
        })
    }

    fn convolve_segment(&self, f_k: &Array1<Complex64>, w: ArrayView1<f64>, factor: Complex64) -> Array1<f64> {
        let mut acc = Array1::zeros(f_k.len());
        add_product(&mut acc, f_k, w, factor);
        self.transform.back(acc)
    }

    fn convolve_sum(&self, f_k: &[Array1<Complex64>], w: &Array2<f64>, factor: Complex64) -> Array1<f64> {
        let mut acc = Array1::zeros(w.ncols());
        for (f_k, w) in f_k.iter().zip(w.outer_iter()) {
            add_product(&mut acc, f_k, w, factor);
        }
        self.transform.back(acc)
    }
}

impl Convolver<f64> for ConvolverFFT {
    fn weighted_densities(&self, density: &Array2<f64>) -> Vec<Array2<f64>> {
        let rho_k: Vec<_> = density
            .outer_iter()
            .map(|rho| self.transform.forward(rho, Parity::Even))
            .collect();

        let mut weighted_densities_vec = Vec::with_capacity(self.weight_functions.len());
        for wf in &self.weight_functions {
            let mut weighted_densities = Array2::zeros((wf.n_weighted_densities(), density.ncols()));
            let mut rows = weighted_densities.outer_iter_mut();

            if wf.local_density {
                for (rho, mut row) in density.outer_iter().zip(rows.by_ref()) {
                    row.assign(&rho);
                }
            }
            for (w, factor) in wf
                .scalar_component_weighted_densities
                .iter()
                .map(|w| (w, SCALAR))
                .chain(wf.vector_component_weighted_densities.iter().map(|w| (w, VECTOR)))
            {
                for ((rho_k, w), mut row) in rho_k.iter().zip(w.outer_iter()).zip(rows.by_ref()) {
                    row.assign(&self.convolve_segment(rho_k, w, factor));
                }
            }
            for (w, factor) in wf
                .scalar_fmt_weighted_densities
                .iter()
                .map(|w| (w, SCALAR))
                .chain(wf.vector_fmt_weighted_densities.iter().map(|w| (w, VECTOR)))
            {
                if let Some(mut row) = rows.next() {
                    row.assign(&self.convolve_sum(&rho_k, w, factor));
                }
            }
            weighted_densities_vec.push(weighted_densities);
        }
        weighted_densities_vec
    }

    fn functional_derivative(&self, partial_derivatives: &[Array2<f64>]) -> Array2<f64> {
        let segments = self.weight_functions.first().map_or(0, |wf| wf.segments);
        let points = partial_derivatives.first().map_or(0, |pd| pd.ncols());
        let mut functional_deriv_local = Array2::zeros((segments, points));
        let mut functional_deriv_k = vec![Array1::zeros(2 * points); segments];

        for (pd, wf) in partial_derivatives.iter().zip(&self.weight_functions) {
            let mut rows = pd.outer_iter();

            if wf.local_density {
                for (mut f, pd) in functional_deriv_local.outer_iter_mut().zip(rows.by_ref()) {
                    f += &pd;
                }
            }
            for (w, parity, factor) in wf
                .scalar_component_weighted_densities
                .iter()
                .map(|w| (w, Parity::Even, SCALAR))
                .chain(
                    wf.vector_component_weighted_densities
                        .iter()
                        .map(|w| (w, Parity::Odd, VECTOR_ADJOINT)),
                )
            {
                for ((f_k, pd), w) in functional_deriv_k
                    .iter_mut()
                    .zip(rows.by_ref())
                    .zip(w.outer_iter())
                {
                    add_product(f_k, &self.transform.forward(pd, parity), w, factor);
                }
            }
            for (w, parity, factor) in wf
                .scalar_fmt_weighted_densities
                .iter()
                .map(|w| (w, Parity::Even, SCALAR))
                .chain(
                    wf.vector_fmt_weighted_densities
                        .iter()
                        .map(|w| (w, Parity::Odd, VECTOR_ADJOINT)),
                )
            {
                if let Some(pd) = rows.next() {
                    let pd_k = self.transform.forward(pd, parity);
                    for (f_k, w) in functional_deriv_k.iter_mut().zip(w.outer_iter()) {
                        add_product(f_k, &pd_k, w, factor);
                    }
                }
            }
        }

        for (mut f, f_k) in functional_deriv_local
            .outer_iter_mut()
            .zip(functional_deriv_k)
        {
            f += &self.transform.back(f_k);
        }
        functional_deriv_local
    }
}
