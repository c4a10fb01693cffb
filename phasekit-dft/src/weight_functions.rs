use ndarray::*;
use num_dual::DualNum;
use std::f64::consts::{FRAC_PI_3, PI};

/// A weight function corresponding to a single weighted density.
#[derive(Clone, Debug)]
pub struct WeightFunction<T> {
    /// Factor in front of normalized weight function
    pub prefactor: Array1<T>,
    /// Kernel radius of the convolution
    pub kernel_radius: Array1<T>,
    /// Shape of the weight function (Dirac delta, Heaviside, etc.)
    pub shape: WeightFunctionShape,
}

impl<T: DualNum<f64> + Copy> WeightFunction<T> {
    /// Create a new weight function without prefactor
    pub fn new_unscaled(kernel_radius: Array1<T>, shape: WeightFunctionShape) -> Self {
        Self {
            prefactor: Array::ones(kernel_radius.raw_dim()),
            kernel_radius,
            shape,
        }
    }

    /// Create a new weight function with weight constant = 1
    pub fn new_scaled(kernel_radius: Array1<T>, shape: WeightFunctionShape) -> Self {
        let unscaled = Self::new_unscaled(kernel_radius, shape);
        let weight_constants = unscaled.fourier_transform(T::zero());
        Self {
            prefactor: weight_constants.mapv(|w| w.recip()),
            kernel_radius: unscaled.kernel_radius,
            shape,
        }
    }

    /// Planar Fourier transform of the weight function of every segment
    /// at the wave number `k`.
    ///
    /// Scalar weights are even and their transform is real. For the
    /// odd [WeightFunctionShape::DeltaVec] the returned value is the
    /// coefficient of the imaginary unit.
    pub fn fourier_transform(&self, k: T) -> Array1<T> {
        Zip::from(&self.kernel_radius)
            .and(&self.prefactor)
            .map_collect(|&r, &p| {
                let rk = r * k;
                match self.shape {
                    WeightFunctionShape::Theta => {
                        (rk.sph_j0() + rk.sph_j2()) * r.powi(3) * p * (4.0 * FRAC_PI_3)
                    }
                    WeightFunctionShape::Delta => rk.sph_j0() * r.powi(2) * p * (4.0 * PI),
                    WeightFunctionShape::DeltaVec => {
                        -(rk.sph_j0() + rk.sph_j2()) * r.powi(3) * p * k * (4.0 * FRAC_PI_3)
                    }
                }
            })
    }
}

/// Possible weight function shapes.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum WeightFunctionShape {
    /// Heaviside step function
    Theta,
    /// Dirac delta function
    Delta,
    /// Vector-shape as combination of Dirac delta and outward normal
    DeltaVec,
}

impl WeightFunctionShape {
    pub fn is_vector(&self) -> bool {
        matches!(self, Self::DeltaVec)
    }
}

/// Weight functions of a single functional contribution.
///
/// Component-wise weighted densities are evaluated separately for every
/// segment, FMT weighted densities are summed over all segments.
#[derive(Clone, Debug)]
pub struct WeightFunctionInfo<T> {
    /// Index of the component that each individual segment belongs to.
    pub(crate) component_index: Array1<usize>,
    /// Flag if local density is required in the functional
    pub(crate) local_density: bool,
    pub(crate) scalar_component_weighted_densities: Vec<WeightFunction<T>>,
    pub(crate) vector_component_weighted_densities: Vec<WeightFunction<T>>,
    pub(crate) scalar_fmt_weighted_densities: Vec<WeightFunction<T>>,
    pub(crate) vector_fmt_weighted_densities: Vec<WeightFunction<T>>,
}

impl<T> WeightFunctionInfo<T> {
    /// Initializing empty `WeightFunctionInfo`.
    pub fn new(component_index: Array1<usize>, local_density: bool) -> Self {
        Self {
            component_index,
            local_density,
            scalar_component_weighted_densities: Vec::new(),
            vector_component_weighted_densities: Vec::new(),
            scalar_fmt_weighted_densities: Vec::new(),
            vector_fmt_weighted_densities: Vec::new(),
        }
    }

    pub fn segments(&self) -> usize {
        self.component_index.len()
    }

    /// Total number of weighted densities. Vector weighted densities
    /// only exist for `dimensions > 0`.
    pub fn n_weighted_densities(&self, dimensions: usize) -> usize {
        let segments = self.segments();
        (if self.local_density { segments } else { 0 })
            + self.scalar_component_weighted_densities.len() * segments
            + self.vector_component_weighted_densities.len() * segments * dimensions
            + self.scalar_fmt_weighted_densities.len()
            + self.vector_fmt_weighted_densities.len() * dimensions
    }

    /// Adds and sorts [WeightFunction] depending on information
    /// about {FMT, component} & {scalar-valued, vector-valued}.
    ///
    /// # Panics
    /// If the kernel radii or prefactors do not match the number of segments.
    pub fn add(mut self, weight_function: WeightFunction<T>, fmt: bool) -> Self {
        let segments = self.segments();
        assert_eq!(
            segments,
            weight_function.kernel_radius.len(),
            "`kernel_radius` does not match the number of segments"
        );
        assert_eq!(
            segments,
            weight_function.prefactor.len(),
            "`prefactor` does not match the number of segments"
        );

        match (fmt, weight_function.shape.is_vector()) {
            (false, true) => self
                .vector_component_weighted_densities
                .push(weight_function),
            (false, false) => self
                .scalar_component_weighted_densities
                .push(weight_function),
            (true, true) => self.vector_fmt_weighted_densities.push(weight_function),
            (true, false) => self.scalar_fmt_weighted_densities.push(weight_function),
        };
        self
    }

    /// Adds and sorts multiple [WeightFunction]s.
    pub fn extend(self, weight_functions: Vec<WeightFunction<T>>, fmt: bool) -> Self {
        weight_functions
            .into_iter()
            .fold(self, |info, wf| info.add(wf, fmt))
    }
}

impl<T: DualNum<f64> + Copy> WeightFunctionInfo<T> {
    /// Matrix of weight constants (weighted densities × segments) at wave number `k`.
    ///
    /// For `k = 0` and `dimensions = 0` this is the linear map from the
    /// bulk densities to the bulk weighted densities.
    pub fn weight_constants(&self, k: T, dimensions: usize) -> Array2<T> {
        let segments = self.segments();
        let n_wd = self.n_weighted_densities(dimensions);
        let mut weight_constants = Array::zeros([n_wd, segments]);
        let mut j = 0;
        if self.local_density {
            weight_constants
                .slice_mut(s![j..j + segments, ..])
                .diag_mut()
                .fill(T::one());
            j += segments;
        }
        for w in &self.scalar_component_weighted_densities {
            weight_constants
                .slice_mut(s![j..j + segments, ..])
                .diag_mut()
                .assign(&w.fourier_transform(k));
            j += segments;
        }
        if dimensions > 0 {
            for w in &self.vector_component_weighted_densities {
                weight_constants
                    .slice_mut(s![j..j + segments, ..])
                    .diag_mut()
                    .assign(&w.fourier_transform(k));
                j += segments;
            }
        }
        for w in &self.scalar_fmt_weighted_densities {
            weight_constants
                .row_mut(j)
                .assign(&w.fourier_transform(k));
            j += 1;
        }
        if dimensions > 0 {
            for w in &self.vector_fmt_weighted_densities {
                weight_constants
                    .row_mut(j)
                    .assign(&w.fourier_transform(k));
                j += 1;
            }
        }
        weight_constants
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn bulk_weight_constants() {
        let r = arr1(&[1.5, 2.0]);
        let info = WeightFunctionInfo::new(arr1(&[0, 1]), true)
            .add(
                WeightFunction::new_scaled(r.clone(), WeightFunctionShape::Theta),
                false,
            )
            .extend(
                vec![
                    WeightFunction::new_unscaled(r.clone(), WeightFunctionShape::Delta),
                    WeightFunction::new_unscaled(r.clone(), WeightFunctionShape::Theta),
                    WeightFunction::new_unscaled(r, WeightFunctionShape::DeltaVec),
                ],
                true,
            );
        assert_eq!(info.n_weighted_densities(0), 6);
        assert_eq!(info.n_weighted_densities(1), 7);

        let wc = info.weight_constants(0.0, 0);
        assert_eq!(wc.shape(), &[6, 2]);
        assert_relative_eq!(wc[[0, 0]], 1.0);
        assert_relative_eq!(wc[[0, 1]], 0.0);
        assert_relative_eq!(wc[[2, 0]], 1.0, max_relative = 1e-14);
        assert_relative_eq!(wc[[3, 1]], 1.0, max_relative = 1e-14);
        assert_relative_eq!(wc[[4, 0]], 4.0 * PI * 2.25, max_relative = 1e-14);
        assert_relative_eq!(wc[[5, 1]], 4.0 * FRAC_PI_3 * 8.0, max_relative = 1e-14);

        let wc = info.weight_constants(0.0, 1);
        assert_eq!(wc.row(6).sum(), 0.0);
    }

    #[test]
    fn theta_decays_with_wave_number() {
        let w = WeightFunction::new_scaled(arr1(&[1.0]), WeightFunctionShape::Theta);
        let w0 = w.fourier_transform(0.0)[0];
        let w1 = w.fourier_transform(1.0)[0];
        let w2 = w.fourier_transform(2.0)[0];
        assert_relative_eq!(w0, 1.0, max_relative = 1e-14);
        assert!(w1 < w0 && w2 < w1);
    }
}
