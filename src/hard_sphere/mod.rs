//! Generic implementation of the hard-sphere contribution
//! that can be used across models.
use ndarray::*;
use num_dual::DualNum;
use phasekit_core::StateHD;
use std::f64::consts::FRAC_PI_6;

#[cfg(feature = "dft")]
mod dft;
#[cfg(feature = "dft")]
pub use dft::{FMTContribution, FMTFunctional, FMTVersion};

/// Different monomer shapes for FMT and BMCSL.
pub enum MonomerShape<'a> {
    /// For spherical monomers, the number of components.
    Spherical(usize),
    /// For non-spherical molecules in a homosegmented approach, the
    /// chain length parameter $m$.
    NonSpherical(&'a Array1<f64>),
}

/// Properties of (generalized) hard sphere systems.
pub trait HardSphereProperties {
    /// The [MonomerShape] used in the model.
    fn monomer_shape(&self) -> MonomerShape<'_>;

    /// The temperature dependent hard-sphere diameters of every segment.
    fn hs_diameter<D: DualNum<f64> + Copy>(&self, temperature: D) -> Array1<D>;

    /// For every segment, the index of the component that it is on.
    fn component_index(&self) -> Array1<usize> {
        let n = match self.monomer_shape() {
            MonomerShape::Spherical(n) => n,
            MonomerShape::NonSpherical(m) => m.len(),
        };
        Array1::from_shape_fn(n, |i| i)
    }

    /// The geometry coefficients $C_{k,\alpha}$ for every segment.
    ///
    /// For homosegmented molecules all four coefficients equal the
    /// segment number.
    fn geometry_coefficients(&self) -> Array1<f64> {
        match self.monomer_shape() {
            MonomerShape::Spherical(n) => Array1::ones(n),
            MonomerShape::NonSpherical(m) => m.clone(),
        }
    }

    /// The packing fractions $\zeta_k$.
    fn zeta<D: DualNum<f64> + Copy, const N: usize>(
        &self,
        temperature: D,
        partial_density: &Array1<D>,
        k: [i32; N],
    ) -> [D; N] {
        let m = self.geometry_coefficients();
        let diameter = self.hs_diameter(temperature);
        let mut zeta = [D::zero(); N];
        for i in 0..diameter.len() {
            for (z, &k) in zeta.iter_mut().zip(k.iter()) {
                *z += partial_density[i] * diameter[i].powi(k) * (m[i] * FRAC_PI_6);
            }
        }
        zeta
    }

    /// The fraction $\frac{\zeta_2}{\zeta_3}$ evaluated with the mole
    /// fractions, so that it stays finite in the zero density limit.
    fn zeta_23<D: DualNum<f64> + Copy>(&self, temperature: D, molefracs: &Array1<D>) -> D {
        let [z2, z3] = self.zeta(temperature, molefracs, [2, 3]);
        z2 / z3
    }
}

/// Implementation of the BMCSL equation of state for hard-sphere mixtures.
///
/// The reduced Helmholtz energy is calculated according to
/// $$\frac{\beta A}{V}=\frac{6}{\pi}\left(\frac{3\zeta_1\zeta_2}{1-\zeta_3}+\frac{\zeta_2^3}{\zeta_3\left(1-\zeta_3\right)^2}+\left(\frac{\zeta_2^3}{\zeta_3^2}-\zeta_0\right)\ln\left(1-\zeta_3\right)\right)$$
/// with the packing fractions
/// $$\zeta_k=\frac{\pi}{6}\sum_\alpha m_\alpha\rho_\alpha d_\alpha^k,~~~~~~~~k=0\ldots 3.$$
pub struct HardSphere<'a, P> {
    properties: &'a P,
}

impl<'a, P: HardSphereProperties> HardSphere<'a, P> {
    pub fn new(properties: &'a P) -> Self {
        Self { properties }
    }

    pub fn helmholtz_energy<D: DualNum<f64> + Copy>(&self, state: &StateHD<D>) -> D {
        let p = self.properties;
        let zeta = p.zeta(state.temperature, &state.partial_density, [0, 1, 2, 3]);
        let frac_1mz3 = -(zeta[3] - 1.0).recip();
        let zeta_23 = p.zeta_23(state.temperature, &state.molefracs);
        state.volume * 6.0 / std::f64::consts::PI
            * (zeta[1] * zeta[2] * frac_1mz3 * 3.0
                + zeta[2].powi(2) * frac_1mz3.powi(2) * zeta_23
                + (zeta[2] * zeta_23.powi(2) - zeta[0]) * (zeta[3] * (-1.0)).ln_1p())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::arr1;

    struct Spheres(Array1<f64>);

    impl HardSphereProperties for Spheres {
        fn monomer_shape(&self) -> MonomerShape<'_> {
            MonomerShape::Spherical(self.0.len())
        }

        fn hs_diameter<D: DualNum<f64> + Copy>(&self, _: D) -> Array1<D> {
            self.0.mapv(D::from)
        }
    }

    #[test]
    fn pure_hard_spheres_follow_carnahan_starling() {
        let spheres = Spheres(arr1(&[1.0]));
        let hs = HardSphere::new(&spheres);
        let rho = 0.6;
        let state = StateHD::new(1.0, 1.0 / rho, arr1(&[1.0]));
        let eta = FRAC_PI_6 * rho;
        let a_cs = (4.0 * eta - 3.0 * eta * eta) / (1.0 - eta).powi(2);
        assert_relative_eq!(hs.helmholtz_energy(&state), a_cs, max_relative = 1e-12);
    }

    #[test]
    fn mixture_reduces_to_pure_component() {
        let pure = Spheres(arr1(&[1.0]));
        let mixture = Spheres(arr1(&[1.0, 1.0]));
        let s_pure = StateHD::new(1.0, 5.0, arr1(&[2.0]));
        let s_mix = StateHD::new(1.0, 5.0, arr1(&[0.5, 1.5]));
        assert_relative_eq!(
            HardSphere::new(&pure).helmholtz_energy(&s_pure),
            HardSphere::new(&mixture).helmholtz_energy(&s_mix),
            max_relative = 1e-12
        );
    }
}
