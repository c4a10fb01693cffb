use crate::hard_sphere::HardSphereProperties;
use crate::pets::eos::dispersion::dispersion_integrals;
use crate::pets::parameters::PetsParameters;
use ndarray::*;
use num_dual::DualNum;
use phasekit_core::EosResult;
use phasekit_dft::{FunctionalContribution, WeightFunction, WeightFunctionInfo, WeightFunctionShape};
use std::f64::consts::{FRAC_PI_3, PI};

/// Range of the weighting of the attractive functional in units of
/// the hard-sphere diameter ([Heier et al., 2018](https://doi.org/10.1080/00268976.2018.1447153)).
const PSI_DFT: f64 = 1.21;

/// Weighted density approximation of the PeTS dispersion term.
///
/// The densities are averaged over spheres of radius $\psi d_i$ and
/// inserted into the bulk expression of the dispersion contribution.
pub struct AttractiveFunctional<'a> {
    parameters: &'a PetsParameters,
}

impl<'a> AttractiveFunctional<'a> {
    pub fn new(parameters: &'a PetsParameters) -> Self {
        Self { parameters }
    }
}

impl<'a> FunctionalContribution for AttractiveFunctional<'a> {
    fn name(&self) -> &'static str {
        "Attractive functional"
    }

    fn weight_functions<N: DualNum<f64> + Copy>(&self, temperature: N) -> WeightFunctionInfo<N> {
        let d = self.parameters.hs_diameter(temperature);
        WeightFunctionInfo::new(self.parameters.component_index(), false).add(
            WeightFunction::new_scaled(d.mapv(|d| d * PSI_DFT), WeightFunctionShape::Theta),
            false,
        )
    }

    fn helmholtz_energy_density<N: DualNum<f64> + Copy>(
        &self,
        temperature: N,
        weighted_densities: ArrayView2<N>,
    ) -> EosResult<Array1<N>> {
        let p = self.parameters;
        let n = p.sigma.len();
        let r = p.hs_diameter(temperature).mapv(|d| d * 0.5);
        let t_inv = temperature.recip();

        let phi = weighted_densities
            .axis_iter(Axis(1))
            .map(|rho| {
                let eta = (0..n).fold(N::zero(), |acc, i| {
                    acc + rho[i] * r[i].powi(3) * (4.0 * FRAC_PI_3)
                });
                let mut rho1mix = N::zero();
                let mut rho2mix = N::zero();
                for i in 0..n {
                    for j in 0..n {
                        let eps_ij_t = t_inv * p.epsilon_k_ij[[i, j]];
                        let rho_ij = rho[i] * rho[j] * eps_ij_t * p.sigma_ij[[i, j]].powi(3);
                        rho1mix += rho_ij;
                        rho2mix += rho_ij * eps_ij_t;
                    }
                }
                let (i1, i2, c1) = dispersion_integrals(eta);
                (-rho1mix * i1 * 2.0 - rho2mix * c1 * i2) * PI
            })
            .collect();
        Ok(phi)
    }
}
