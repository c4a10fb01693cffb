use crate::hard_sphere::HardSphereProperties;
use crate::pets::parameters::PetsParameters;
use num_dual::DualNum;
use phasekit_core::StateHD;
use std::f64::consts::{FRAC_PI_3, PI};

pub const A: [f64; 7] = [
    0.690603404,
    1.189317012,
    1.265604153,
    -24.34554201,
    93.67300357,
    -157.8773415,
    96.93736697,
];
pub const B: [f64; 7] = [
    0.664852128,
    2.10733079,
    -9.597951213,
    -17.37871193,
    30.17506222,
    209.3942909,
    -353.2743581,
];

/// Integrals $I_1$, $I_2$ and the compressibility term $C_1$ as functions
/// of the packing fraction.
pub(crate) fn dispersion_integrals<D: DualNum<f64> + Copy>(eta: D) -> (D, D, D) {
    let mut i1 = D::zero();
    let mut i2 = D::zero();
    let mut eta_i = D::one();
    for (a, b) in A.iter().zip(B.iter()) {
        i1 += eta_i * *a;
        i2 += eta_i * *b;
        eta_i *= eta;
    }
    let c1 = ((eta * 8.0 - eta.powi(2) * 2.0) / (eta - 1.0).powi(4) + 1.0).recip();
    (i1, i2, c1)
}

pub struct Dispersion<'a> {
    pub parameters: &'a PetsParameters,
}

impl<'a> Dispersion<'a> {
    pub fn helmholtz_energy<D: DualNum<f64> + Copy>(&self, state: &StateHD<D>) -> D {
        // auxiliary variables
        let n = self.parameters.sigma.len();
        let p = self.parameters;
        let rho = &state.partial_density;

        // temperature dependent segment radius
        let r = p.hs_diameter(state.temperature).mapv(|d| d * 0.5);

        // packing fraction
        let eta = (0..n).fold(D::zero(), |acc, i| {
            acc + rho[i] * r[i].powi(3) * (4.0 * FRAC_PI_3)
        });

        // mixture densities, crosswise interactions of all segments on all chains
        let mut rho1mix = D::zero();
        let mut rho2mix = D::zero();
        for i in 0..n {
            for j in 0..n {
                let eps_ij = state.temperature.recip() * p.epsilon_k_ij[(i, j)];
                let sigma_ij = p.sigma_ij[[i, j]].powi(3);
                rho1mix += rho[i] * rho[j] * eps_ij * sigma_ij;
                rho2mix += rho[i] * rho[j] * eps_ij * eps_ij * sigma_ij;
            }
        }

        let (i1, i2, c1) = dispersion_integrals(eta);
        (-rho1mix * i1 * 2.0 - rho2mix * c1 * i2) * PI * state.volume
    }
}
