use ndarray::Array1;
use num_dual::DualNum;

/// Difference between the ideal gas of chains with `m` segments and the
/// ideal gas of single particles.
///
/// Only required for bulk properties. Inside the functional the chain
/// length enters through the Euler-Lagrange equation.
#[derive(Clone, Debug)]
pub struct IdealChainContribution {
    m: Array1<f64>,
}

impl IdealChainContribution {
    pub fn new(m: &Array1<f64>) -> Self {
        Self { m: m.clone() }
    }

    pub fn name(&self) -> String {
        "Ideal chain".to_string()
    }

    pub fn bulk_helmholtz_energy_density<D: DualNum<f64> + Copy>(&self, density: &Array1<D>) -> D {
        density
            .iter()
            .zip(self.m.iter())
            .fold(D::zero(), |acc, (&rho, &m)| {
                acc + rho * (m - 1.0) * ((rho.abs() + f64::EPSILON).ln() - 1.0)
            })
    }
}
