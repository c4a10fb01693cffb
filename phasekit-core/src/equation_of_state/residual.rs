use super::Components;
use crate::errors::{EosError, EosResult};
use crate::state::StateHD;
use ndarray::prelude::*;
use num_dual::*;

/// A residual Helmholtz energy model.
///
/// Everything a solver needs is derived from the reduced residual
/// Helmholtz energy $\beta A^\mathrm{res}(T,V,N_i)$ evaluated with
/// generalized (hyper-) dual numbers.
pub trait Residual: Components + Send + Sync {
    /// Return the maximum density in Angstrom^-3.
    ///
    /// This value is used as an estimate for a liquid phase for phase
    /// equilibria and other iterations. It is not explicitly meant to
    /// be a mathematical limit for the density (if those exist in the
    /// equation of state anyways).
    fn compute_max_density(&self, moles: &Array1<f64>) -> f64;

    /// Evaluate the reduced Helmholtz energy of each individual contribution
    /// and return them together with a string representation of the contribution.
    fn residual_helmholtz_energy_contributions<D: DualNum<f64> + Copy>(
        &self,
        state: &StateHD<D>,
    ) -> Vec<(String, D)>;

    /// Evaluate the residual reduced Helmholtz energy $\beta A^\mathrm{res}$.
    fn residual_helmholtz_energy<D: DualNum<f64> + Copy>(&self, state: &StateHD<D>) -> D {
        self.residual_helmholtz_energy_contributions(state)
            .into_iter()
            .fold(D::zero(), |acc, (_, a)| acc + a)
    }

    /// Initial temperature for critical point calculations.
    ///
    /// Model families overwrite this with an estimate based on their
    /// energy parameters.
    fn critical_point_guess(&self, _moles: &Array1<f64>) -> f64 {
        300.0
    }

    /// Check if the provided optional mole number is consistent with the
    /// equation of state.
    ///
    /// In general, the number of elements in `moles` needs to match the number
    /// of components of the equation of state. For a pure component, however,
    /// no moles need to be provided. In that case, it is set to 1.
    fn validate_moles(&self, moles: Option<&Array1<f64>>) -> EosResult<Array1<f64>> {
        let l = moles.map_or(1, |m| m.len());
        if self.components() == l {
            match moles {
                Some(m) => Ok(m.to_owned()),
                None => Ok(Array::ones(1)),
            }
        } else {
            Err(EosError::IncompatibleComponents(self.components(), l))
        }
    }

    /// Calculate the maximum density.
    fn max_density(&self, moles: Option<&Array1<f64>>) -> EosResult<f64> {
        let m = self.validate_moles(moles)?;
        Ok(self.compute_max_density(&m))
    }

    /// Calculate the second virial coefficient $B(T)$ in Å³.
    fn second_virial_coefficient(
        &self,
        temperature: f64,
        moles: Option<&Array1<f64>>,
    ) -> EosResult<f64> {
        let m = self.validate_moles(moles)?;
        let x = &m / m.sum();
        let rho = HyperDual64::from(0.0).derivative1().derivative2();
        let t = HyperDual64::from(temperature);
        let s = StateHD::new_virial(t, rho, x);
        Ok(self.residual_helmholtz_energy(&s).eps1eps2 * 0.5)
    }
}
