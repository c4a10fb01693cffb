use crate::state::StateHD;
use ndarray::Array1;
use num_dual::DualNum;

mod ideal_gas;
mod residual;
pub use ideal_gas::ideal_gas_helmholtz_energy;
pub use residual::Residual;

/// Number of components and the possibility to select a subset of them.
pub trait Components {
    /// Return the number of components of the model.
    fn components(&self) -> usize;

    /// Return a model consisting of the components
    /// contained in component_list.
    fn subset(&self, component_list: &[usize]) -> Self;
}

/// Model without residual contribution.
///
/// States of this model follow the ideal gas law. It has no
/// phase transition and therefore no critical point.
#[derive(Clone, Copy, Debug)]
pub struct NoResidual(pub usize);

impl Components for NoResidual {
    fn components(&self) -> usize {
        self.0
    }

    fn subset(&self, component_list: &[usize]) -> Self {
        Self(component_list.len())
    }
}

impl Residual for NoResidual {
    fn compute_max_density(&self, _: &Array1<f64>) -> f64 {
        1.0
    }

    fn residual_helmholtz_energy_contributions<D: DualNum<f64> + Copy>(
        &self,
        _: &StateHD<D>,
    ) -> Vec<(String, D)> {
        vec![]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Contributions, DensityInitialization, EosError, EosResult, State};
    use approx::assert_relative_eq;
    use ndarray::arr1;
    use std::sync::Arc;

    #[test]
    fn ideal_gas_law() -> EosResult<()> {
        let eos = Arc::new(NoResidual(2));
        let moles = arr1(&[1500.0, 500.0]);
        for (t, v) in [(150.0, 1e5), (300.0, 3.5e4), (1000.0, 1e7)] {
            let state = State::new_nvt(&eos, t, v, &moles)?;
            assert_relative_eq!(
                state.pressure(Contributions::Total) * v,
                2000.0 * t,
                max_relative = 1e-12
            );
            assert_eq!(state.pressure(Contributions::Residual), 0.0);
            assert_relative_eq!(state.compressibility(Contributions::Total), 1.0, max_relative = 1e-12);
        }
        Ok(())
    }

    #[test]
    fn ideal_gas_has_no_liquid() -> EosResult<()> {
        let eos = Arc::new(NoResidual(1));
        let moles = arr1(&[1.0]);
        let vapor = State::new_npt(&eos, 300.0, 1e-5, &moles, DensityInitialization::Vapor)?;
        assert_relative_eq!(vapor.density, 1e-5 / 300.0, max_relative = 1e-12);
        let stable = State::new_npt(&eos, 300.0, 1e-5, &moles, DensityInitialization::None)?;
        assert_relative_eq!(stable.density, vapor.density, max_relative = 1e-12);
        assert!(matches!(
            State::new_npt(&eos, 300.0, 1e-5, &moles, DensityInitialization::Liquid),
            Err(EosError::NoPhysicalRoot { .. })
        ));
        Ok(())
    }

    #[test]
    fn ideal_gas_pressure_round_trip() -> EosResult<()> {
        let eos = Arc::new(NoResidual(2));
        let moles = arr1(&[0.3, 0.7]);
        for t in [100.0, 298.15, 1000.0] {
            for p_pa in [1e3, 1e4, 1e5, 1e6, 1e7] {
                let p = p_pa / crate::KB_A3;
                let state = State::new_npt(&eos, t, p, &moles, DensityInitialization::None)?;
                assert_relative_eq!(state.pressure(Contributions::Total), p, max_relative = 1e-8);
                assert_relative_eq!(state.density, p / t, max_relative = 1e-8);
            }
        }
        Ok(())
    }

    #[test]
    fn ideal_gas_has_no_critical_point() {
        let eos = Arc::new(NoResidual(1));
        assert!(State::critical_point(&eos, None, None, Default::default()).is_err());
    }
}
