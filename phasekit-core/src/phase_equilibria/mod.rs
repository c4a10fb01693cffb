use crate::equation_of_state::Residual;
use crate::errors::{EosError, EosResult};
use crate::state::{Contributions, DensityInitialization, State};
use ndarray::Array1;
use std::fmt;
use std::sync::Arc;

mod bubble_dew;
mod phase_diagram_binary;
mod phase_diagram_pure;
mod vle_pure;
pub use phase_diagram_pure::{DroppedPoint, PhaseDiagram};

/// A thermodynamic equilibrium state.
///
/// The struct is parametrized over the number of phases. All solvers
/// are implemented for the two phase vapor/liquid case.
///
/// ## Contents
///
/// + [Bubble and dew point calculations](#bubble-and-dew-point-calculations)
/// + [Pure component phase equilibria](#pure-component-phase-equilibria)
/// + [Utility functions](#utility-functions)
#[derive(Debug)]
pub struct PhaseEquilibrium<E, const P: usize>([State<E>; P]);

impl<E, const P: usize> Clone for PhaseEquilibrium<E, P> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<E: Residual, const P: usize> fmt::Display for PhaseEquilibrium<E, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, s) in self.0.iter().enumerate() {
            writeln!(f, "phase {}: {}", i, s)?;
        }
        Ok(())
    }
}

impl<E: Residual> PhaseEquilibrium<E, 2> {
    pub fn vapor(&self) -> &State<E> {
        &self.0[0]
    }

    pub fn liquid(&self) -> &State<E> {
        &self.0[1]
    }

    /// Creates a phase equilibrium from two states, sorted by density.
    ///
    /// The states are not checked for equilibrium.
    pub fn from_states(state1: State<E>, state2: State<E>) -> Self {
        let (vapor, liquid) = if state1.density < state2.density {
            (state1, state2)
        } else {
            (state2, state1)
        };
        Self([vapor, liquid])
    }

    /// Creates a new PhaseEquilibrium that contains two states at the
    /// specified temperature, pressure and moles.
    ///
    /// The constructor can be used in custom phase equilibrium solvers or,
    /// e.g., to generate initial guesses for an actual VLE solver.
    /// In general, the two states generated are NOT in an equilibrium.
    pub fn new_npt(
        eos: &Arc<E>,
        temperature: f64,
        pressure: f64,
        vapor_moles: &Array1<f64>,
        liquid_moles: &Array1<f64>,
    ) -> EosResult<Self> {
        let liquid = State::new_npt(
            eos,
            temperature,
            pressure,
            liquid_moles,
            DensityInitialization::Liquid,
        )?;
        let vapor = State::new_npt(
            eos,
            temperature,
            pressure,
            vapor_moles,
            DensityInitialization::Vapor,
        )?;
        Ok(Self([vapor, liquid]))
    }

    /// Initial guess for a pure component equilibrium slightly below
    /// the critical point.
    ///
    /// The densities follow the near-critical asymptote
    /// $\rho^{L,V}=\rho_c\left(1\pm2\sqrt{1-T/T_c}\right)$.
    pub fn near_critical(critical_point: &State<E>, delta_t: f64) -> EosResult<Self> {
        let tc = critical_point.temperature;
        let temperature = tc - delta_t;
        if delta_t <= 0.0 || temperature <= 0.0 {
            return Err(EosError::NonPhysicalInput {
                name: "temperature step".into(),
                value: delta_t,
            });
        }
        let rhoc = critical_point.density;
        let d = 2.0 * (delta_t / tc).sqrt();
        let eos = &critical_point.eos;
        let moles = &critical_point.moles;
        let n = critical_point.total_moles;
        let vapor = State::new_nvt(eos, temperature, n / (rhoc * (1.0 - d).max(0.05)), moles)?;
        let liquid = State::new_nvt(eos, temperature, n / (rhoc * (1.0 + d)), moles)?;
        Ok(Self([vapor, liquid]))
    }
}

impl<E: Residual, const P: usize> PhaseEquilibrium<E, P> {
    pub(super) fn update_pressure(mut self, temperature: f64, pressure: f64) -> EosResult<Self> {
        for s in self.0.iter_mut() {
            *s = State::new_npt(
                &s.eos,
                temperature,
                pressure,
                &s.moles,
                DensityInitialization::InitialDensity(s.density),
            )?;
        }
        Ok(self)
    }

    /// Temperature of the first phase.
    pub fn temperature(&self) -> f64 {
        self.0[0].temperature
    }
}

const TRIVIAL_REL_DEVIATION: f64 = 1e-5;

/// # Utility functions
impl<E: Residual> PhaseEquilibrium<E, 2> {
    pub(super) fn check_trivial_solution(self) -> EosResult<Self> {
        if Self::is_trivial_solution(self.vapor(), self.liquid()) {
            Err(EosError::TrivialSolution)
        } else {
            Ok(self)
        }
    }

    /// Check if the two states form a trivial solution
    pub fn is_trivial_solution(state1: &State<E>, state2: &State<E>) -> bool {
        let rho1 = &state1.partial_density;
        let rho2 = &state2.partial_density;

        rho1.iter()
            .zip(rho2.iter())
            .fold(0.0, |acc, (&rho1, &rho2)| {
                (rho2 / rho1 - 1.0).abs().max(acc)
            })
            < TRIVIAL_REL_DEVIATION
    }

    /// Largest relative deviation of pressure and fugacities between the phases.
    pub fn equilibrium_residual(&self) -> f64 {
        let (v, l) = (self.vapor(), self.liquid());
        let p_v = v.pressure(Contributions::Total);
        let p_l = l.pressure(Contributions::Total);
        let dp = ((p_v - p_l) / p_v).abs();
        v.fugacity()
            .iter()
            .zip(l.fugacity().iter())
            .filter(|(&f_v, _)| f_v > 0.0)
            .fold(dp, |acc, (&f_v, &f_l)| acc.max((f_l / f_v - 1.0).abs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cubic::{PengRobinson, PengRobinsonParameters};
    use approx::assert_relative_eq;
    use ndarray::arr1;

    fn propane() -> EosResult<Arc<PengRobinson>> {
        let parameters =
            PengRobinsonParameters::new_simple(&[369.96], &[4250000.0], &[0.153], &[44.0962])?;
        Ok(Arc::new(PengRobinson::new(Arc::new(parameters))))
    }

    #[test]
    fn near_critical_seed() -> EosResult<()> {
        let eos = propane()?;
        let cp = State::critical_point(&eos, None, None, Default::default())?;
        let vle = PhaseEquilibrium::near_critical(&cp, 1e-3 * cp.temperature)?;
        assert_relative_eq!(vle.temperature(), 0.999 * cp.temperature);
        assert!(vle.vapor().density < cp.density);
        assert!(vle.liquid().density > cp.density);
        assert!(PhaseEquilibrium::near_critical(&cp, -1.0).is_err());
        Ok(())
    }

    #[test]
    fn trivial_solution() -> EosResult<()> {
        let eos = propane()?;
        let s = State::new_pure(&eos, 300.0, 1e-3)?;
        let vle = PhaseEquilibrium::from_states(s.clone(), s);
        assert!(matches!(
            vle.check_trivial_solution(),
            Err(EosError::TrivialSolution)
        ));
        let m = arr1(&[1.0]);
        let vle = PhaseEquilibrium::new_npt(&eos, 300.0, 1e-4, &m, &m)?;
        assert!(!PhaseEquilibrium::is_trivial_solution(
            vle.vapor(),
            vle.liquid()
        ));
        Ok(())
    }
}
