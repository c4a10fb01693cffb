use super::PhaseEquilibrium;
use crate::equation_of_state::Residual;
use crate::errors::{EosError, EosResult};
use crate::state::{Contributions, State};
use crate::{SolverOptions, Verbosity};
use ndarray::arr1;
use std::sync::Arc;

pub(super) const MAX_ITER_PURE: usize = 50;
const TOL_PURE: f64 = 1e-12;

/// # Pure component phase equilibria
impl<E: Residual> PhaseEquilibrium<E, 2> {
    /// Calculate a phase equilibrium for a pure component
    /// and given temperature.
    ///
    /// The calculation is initialized from `initial_state` if given, then
    /// from an ideal gas estimate of the vapor pressure and finally from
    /// the spinodals.
    pub fn pure(
        eos: &Arc<E>,
        temperature: f64,
        initial_state: Option<&PhaseEquilibrium<E, 2>>,
        options: SolverOptions,
    ) -> EosResult<Self> {
        Self::pure_t(eos, temperature, initial_state, options).map(|(vle, _)| vle)
    }

    /// Same as [PhaseEquilibrium::pure] but also returns the number of iterations
    /// of the successful attempt.
    pub(super) fn pure_t(
        eos: &Arc<E>,
        temperature: f64,
        initial_state: Option<&PhaseEquilibrium<E, 2>>,
        options: SolverOptions,
    ) -> EosResult<(Self, usize)> {
        let (max_iter, tol, verbosity) = options.unwrap_or(MAX_ITER_PURE, TOL_PURE);
        let iterate = |vle: Self| vle.iterate_pure_t(max_iter, tol, verbosity, &options);

        // First use given initial state if applicable
        let mut vle = match initial_state.map(|init| Self::init_pure_state(init, temperature)) {
            Some(Ok(init)) => match iterate(init) {
                Err(EosError::Cancelled) => return Err(EosError::Cancelled),
                res => res.ok(),
            },
            _ => None,
        };

        // Next try to initialize with an ideal gas assumption
        if vle.is_none() {
            vle = match Self::init_pure_ideal_gas(eos, temperature).and_then(iterate) {
                Err(EosError::Cancelled) => return Err(EosError::Cancelled),
                res => res.ok(),
            };
        }

        // Finally use the spinodal to initialize the calculation
        match vle {
            Some(vle) => Ok(vle),
            None => Self::init_pure_spinodal(eos, temperature, &options).and_then(iterate),
        }
    }

    fn iterate_pure_t(
        self,
        max_iter: usize,
        tol: f64,
        verbosity: Verbosity,
        options: &SolverOptions,
    ) -> EosResult<(Self, usize)> {
        let mut p_old = self.vapor().pressure(Contributions::Total);
        let [mut vapor, mut liquid] = self.0;

        log_iter!(verbosity,
            " iter |     residual      |     pressure     |    liquid density    |    vapor density     | Newton steps"
        );
        log_iter!(verbosity, "{:-<106}", "");
        log_iter!(
            verbosity,
            " {:4} |                   | {:12.8e} | {:12.8e} | {:12.8e} |",
            0,
            p_old,
            liquid.density,
            vapor.density
        );

        let mut res = f64::INFINITY;
        for i in 1..=max_iter {
            options.check_cancelled()?;

            // calculate the pressures and derivatives
            let (p_l, p_rho_l) = liquid.p_dpdrho();
            let (p_v, p_rho_v) = vapor.p_dpdrho();
            // calculate the residual Helmholtz energies per particle
            let a_l_res = liquid.residual_molar_helmholtz_energy();
            let a_v_res = vapor.residual_molar_helmholtz_energy();

            // Estimate the new pressure
            let kt = vapor.temperature;
            let delta_v = 1.0 / vapor.density - 1.0 / liquid.density;
            let delta_a = a_v_res - a_l_res + kt * (vapor.density / liquid.density).ln();
            let mut p_new = -delta_a / delta_v;

            // If the pressure becomes negative, assume the gas phase is ideal. The
            // resulting pressure is always positive.
            if p_new.is_sign_negative() {
                p_new = p_v * ((-delta_a - p_v / vapor.density) / kt).exp();
            }

            // Improve the estimate by exploiting the almost ideal behavior of the gas phase
            let mut newton_iter = 0;
            let newton_tol = p_old * delta_v * tol;
            for _ in 0..20 {
                let p_frac = p_new / p_old;
                let f = p_new * delta_v + delta_a + (p_frac.ln() + 1.0 - p_frac) * kt;
                let df_dp = delta_v + (1.0 / p_new - 1.0 / p_old) * kt;
                p_new -= f / df_dp;
                newton_iter += 1;
                if f.abs() < newton_tol {
                    break;
                }
            }

            // Emergency brake if the implementation of the EOS is not safe.
            if !p_new.is_finite() {
                return Err(EosError::IterationFailed("pure_t".to_owned()));
            }

            // Calculate Newton steps for the densities and update state.
            let rho_l = liquid.density + (p_new - p_l) / p_rho_l;
            let rho_v = vapor.density + (p_new - p_v) / p_rho_v;
            liquid = State::new_pure(&liquid.eos, liquid.temperature, rho_l)?;
            vapor = State::new_pure(&vapor.eos, vapor.temperature, rho_v)?;
            if Self::is_trivial_solution(&vapor, &liquid) {
                return Err(EosError::TrivialSolution);
            }

            // Check for convergence
            res = (p_new - p_old).abs();
            log_iter!(
                verbosity,
                " {:4} | {:14.8e} | {:12.8e} | {:12.8e} | {:12.8e} | {}",
                i,
                res,
                p_new,
                liquid.density,
                vapor.density,
                newton_iter
            );
            if res < p_old * tol {
                log_result!(
                    verbosity,
                    "PhaseEquilibrium::pure_t: calculation converged in {} step(s)\n",
                    i
                );
                return Ok((Self([vapor, liquid]), i));
            }
            p_old = p_new;
        }
        Err(EosError::no_convergence("pure_t", max_iter, res / p_old))
    }

    /// Calculate a phase equilibrium for a pure component
    /// and given pressure.
    pub fn pure_p(
        eos: &Arc<E>,
        pressure: f64,
        initial_state: Option<&Self>,
        options: SolverOptions,
    ) -> EosResult<Self> {
        let (max_iter, tol, verbosity) = options.unwrap_or(MAX_ITER_PURE, TOL_PURE);

        // Initialize the phase equilibrium
        let mut vle = match initial_state {
            Some(init) => init
                .clone()
                .update_pressure(init.vapor().temperature, pressure)?,
            None => PhaseEquilibrium::init_pure_p(eos, pressure, &options)?,
        };

        log_iter!(
            verbosity,
            " iter |     residual     |   temperature   |    liquid density    |    vapor density     "
        );
        log_iter!(verbosity, "{:-<89}", "");
        log_iter!(
            verbosity,
            " {:4} |                  | {:13.8} | {:12.8e} | {:12.8e}",
            0,
            vle.vapor().temperature,
            vle.liquid().density,
            vle.vapor().density
        );
        let mut res = f64::INFINITY;
        for i in 1..=max_iter {
            options.check_cancelled()?;

            // calculate the pressures and derivatives
            let (p_l, p_rho_l) = vle.liquid().p_dpdrho();
            let (p_v, p_rho_v) = vle.vapor().p_dpdrho();
            let p_t_l = vle.liquid().dp_dt(Contributions::Total);
            let p_t_v = vle.vapor().dp_dt(Contributions::Total);

            // calculate the residual entropies and Helmholtz energies per particle
            let s_l_res = vle.liquid().residual_molar_entropy();
            let s_v_res = vle.vapor().residual_molar_entropy();
            let a_l_res = vle.liquid().residual_molar_helmholtz_energy();
            let a_v_res = vle.vapor().residual_molar_helmholtz_energy();

            // calculate the molar volumes
            let v_l = 1.0 / vle.liquid().density;
            let v_v = 1.0 / vle.vapor().density;

            // estimate the temperature steps
            let kt = vle.vapor().temperature;
            let ln_rho = (v_l / v_v).ln();
            let delta_t = (pressure * (v_v - v_l) + (a_v_res - a_l_res + kt * ln_rho))
                / (s_v_res - s_l_res - ln_rho);
            let t_new = vle.vapor().temperature + delta_t;

            // calculate Newton steps for the densities and update state.
            let rho_l = vle.liquid().density + (pressure - p_l - p_t_l * delta_t) / p_rho_l;
            let rho_v = vle.vapor().density + (pressure - p_v - p_t_v * delta_t) / p_rho_v;

            if rho_l.is_sign_negative() || rho_v.is_sign_negative() || delta_t.abs() > 1.0 {
                // if densities are negative or the temperature step is large use density iteration instead
                vle = vle
                    .update_pressure(t_new, pressure)?
                    .check_trivial_solution()?;
            } else {
                // update state
                vle = Self([
                    State::new_pure(eos, t_new, rho_v)?,
                    State::new_pure(eos, t_new, rho_l)?,
                ]);
            }

            // check for convergence
            res = delta_t.abs();
            log_iter!(
                verbosity,
                " {:4} | {:14.8e} | {:13.8} | {:12.8e} | {:12.8e}",
                i,
                res,
                vle.vapor().temperature,
                vle.liquid().density,
                vle.vapor().density
            );
            if res < vle.vapor().temperature * tol {
                log_result!(
                    verbosity,
                    "PhaseEquilibrium::pure_p: calculation converged in {} step(s)\n",
                    i
                );
                return Ok(vle);
            }
        }
        Err(EosError::no_convergence("pure_p", max_iter, res))
    }

    fn init_pure_state(initial_state: &Self, temperature: f64) -> EosResult<Self> {
        let vapor = initial_state.vapor().update_temperature(temperature)?;
        let liquid = initial_state.liquid().update_temperature(temperature)?;
        Ok(Self([vapor, liquid]))
    }

    fn init_pure_ideal_gas(eos: &Arc<E>, temperature: f64) -> EosResult<Self> {
        let m = arr1(&[1.0]);
        let p = Self::starting_pressure_ideal_gas_bubble(eos, temperature, &m)?.0;
        PhaseEquilibrium::new_npt(eos, temperature, p, &m, &m)?.check_trivial_solution()
    }

    fn init_pure_spinodal(
        eos: &Arc<E>,
        temperature: f64,
        options: &SolverOptions,
    ) -> EosResult<Self> {
        let m = arr1(&[1.0]);
        let p = Self::starting_pressure_spinodal(eos, temperature, &m, options)?;
        PhaseEquilibrium::new_npt(eos, temperature, p, &m, &m)
    }

    /// Initialize a new VLE for a pure substance for a given pressure.
    ///
    /// The temperature is interpolated from two vapor pressures
    /// assuming a linear relation between $\ln p$ and $1/T$.
    fn init_pure_p(eos: &Arc<E>, pressure: f64, options: &SolverOptions) -> EosResult<Self> {
        let cp = State::critical_point(eos, None, None, options.inherit())?;
        if pressure >= cp.pressure(Contributions::Total) {
            return Err(EosError::SuperCritical);
        };
        let tc = cp.temperature;
        let vle1 = Self::pure(eos, 0.7 * tc, None, options.inherit())?;
        let vle2 = Self::pure(eos, 0.8 * tc, Some(&vle1), options.inherit())?;
        let (t1, t2) = (vle1.temperature(), vle2.temperature());
        let ln_p1 = vle1.vapor().pressure(Contributions::Total).ln();
        let ln_p2 = vle2.vapor().pressure(Contributions::Total).ln();
        let slope = (ln_p2 - ln_p1) / (1.0 / t2 - 1.0 / t1);
        let t0 = 1.0 / (1.0 / t1 + (pressure.ln() - ln_p1) / slope);
        let t0 = t0.min(0.99 * tc);
        Self::pure(eos, t0, Some(&vle2), options.inherit())
    }
}

impl<E: Residual> PhaseEquilibrium<E, 2> {
    /// Calculate the pure component vapor pressures of all
    /// components in the system for the given temperature.
    pub fn vapor_pressure(eos: &Arc<E>, temperature: f64) -> Vec<Option<f64>> {
        (0..eos.components())
            .map(|i| {
                let pure_eos = Arc::new(eos.subset(&[i]));
                PhaseEquilibrium::pure(&pure_eos, temperature, None, SolverOptions::default())
                    .map(|vle| vle.vapor().pressure(Contributions::Total))
                    .ok()
            })
            .collect()
    }

    /// Calculate the pure component boiling temperatures of all
    /// components in the system for the given pressure.
    pub fn boiling_temperature(eos: &Arc<E>, pressure: f64) -> Vec<Option<f64>> {
        (0..eos.components())
            .map(|i| {
                let pure_eos = Arc::new(eos.subset(&[i]));
                PhaseEquilibrium::pure_p(&pure_eos, pressure, None, SolverOptions::default())
                    .map(|vle| vle.vapor().temperature)
                    .ok()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cubic::{PengRobinson, PengRobinsonParameters};
    use crate::{Cancellation, Components, KB_A3};
    use approx::assert_relative_eq;
    use std::sync::atomic::AtomicBool;

    fn mixture() -> EosResult<Arc<PengRobinson>> {
        let parameters = PengRobinsonParameters::new_simple(
            &[369.96, 425.2],
            &[4250000.0, 3800000.0],
            &[0.153, 0.199],
            &[44.0962, 58.123],
        )?;
        Ok(Arc::new(PengRobinson::new(Arc::new(parameters))))
    }

    #[test]
    fn pure_t_and_pure_p_agree() -> EosResult<()> {
        let eos = Arc::new(mixture()?.subset(&[0]));
        let vle_t = PhaseEquilibrium::pure(&eos, 300.0, None, Default::default())?;
        let p = vle_t.vapor().pressure(Contributions::Total);
        let vle_p = PhaseEquilibrium::pure_p(&eos, p, None, Default::default())?;
        assert_relative_eq!(vle_p.vapor().temperature, 300.0, max_relative = 1e-8);
        assert_relative_eq!(
            vle_p.liquid().density,
            vle_t.liquid().density,
            max_relative = 1e-6
        );
        Ok(())
    }

    #[test]
    fn equal_pressure_and_fugacity() -> EosResult<()> {
        let eos = Arc::new(mixture()?.subset(&[1]));
        for &t in [250.0, 320.0, 400.0].iter() {
            let vle = PhaseEquilibrium::pure(&eos, t, None, Default::default())?;
            assert!(vle.equilibrium_residual() < 1e-8);
            assert!(vle.vapor().density < vle.liquid().density);
        }
        Ok(())
    }

    #[test]
    fn vapor_pressures_of_components() -> EosResult<()> {
        let eos = mixture()?;
        let p = PhaseEquilibrium::vapor_pressure(&eos, 400.0);
        // propane is supercritical at 400 K
        assert!(p[0].is_none());
        let p_butane = p[1].ok_or(EosError::SuperCritical)? * KB_A3;
        assert!(p_butane > 1e6 && p_butane < 3.8e6);
        let t = PhaseEquilibrium::boiling_temperature(&eos, p[1].unwrap_or(1.0));
        assert_relative_eq!(t[1].unwrap_or(0.0), 400.0, max_relative = 1e-6);
        Ok(())
    }

    #[test]
    fn supercritical_pressure() -> EosResult<()> {
        let eos = Arc::new(mixture()?.subset(&[0]));
        let vle = PhaseEquilibrium::pure_p(&eos, 5e6 / KB_A3, None, Default::default());
        assert!(matches!(vle, Err(EosError::SuperCritical)));
        Ok(())
    }

    #[test]
    fn cancelled_vle() -> EosResult<()> {
        let eos = Arc::new(mixture()?.subset(&[0]));
        let flag = Arc::new(AtomicBool::new(true));
        let options = SolverOptions::new().cancel(Cancellation::from_flag(flag));
        let vle = PhaseEquilibrium::pure(&eos, 300.0, None, options);
        assert!(matches!(vle, Err(EosError::Cancelled)));
        Ok(())
    }
}
