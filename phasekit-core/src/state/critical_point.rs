use super::{DensityInitialization, State, StateHD};
use crate::equation_of_state::{ideal_gas_helmholtz_energy, Residual};
use crate::errors::{EosError, EosResult};
use crate::solver_options::{SolverOptions, Verbosity};
use ndarray::{arr1, arr2, Array1, Array2};
use num_dual::linalg::{norm, smallest_ev, LU};
use num_dual::{Dual2, Dual3, Dual64, DualNum, HyperDual};
use num_traits::{One, Zero};
use std::sync::Arc;

const MAX_ITER_CRIT_POINT: usize = 50;
const TOL_CRIT_POINT: f64 = 1e-8;

/// # Critical points
impl<E: Residual> State<E> {
    /// Calculate the pure component critical point of all components.
    pub fn critical_point_pure(
        eos: &Arc<E>,
        initial_temperature: Option<f64>,
        options: SolverOptions,
    ) -> EosResult<Vec<Self>> {
        (0..eos.components())
            .map(|i| {
                Self::critical_point(
                    &Arc::new(eos.subset(&[i])),
                    None,
                    initial_temperature,
                    options.clone(),
                )
            })
            .collect()
    }

    /// Calculate the critical point of a system for given moles.
    ///
    /// Without an initial temperature, the iteration is started from the
    /// estimate of the model and, if that fails, from a fixed set of
    /// trial temperatures.
    pub fn critical_point(
        eos: &Arc<E>,
        moles: Option<&Array1<f64>>,
        initial_temperature: Option<f64>,
        options: SolverOptions,
    ) -> EosResult<Self> {
        let moles = eos.validate_moles(moles)?;
        if let Some(t) = initial_temperature {
            return Self::critical_point_newton(eos, &moles, t, options);
        }
        let trial_temperatures = [eos.critical_point_guess(&moles), 300.0, 700.0, 500.0];
        let mut error = None;
        for &t in trial_temperatures.iter() {
            match Self::critical_point_newton(eos, &moles, t, options.clone()) {
                Ok(s) => return Ok(s),
                Err(EosError::Cancelled) => return Err(EosError::Cancelled),
                Err(e @ EosError::NoConvergence { .. }) => error = Some(e),
                Err(_) => (),
            }
        }
        Err(error.unwrap_or_else(|| {
            EosError::no_convergence("critical point", MAX_ITER_CRIT_POINT, f64::NAN)
        }))
    }

    fn critical_point_newton(
        eos: &Arc<E>,
        moles: &Array1<f64>,
        initial_temperature: f64,
        options: SolverOptions,
    ) -> EosResult<Self> {
        let (max_iter, tol, verbosity) = options.unwrap_or(MAX_ITER_CRIT_POINT, TOL_CRIT_POINT);

        let mut t = initial_temperature;
        let max_density = eos.max_density(Some(moles))?;
        let mut rho = 0.3 * max_density;
        let objective = if eos.components() == 1 {
            critical_point_objective_pure::<E>
        } else {
            critical_point_objective::<E>
        };

        log_iter!(
            verbosity,
            " iter |    residual    |   temperature   |       density        "
        );
        log_iter!(verbosity, "{:-<64}", "");
        log_iter!(verbosity, " {:4} |                | {:13.8} | {:12.8e}", 0, t, rho);

        let mut residual = f64::INFINITY;
        for i in 1..=max_iter {
            options.check_cancelled()?;

            // calculate residuals and derivatives w.r.t. temperature and density
            let res_t = objective(eos, Dual64::from(t).derivative(), Dual64::from(rho), moles);
            let res_r = objective(eos, Dual64::from(t), Dual64::from(rho).derivative(), moles);
            let res = res_t.map(Dual64::re);
            residual = norm(&res);
            if !residual.is_finite() {
                return Err(EosError::IterationFailed(String::from("critical point")));
            }

            // check convergence
            if residual < tol {
                log_result!(
                    verbosity,
                    "Critical point calculation converged in {} step(s)\n",
                    i - 1
                );
                return State::new_nvt(eos, t, moles.sum() / rho, moles);
            }

            // calculate Newton step
            let h = arr2(&[[res_t[0].eps, res_r[0].eps], [res_t[1].eps, res_r[1].eps]]);
            let mut delta = LU::new(h)?.solve(&res);

            // reduce step if necessary
            if delta[0].abs() > 0.25 * t {
                delta *= 0.25 * t / delta[0].abs()
            }
            if delta[1].abs() > 0.03 * max_density {
                delta *= 0.03 * max_density / delta[1].abs()
            }

            // apply step
            t -= delta[0];
            rho -= delta[1];
            rho = f64::max(rho, 1e-4 * max_density);

            log_iter!(verbosity, " {:4} | {:14.8e} | {:13.8} | {:12.8e}", i, residual, t, rho);
        }
        log_result!(verbosity, "Critical point calculation did not converge\n");
        Err(EosError::no_convergence("critical point", max_iter, residual))
    }

    /// Calculate the vapor and the liquid spinodal at the given temperature.
    pub fn spinodal(
        eos: &Arc<E>,
        temperature: f64,
        moles: Option<&Array1<f64>>,
        options: SolverOptions,
    ) -> EosResult<[Self; 2]> {
        let critical_point = Self::critical_point(eos, moles, None, options.inherit())?;
        let moles = eos.validate_moles(moles)?;
        let spinodal_vapor = Self::calculate_spinodal(
            eos,
            temperature,
            &moles,
            DensityInitialization::Vapor,
            options.clone(),
        )?;
        let rho = 2.0 * critical_point.density - spinodal_vapor.density;
        let spinodal_liquid = Self::calculate_spinodal(
            eos,
            temperature,
            &moles,
            DensityInitialization::InitialDensity(rho),
            options,
        )?;
        Ok([spinodal_vapor, spinodal_liquid])
    }

    fn calculate_spinodal(
        eos: &Arc<E>,
        temperature: f64,
        moles: &Array1<f64>,
        density_initialization: DensityInitialization,
        options: SolverOptions,
    ) -> EosResult<Self> {
        let (max_iter, tol, verbosity) = options.unwrap_or(MAX_ITER_CRIT_POINT, TOL_CRIT_POINT);

        let max_density = eos.max_density(Some(moles))?;
        let mut rho = match density_initialization {
            DensityInitialization::Vapor => 1e-5 * max_density,
            DensityInitialization::Liquid => max_density,
            DensityInitialization::InitialDensity(rho) => rho,
            DensityInitialization::None => {
                return Err(EosError::Error(String::from(
                    "A spinodal requires a vapor or liquid initialization.",
                )))
            }
        };

        log_iter!(verbosity, " iter |    residual    |       density        ");
        log_iter!(verbosity, "{:-<46}", "");
        log_iter!(verbosity, " {:4} |                | {:12.8e}", 0, rho);

        for i in 1..=max_iter {
            options.check_cancelled()?;

            // calculate residuals and derivative w.r.t. density
            let res = spinodal_objective(eos, Dual64::from(temperature), Dual64::from(rho).derivative(), moles);

            // calculate Newton step
            let mut delta = res.re / res.eps;
            if !delta.is_finite() {
                break;
            }

            // reduce step if necessary
            if delta.abs() > 0.03 * max_density {
                delta *= 0.03 * max_density / delta.abs()
            }

            // apply step
            rho -= delta;
            rho = f64::max(rho, 1e-4 * max_density);

            log_iter!(verbosity, " {:4} | {:14.8e} | {:12.8e}", i, res.re.abs(), rho);

            // check convergence
            if res.re.abs() < tol {
                log_result!(verbosity, "Spinodal calculation converged in {} step(s)\n", i);
                return State::new_nvt(eos, temperature, moles.sum() / rho, moles);
            }
        }
        Err(EosError::SuperCritical)
    }

    /// Density at which the liquid branch of the isotherm becomes mechanically unstable,
    /// i.e. $\left(\frac{\partial p}{\partial\rho}\right)_{T,x_i}=0$.
    ///
    /// Returns [EosError::SuperCritical] if the isotherm has no such point.
    pub(crate) fn liquid_spinodal_density(
        eos: &Arc<E>,
        temperature: f64,
        moles: &Array1<f64>,
    ) -> EosResult<f64> {
        let max_density = eos.max_density(Some(moles))?;
        let mut rho = max_density;
        for _ in 0..MAX_ITER_CRIT_POINT {
            let res = mechanical_stability(eos, Dual64::from(temperature), Dual64::from(rho).derivative(), moles);
            if res.re.abs() < TOL_CRIT_POINT {
                return Ok(rho);
            }
            let mut delta = res.re / res.eps;
            if !delta.is_finite() {
                break;
            }
            if delta.abs() > 0.03 * max_density {
                delta = 0.03 * max_density * delta.signum()
            }
            rho = f64::max(rho - delta, 1e-4 * max_density);
        }
        Err(EosError::SuperCritical)
    }
}

fn total_helmholtz_energy<E: Residual, D: DualNum<f64> + Copy>(eos: &E, state: &StateHD<D>) -> D {
    ideal_gas_helmholtz_energy(state) + eos.residual_helmholtz_energy(state)
}

/// $\beta\left(\frac{\partial p}{\partial\rho}\right)_{T,N_i}=\frac{V^2}{N}\left(\frac{\partial^2\beta A}{\partial V^2}\right)_{T,N_i}$
fn mechanical_stability<E: Residual>(
    eos: &Arc<E>,
    temperature: Dual64,
    density: Dual64,
    moles: &Array1<f64>,
) -> Dual64 {
    let n = moles.sum();
    let v = density.recip() * n;
    let state = StateHD::new(
        Dual2::from_re(temperature),
        Dual2::from_re(v).derivative(),
        moles.mapv(Dual2::from),
    );
    total_helmholtz_energy(&**eos, &state).v2 * v * v / n
}

/// Both volume derivatives of the pressure of a pure substance in dimensionless form.
fn critical_point_objective_pure<E: Residual>(
    eos: &Arc<E>,
    temperature: Dual64,
    density: Dual64,
    moles: &Array1<f64>,
) -> Array1<Dual64> {
    let n = moles.sum();
    let v = density.recip() * n;
    let state = StateHD::new(
        Dual3::from_re(temperature),
        Dual3::from_re(v).derivative(),
        moles.mapv(Dual3::from),
    );
    let a = total_helmholtz_energy(&**eos, &state);
    arr1(&[a.v2 * v * v / n, a.v3 * v * v * v / n])
}

/// Stability criterion and third derivative along the critical eigenvector
/// (Heidemann and Khalil) for mixtures.
fn critical_point_objective<E: Residual>(
    eos: &Arc<E>,
    temperature: Dual64,
    density: Dual64,
    moles: &Array1<f64>,
) -> Array1<Dual64> {
    let (eval, evec) = smallest_eigenpair(eos, temperature, density, moles);

    // evaluate third partial derivative w.r.t. s
    let moles_hd = Array1::from_shape_fn(eos.components(), |i| {
        Dual3::new(
            Dual64::from(moles[i]),
            evec[i] * moles[i].sqrt(),
            Dual64::zero(),
            Dual64::zero(),
        )
    });
    let state_s = StateHD::new(
        Dual3::from_re(temperature),
        Dual3::from_re(density.recip() * moles.sum()),
        moles_hd,
    );
    let res = total_helmholtz_energy(&**eos, &state_s);
    arr1(&[eval, res.v3])
}

fn spinodal_objective<E: Residual>(
    eos: &Arc<E>,
    temperature: Dual64,
    density: Dual64,
    moles: &Array1<f64>,
) -> Dual64 {
    smallest_eigenpair(eos, temperature, density, moles).0
}

/// Smallest eigenvalue and eigenvector of the scaled Hessian
/// $q_{ij}=\sqrt{N_iN_j}\frac{\partial^2\beta A}{\partial N_i\partial N_j}$.
fn smallest_eigenpair<E: Residual>(
    eos: &Arc<E>,
    temperature: Dual64,
    density: Dual64,
    moles: &Array1<f64>,
) -> (Dual64, Array1<Dual64>) {
    let t = HyperDual::from_re(temperature);
    let v = HyperDual::from_re(density.recip() * moles.sum());
    let qij = Array2::from_shape_fn((eos.components(), eos.components()), |(i, j)| {
        let mut m = moles.mapv(HyperDual::from);
        m[i].eps1 = Dual64::one();
        m[j].eps2 = Dual64::one();
        let state = StateHD::new(t, v, m);
        total_helmholtz_energy(&**eos, &state).eps1eps2 * (moles[i] * moles[j]).sqrt()
    });
    smallest_ev(qij)
}

#[cfg(test)]
mod tests {
    use crate::cubic::{PengRobinson, PengRobinsonParameters};
    use crate::{Cancellation, Components, Contributions, EosError, EosResult, SolverOptions, State};
    use approx::assert_relative_eq;
    use ndarray::arr1;
    use std::sync::Arc;
    use std::time::Duration;

    fn propane_butane() -> EosResult<Arc<PengRobinson>> {
        let parameters = PengRobinsonParameters::new_simple(
            &[369.96, 425.2],
            &[4250000.0, 3800000.0],
            &[0.153, 0.199],
            &[44.0962, 58.123],
        )?;
        Ok(Arc::new(PengRobinson::new(Arc::new(parameters))))
    }

    #[test]
    fn derivatives_vanish_at_critical_point() -> EosResult<()> {
        let eos = propane_butane()?;
        for cp in State::critical_point_pure(&eos, None, Default::default())? {
            let p = cp.pressure(Contributions::Total);
            let v = cp.volume;
            assert!((cp.dp_dv(Contributions::Total) * v / p).abs() < 1e-6);
            assert!((cp.d2p_dv2(Contributions::Total) * v * v / p).abs() < 1e-6);
        }
        Ok(())
    }

    #[test]
    fn mixture_critical_point_between_pure_components() -> EosResult<()> {
        let eos = propane_butane()?;
        let cp = State::critical_point(&eos, Some(&arr1(&[0.5, 0.5])), None, Default::default())?;
        assert!(cp.temperature > 369.96 && cp.temperature < 425.2);
        Ok(())
    }

    #[test]
    fn spinodal_brackets_critical_density() -> EosResult<()> {
        let eos = Arc::new(propane_butane()?.subset(&[0]));
        let cp = State::critical_point(&eos, None, None, Default::default())?;
        let [vapor, liquid] = State::spinodal(&eos, 300.0, None, Default::default())?;
        assert!(vapor.density < cp.density && cp.density < liquid.density);
        assert_relative_eq!(vapor.dp_drho(), 0.0, epsilon = 1e-6);
        assert_relative_eq!(liquid.dp_drho(), 0.0, epsilon = 1e-6);
        let rho = State::liquid_spinodal_density(&eos, 300.0, &arr1(&[1.0]))?;
        assert_relative_eq!(rho, liquid.density, max_relative = 1e-6);
        Ok(())
    }

    #[test]
    fn supercritical_liquid_spinodal() -> EosResult<()> {
        let eos = Arc::new(propane_butane()?.subset(&[0]));
        assert!(matches!(
            State::liquid_spinodal_density(&eos, 500.0, &arr1(&[1.0])),
            Err(EosError::SuperCritical)
        ));
        Ok(())
    }

    #[test]
    fn cancelled_critical_point() -> EosResult<()> {
        let eos = propane_butane()?;
        let options = SolverOptions::new().cancel(Cancellation::from_timeout(Duration::ZERO));
        let cp = State::critical_point(&eos, Some(&arr1(&[0.5, 0.5])), None, options);
        assert!(matches!(cp, Err(EosError::Cancelled)));
        Ok(())
    }
}
