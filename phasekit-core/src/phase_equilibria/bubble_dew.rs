use super::PhaseEquilibrium;
use crate::equation_of_state::Residual;
use crate::errors::{EosError, EosResult};
use crate::state::{
    Contributions,
    DensityInitialization::{InitialDensity, Liquid, Vapor},
    State,
};
use crate::{SolverOptions, Verbosity};
use ndarray::*;
use num_dual::linalg::{norm, LU};
use std::sync::Arc;

const MAX_ITER_INNER: usize = 5;
const TOL_INNER: f64 = 1e-9;
const MAX_ITER_OUTER: usize = 400;
const TOL_OUTER: f64 = 1e-10;

const MAX_LNPSTEP: f64 = 0.1;
const NEWTON_TOL: f64 = 1e-3;

/// # Bubble and dew point calculations
impl<E: Residual> PhaseEquilibrium<E, 2> {
    /// Calculate a phase equilibrium for a given temperature
    /// and composition of the liquid phase.
    ///
    /// Without an initial pressure, the calculation is initialized from an
    /// ideal gas estimate and, if that fails, from the spinodals.
    pub fn bubble_point(
        eos: &Arc<E>,
        temperature: f64,
        liquid_molefracs: &Array1<f64>,
        p_init: Option<f64>,
        vapor_molefracs: Option<&Array1<f64>>,
        options: (SolverOptions, SolverOptions),
    ) -> EosResult<Self> {
        Self::bubble_dew_point(
            eos,
            temperature,
            p_init,
            liquid_molefracs,
            vapor_molefracs,
            true,
            options,
        )
    }

    /// Calculate a phase equilibrium for a given temperature
    /// and composition of the vapor phase.
    pub fn dew_point(
        eos: &Arc<E>,
        temperature: f64,
        vapor_molefracs: &Array1<f64>,
        p_init: Option<f64>,
        liquid_molefracs: Option<&Array1<f64>>,
        options: (SolverOptions, SolverOptions),
    ) -> EosResult<Self> {
        Self::bubble_dew_point(
            eos,
            temperature,
            p_init,
            vapor_molefracs,
            liquid_molefracs,
            false,
            options,
        )
    }

    fn bubble_dew_point(
        eos: &Arc<E>,
        temperature: f64,
        p_init: Option<f64>,
        molefracs_spec: &Array1<f64>,
        molefracs_init: Option<&Array1<f64>>,
        bubble: bool,
        options: (SolverOptions, SolverOptions),
    ) -> EosResult<Self> {
        eos.validate_moles(Some(molefracs_spec))?;

        // First use given initial pressure if applicable
        if let Some(p) = p_init {
            return Self::iterate_bubble_dew(
                eos,
                temperature,
                p,
                molefracs_spec,
                molefracs_init,
                bubble,
                &options,
            );
        }

        // Next try to initialize with an ideal gas assumption
        let vle = Self::starting_pressure_ideal_gas(eos, temperature, molefracs_spec, bubble)
            .and_then(|(p, x)| {
                Self::iterate_bubble_dew(
                    eos,
                    temperature,
                    p,
                    molefracs_spec,
                    molefracs_init.or(Some(&x)),
                    bubble,
                    &options,
                )
            });

        // Finally use the spinodal to initialize the calculation
        match vle {
            Err(EosError::Cancelled) => Err(EosError::Cancelled),
            Err(_) => Self::iterate_bubble_dew(
                eos,
                temperature,
                Self::starting_pressure_spinodal(eos, temperature, molefracs_spec, &options.1)?,
                molefracs_spec,
                molefracs_init,
                bubble,
                &options,
            ),
            vle => vle,
        }
    }

    fn iterate_bubble_dew(
        eos: &Arc<E>,
        temperature: f64,
        pressure: f64,
        molefracs_spec: &Array1<f64>,
        molefracs_init: Option<&Array1<f64>>,
        bubble: bool,
        options: &(SolverOptions, SolverOptions),
    ) -> EosResult<Self> {
        let [state1, state2] = if bubble {
            starting_x2_bubble(eos, temperature, pressure, molefracs_spec, molefracs_init)
        } else {
            starting_x2_dew(eos, temperature, pressure, molefracs_spec, molefracs_init)
        }?;
        bubble_dew(pressure, state1, state2, bubble, options)
    }

    fn starting_pressure_ideal_gas(
        eos: &Arc<E>,
        temperature: f64,
        molefracs_spec: &Array1<f64>,
        bubble: bool,
    ) -> EosResult<(f64, Array1<f64>)> {
        if bubble {
            Self::starting_pressure_ideal_gas_bubble(eos, temperature, molefracs_spec)
        } else {
            Self::starting_pressure_ideal_gas_dew(eos, temperature, molefracs_spec)
        }
    }

    /// Bubble pressure and vapor composition of an ideal gas in equilibrium
    /// with a liquid at 75 % of the maximum density.
    pub(super) fn starting_pressure_ideal_gas_bubble(
        eos: &Arc<E>,
        temperature: f64,
        liquid_molefracs: &Array1<f64>,
    ) -> EosResult<(f64, Array1<f64>)> {
        let m = liquid_molefracs;
        let density = 0.75 * eos.max_density(Some(m))?;
        let liquid = State::new_nvt(eos, temperature, m.sum() / density, m)?;
        let v_l = liquid.partial_molar_volume();
        let p_l = liquid.pressure(Contributions::Total);
        let mu_l = liquid.residual_chemical_potential();
        let p_i = (liquid_molefracs * temperature * density)
            * ((mu_l - p_l * v_l) / temperature).mapv(f64::exp);
        let p = p_i.sum();
        let y = p_i / p;
        Ok((p, y))
    }

    fn starting_pressure_ideal_gas_dew(
        eos: &Arc<E>,
        temperature: f64,
        vapor_molefracs: &Array1<f64>,
    ) -> EosResult<(f64, Array1<f64>)> {
        let mut p = f64::NAN;

        let mut x = vapor_molefracs.clone();
        for _ in 0..5 {
            let density = 0.75 * eos.max_density(Some(&x))?;
            let liquid = State::new_nvt(eos, temperature, x.sum() / density, &x)?;
            let v_l = liquid.partial_molar_volume();
            let p_l = liquid.pressure(Contributions::Total);
            let mu_l = liquid.residual_chemical_potential();
            let k = vapor_molefracs / ((mu_l - p_l * v_l) / temperature).mapv(f64::exp);
            let p_new = temperature * density / k.sum();
            x = &k / k.sum();
            let converged = ((p_new - p) / p).abs() < 1e-5;
            p = p_new;
            if converged {
                break;
            }
        }
        Ok((p, x))
    }

    /// Mean of the spinodal pressures (negative liquid spinodal
    /// pressures are replaced by zero).
    pub(super) fn starting_pressure_spinodal(
        eos: &Arc<E>,
        temperature: f64,
        molefracs: &Array1<f64>,
        options: &SolverOptions,
    ) -> EosResult<f64> {
        let [sp_v, sp_l] = State::spinodal(eos, temperature, Some(molefracs), options.inherit())?;
        let pv = sp_v.pressure(Contributions::Total);
        let pl = sp_l.pressure(Contributions::Total);
        Ok(0.5 * (pl.max(0.0) + pv))
    }
}

fn starting_x2_bubble<E: Residual>(
    eos: &Arc<E>,
    temperature: f64,
    pressure: f64,
    liquid_molefracs: &Array1<f64>,
    vapor_molefracs: Option<&Array1<f64>>,
) -> EosResult<[State<E>; 2]> {
    let liquid_state = State::new_npt(eos, temperature, pressure, liquid_molefracs, Liquid)?;
    let xv = match vapor_molefracs {
        Some(xv) => xv.clone(),
        None => liquid_state.ln_phi().mapv(f64::exp) * liquid_molefracs,
    };
    let vapor_state = State::new_npt(eos, temperature, pressure, &xv, Vapor)?;
    Ok([liquid_state, vapor_state])
}

fn starting_x2_dew<E: Residual>(
    eos: &Arc<E>,
    temperature: f64,
    pressure: f64,
    vapor_molefracs: &Array1<f64>,
    liquid_molefracs: Option<&Array1<f64>>,
) -> EosResult<[State<E>; 2]> {
    let vapor_state = State::new_npt(eos, temperature, pressure, vapor_molefracs, Vapor)?;
    let xl = match liquid_molefracs {
        Some(xl) => xl.clone(),
        None => {
            let xl = vapor_state.ln_phi().mapv(f64::exp) * vapor_molefracs;
            let liquid_state = State::new_npt(eos, temperature, pressure, &xl, Liquid)?;
            (vapor_state.ln_phi() - liquid_state.ln_phi()).mapv(f64::exp) * vapor_molefracs
        }
    };
    let liquid_state = State::new_npt(eos, temperature, pressure, &xl, Liquid)?;
    Ok([vapor_state, liquid_state])
}

/// Successive substitution on the composition of the incipient phase
/// (`state2`) with an inner iteration on $\ln p$, followed by a full
/// Newton iteration once the residual is small.
fn bubble_dew<E: Residual>(
    mut pressure: f64,
    mut state1: State<E>,
    mut state2: State<E>,
    bubble: bool,
    options: &(SolverOptions, SolverOptions),
) -> EosResult<PhaseEquilibrium<E, 2>> {
    let (options_inner, options_outer) = options;
    let max_iter = options_outer.max_iter.unwrap_or(MAX_ITER_OUTER);
    let tol = options_outer.tol.unwrap_or(TOL_OUTER);

    // initialize variables
    let mut err_out = 1.0;
    let mut k_out = 0;

    if PhaseEquilibrium::is_trivial_solution(&state1, &state2) {
        log_iter!(options_outer.verbosity, "Trivial solution encountered!");
        return Err(EosError::TrivialSolution);
    }

    log_iter!(
        options_outer.verbosity,
        "res outer loop | res inner loop |     pressure     | molefracs second phase"
    );
    log_iter!(options_outer.verbosity, "{:-<85}", "");
    log_iter!(
        options_outer.verbosity,
        "{:14} | {:14} | {:12.8e} | {:.8}",
        "",
        "",
        pressure,
        state2.molefracs
    );

    // Outer loop for finding x2
    for ko in 0..max_iter {
        options_outer.check_cancelled()?;

        // Iso-Fugacity equation
        err_out = if err_out > NEWTON_TOL {
            // Inner loop for finding p
            for _ in 0..options_inner.max_iter.unwrap_or(MAX_ITER_INNER) {
                if adjust_p(
                    &mut pressure,
                    &mut state1,
                    &mut state2,
                    options_inner.verbosity,
                )? < options_inner.tol.unwrap_or(TOL_INNER)
                {
                    break;
                }
            }
            adjust_x2(&state1, &mut state2, options_outer.verbosity)
        } else {
            newton_step(&mut pressure, &mut state1, &mut state2, options_outer.verbosity)
        }?;

        if PhaseEquilibrium::is_trivial_solution(&state1, &state2) {
            log_iter!(options_outer.verbosity, "Trivial solution encountered!");
            return Err(EosError::TrivialSolution);
        }

        if err_out < tol {
            k_out = ko + 1;
            break;
        }
    }

    if err_out < tol {
        log_result!(
            options_outer.verbosity,
            "Bubble/dew point: calculation converged in {} step(s)\n",
            k_out
        );
        if bubble {
            Ok(PhaseEquilibrium([state2, state1]))
        } else {
            Ok(PhaseEquilibrium([state1, state2]))
        }
    } else {
        Err(EosError::no_convergence("bubble-dew-iteration", max_iter, err_out))
    }
}

fn adjust_p<E: Residual>(
    pressure: &mut f64,
    state1: &mut State<E>,
    state2: &mut State<E>,
    verbosity: Verbosity,
) -> EosResult<f64> {
    // calculate K = phi_1/phi_2 = x_2/x_1
    let ln_phi_1 = state1.ln_phi();
    let ln_phi_2 = state2.ln_phi();
    let k = (&ln_phi_1 - &ln_phi_2).mapv(f64::exp);

    // calculate residual
    let f = (&state1.molefracs * &k).sum() - 1.0;

    // Derivative w.r.t. ln(pressure)
    let ln_phi_1_dp = state1.dln_phi_dp();
    let ln_phi_2_dp = state2.dln_phi_dp();
    let df = ((ln_phi_1_dp - ln_phi_2_dp) * *pressure * &state1.molefracs * &k).sum();
    let lnpstep = (-f / df).clamp(-MAX_LNPSTEP, MAX_LNPSTEP);
    if lnpstep.is_nan() {
        return Err(EosError::IterationFailed(String::from("bubble-dew-iteration")));
    }

    // Update p
    *pressure *= lnpstep.exp();

    // update states with new pressure
    *state1 = State::new_npt(
        &state1.eos,
        state1.temperature,
        *pressure,
        &state1.moles,
        InitialDensity(state1.density),
    )?;
    *state2 = State::new_npt(
        &state2.eos,
        state2.temperature,
        *pressure,
        &state2.moles,
        InitialDensity(state2.density),
    )?;

    log_iter!(
        verbosity,
        "{:14} | {:<14.8e} | {:12.8e} | {:.8}",
        "",
        f.abs(),
        pressure,
        state2.molefracs
    );

    Ok(f.abs())
}

fn newton_step<E: Residual>(
    pressure: &mut f64,
    state1: &mut State<E>,
    state2: &mut State<E>,
    verbosity: Verbosity,
) -> EosResult<f64> {
    let dmu_drho_1 = (state1.dmu_dni(Contributions::Total) * state1.volume).dot(&state1.molefracs);
    let dmu_drho_2 = state2.dmu_dni(Contributions::Total) * state2.volume;
    let dp_drho_1 = (state1.dp_dni(Contributions::Total) * state1.volume).dot(&state1.molefracs);
    let dp_drho_2 = state2.dp_dni(Contributions::Total) * state2.volume;
    let mu_1_res = state1.residual_chemical_potential();
    let mu_2_res = state2.residual_chemical_potential();
    let p_1 = state1.pressure(Contributions::Total);
    let p_2 = state2.pressure(Contributions::Total);

    // calculate residual
    let dmu_ig = state1.temperature
        * (&state1.partial_density / &state2.partial_density).mapv(f64::ln);
    let res = concatenate![Axis(0), mu_1_res - mu_2_res + dmu_ig, arr1(&[p_1 - p_2])];
    let error = norm(&res);

    // calculate Jacobian
    let jacobian = concatenate![
        Axis(1),
        concatenate![Axis(0), -dmu_drho_2, -dp_drho_2.insert_axis(Axis(0))],
        concatenate![
            Axis(0),
            dmu_drho_1.insert_axis(Axis(1)),
            arr2(&[[dp_drho_1]])
        ]
    ];

    // calculate Newton step
    let dx = LU::new(jacobian)?.solve(&res);

    // apply Newton step
    let rho_l1 = state1.density - dx[dx.len() - 1];
    let rho_l2 = &state2.partial_density - &dx.slice(s![0..-1]);

    // update states
    *state1 = State::new_nvt(&state1.eos, state1.temperature, 1.0 / rho_l1, &state1.molefracs)?;
    *state2 = State::new_density(&state2.eos, state2.temperature, &rho_l2)?;
    *pressure = state1.pressure(Contributions::Total);
    log_iter!(
        verbosity,
        "{:<14.8e} | {:14} | {:12.8e} | {:.8} NEWTON",
        error,
        "",
        pressure,
        state2.molefracs
    );
    Ok(error)
}

fn adjust_x2<E: Residual>(
    state1: &State<E>,
    state2: &mut State<E>,
    verbosity: Verbosity,
) -> EosResult<f64> {
    let x1 = &state1.molefracs;
    let ln_phi_1 = state1.ln_phi();
    let ln_phi_2 = state2.ln_phi();
    let k = (ln_phi_1 - ln_phi_2).mapv(f64::exp);
    let err_out = (&k * x1 / &state2.molefracs - 1.0).mapv(f64::abs).sum();
    let x2 = (x1 * &k) / (&k * x1).sum();
    log_iter!(verbosity, "{:<14.8e} | {:14} | {:16} |", err_out, "", "");
    *state2 = State::new_npt(
        &state2.eos,
        state2.temperature,
        state2.pressure(Contributions::Total),
        &x2,
        InitialDensity(state2.density),
    )?;
    Ok(err_out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cubic::{PengRobinson, PengRobinsonParameters};
    use approx::assert_relative_eq;

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
    fn bubble_point() -> EosResult<()> {
        let eos = mixture()?;
        let x = arr1(&[0.5, 0.5]);
        let vle = PhaseEquilibrium::bubble_point(&eos, 330.0, &x, None, None, Default::default())?;
        assert_relative_eq!(vle.liquid().molefracs, x, epsilon = 1e-12);
        assert!(vle.vapor().molefracs[0] > 0.5);
        assert!(vle.equilibrium_residual() < 1e-6);

        let p = vle.vapor().pressure(Contributions::Total);
        let p_sat = PhaseEquilibrium::vapor_pressure(&eos, 330.0);
        assert!(p < p_sat[0].unwrap_or(0.0));
        assert!(p > p_sat[1].unwrap_or(f64::INFINITY));
        Ok(())
    }

    #[test]
    fn dew_point_inverts_bubble_point() -> EosResult<()> {
        let eos = mixture()?;
        let x = arr1(&[0.3, 0.7]);
        let bubble =
            PhaseEquilibrium::bubble_point(&eos, 350.0, &x, None, None, Default::default())?;
        let y = bubble.vapor().molefracs.clone();
        let dew = PhaseEquilibrium::dew_point(&eos, 350.0, &y, None, None, Default::default())?;
        assert_relative_eq!(
            dew.vapor().pressure(Contributions::Total),
            bubble.vapor().pressure(Contributions::Total),
            max_relative = 1e-6
        );
        assert_relative_eq!(dew.liquid().molefracs, x, epsilon = 1e-6);
        Ok(())
    }

    #[test]
    fn incompatible_composition() -> EosResult<()> {
        let eos = mixture()?;
        let x = arr1(&[0.2, 0.3, 0.5]);
        let vle = PhaseEquilibrium::bubble_point(&eos, 330.0, &x, None, None, Default::default());
        assert!(matches!(vle, Err(EosError::IncompatibleComponents(2, 3))));
        Ok(())
    }
}
