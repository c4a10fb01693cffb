use crate::equation_of_state::Residual;
use crate::errors::{EosError, EosResult};
use crate::state::State;
use ndarray::Array1;
use std::sync::Arc;

const MAX_ITER_DENSITY: usize = 50;
const MAX_ITER_SPINODAL: usize = 30;
const MAX_STEP: f64 = 0.075;

/// Find the volume at which the pressure equals `pressure`.
///
/// The Newton iteration is carried out in the density $\rho=N/V$, which
/// has the same roots and a better conditioned derivative. If the
/// iteration fails to converge, it is restarted once from the same
/// initial density with half the step limit.
pub fn density_iteration<E: Residual>(
    eos: &Arc<E>,
    temperature: f64,
    pressure: f64,
    moles: &Array1<f64>,
    initial_density: f64,
) -> EosResult<State<E>> {
    let state = match newton_density(eos, temperature, pressure, moles, initial_density, MAX_STEP)
    {
        Err(EosError::NoConvergence { .. }) => newton_density(
            eos,
            temperature,
            pressure,
            moles,
            initial_density,
            0.5 * MAX_STEP,
        ),
        res => res,
    }?;

    // a converged root on the unstable branch is not a physical state
    if state.dp_drho() <= 0.0 {
        return Err(EosError::NoPhysicalRoot {
            phase: "stable".into(),
            temperature,
            pressure,
        });
    }
    Ok(state)
}

fn newton_density<E: Residual>(
    eos: &Arc<E>,
    temperature: f64,
    pressure: f64,
    moles: &Array1<f64>,
    initial_density: f64,
    max_step: f64,
) -> EosResult<State<E>> {
    let maxdensity = eos.max_density(Some(moles))?;
    let (abstol, reltol) = (1e-12, 1e-14);
    let n = moles.sum();

    let mut rho = initial_density;
    if !rho.is_finite() || rho <= 0.0 {
        return Err(EosError::NonPhysicalInput {
            name: "initial density".into(),
            value: rho,
        });
    }

    let mut error = f64::INFINITY;
    for k in 0..MAX_ITER_DENSITY {
        let (mut p, mut dp_drho) = State::new_nvt(eos, temperature, n / rho, moles)?.p_dpdrho();

        // attempt to correct for poor initial density rho_init
        if dp_drho.is_sign_negative() && k == 0 {
            rho = if initial_density <= 0.15 * maxdensity {
                0.05 * initial_density
            } else {
                (1.1 * initial_density).min(maxdensity)
            };
            (p, dp_drho) = State::new_nvt(eos, temperature, n / rho, moles)?.p_dpdrho();
        }

        error = p - pressure;

        let mut delta_rho = -error / dp_drho;
        if delta_rho.abs() > max_step * maxdensity {
            delta_rho = max_step * maxdensity * delta_rho.signum();
        };
        delta_rho = delta_rho.max(-0.95 * rho); // prevent stepping to rho < 0.0

        // correction for instable region
        if dp_drho.is_sign_negative() {
            let (_, _, d2pdrho2) = State::new_nvt(eos, temperature, n / rho, moles)?.d2pdrho2();
            let spinodal = |rho0| pressure_spinodal(eos, temperature, rho0, moles);

            if rho > 0.85 * maxdensity {
                let (sp_p, sp_rho) = spinodal(initial_density)?;
                rho = sp_rho;
                error = sp_p - pressure;
                if rho > 0.85 * maxdensity {
                    if error.is_sign_negative() {
                        return Err(EosError::IterationFailed(String::from(
                            "density_iteration",
                        )));
                    } else {
                        rho *= 0.98
                    }
                } else if error.is_sign_positive() {
                    rho = 0.001 * maxdensity
                } else {
                    rho = (rho * 1.1).min(maxdensity)
                }
            } else if error.is_sign_positive() && d2pdrho2.is_sign_positive() {
                let (sp_p, sp_rho) = spinodal(initial_density)?;
                rho = sp_rho;
                error = sp_p - pressure;
                if error.is_sign_positive() {
                    rho = 0.001 * maxdensity
                } else {
                    rho = (rho * 1.1).min(maxdensity)
                }
            } else if error.is_sign_negative() && d2pdrho2.is_sign_negative() {
                let (sp_p, sp_rho) = spinodal(initial_density)?;
                rho = sp_rho;
                error = sp_p - pressure;
                if error.is_sign_negative() {
                    rho = 0.8 * maxdensity
                } else {
                    rho *= 0.8
                }
            } else if error.is_sign_negative() && d2pdrho2.is_sign_positive() {
                let (_, rho_l) = spinodal(0.8 * maxdensity)?;
                let (sp_v_p, rho_v) = spinodal(0.001 * maxdensity)?;
                error = sp_v_p - pressure;
                if error.is_sign_positive()
                    && (initial_density - rho_v).abs() < (initial_density - rho_l).abs()
                {
                    rho = 0.8 * rho_v
                } else {
                    rho = (rho_l * 1.1).min(maxdensity)
                }
            } else if error.is_sign_positive() && d2pdrho2.is_sign_negative() {
                let (_, rho_l) = spinodal(0.8 * maxdensity)?;
                let (sp_v_p, rho_v) = spinodal(0.001 * maxdensity)?;
                error = sp_v_p - pressure;
                if error.is_sign_negative()
                    && (initial_density - rho_v).abs() > (initial_density - rho_l).abs()
                {
                    rho = (rho_l * 1.1).min(maxdensity)
                } else {
                    rho = 0.8 * rho_v
                }
            } else {
                rho = (rho + initial_density) * 0.5;
                if (rho - initial_density).abs() < 1e-8 {
                    rho = (rho + 0.1 * maxdensity).min(maxdensity)
                }
            }
            continue;
        }

        // Newton step
        rho += delta_rho;
        if error.abs() < f64::max(abstol, rho * reltol) {
            return State::new_nvt(eos, temperature, n / rho, moles);
        }
    }
    Err(EosError::no_convergence(
        "density_iteration",
        MAX_ITER_DENSITY,
        error.abs(),
    ))
}

/// Newton iteration for $\frac{\partial p}{\partial\rho}=0$ at constant composition.
///
/// Returns pressure and density at the spinodal closest to `rho_init`.
fn pressure_spinodal<E: Residual>(
    eos: &Arc<E>,
    temperature: f64,
    rho_init: f64,
    moles: &Array1<f64>,
) -> EosResult<(f64, f64)> {
    let abstol = 1e-8;

    let maxdensity = eos.max_density(Some(moles))?;
    let n = moles.sum();
    let mut rho = rho_init;

    if rho <= 0.0 {
        return Err(EosError::NonPhysicalInput {
            name: "initial density".into(),
            value: rho,
        });
    }

    let mut dpdrho = f64::INFINITY;
    for _ in 0..MAX_ITER_SPINODAL {
        let (p, dp, d2pdrho2) = State::new_nvt(eos, temperature, n / rho, moles)?.d2pdrho2();
        dpdrho = dp;

        let mut delta_rho = -dpdrho / d2pdrho2;
        if delta_rho.abs() > 0.05 * maxdensity {
            delta_rho = 0.05 * maxdensity * delta_rho.signum()
        }
        delta_rho = delta_rho.max(-rho * 0.95); // prevent stepping to rho < 0.0
        delta_rho = delta_rho.min(maxdensity - rho); // prevent stepping to rho > maxdensity
        rho += delta_rho;

        if dpdrho.abs() < abstol {
            return Ok((p, rho));
        }
    }
    Err(EosError::no_convergence(
        "pressure_spinodal",
        MAX_ITER_SPINODAL,
        dpdrho.abs(),
    ))
}
