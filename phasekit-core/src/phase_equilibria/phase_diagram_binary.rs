use super::phase_diagram_pure::DroppedPoint;
use super::{PhaseDiagram, PhaseEquilibrium};
use crate::equation_of_state::Residual;
use crate::errors::{EosError, EosResult};
use crate::state::{Contributions, State};
use crate::SolverOptions;
use ndarray::{arr1, Array1};
use std::sync::Arc;

const DEFAULT_POINTS: usize = 51;

impl<E: Residual> PhaseDiagram<E, 2> {
    /// Create a new isothermal binary phase diagram exhibiting a
    /// vapor/liquid equilibrium.
    ///
    /// The diagram is traced by bubble point calculations from
    /// `x_lim[0]` to `x_lim[1]` (mole fraction of the first component in
    /// the liquid phase) using the previous point as initial guess.
    /// End points with a pure liquid are taken from the pure component
    /// equilibria. Failed points are recorded in `dropped`.
    pub fn binary_vle(
        eos: &Arc<E>,
        temperature: f64,
        npoints: Option<usize>,
        x_lim: Option<[f64; 2]>,
        bubble_dew_options: (SolverOptions, SolverOptions),
    ) -> EosResult<Self> {
        if eos.components() != 2 {
            return Err(EosError::IncompatibleComponents(eos.components(), 2));
        }
        let npoints = npoints.unwrap_or(DEFAULT_POINTS).max(2);
        let x_lim = x_lim.unwrap_or([0.0, 1.0]);
        if x_lim.iter().any(|x| !(0.0..=1.0).contains(x)) {
            return Err(EosError::NonPhysicalInput {
                name: "mole fraction".into(),
                value: if (0.0..=1.0).contains(&x_lim[0]) { x_lim[1] } else { x_lim[0] },
            });
        }

        let mut states = Vec::with_capacity(npoints);
        let mut dropped = Vec::new();
        let mut p_old = None;
        let mut y_old: Option<Array1<f64>> = None;
        for &xi in Array1::linspace(x_lim[0], x_lim[1], npoints).iter() {
            bubble_dew_options.1.check_cancelled()?;
            let x = arr1(&[xi, 1.0 - xi]);

            let vle = if xi == 0.0 || xi == 1.0 {
                let i = if xi == 1.0 { 0 } else { 1 };
                pure_component_vle(eos, temperature, i, &bubble_dew_options.1)
            } else {
                PhaseEquilibrium::bubble_point(
                    eos,
                    temperature,
                    &x,
                    p_old,
                    y_old.as_ref(),
                    bubble_dew_options.clone(),
                )
            };

            match vle {
                Ok(vle) => {
                    p_old = Some(vle.vapor().pressure(Contributions::Total));
                    // a pure vapor is no useful guess for the composition
                    y_old = Some(vle.vapor().molefracs.clone()).filter(|y| y.iter().all(|&y| y > 0.0));
                    states.push(vle);
                }
                Err(EosError::Cancelled) => return Err(EosError::Cancelled),
                Err(e) => {
                    log_result!(
                        bubble_dew_options.1.verbosity,
                        "PhaseDiagram: dropped point at x = {:.5} ({})",
                        xi,
                        e
                    );
                    dropped.push(DroppedPoint::new(temperature, Some(x), &e));
                    p_old = None;
                    y_old = None;
                }
            }
        }
        Ok(Self { states, dropped })
    }
}

/// Vapor/liquid equilibrium of component `i` as a state of the binary mixture.
fn pure_component_vle<E: Residual>(
    eos: &Arc<E>,
    temperature: f64,
    i: usize,
    options: &SolverOptions,
) -> EosResult<PhaseEquilibrium<E, 2>> {
    let pure_eos = Arc::new(eos.subset(&[i]));
    let vle = PhaseEquilibrium::pure(&pure_eos, temperature, None, options.clone())?;
    let embed = |s: &State<E>| {
        let mut moles = Array1::zeros(2);
        moles[i] = s.total_moles;
        State::new_nvt(eos, temperature, s.volume, &moles)
    };
    Ok(PhaseEquilibrium::from_states(
        embed(vle.vapor())?,
        embed(vle.liquid())?,
    ))
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
    fn isothermal_binary_diagram() -> EosResult<()> {
        let eos = mixture()?;
        let diagram = PhaseDiagram::binary_vle(&eos, 330.0, Some(11), None, Default::default())?;
        assert!(diagram.dropped.is_empty());
        assert_eq!(diagram.states.len(), 11);

        // pressure increases with the amount of the lighter component
        let p = diagram.pressure();
        assert!(p.to_vec().windows(2).all(|w| w[0] < w[1]));
        let p_sat = PhaseEquilibrium::vapor_pressure(&eos, 330.0);
        assert_relative_eq!(p[0], p_sat[1].unwrap_or(0.0), max_relative = 1e-8);
        assert_relative_eq!(p[10], p_sat[0].unwrap_or(0.0), max_relative = 1e-8);

        for vle in &diagram.states {
            assert!(vle.equilibrium_residual() < 1e-6);
        }
        Ok(())
    }

    #[test]
    fn supercritical_component_is_dropped() -> EosResult<()> {
        let eos = mixture()?;
        // propane is supercritical at 400 K
        let diagram = PhaseDiagram::binary_vle(&eos, 400.0, Some(11), None, Default::default())?;
        assert!(!diagram.dropped.is_empty());
        let last = diagram.dropped.last().map(|d| d.temperature);
        assert_eq!(last, Some(400.0));
        assert!(diagram.states.len() > 2);
        Ok(())
    }

    #[test]
    fn binary_diagram_requires_two_components() -> EosResult<()> {
        let eos = Arc::new(crate::Components::subset(mixture()?.as_ref(), &[0]));
        assert!(matches!(
            PhaseDiagram::binary_vle(&eos, 300.0, None, None, Default::default()),
            Err(EosError::IncompatibleComponents(1, 2))
        ));
        Ok(())
    }
}
