use super::vle_pure::MAX_ITER_PURE;
use super::PhaseEquilibrium;
use crate::equation_of_state::Residual;
use crate::errors::{EosError, EosResult};
use crate::state::{Contributions, State, StateVec};
use crate::{SolverOptions, Verbosity};
use ndarray::Array1;
#[cfg(feature = "rayon")]
use rayon::{prelude::*, ThreadPool};
use std::fmt;
use std::sync::Arc;

/// Relative distance of the first continuation point to the critical temperature.
const NEAR_CRITICAL: f64 = 1e-3;
/// Smallest temperature step relative to the width of the temperature range.
const MIN_STEP: f64 = 1e-3;

/// A point of a phase diagram for which no equilibrium could be found.
#[derive(Clone, Debug, PartialEq)]
pub struct DroppedPoint {
    /// Temperature of the point in K.
    pub temperature: f64,
    /// Specified mole fractions (for isothermal mixture diagrams).
    pub molefracs: Option<Array1<f64>>,
    /// Error message of the last attempt.
    pub reason: String,
}

impl DroppedPoint {
    pub(super) fn new(temperature: f64, molefracs: Option<Array1<f64>>, error: &EosError) -> Self {
        Self {
            temperature,
            molefracs,
            reason: error.to_string(),
        }
    }
}

impl fmt::Display for DroppedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T = {:.5} K", self.temperature)?;
        if let Some(x) = &self.molefracs {
            write!(f, ", x = {:.5}", x)?;
        }
        write!(f, ": {}", self.reason)
    }
}

/// Pure component and binary mixture phase diagrams.
///
/// Points that could not be converged are not part of `states`
/// but are listed in `dropped`.
pub struct PhaseDiagram<E, const P: usize> {
    pub states: Vec<PhaseEquilibrium<E, P>>,
    pub dropped: Vec<DroppedPoint>,
}

impl<E, const P: usize> Clone for PhaseDiagram<E, P> {
    fn clone(&self) -> Self {
        Self {
            states: self.states.clone(),
            dropped: self.dropped.clone(),
        }
    }
}

impl<E, const P: usize> PhaseDiagram<E, P> {
    /// Create a phase diagram from a list of phase equilibria.
    pub fn new(states: Vec<PhaseEquilibrium<E, P>>) -> Self {
        Self {
            states,
            dropped: Vec::new(),
        }
    }
}

impl<E: Residual> PhaseDiagram<E, 2> {
    /// Calculate a phase diagram for a pure component.
    ///
    /// The diagram consists of `npoints - 1` equidistant temperatures
    /// between `min_temperature` and the critical temperature, which are
    /// traced downwards starting close to the critical point, and the
    /// critical point itself.
    pub fn pure(
        eos: &Arc<E>,
        min_temperature: f64,
        npoints: usize,
        critical_temperature: Option<f64>,
        options: SolverOptions,
    ) -> EosResult<Self> {
        let (cp, temperatures) =
            Self::target_temperatures(eos, min_temperature, npoints, critical_temperature, &options)?;
        let (mut states, dropped) =
            trace_pure(eos, &cp, Some(&cp), &temperatures, min_temperature, &options)?;
        states.reverse();
        states.push(PhaseEquilibrium::from_states(cp.clone(), cp));
        Ok(Self { states, dropped })
    }

    /// Calculate a pure component phase diagram with `npoints` equidistant
    /// temperatures between `min_temperature` and `max_temperature`.
    ///
    /// The critical point is only used to start the continuation and is
    /// not part of the result.
    pub fn pure_range(
        eos: &Arc<E>,
        min_temperature: f64,
        max_temperature: f64,
        npoints: usize,
        options: SolverOptions,
    ) -> EosResult<Self> {
        if npoints < 2 || !(min_temperature > 0.0) || !(max_temperature > min_temperature) {
            return Err(EosError::NonPhysicalInput {
                name: "temperature range".into(),
                value: max_temperature - min_temperature,
            });
        }
        let cp = State::critical_point(eos, None, None, options.inherit())?;
        if max_temperature >= cp.temperature {
            return Err(EosError::SuperCritical);
        }
        let temperatures = Array1::linspace(max_temperature, min_temperature, npoints).to_vec();
        let (mut states, dropped) =
            trace_pure(eos, &cp, Some(&cp), &temperatures, min_temperature, &options)?;
        states.reverse();
        Ok(Self { states, dropped })
    }

    /// Critical point and the temperatures (in descending order) of a pure component diagram.
    fn target_temperatures(
        eos: &Arc<E>,
        min_temperature: f64,
        npoints: usize,
        critical_temperature: Option<f64>,
        options: &SolverOptions,
    ) -> EosResult<(State<E>, Vec<f64>)> {
        if npoints < 2 {
            return Err(EosError::NonPhysicalInput {
                name: "npoints".into(),
                value: npoints as f64,
            });
        }
        if !(min_temperature > 0.0) {
            return Err(EosError::NonPhysicalInput {
                name: "minimum temperature".into(),
                value: min_temperature,
            });
        }
        let cp = State::critical_point(eos, None, critical_temperature, options.inherit())?;
        if min_temperature >= cp.temperature {
            return Err(EosError::SuperCritical);
        }
        let max_temperature = min_temperature
            + (cp.temperature - min_temperature) * ((npoints - 2) as f64 / (npoints - 1) as f64);
        let temperatures = Array1::linspace(max_temperature, min_temperature, npoints - 1);
        Ok((cp, temperatures.to_vec()))
    }

    /// Return the vapor states of the diagram.
    pub fn vapor(&self) -> StateVec<'_, E> {
        self.states.iter().map(|s| s.vapor()).collect()
    }

    /// Return the liquid states of the diagram.
    pub fn liquid(&self) -> StateVec<'_, E> {
        self.states.iter().map(|s| s.liquid()).collect()
    }

    /// Temperatures of all converged points.
    pub fn temperature(&self) -> Array1<f64> {
        self.vapor().temperature()
    }

    /// Vapor pressures of all converged points.
    pub fn pressure(&self) -> Array1<f64> {
        self.states
            .iter()
            .map(|s| s.vapor().pressure(Contributions::Total))
            .collect()
    }
}

/// Trace the coexistence curve through the given temperatures (descending).
///
/// If `start` is the critical point, the first equilibrium is seeded
/// by the near-critical asymptote; otherwise the first target is solved
/// without an initial guess. Between two targets, the temperature step
/// is halved on failure and doubled after two easy steps. A target that
/// fails with the smallest step is dropped and the continuation resumes
/// from the last converged equilibrium.
fn trace_pure<E: Residual>(
    eos: &Arc<E>,
    critical_point: &State<E>,
    start: Option<&State<E>>,
    temperatures: &[f64],
    min_temperature: f64,
    options: &SolverOptions,
) -> EosResult<(Vec<PhaseEquilibrium<E, 2>>, Vec<DroppedPoint>)> {
    let mut states = Vec::with_capacity(temperatures.len());
    let mut dropped = Vec::new();
    if temperatures.is_empty() {
        return Ok((states, dropped));
    }

    let tc = critical_point.temperature;
    let (max_iter, _, verbosity) = options.unwrap_or(MAX_ITER_PURE, 0.0);
    let easy = max_iter / 4;
    let spacing = if temperatures.len() > 1 {
        temperatures[0] - temperatures[1]
    } else {
        tc - temperatures[0]
    };
    let min_step = MIN_STEP * (tc - min_temperature);

    // converged equilibrium the continuation starts from
    let mut previous = match start {
        Some(cp) => {
            let seed = PhaseEquilibrium::near_critical(cp, NEAR_CRITICAL * tc)?;
            let t = seed.temperature();
            match PhaseEquilibrium::pure(eos, t, Some(&seed), options.clone()) {
                Ok(vle) => Some(vle),
                Err(EosError::Cancelled) => return Err(EosError::Cancelled),
                Err(_) => match PhaseEquilibrium::pure(eos, t, None, options.clone()) {
                    Ok(vle) => Some(vle),
                    Err(EosError::Cancelled) => return Err(EosError::Cancelled),
                    Err(_) => None,
                },
            }
        }
        None => None,
    };
    let mut step = spacing;
    let mut easy_steps = 0;

    for &target in temperatures {
        let Some(mut vle) = previous.take() else {
            // no equilibrium to continue from
            match PhaseEquilibrium::pure(eos, target, None, options.clone()) {
                Ok(vle) => {
                    states.push(vle.clone());
                    previous = Some(vle);
                }
                Err(EosError::Cancelled) => return Err(EosError::Cancelled),
                Err(e) => drop_point(&mut dropped, target, &e, verbosity),
            }
            continue;
        };

        loop {
            options.check_cancelled()?;
            let t_old = vle.temperature();
            let reached = t_old - step <= target;
            let t_new = if reached { target } else { t_old - step };
            match PhaseEquilibrium::pure_t(eos, t_new, Some(&vle), options.clone()) {
                Ok((new_vle, iterations)) => {
                    vle = new_vle;
                    if iterations < easy {
                        easy_steps += 1;
                        if easy_steps >= 2 {
                            step = (2.0 * step).min(spacing);
                            easy_steps = 0;
                        }
                    } else {
                        easy_steps = 0;
                    }
                    if reached {
                        states.push(vle.clone());
                        break;
                    }
                }
                Err(EosError::Cancelled) => return Err(EosError::Cancelled),
                Err(e) => {
                    easy_steps = 0;
                    if 0.5 * step >= min_step {
                        step *= 0.5;
                        continue;
                    }
                    // last resort: solve the target without continuation
                    match PhaseEquilibrium::pure(eos, target, None, options.clone()) {
                        Ok(new_vle) => {
                            vle = new_vle;
                            states.push(vle.clone());
                        }
                        Err(EosError::Cancelled) => return Err(EosError::Cancelled),
                        Err(_) => drop_point(&mut dropped, target, &e, verbosity),
                    }
                    step = spacing;
                    break;
                }
            }
        }
        previous = Some(vle);
    }
    Ok((states, dropped))
}

fn drop_point(dropped: &mut Vec<DroppedPoint>, temperature: f64, e: &EosError, verbosity: Verbosity) {
    log_result!(
        verbosity,
        "PhaseDiagram: dropped point at T = {:.5} K ({})",
        temperature,
        e
    );
    dropped.push(DroppedPoint::new(temperature, None, e));
}

#[cfg(feature = "rayon")]
impl<E: Residual> PhaseDiagram<E, 2> {
    /// Calculate a phase diagram for a pure component in parallel.
    ///
    /// The temperatures are split into chunks of `chunksize` consecutive
    /// points. Each chunk is traced independently on `thread_pool`; only
    /// the chunk adjacent to the critical point is seeded from it.
    pub fn par_pure(
        eos: &Arc<E>,
        min_temperature: f64,
        npoints: usize,
        chunksize: usize,
        thread_pool: ThreadPool,
        critical_temperature: Option<f64>,
        options: SolverOptions,
    ) -> EosResult<Self> {
        let (cp, temperatures) =
            Self::target_temperatures(eos, min_temperature, npoints, critical_temperature, &options)?;
        let chunks: Vec<_> = temperatures
            .chunks(chunksize.max(1))
            .enumerate()
            .collect();

        let results: Vec<_> = thread_pool.install(|| {
            chunks
                .into_par_iter()
                .map(|(i, t)| {
                    let start = if i == 0 { Some(&cp) } else { None };
                    trace_pure(eos, &cp, start, t, min_temperature, &options)
                })
                .collect()
        });

        let mut states = Vec::with_capacity(npoints);
        let mut dropped = Vec::new();
        for result in results {
            let (s, d) = result?;
            states.extend(s);
            dropped.extend(d);
        }
        states.reverse();
        states.push(PhaseEquilibrium::from_states(cp.clone(), cp));
        Ok(Self { states, dropped })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cubic::{PengRobinson, PengRobinsonParameters};
    use crate::Cancellation;
    use approx::assert_relative_eq;
    use std::time::Duration;

    fn propane() -> EosResult<Arc<PengRobinson>> {
        let parameters =
            PengRobinsonParameters::new_simple(&[369.96], &[4250000.0], &[0.153], &[44.0962])?;
        Ok(Arc::new(PengRobinson::new(Arc::new(parameters))))
    }

    #[test]
    fn pure_phase_diagram() -> EosResult<()> {
        let eos = propane()?;
        let diagram = PhaseDiagram::pure(&eos, 200.0, 21, None, Default::default())?;
        assert!(diagram.dropped.is_empty());
        assert_eq!(diagram.states.len(), 21);

        let t = diagram.temperature();
        assert_relative_eq!(t[0], 200.0, max_relative = 1e-10);
        assert!(t.to_vec().windows(2).all(|w| w[0] < w[1]));
        for vle in &diagram.states[..20] {
            assert!(vle.equilibrium_residual() < 1e-8);
        }
        let p = diagram.pressure();
        assert!(p.to_vec().windows(2).all(|w| w[0] < w[1]));
        Ok(())
    }

    #[test]
    fn pure_range_phase_diagram() -> EosResult<()> {
        let eos = propane()?;
        let cp = State::critical_point(&eos, None, None, Default::default())?;
        let tc = cp.temperature;
        let diagram = PhaseDiagram::pure_range(&eos, 0.5 * tc, 0.99 * tc, 20, Default::default())?;
        assert!(diagram.states.len() >= 18);
        assert_eq!(diagram.states.len() + diagram.dropped.len(), 20);
        assert_relative_eq!(diagram.temperature()[0], 0.5 * tc, max_relative = 1e-10);
        Ok(())
    }

    #[test]
    fn invalid_temperature_range() -> EosResult<()> {
        let eos = propane()?;
        assert!(matches!(
            PhaseDiagram::pure(&eos, 400.0, 10, None, Default::default()),
            Err(EosError::SuperCritical)
        ));
        assert!(matches!(
            PhaseDiagram::pure(&eos, -1.0, 10, None, Default::default()),
            Err(EosError::NonPhysicalInput { .. })
        ));
        Ok(())
    }

    #[test]
    fn cancelled_phase_diagram() -> EosResult<()> {
        let eos = propane()?;
        let options = SolverOptions::new().cancel(Cancellation::from_timeout(Duration::ZERO));
        assert!(matches!(
            PhaseDiagram::pure(&eos, 200.0, 10, None, options),
            Err(EosError::Cancelled)
        ));
        Ok(())
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn parallel_phase_diagram() -> EosResult<()> {
        let eos = propane()?;
        let pool = rayon::ThreadPoolBuilder::new().num_threads(2).build()?;
        let diagram = PhaseDiagram::par_pure(&eos, 200.0, 21, 5, pool, None, Default::default())?;
        let serial = PhaseDiagram::pure(&eos, 200.0, 21, None, Default::default())?;
        assert_eq!(diagram.states.len(), serial.states.len());
        for (p, s) in diagram.pressure().iter().zip(serial.pressure().iter()) {
            assert_relative_eq!(p, s, max_relative = 1e-8);
        }
        Ok(())
    }
}
