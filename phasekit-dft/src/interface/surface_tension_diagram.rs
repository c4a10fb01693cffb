use super::PlanarInterface;
use crate::functional::HelmholtzEnergyFunctional;
use crate::solver::DFTSolver;
use ndarray::{Array1, Array2};
use phasekit_core::{
    log_result, DroppedPoint, EosError, EosResult, PhaseEquilibrium, StateVec, Verbosity,
};
#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Surface tensions along a phase diagram.
///
/// Points whose profile could not be solved are listed in `dropped`.
pub struct SurfaceTensionDiagram<F: HelmholtzEnergyFunctional> {
    pub profiles: Vec<PlanarInterface<F>>,
    pub dropped: Vec<DroppedPoint>,
}

fn dropped<F: HelmholtzEnergyFunctional>(
    vle: &PhaseEquilibrium<F, 2>,
    reason: String,
) -> DroppedPoint {
    DroppedPoint {
        temperature: vle.temperature(),
        molefracs: None,
        reason,
    }
}

fn solve_point<F: HelmholtzEnergyFunctional>(
    vle: &PhaseEquilibrium<F, 2>,
    init: Option<&Array2<f64>>,
    n_grid: usize,
    l_grid: f64,
    critical_temperature: f64,
    solver: Option<&DFTSolver>,
) -> EosResult<PlanarInterface<F>> {
    if PhaseEquilibrium::is_trivial_solution(vle.vapor(), vle.liquid()) {
        return Err(EosError::TrivialSolution);
    }
    let mut interface =
        PlanarInterface::from_tanh(vle, n_grid, l_grid, critical_temperature, true)?;
    if let Some(init) = init {
        if init.raw_dim() == interface.profile.density.raw_dim() {
            interface.set_density_inplace(init, true)?;
        }
    }
    interface.solve(solver)
}

impl<F: HelmholtzEnergyFunctional> SurfaceTensionDiagram<F> {
    /// Solve the interfaces of all phase equilibria in `diagram`, using
    /// the last converged profile as initial guess for the next point.
    pub fn new(
        diagram: &[PhaseEquilibrium<F, 2>],
        n_grid: usize,
        l_grid: f64,
        critical_temperature: f64,
        solver: Option<&DFTSolver>,
    ) -> Self {
        let verbosity = solver.map_or(Verbosity::None, |s| s.verbosity);
        let mut profiles: Vec<PlanarInterface<F>> = Vec::with_capacity(diagram.len());
        let mut dropped_points = Vec::new();
        for (i, vle) in diagram.iter().enumerate() {
            let init = profiles.last().map(|p| &p.profile.density);
            match solve_point(vle, init, n_grid, l_grid, critical_temperature, solver) {
                Ok(profile) => profiles.push(profile),
                Err(EosError::Cancelled) => {
                    log_result!(
                        verbosity,
                        "surface tension diagram: cancelled at T = {} K",
                        vle.temperature()
                    );
                    dropped_points.extend(
                        diagram[i..]
                            .iter()
                            .map(|vle| dropped(vle, EosError::Cancelled.to_string())),
                    );
                    break;
                }
                Err(e) => {
                    log_result!(
                        verbosity,
                        "surface tension diagram: dropped T = {} K ({})",
                        vle.temperature(),
                        e
                    );
                    dropped_points.push(dropped(vle, e.to_string()));
                }
            }
        }
        Self {
            profiles,
            dropped: dropped_points,
        }
    }

    /// Solve all interfaces in parallel, each from a tanh profile.
    #[cfg(feature = "rayon")]
    pub fn par_new(
        diagram: &[PhaseEquilibrium<F, 2>],
        n_grid: usize,
        l_grid: f64,
        critical_temperature: f64,
        solver: Option<&DFTSolver>,
    ) -> Self {
        let results: Vec<_> = diagram
            .par_iter()
            .map(|vle| solve_point(vle, None, n_grid, l_grid, critical_temperature, solver))
            .collect();
        let mut profiles = Vec::with_capacity(diagram.len());
        let mut dropped_points = Vec::new();
        for (vle, result) in diagram.iter().zip(results) {
            match result {
                Ok(profile) => profiles.push(profile),
                Err(e) => dropped_points.push(dropped(vle, e.to_string())),
            }
        }
        Self {
            profiles,
            dropped: dropped_points,
        }
    }

    pub fn vapor(&self) -> StateVec<'_, F> {
        self.profiles.iter().map(|p| p.vle.vapor()).collect()
    }

    pub fn liquid(&self) -> StateVec<'_, F> {
        self.profiles.iter().map(|p| p.vle.liquid()).collect()
    }

    pub fn temperature(&self) -> Array1<f64> {
        self.profiles.iter().map(|p| p.profile.temperature).collect()
    }

    /// Surface tensions in K/Å².
    pub fn surface_tension(&self) -> Array1<f64> {
        self.profiles
            .iter()
            .map(|p| p.surface_tension.unwrap_or(f64::NAN))
            .collect()
    }

    pub fn relative_adsorption(&self) -> Vec<Array2<f64>> {
        self.profiles
            .iter()
            .map(|p| p.relative_adsorption())
            .collect()
    }
}
