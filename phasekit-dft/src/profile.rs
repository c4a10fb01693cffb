use crate::convolver::{Convolver, ConvolverFFT};
use crate::functional::HelmholtzEnergyFunctional;
use crate::geometry::Axis;
use crate::solver::{DFTSolver, SolverState};
use ndarray::prelude::*;
use ndarray::Zip;
use phasekit_core::{log_result, Contributions, EosError, EosResult, State, Verbosity};
use std::fmt;
use std::sync::Arc;

/// Maximum relative deviation of pressure and (reduced) chemical potentials
/// between two different bulk phases.
const BULK_TOLERANCE: f64 = 1e-6;
/// Fraction of the grid at either edge that has to be in the bulk.
const EDGE_FRACTION: f64 = 0.05;
/// Maximum deviation from the bulk at the edges relative to the density jump.
const EDGE_TOLERANCE: f64 = 1e-3;

/// Specification of the grand potential of a DFT calculation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DFTSpecification {
    /// The chemical potential is given by the bulk phases.
    ChemicalPotential,
    /// The chemical potentials are iterated together with the density
    /// profile to keep the total number of particles (per area) constant.
    ///
    /// Used to fix the position of a planar interface.
    TotalMoles { total_moles: f64 },
}

/// A density profile on a planar axis between two bulk phases.
///
/// The first and last grid points are clamped to the densities of
/// `bulk_left` and `bulk_right`.
pub struct DFTProfile<F> {
    pub axis: Axis,
    pub convolver: Arc<dyn Convolver<f64>>,
    pub functional: Arc<F>,
    pub temperature: f64,
    /// Partial densities (components × grid points) in Å⁻³.
    pub density: Array2<f64>,
    pub bulk_left: State<F>,
    pub bulk_right: State<F>,
    pub specification: DFTSpecification,
}

impl<F> Clone for DFTProfile<F> {
    fn clone(&self) -> Self {
        Self {
            axis: self.axis.clone(),
            convolver: self.convolver.clone(),
            functional: self.functional.clone(),
            temperature: self.temperature,
            density: self.density.clone(),
            bulk_left: self.bulk_left.clone(),
            bulk_right: self.bulk_right.clone(),
            specification: self.specification,
        }
    }
}

impl<F> fmt::Debug for DFTProfile<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DFTProfile")
            .field("temperature", &self.temperature)
            .field("points", &self.axis.points())
            .field("length", &self.axis.length())
            .field("specification", &self.specification)
            .finish()
    }
}

impl<F: HelmholtzEnergyFunctional> DFTProfile<F> {
    /// Create a new profile from an initial density.
    ///
    /// The edges of the initial density are overwritten with the bulk densities.
    pub fn new(
        axis: Axis,
        bulk_left: &State<F>,
        bulk_right: &State<F>,
        density: Array2<f64>,
        specification: DFTSpecification,
    ) -> EosResult<Self> {
        let functional = bulk_left.eos.clone();
        let components = functional.components();
        if density.nrows() != components {
            return Err(EosError::IncompatibleComponents(components, density.nrows()));
        }
        if density.ncols() != axis.points() {
            return Err(EosError::InvalidGrid(format!(
                "the initial density has {} points, the axis {}",
                density.ncols(),
                axis.points()
            )));
        }
        let temperature = bulk_left.temperature;
        let convolver = ConvolverFFT::plan(&axis, &functional.weight_functions(temperature));
        let mut profile = Self {
            axis,
            convolver,
            functional,
            temperature,
            density,
            bulk_left: bulk_left.clone(),
            bulk_right: bulk_right.clone(),
            specification,
        };
        profile.clamp_edges();
        Ok(profile)
    }

    fn clamp_edges(&mut self) {
        clamp_edges(
            &mut self.density,
            &self.bulk_left.partial_density,
            &self.bulk_right.partial_density,
        );
    }

    /// Positions of the grid points in Å.
    pub fn z(&self) -> &Array1<f64> {
        &self.axis.grid
    }

    /// Integral of `f` over the axis.
    pub fn integrate(&self, f: &Array1<f64>) -> f64 {
        self.axis.integrate(f)
    }

    /// Number of particles of every component per area in Å⁻².
    pub fn moles(&self) -> Array1<f64> {
        self.density
            .outer_iter()
            .map(|rho| self.integrate(&rho.to_owned()))
            .collect()
    }

    /// Total number of particles per area in Å⁻².
    pub fn total_moles(&self) -> f64 {
        self.moles().sum()
    }

    /// Set the specification to the total number of particles of the current profile.
    pub fn fix_total_moles(&mut self) {
        self.specification = DFTSpecification::TotalMoles {
            total_moles: self.total_moles(),
        };
    }

    /// Reduced chemical potentials $\beta\mu_i$ of the left bulk phase.
    ///
    /// Evaluated with the functional itself, so that a homogeneous
    /// profile is an exact solution of the Euler-Lagrange equation.
    pub fn bulk_chemical_potential(&self) -> EosResult<Array1<f64>> {
        let rho = &self.bulk_left.partial_density;
        let dfdrho = self
            .functional
            .bulk_functional_derivative(self.temperature, rho)?;
        Ok(Zip::from(rho)
            .and(&dfdrho)
            .and(&*self.functional.m())
            .map_collect(|&rho, &df, &m| m * rho.ln() + df))
    }

    /// Grand potential density $\omega(z)$ in K/Å³.
    pub fn grand_potential_density(&self) -> EosResult<Array1<f64>> {
        self.functional
            .grand_potential_density(self.temperature, &self.density, &self.convolver)
    }

    /// Residual of the Euler-Lagrange equation and its RMS norm for the current profile.
    pub fn residual(&self, log: bool) -> EosResult<(Array2<f64>, f64)> {
        let mu = self.bulk_chemical_potential()?;
        let (res_rho, res_mu) = self.euler_lagrange_equation(&self.density, &mu, log)?;
        let n = (res_rho.len() + res_mu.len()) as f64;
        let norm = (res_rho.mapv(|r| r * r).sum() + res_mu.mapv(|r| r * r).sum()).sqrt() / n.sqrt();
        Ok((res_rho, norm))
    }

    fn euler_lagrange_equation(
        &self,
        density: &Array2<f64>,
        chemical_potential: &Array1<f64>,
        log: bool,
    ) -> EosResult<(Array2<f64>, Array1<f64>)> {
        let (_, dfdrho) =
            self.functional
                .functional_derivative(self.temperature, density, &self.convolver)?;
        let m = self.functional.m();

        // Euler-Lagrange equation
        let mut res_rho = Array2::zeros(density.raw_dim());
        res_rho
            .outer_iter_mut()
            .zip(dfdrho.outer_iter())
            .zip(chemical_potential.iter())
            .zip(m.iter())
            .zip(density.outer_iter())
            .for_each(|((((mut res, df), &mu), &m), rho)| {
                res.assign(&if log {
                    rho.mapv(f64::ln) - (mu - &df) / m
                } else {
                    &rho - &((mu - &df) / m).mapv(f64::exp)
                });
            });
        let n = density.ncols();
        res_rho.column_mut(0).fill(0.0);
        res_rho.column_mut(n - 1).fill(0.0);

        // additional residuals for the chemical potentials
        let mu_spec = match self.specification {
            DFTSpecification::ChemicalPotential => chemical_potential.clone(),
            DFTSpecification::TotalMoles { total_moles } => {
                // the edges are fixed and do not depend on the chemical potential
                let mut weights = self.axis.integration_weights().clone();
                weights[0] = 0.0;
                weights[n - 1] = 0.0;
                let edge_moles = self.axis.cell_size()
                    * (density.column(0).sum() + density.column(n - 1).sum());
                let moles: f64 = dfdrho
                    .outer_iter()
                    .zip(chemical_potential.iter())
                    .zip(m.iter())
                    .map(|((df, &mu), &m)| {
                        (&df.mapv(|df| ((mu - df) / m).exp()) * &weights).sum()
                    })
                    .sum();
                let ln_scale = ((total_moles - edge_moles) / moles).ln();
                chemical_potential + &(&*m * ln_scale)
            }
        };
        let res_mu = if log {
            chemical_potential - &mu_spec
        } else {
            chemical_potential.mapv(f64::exp) - mu_spec.mapv(f64::exp)
        };
        Ok((res_rho, res_mu))
    }

    /// Check that the two bulk phases are valid boundary conditions.
    pub fn validate_bulk_states(&self) -> EosResult<()> {
        let (left, right) = (&self.bulk_left, &self.bulk_right);
        if !Arc::ptr_eq(&left.eos, &self.functional) || !Arc::ptr_eq(&right.eos, &self.functional) {
            return Err(EosError::InvalidBulkState(
                "the bulk phases belong to a different functional".into(),
            ));
        }
        let t = self.temperature;
        for (side, state) in [("left", left), ("right", right)] {
            if (state.temperature - t).abs() > 1e-12 * t {
                return Err(EosError::InvalidBulkState(format!(
                    "the {side} bulk phase is at T = {} K instead of {t} K",
                    state.temperature
                )));
            }
            if state
                .partial_density
                .iter()
                .any(|rho| !(rho.is_finite() && *rho > 0.0))
            {
                return Err(EosError::InvalidBulkState(format!(
                    "the {side} bulk phase has non-positive partial densities {}",
                    state.partial_density
                )));
            }
            if !(state.dp_drho() > 0.0) {
                return Err(EosError::InvalidBulkState(format!(
                    "the {side} bulk phase (rho = {:e} Å⁻³) is mechanically unstable",
                    state.density
                )));
            }
        }

        let identical = Zip::from(&left.partial_density)
            .and(&right.partial_density)
            .fold(true, |acc, &l, &r| acc && ((l - r) / l).abs() < 1e-12);
        if !identical {
            let p_l = left.pressure(Contributions::Total);
            let p_r = right.pressure(Contributions::Total);
            if ((p_l - p_r) / p_l).abs() > BULK_TOLERANCE {
                return Err(EosError::InvalidBulkState(format!(
                    "the pressures of the bulk phases differ ({p_l:e} and {p_r:e} K/Å³)"
                )));
            }
            let mu_l = left.chemical_potential(Contributions::Total);
            let mu_r = right.chemical_potential(Contributions::Total);
            let dmu = Zip::from(&mu_l)
                .and(&mu_r)
                .fold(0.0, |acc: f64, &l, &r| acc.max((l - r).abs()));
            if dmu > BULK_TOLERANCE * t {
                return Err(EosError::InvalidBulkState(format!(
                    "the chemical potentials of the bulk phases differ by {dmu:e} K"
                )));
            }
        }
        Ok(())
    }

    /// Check that the profile reaches both bulk phases within the grid.
    pub fn check_edges(&self) -> EosResult<()> {
        let n = self.axis.points();
        let n_edge = ((EDGE_FRACTION * n as f64).ceil() as usize).max(1);
        let rho_l = &self.bulk_left.partial_density;
        let rho_r = &self.bulk_right.partial_density;
        let jump = Zip::from(rho_l)
            .and(rho_r)
            .fold(0.0, |acc: f64, &l, &r| acc.max((l - r).abs()));
        let scale = if jump > 0.0 {
            jump
        } else {
            rho_l.fold(0.0, |acc: f64, &rho| acc.max(rho))
        };

        let mut deviation: f64 = 0.0;
        for ((rho, &l), &r) in self.density.outer_iter().zip(rho_l).zip(rho_r) {
            for z in 0..n_edge {
                deviation = deviation
                    .max((rho[z] - l).abs())
                    .max((rho[n - 1 - z] - r).abs());
            }
        }
        let deviation = deviation / scale;
        if deviation < EDGE_TOLERANCE {
            Ok(())
        } else {
            Err(EosError::InvalidGrid(format!(
                "the density deviates by {:.1e} (relative to the density jump) from the bulk within the outer {} % of the grid",
                deviation,
                EDGE_FRACTION * 100.0
            )))
        }
    }

    /// Solve the Euler-Lagrange equation for the density profile.
    ///
    /// The profile is only updated if the solver converges and the
    /// result reaches the bulk phases at the edges of the grid.
    pub fn solve(&mut self, solver: Option<&DFTSolver>) -> EosResult<()> {
        self.validate_bulk_states()?;
        let solver = solver.cloned().unwrap_or_default();

        let rho_left = self.bulk_left.partial_density.clone();
        let rho_right = self.bulk_right.partial_density.clone();
        let mut density = self.density.clone();
        clamp_edges(&mut density, &rho_left, &rho_right);
        let mut chemical_potential = self.bulk_chemical_potential()?;

        // initialize x-vector
        let n_rho = density.len();
        let mut x: Array1<f64> = density
            .iter()
            .copied()
            .chain(chemical_potential.iter().map(|mu| mu.exp()))
            .collect();

        let mut residual =
            |x: &Array1<f64>, mut res: ArrayViewMut1<f64>, log: bool| -> EosResult<()> {
                // read density and chemical potential from the solution vector
                density
                    .iter_mut()
                    .zip(x.iter())
                    .for_each(|(rho, &x)| *rho = x);
                clamp_edges(&mut density, &rho_left, &rho_right);
                chemical_potential
                    .iter_mut()
                    .zip(x.iter().skip(n_rho))
                    .for_each(|(mu, &x)| *mu = x.ln());

                let (res_rho, res_mu) =
                    self.euler_lagrange_equation(&density, &chemical_potential, log)?;
                res.iter_mut()
                    .zip(res_rho.iter().chain(res_mu.iter()))
                    .for_each(|(r, &x)| *r = x);
                Ok(())
            };

        let (state, iterations, res) = solver.solve(&mut x, &mut residual)?;
        if state != SolverState::Converged {
            return Err(EosError::no_convergence("DFT", iterations, res));
        }
        log_result!(
            solver.verbosity,
            "DFT profile at T = {} K solved in {} iterations",
            self.temperature,
            iterations
        );

        let mut density = self.density.clone();
        density
            .iter_mut()
            .zip(x.iter())
            .for_each(|(rho, &x)| *rho = x);
        clamp_edges(&mut density, &rho_left, &rho_right);
        let previous = std::mem::replace(&mut self.density, density);
        if let Err(e) = self.check_edges() {
            self.density = previous;
            return Err(e);
        }
        Ok(())
    }
}

fn clamp_edges(density: &mut Array2<f64>, rho_left: &Array1<f64>, rho_right: &Array1<f64>) {
    let n = density.ncols();
    density.column_mut(0).assign(rho_left);
    density.column_mut(n - 1).assign(rho_right);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        FunctionalContribution, MoleculeShape, WeightFunction, WeightFunctionInfo,
        WeightFunctionShape,
    };
    use approx::assert_relative_eq;
    use num_dual::DualNum;
    use phasekit_core::{Cancellation, Components, Residual, StateHD};
    use std::sync::atomic::AtomicBool;

    /// van der Waals fluid with the attraction evaluated at a weighted density.
    struct MeanField;

    impl FunctionalContribution for MeanField {
        fn name(&self) -> &'static str {
            "mean field"
        }

        fn weight_functions<N: DualNum<f64> + Copy>(&self, _: N) -> WeightFunctionInfo<N> {
            WeightFunctionInfo::new(arr1(&[0]), false).add(
                WeightFunction::new_scaled(arr1(&[N::one()]), WeightFunctionShape::Theta),
                false,
            )
        }

        fn helmholtz_energy_density<N: DualNum<f64> + Copy>(
            &self,
            temperature: N,
            weighted_densities: ArrayView2<N>,
        ) -> EosResult<Array1<N>> {
            Ok(weighted_densities
                .row(0)
                .mapv(|rho| -rho * (-rho).ln_1p() - rho * rho / temperature))
        }
    }

    struct VanDerWaals;

    impl Components for VanDerWaals {
        fn components(&self) -> usize {
            1
        }

        fn subset(&self, _: &[usize]) -> Self {
            Self
        }
    }

    impl Residual for VanDerWaals {
        fn compute_max_density(&self, _: &Array1<f64>) -> f64 {
            0.9
        }

        fn residual_helmholtz_energy_contributions<D: DualNum<f64> + Copy>(
            &self,
            state: &StateHD<D>,
        ) -> Vec<(String, D)> {
            self.evaluate_bulk(state)
        }
    }

    impl HelmholtzEnergyFunctional for VanDerWaals {
        type Contribution<'a> = MeanField;

        fn contributions<'a>(&'a self) -> Vec<MeanField> {
            vec![MeanField]
        }

        fn molecule_shape(&self) -> MoleculeShape<'_> {
            MoleculeShape::Spherical(1)
        }
    }

    // supercritical, T_c = 8/27
    const T: f64 = 0.4;

    fn profile(rho_left: f64, rho_right: f64) -> EosResult<DFTProfile<VanDerWaals>> {
        let func = Arc::new(VanDerWaals);
        let left = State::new_pure(&func, T, rho_left)?;
        let right = State::new_pure(&func, T, rho_right)?;
        let axis = Axis::new_cartesian(64, 20.0)?;
        let density = Array2::from_shape_fn((1, 64), |(_, i)| {
            rho_left + (rho_right - rho_left) * i as f64 / 63.0
        });
        DFTProfile::new(
            axis,
            &left,
            &right,
            density,
            DFTSpecification::ChemicalPotential,
        )
    }

    #[test]
    fn uniform_profile_is_a_solution() -> EosResult<()> {
        let mut profile = profile(0.3, 0.3)?;
        assert!(profile.residual(false)?.1 < 1e-12);
        profile.solve(None)?;
        for &rho in profile.density.iter() {
            assert_relative_eq!(rho, 0.3, max_relative = 1e-10);
        }
        let omega = profile.grand_potential_density()?;
        let p = profile.bulk_left.pressure(Contributions::Total);
        for &o in omega.iter() {
            assert_relative_eq!(o, -p, max_relative = 1e-8);
        }
        Ok(())
    }

    #[test]
    fn bulk_phases_have_to_coexist() -> EosResult<()> {
        let mut profile = profile(0.3, 0.1)?;
        assert!(matches!(
            profile.validate_bulk_states(),
            Err(EosError::InvalidBulkState(_))
        ));
        assert!(matches!(
            profile.solve(None),
            Err(EosError::InvalidBulkState(_))
        ));
        Ok(())
    }

    #[test]
    fn edges_have_to_reach_the_bulk() -> EosResult<()> {
        let profile = profile(0.3, 0.1)?;
        assert_eq!(profile.density[[0, 0]], 0.3);
        assert_eq!(profile.density[[0, 63]], 0.1);
        assert!(matches!(profile.check_edges(), Err(EosError::InvalidGrid(_))));
        Ok(())
    }

    #[test]
    fn fixed_total_moles() -> EosResult<()> {
        let mut profile = profile(0.3, 0.3)?;
        profile.fix_total_moles();
        match profile.specification {
            DFTSpecification::TotalMoles { total_moles } => {
                assert_relative_eq!(total_moles, 6.0, max_relative = 1e-12)
            }
            DFTSpecification::ChemicalPotential => panic!("total moles are not fixed"),
        }
        profile.solve(None)?;
        assert_relative_eq!(profile.total_moles(), 6.0, max_relative = 1e-10);
        Ok(())
    }

    #[test]
    fn cancelled_solver() -> EosResult<()> {
        let mut profile = profile(0.3, 0.3)?;
        let cancel = Cancellation::from_flag(Arc::new(AtomicBool::new(true)));
        let solver = DFTSolver::default().cancel(cancel);
        assert!(matches!(
            profile.solve(Some(&solver)),
            Err(EosError::Cancelled)
        ));
        Ok(())
    }

    #[test]
    fn invalid_initial_density() -> EosResult<()> {
        let func = Arc::new(VanDerWaals);
        let bulk = State::new_pure(&func, T, 0.3)?;
        let axis = Axis::new_cartesian(64, 20.0)?;
        let result = DFTProfile::new(
            axis.clone(),
            &bulk,
            &bulk,
            Array2::zeros((2, 64)),
            DFTSpecification::ChemicalPotential,
        );
        assert!(matches!(result, Err(EosError::IncompatibleComponents(1, 2))));
        let result = DFTProfile::new(
            axis,
            &bulk,
            &bulk,
            Array2::zeros((1, 32)),
            DFTSpecification::ChemicalPotential,
        );
        assert!(matches!(result, Err(EosError::InvalidGrid(_))));
        Ok(())
    }
}
