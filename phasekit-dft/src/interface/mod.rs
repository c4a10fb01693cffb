//! Density profiles at planar vapor-liquid interfaces.
use crate::functional::HelmholtzEnergyFunctional;
use crate::geometry::Axis;
use crate::profile::{DFTProfile, DFTSpecification};
use crate::solver::DFTSolver;
use ndarray::{Array1, Array2, Axis as Ax};
use phasekit_core::{Contributions, EosError, EosResult, PhaseEquilibrium, State};
use std::sync::Arc;

mod surface_tension_diagram;
pub use surface_tension_diagram::SurfaceTensionDiagram;

/// Discretization of a planar interface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridSpec {
    /// Number of grid points.
    pub n_grid: usize,
    /// Length of the grid in Å.
    pub l_grid: f64,
    /// Critical temperature in K, used for the initial tanh profile.
    pub critical_temperature: f64,
}

/// Density profile and properties of a planar interface.
///
/// The left side of the grid is the first bulk phase (the liquid for
/// interfaces created from a [PhaseEquilibrium]), the right side the second.
pub struct PlanarInterface<F: HelmholtzEnergyFunctional> {
    pub profile: DFTProfile<F>,
    pub vle: PhaseEquilibrium<F, 2>,
    /// Surface tension in K/Å².
    pub surface_tension: Option<f64>,
    /// Position of the equimolar dividing surface in Å.
    pub equimolar_radius: Option<f64>,
}

impl<F: HelmholtzEnergyFunctional> Clone for PlanarInterface<F> {
    fn clone(&self) -> Self {
        Self {
            profile: self.profile.clone(),
            vle: self.vle.clone(),
            surface_tension: self.surface_tension,
            equimolar_radius: self.equimolar_radius,
        }
    }
}

impl<F: HelmholtzEnergyFunctional> PlanarInterface<F> {
    /// Solve the density profile and evaluate the surface tension.
    pub fn solve_inplace(&mut self, solver: Option<&DFTSolver>) -> EosResult<()> {
        self.profile.solve(solver)?;

        let pressure = self.profile.bulk_left.pressure(Contributions::Total);
        let omega = self.profile.grand_potential_density()?;
        self.surface_tension = Some(self.profile.integrate(&(omega + pressure)));
        self.equimolar_radius = self.equimolar_position();
        Ok(())
    }

    pub fn solve(mut self, solver: Option<&DFTSolver>) -> EosResult<Self> {
        self.solve_inplace(solver)?;
        Ok(self)
    }

    fn equimolar_position(&self) -> Option<f64> {
        let rho = self.profile.density.sum_axis(Ax(0));
        let n = rho.len();
        let (rho_l, rho_r) = (rho[0], rho[n - 1]);
        if (rho_l - rho_r).abs() <= f64::EPSILON * rho_l.max(rho_r) {
            return None;
        }
        let z0 = self.profile.axis.edges[0];
        Some(z0 + self.profile.integrate(&((rho - rho_r) / (rho_l - rho_r))))
    }
}

impl<F: HelmholtzEnergyFunctional> PlanarInterface<F> {
    /// Interface with a step function as initial profile.
    pub fn new(vle: &PhaseEquilibrium<F, 2>, n_grid: usize, l_grid: f64) -> EosResult<Self> {
        let half = 0.5 * l_grid;
        Self::from_shape(
            vle.liquid(),
            vle.vapor(),
            vle.clone(),
            n_grid,
            l_grid,
            |z| if z < half { 0.0 } else { 1.0 },
            false,
        )
    }

    /// Interface with a tanh profile as initial guess.
    ///
    /// If `fix_equimolar_surface` is set, the total number of particles of
    /// the initial profile is kept constant during the iteration, which
    /// pins the interface to the center of the grid.
    pub fn from_tanh(
        vle: &PhaseEquilibrium<F, 2>,
        n_grid: usize,
        l_grid: f64,
        critical_temperature: f64,
        fix_equimolar_surface: bool,
    ) -> EosResult<Self> {
        let shape = tanh_shape(vle.vapor().temperature, critical_temperature, l_grid)?;
        Self::from_shape(
            vle.liquid(),
            vle.vapor(),
            vle.clone(),
            n_grid,
            l_grid,
            shape,
            fix_equimolar_surface,
        )
    }

    /// Interface between two arbitrary bulk states with a fixed equimolar surface.
    ///
    /// Below the critical temperature the initial guess is a tanh profile,
    /// at or above it a linear interpolation between the bulk densities
    /// (a uniform profile for identical bulk states).
    pub fn from_states(
        bulk_left: &State<F>,
        bulk_right: &State<F>,
        grid_spec: &GridSpec,
    ) -> EosResult<Self> {
        let (t, tc, l_grid) = (
            bulk_left.temperature,
            grid_spec.critical_temperature,
            grid_spec.l_grid,
        );
        let shape: Box<dyn Fn(f64) -> f64> = if tc > 0.0 && t >= tc {
            Box::new(move |z: f64| z / l_grid)
        } else {
            Box::new(tanh_shape(t, tc, l_grid)?)
        };
        let vle = PhaseEquilibrium::from_states(bulk_left.clone(), bulk_right.clone());
        Self::from_shape(
            bulk_left,
            bulk_right,
            vle,
            grid_spec.n_grid,
            grid_spec.l_grid,
            shape,
            true,
        )
    }

    /// `shape` interpolates between the left (0) and the right (1) bulk density.
    fn from_shape<S: Fn(f64) -> f64>(
        bulk_left: &State<F>,
        bulk_right: &State<F>,
        vle: PhaseEquilibrium<F, 2>,
        n_grid: usize,
        l_grid: f64,
        shape: S,
        fix_equimolar_surface: bool,
    ) -> EosResult<Self> {
        let axis = Axis::new_cartesian(n_grid, l_grid)?;
        let rho_l = &bulk_left.partial_density;
        let rho_r = &bulk_right.partial_density;
        let density = Array2::from_shape_fn((rho_l.len(), n_grid), |(i, k)| {
            rho_l[i] + (rho_r[i] - rho_l[i]) * shape(axis.grid[k])
        });
        let mut profile = DFTProfile::new(
            axis,
            bulk_left,
            bulk_right,
            density,
            DFTSpecification::ChemicalPotential,
        )?;
        if fix_equimolar_surface {
            profile.fix_total_moles();
        }
        Ok(Self {
            profile,
            vle,
            surface_tension: None,
            equimolar_radius: None,
        })
    }

    /// Replace the density with the (solved) profile of another interface.
    ///
    /// With `scale`, every component is stretched linearly so that its
    /// edges match the bulk densities of this interface.
    pub fn set_density_inplace(&mut self, init: &Array2<f64>, scale: bool) -> EosResult<()> {
        let dim = self.profile.density.raw_dim();
        if init.raw_dim() != dim {
            return Err(EosError::InvalidGrid(format!(
                "cannot initialize a profile of shape {:?} with a profile of shape {:?}",
                dim,
                init.shape()
            )));
        }
        let n = dim[1];
        let mut density = init.clone();
        if scale {
            let rho_l = &self.profile.bulk_left.partial_density;
            let rho_r = &self.profile.bulk_right.partial_density;
            for (i, mut rho) in density.outer_iter_mut().enumerate() {
                let (init_l, init_r) = (init[[i, 0]], init[[i, n - 1]]);
                if (init_l - init_r).abs() > f64::EPSILON * init_l.max(init_r) {
                    rho.mapv_inplace(|x| {
                        (x - init_r) / (init_l - init_r) * (rho_l[i] - rho_r[i]) + rho_r[i]
                    });
                }
            }
        }
        let rho_l = self.profile.bulk_left.partial_density.clone();
        let rho_r = self.profile.bulk_right.partial_density.clone();
        density.column_mut(0).assign(&rho_l);
        density.column_mut(n - 1).assign(&rho_r);
        self.profile.density = density;
        if let DFTSpecification::TotalMoles { .. } = self.profile.specification {
            self.profile.fix_total_moles();
        }
        Ok(())
    }

    /// Relative adsorption $\Gamma_i^{(j)}$ of component $i$ with respect to component $j$ in Å⁻².
    pub fn relative_adsorption(&self) -> Array2<f64> {
        let s = self.profile.density.shape();
        let mut rho_l = Array1::zeros(s[0]);
        let mut rho_v = Array1::zeros(s[0]);
        rho_l.assign(&self.profile.density.index_axis(Ax(1), 0));
        rho_v.assign(&self.profile.density.index_axis(Ax(1), s[1] - 1));

        let mut gamma = Array2::zeros((s[0], s[0]));
        for i in 0..s[0] {
            for j in 0..s[0] {
                let rho_i = self.profile.density.index_axis(Ax(0), i).to_owned();
                let rho_j = self.profile.density.index_axis(Ax(0), j).to_owned();
                gamma[[i, j]] = -(rho_l[i] - rho_v[i])
                    * self.profile.integrate(
                        &((&rho_j - rho_l[j]) / (rho_l[j] - rho_v[j])
                            - (&rho_i - rho_l[i]) / (rho_l[i] - rho_v[i])),
                    );
            }
        }
        gamma
    }

    /// Maximum of every density profile relative to the larger of its bulk densities.
    pub fn interfacial_enrichment(&self) -> Array1<f64> {
        let n = self.profile.density.ncols();
        self.profile
            .density
            .outer_iter()
            .map(|rho| {
                let rho_max = rho.fold(f64::NEG_INFINITY, |acc, &r| acc.max(r));
                rho_max / rho[0].max(rho[n - 1])
            })
            .collect()
    }

    /// Distance between the positions where the total density crosses
    /// `limits.0` and `limits.1` of the density jump (10-90 thickness for `(0.9, 0.1)`).
    pub fn interfacial_thickness(&self, limits: (f64, f64)) -> EosResult<f64> {
        let rho = self.profile.density.sum_axis(Ax(0));
        let z = self.profile.z();
        let n = rho.len();
        let (rho_r, rho_l) = (rho[n - 1], rho[0]);
        let (upper, lower) = (limits.0.max(limits.1), limits.0.min(limits.1));
        let value = |f: f64| rho_r + f * (rho_l - rho_r);
        let z_upper = crossing(z, &rho, value(upper));
        let z_lower = crossing(z, &rho, value(lower));
        match (z_upper, z_lower) {
            (Some(u), Some(l)) => Ok((u - l).abs()),
            _ => Err(EosError::Error(format!(
                "the density profile does not cross {upper} and {lower} of the density jump"
            ))),
        }
    }

    /// Surface tension converted to mN/m.
    pub fn surface_tension_mn_m(&self) -> Option<f64> {
        self.surface_tension.map(|gamma| gamma * phasekit_core::KB_A3 * 1e-7)
    }
}

/// First position where `rho` passes `value`, linearly interpolated.
fn crossing(z: &Array1<f64>, rho: &Array1<f64>, value: f64) -> Option<f64> {
    let decreasing = rho[0] >= rho[rho.len() - 1];
    let above = |r: f64| if decreasing { r < value } else { r > value };
    (1..rho.len())
        .find(|&i| above(rho[i]) && !above(rho[i - 1]))
        .map(|i| z[i - 1] + (value - rho[i - 1]) / (rho[i] - rho[i - 1]) * (z[i] - z[i - 1]))
}

/// Interpolation between the left and right bulk density
/// $\frac{1}{2}\left(1+\tanh\left(\frac{a}{3}(z-L/2)\right)\right)$ with
/// $a=2.4728-2.3625\,T/T_c$ and $z$ in Å.
fn tanh_shape(
    temperature: f64,
    critical_temperature: f64,
    l_grid: f64,
) -> EosResult<impl Fn(f64) -> f64> {
    if !(critical_temperature > 0.0) {
        return Err(EosError::NonPhysicalInput {
            name: "critical temperature".into(),
            value: critical_temperature,
        });
    }
    if temperature >= critical_temperature {
        return Err(EosError::SuperCritical);
    }
    let a = 2.4728 - 2.3625 * temperature / critical_temperature;
    let center = 0.5 * l_grid;
    Ok(move |z: f64| 0.5 * (1.0 + ((z - center) * a / 3.0).tanh()))
}

/// Solve the density profile between two bulk states of `functional`.
///
/// The initial profile is a tanh (linear above the critical temperature)
/// with a fixed equimolar surface in the center of the grid.
pub fn solve_density_profile<F: HelmholtzEnergyFunctional>(
    functional: &Arc<F>,
    bulk_left: &State<F>,
    bulk_right: &State<F>,
    grid_spec: &GridSpec,
    solver: Option<&DFTSolver>,
) -> EosResult<DFTProfile<F>> {
    if !Arc::ptr_eq(functional, &bulk_left.eos) || !Arc::ptr_eq(functional, &bulk_right.eos) {
        return Err(EosError::InvalidBulkState(
            "the bulk states were not created with this functional".into(),
        ));
    }
    Ok(PlanarInterface::from_states(bulk_left, bulk_right, grid_spec)?
        .solve(solver)?
        .profile)
}

