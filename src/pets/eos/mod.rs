use super::parameters::PetsParameters;
#[cfg(feature = "dft")]
use crate::hard_sphere::FMTVersion;
use crate::hard_sphere::HardSphere;
use ndarray::{Array1, Zip};
use num_dual::DualNum;
use phasekit_core::parameter::Parameter;
use phasekit_core::{Components, Residual, StateHD};
use std::f64::consts::FRAC_PI_6;
use std::fmt;
use std::sync::Arc;

pub(crate) mod dispersion;
use dispersion::Dispersion;

/// Settings shared by the equation of state and the functional.
#[derive(Copy, Clone, Debug)]
pub struct PetsOptions {
    /// Packing fraction at the upper end of the density range used
    /// as starting point for liquid density iterations.
    pub max_eta: f64,
    #[cfg(feature = "dft")]
    pub fmt_version: FMTVersion,
}

impl Default for PetsOptions {
    fn default() -> Self {
        Self {
            max_eta: 0.5,
            #[cfg(feature = "dft")]
            fmt_version: FMTVersion::WhiteBear,
        }
    }
}

/// Perturbed truncated and shifted (PeTS) Lennard-Jones fluid.
///
/// The pair potential is truncated at $2.5\sigma$; see
/// [Heier et al., 2018](https://doi.org/10.1080/00268976.2018.1447153).
/// With the `dft` feature, the same type is a Helmholtz energy functional
/// whose bulk limit is this equation of state.
pub struct Pets {
    pub parameters: Arc<PetsParameters>,
    pub options: PetsOptions,
}

impl Pets {
    pub fn new(parameters: Arc<PetsParameters>) -> Self {
        Self::with_options(parameters, PetsOptions::default())
    }

    pub fn with_options(parameters: Arc<PetsParameters>, options: PetsOptions) -> Self {
        Self {
            parameters,
            options,
        }
    }
}

impl fmt::Display for Pets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PeTS({} component(s), max_eta={})",
            self.components(),
            self.options.max_eta
        )
    }
}

impl Components for Pets {
    fn components(&self) -> usize {
        self.parameters.sigma.len()
    }

    fn subset(&self, component_list: &[usize]) -> Self {
        let parameters = self.parameters.subset(component_list);
        Self::with_options(Arc::new(parameters), self.options)
    }
}

impl Residual for Pets {
    /// Number density at which the packing fraction of the segments equals `max_eta`.
    fn compute_max_density(&self, moles: &Array1<f64>) -> f64 {
        let volume = Zip::from(moles)
            .and(&self.parameters.sigma)
            .fold(0.0, |acc, &n, &s| acc + n * FRAC_PI_6 * s.powi(3));
        self.options.max_eta * moles.sum() / volume
    }

    fn residual_helmholtz_energy_contributions<D: DualNum<f64> + Copy>(
        &self,
        state: &StateHD<D>,
    ) -> Vec<(String, D)> {
        let parameters = &*self.parameters;
        let hard_sphere = HardSphere::new(parameters).helmholtz_energy(state);
        let dispersion = Dispersion { parameters }.helmholtz_energy(state);
        vec![
            ("Hard Sphere".into(), hard_sphere),
            ("Dispersion".into(), dispersion),
        ]
    }

    /// $T_c\approx 1.08\,\varepsilon/k_B$ for the pure fluid, averaged with the mole fractions.
    fn critical_point_guess(&self, moles: &Array1<f64>) -> f64 {
        1.08 * moles.dot(&self.parameters.epsilon_k) / moles.sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pets::parameters::utils::{argon_krypton_parameters, argon_parameters};
    use approx::assert_relative_eq;
    use ndarray::arr1;

    #[test]
    fn max_density_and_critical_point_guess() {
        let pets = Pets::new(Arc::new(argon_krypton_parameters()));
        let moles = arr1(&[1.0, 1.0]);
        let segment_volume = FRAC_PI_6 * (3.405f64.powi(3) + 3.63f64.powi(3)) / 2.0;
        assert_relative_eq!(
            pets.compute_max_density(&moles),
            0.5 / segment_volume,
            max_relative = 1e-14
        );
        assert_relative_eq!(
            pets.critical_point_guess(&moles),
            1.08 * 0.5 * (119.8 + 163.1),
            max_relative = 1e-14
        );
        assert_eq!(pets.to_string(), "PeTS(2 component(s), max_eta=0.5)");
    }

    #[test]
    fn subset_keeps_options() {
        let options = PetsOptions {
            max_eta: 0.4,
            ..Default::default()
        };
        let mixture = Pets::with_options(Arc::new(argon_krypton_parameters()), options);
        let argon = mixture.subset(&[0]);
        assert_eq!(argon.components(), 1);
        assert_eq!(argon.options.max_eta, 0.4);

        let state = StateHD::new(150.0, 50.0, arr1(&[1.0]));
        let pure = Pets::with_options(Arc::new(argon_parameters()), options);
        assert_relative_eq!(
            argon.residual_helmholtz_energy(&state),
            pure.residual_helmholtz_energy(&state),
            max_relative = 1e-14
        );
    }
}
