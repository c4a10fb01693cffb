//! Description of a thermodynamic state.
//!
//! A thermodynamic state is defined by
//! * a temperature
//! * an array of mole numbers
//! * the volume
//!
//! Internally, all properties are computed using such states as input.
use crate::density_iteration::density_iteration;
use crate::equation_of_state::Residual;
use crate::errors::{EosError, EosResult};
use ndarray::prelude::*;
use num_dual::*;
use std::fmt;
use std::sync::Arc;

mod critical_point;
mod properties;
mod statevec;
pub use statevec::StateVec;

/// Possible contributions that can be computed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Contributions {
    /// Only compute the ideal gas contribution
    IdealGas,
    /// Only compute the difference between the total and the ideal gas contribution
    Residual,
    /// Compute ideal gas and residual contributions
    Total,
}

/// Initial values in a density iteration.
#[derive(Clone, Copy, Debug)]
pub enum DensityInitialization {
    /// Calculate a vapor phase by initializing using the ideal gas.
    Vapor,
    /// Calculate a liquid phase by using the `max_density`.
    Liquid,
    /// Use the given density as initial value.
    InitialDensity(f64),
    /// Calculate the most stable phase by calculating both a vapor and a liquid
    /// and return the one with the lower Gibbs energy.
    None,
}

/// Thermodynamic state of the system in reduced variables
/// including their derivatives.
///
/// Properties are stored as generalized (hyper) dual numbers which allows
/// for automatic differentiation.
#[derive(Clone, Debug)]
pub struct StateHD<D: DualNum<f64>> {
    /// temperature in Kelvin
    pub temperature: D,
    /// volume in Angstrom^3
    pub volume: D,
    /// number of particles
    pub moles: Array1<D>,
    /// mole fractions
    pub molefracs: Array1<D>,
    /// partial number densities in Angstrom^-3
    pub partial_density: Array1<D>,
}

impl<D: DualNum<f64> + Copy> StateHD<D> {
    /// Create a new `StateHD` for given temperature volume and moles.
    pub fn new(temperature: D, volume: D, moles: Array1<D>) -> Self {
        let total_moles = moles.sum();
        let partial_density = moles.mapv(|n| n / volume);
        let molefracs = moles.mapv(|n| n / total_moles);

        Self {
            temperature,
            volume,
            moles,
            molefracs,
            partial_density,
        }
    }

    // Since the molefracs can not be reproduced from moles if the density is zero,
    // this constructor exists specifically for these cases.
    pub(crate) fn new_virial(temperature: D, density: D, molefracs: Array1<f64>) -> Self {
        let volume = D::one();
        let partial_density = molefracs.mapv(|x| density * x);
        let moles = partial_density.mapv(|pd| pd * volume);
        let molefracs = molefracs.mapv(D::from);
        Self {
            temperature,
            volume,
            moles,
            molefracs,
            partial_density,
        }
    }
}

/// Thermodynamic state of the system.
///
/// The state is always specified by the variables of the Helmholtz energy: volume $V$,
/// temperature $T$ and mole numbers $N_i$. Additional to these variables, the state saves
/// properties like the density, that can be calculated directly from the basic variables.
/// The state also contains a reference to the equation of state used to create the state.
/// Therefore, it can be used directly to calculate all state properties.
///
/// All quantities are reduced: temperatures in K, volumes in Å³, amounts as
/// number of particles and energies in K.
///
/// Properties are evaluated on demand by differentiating the Helmholtz energy
/// with dual numbers. `State` objects are immutable and can be shared freely
/// between threads.
#[derive(Debug)]
pub struct State<E> {
    /// Equation of state
    pub eos: Arc<E>,
    /// Temperature $T$
    pub temperature: f64,
    /// Volume $V$
    pub volume: f64,
    /// Mole numbers $N_i$
    pub moles: Array1<f64>,
    /// Total number of moles $N=\sum_iN_i$
    pub total_moles: f64,
    /// Partial densities $\rho_i=\frac{N_i}{V}$
    pub partial_density: Array1<f64>,
    /// Total density $\rho=\frac{N}{V}=\sum_i\rho_i$
    pub density: f64,
    /// Mole fractions $x_i=\frac{N_i}{N}=\frac{\rho_i}{\rho}$
    pub molefracs: Array1<f64>,
}

impl<E> Clone for State<E> {
    fn clone(&self) -> Self {
        Self {
            eos: self.eos.clone(),
            temperature: self.temperature,
            volume: self.volume,
            moles: self.moles.clone(),
            total_moles: self.total_moles,
            partial_density: self.partial_density.clone(),
            density: self.density,
            molefracs: self.molefracs.clone(),
        }
    }
}

impl<E: Residual> fmt::Display for State<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.eos.components() == 1 {
            write!(f, "T = {:.5} K, ρ = {:.5e} Å⁻³", self.temperature, self.density)
        } else {
            write!(
                f,
                "T = {:.5} K, ρ = {:.5e} Å⁻³, x = {:.5}",
                self.temperature, self.density, self.molefracs
            )
        }
    }
}

/// Derivatives of the helmholtz energy.
#[derive(Clone, Copy, Eq, Hash, PartialEq, Debug, PartialOrd, Ord)]
pub enum Derivative {
    /// Derivative with respect to system volume.
    DV,
    /// Derivative with respect to temperature.
    DT,
    /// Derivative with respect to component `i`.
    DN(usize),
}

/// # State constructors
impl<E: Residual> State<E> {
    /// Return a new `State` given a temperature, an array of mole numbers and a volume.
    ///
    /// This function will perform a validation of the given properties, i.e. test for signs
    /// and if values are finite. It will **not** validate physics, i.e. if the resulting
    /// densities are below the maximum packing fraction.
    pub fn new_nvt(
        eos: &Arc<E>,
        temperature: f64,
        volume: f64,
        moles: &Array1<f64>,
    ) -> EosResult<Self> {
        eos.validate_moles(Some(moles))?;
        validate(temperature, volume, moles)?;

        Ok(Self::new_nvt_unchecked(eos, temperature, volume, moles))
    }

    pub(crate) fn new_nvt_unchecked(
        eos: &Arc<E>,
        temperature: f64,
        volume: f64,
        moles: &Array1<f64>,
    ) -> Self {
        let total_moles = moles.sum();
        let partial_density = moles / volume;
        let density = total_moles / volume;
        let molefracs = moles / total_moles;

        State {
            eos: eos.clone(),
            temperature,
            volume,
            moles: moles.to_owned(),
            total_moles,
            partial_density,
            density,
            molefracs,
        }
    }

    /// Return a new `State` for a pure component given a temperature and a density. The moles
    /// are set to 1.
    pub fn new_pure(eos: &Arc<E>, temperature: f64, density: f64) -> EosResult<Self> {
        let moles = arr1(&[1.0]);
        Self::new_nvt(eos, temperature, 1.0 / density, &moles)
    }

    /// Return a new `State` for given temperature, partial densities and a volume of 1 Å³.
    pub fn new_density(
        eos: &Arc<E>,
        temperature: f64,
        partial_density: &Array1<f64>,
    ) -> EosResult<Self> {
        Self::new_nvt(eos, temperature, 1.0, partial_density)
    }

    /// Return a new `State` using a density iteration. [DensityInitialization] is used to
    /// influence the calculation with respect to the possible solutions.
    ///
    /// # Errors
    ///
    /// [EosError::NoPhysicalRoot] if the requested phase does not exist at the given
    /// conditions, [EosError::NoConvergence] if the density iteration fails.
    pub fn new_npt(
        eos: &Arc<E>,
        temperature: f64,
        pressure: f64,
        moles: &Array1<f64>,
        density_initialization: DensityInitialization,
    ) -> EosResult<Self> {
        eos.validate_moles(Some(moles))?;
        validate_positive("pressure", pressure)?;
        validate_positive("temperature", temperature)?;

        // calculate state from initial density or given phase
        match density_initialization {
            DensityInitialization::InitialDensity(rho0) => {
                return density_iteration(eos, temperature, pressure, moles, rho0)
            }
            DensityInitialization::Vapor => {
                return density_iteration(eos, temperature, pressure, moles, pressure / temperature)
            }
            DensityInitialization::Liquid => {
                return Self::new_npt_liquid(eos, temperature, pressure, moles)
            }
            DensityInitialization::None => (),
        }

        // calculate stable phase
        let max_density = eos.max_density(Some(moles))?;
        let liquid = Self::new_npt_liquid(eos, temperature, pressure, moles);

        if pressure < max_density * temperature {
            let vapor = density_iteration(eos, temperature, pressure, moles, pressure / temperature);
            match (liquid, vapor) {
                (Ok(l), Err(_)) => Ok(l),
                (Err(_), Ok(v)) => Ok(v),
                (Ok(l), Ok(v)) => {
                    if l.gibbs_energy(Contributions::Total) > v.gibbs_energy(Contributions::Total) {
                        Ok(v)
                    } else {
                        Ok(l)
                    }
                }
                (Err(_), Err(e)) => Err(e),
            }
        } else {
            liquid
        }
    }

    /// Density iteration starting from the maximum density.
    ///
    /// The converged root is only accepted if it lies on the liquid
    /// branch of the isotherm, i.e., at a density above the liquid
    /// spinodal.
    fn new_npt_liquid(
        eos: &Arc<E>,
        temperature: f64,
        pressure: f64,
        moles: &Array1<f64>,
    ) -> EosResult<Self> {
        let no_root = || EosError::NoPhysicalRoot {
            phase: "liquid".into(),
            temperature,
            pressure,
        };
        let spinodal = Self::liquid_spinodal_density(eos, temperature, moles).map_err(|e| match e {
            EosError::SuperCritical | EosError::NoConvergence { .. } => no_root(),
            e => e,
        })?;
        let max_density = eos.max_density(Some(moles))?;
        let state = density_iteration(eos, temperature, pressure, moles, max_density)?;
        if state.density < spinodal {
            return Err(no_root());
        }
        Ok(state)
    }

    /// Return a new `State` for given pressure $p$, volume $V$, temperature $T$ and composition $x_i$.
    pub fn new_npvx(
        eos: &Arc<E>,
        temperature: f64,
        pressure: f64,
        volume: f64,
        molefracs: &Array1<f64>,
        density_initialization: DensityInitialization,
    ) -> EosResult<Self> {
        let state = Self::new_npt(eos, temperature, pressure, molefracs, density_initialization)?;
        let moles = &state.partial_density * volume;
        Self::new_nvt(eos, temperature, volume, &moles)
    }

    /// Update the state with the given temperature.
    pub fn update_temperature(&self, temperature: f64) -> EosResult<Self> {
        Self::new_nvt(&self.eos, temperature, self.volume, &self.moles)
    }
}

impl<E: Residual> State<E> {
    /// Creates a [StateHD] cloning temperature, volume and moles.
    pub fn derive0(&self) -> StateHD<f64> {
        StateHD::new(self.temperature, self.volume, self.moles.clone())
    }

    /// Creates a [StateHD] taking the first derivative.
    pub fn derive1(&self, derivative: Derivative) -> StateHD<Dual64> {
        let mut t = Dual64::from(self.temperature);
        let mut v = Dual64::from(self.volume);
        let mut n = self.moles.mapv(Dual64::from);
        match derivative {
            Derivative::DT => t = t.derivative(),
            Derivative::DV => v = v.derivative(),
            Derivative::DN(i) => n[i] = n[i].derivative(),
        }
        StateHD::new(t, v, n)
    }

    /// Creates a [StateHD] taking the first and second (partial) derivatives.
    pub fn derive2(&self, derivative: Derivative) -> StateHD<Dual2_64> {
        let mut t = Dual2_64::from(self.temperature);
        let mut v = Dual2_64::from(self.volume);
        let mut n = self.moles.mapv(Dual2_64::from);
        match derivative {
            Derivative::DT => t = t.derivative(),
            Derivative::DV => v = v.derivative(),
            Derivative::DN(i) => n[i] = n[i].derivative(),
        }
        StateHD::new(t, v, n)
    }

    /// Creates a [StateHD] taking the first and second (partial) derivatives.
    pub fn derive2_mixed(
        &self,
        derivative1: Derivative,
        derivative2: Derivative,
    ) -> StateHD<HyperDual64> {
        let mut t = HyperDual64::from(self.temperature);
        let mut v = HyperDual64::from(self.volume);
        let mut n = self.moles.mapv(HyperDual64::from);
        match derivative1 {
            Derivative::DT => t = t.derivative1(),
            Derivative::DV => v = v.derivative1(),
            Derivative::DN(i) => n[i] = n[i].derivative1(),
        }
        match derivative2 {
            Derivative::DT => t = t.derivative2(),
            Derivative::DV => v = v.derivative2(),
            Derivative::DN(i) => n[i] = n[i].derivative2(),
        }
        StateHD::new(t, v, n)
    }

    /// Creates a [StateHD] taking the first, second, and third derivative with respect to a single property.
    pub fn derive3(&self, derivative: Derivative) -> StateHD<Dual3_64> {
        let mut t = Dual3_64::from(self.temperature);
        let mut v = Dual3_64::from(self.volume);
        let mut n = self.moles.mapv(Dual3_64::from);
        match derivative {
            Derivative::DT => t = t.derivative(),
            Derivative::DV => v = v.derivative(),
            Derivative::DN(i) => n[i] = n[i].derivative(),
        };
        StateHD::new(t, v, n)
    }
}

fn validate_positive(name: &str, value: f64) -> EosResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(EosError::NonPhysicalInput {
            name: name.into(),
            value,
        });
    }
    Ok(())
}

/// Validate the given temperature, mole numbers and volume.
///
/// Properties are valid if
/// * they are finite
/// * they have a positive sign
///
/// There is no validation of the physical state, e.g.
/// if resulting densities are below maximum packing fraction.
fn validate(temperature: f64, volume: f64, moles: &Array1<f64>) -> EosResult<()> {
    validate_positive("temperature", temperature)?;
    validate_positive("volume", volume)?;
    for &n in moles.iter() {
        if !n.is_finite() || n.is_sign_negative() {
            return Err(EosError::NonPhysicalInput {
                name: "moles".into(),
                value: n,
            });
        }
    }
    if moles.sum() <= 0.0 {
        return Err(EosError::NonPhysicalInput {
            name: "total moles".into(),
            value: moles.sum(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equation_of_state::NoResidual;

    #[test]
    fn test_validate() {
        assert!(validate(298.15, 3000.0, &arr1(&[0.03, 0.02, 0.05])).is_ok());
    }

    #[test]
    fn test_negative_temperature() {
        assert!(matches!(
            validate(-298.15, 3000.0, &arr1(&[0.03, 0.02, 0.05])),
            Err(EosError::NonPhysicalInput { .. })
        ));
    }

    #[test]
    fn test_nan_temperature() {
        assert!(validate(f64::NAN, 3000.0, &arr1(&[0.03, 0.02, 0.05])).is_err());
    }

    #[test]
    fn test_negative_mole_number() {
        assert!(validate(298.15, 3000.0, &arr1(&[-0.03, 0.02, 0.05])).is_err());
    }

    #[test]
    fn test_nan_mole_number() {
        assert!(validate(298.15, 3000.0, &arr1(&[f64::NAN, 0.02, 0.05])).is_err());
    }

    #[test]
    fn test_negative_volume() {
        assert!(validate(298.15, -3000.0, &arr1(&[0.01, 0.02, 0.05])).is_err());
    }

    #[test]
    fn test_zero_volume() {
        assert!(validate(298.15, 0.0, &arr1(&[0.01, 0.02, 0.05])).is_err());
    }

    #[test]
    fn test_negative_pressure() {
        let eos = Arc::new(NoResidual(1));
        let state = State::new_npt(
            &eos,
            300.0,
            -1e-5,
            &arr1(&[1.0]),
            DensityInitialization::Vapor,
        );
        assert!(matches!(state, Err(EosError::NonPhysicalInput { .. })));
    }

    #[test]
    fn test_incompatible_components() {
        let eos = Arc::new(NoResidual(2));
        let state = State::new_nvt(&eos, 300.0, 1000.0, &arr1(&[1.0]));
        assert!(matches!(state, Err(EosError::IncompatibleComponents(2, 1))));
    }
}
