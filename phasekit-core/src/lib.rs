#![warn(clippy::all)]
#![allow(clippy::reversed_empty_ranges)]
#![allow(clippy::many_single_char_names)]
#![allow(clippy::too_many_arguments)]

/// Print messages with level `Verbosity::Iter` or higher.
#[macro_export]
macro_rules! log_iter {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= Verbosity::Iter {
            println!($($arg)*);
        }
    }
}

/// Print messages with level `Verbosity::Result` or higher.
#[macro_export]
macro_rules! log_result {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= Verbosity::Result {
            println!($($arg)*);
        }
    }
}

pub mod cubic;
mod density_iteration;
mod equation_of_state;
mod errors;
pub mod parameter;
mod phase_equilibria;
mod solver_options;
mod state;
pub use equation_of_state::{Components, NoResidual, Residual};
pub use errors::{EosError, EosResult};
pub use phase_equilibria::{DroppedPoint, PhaseDiagram, PhaseEquilibrium};
pub use solver_options::{Cancellation, SolverOptions, Verbosity};
pub use state::{
    Contributions, DensityInitialization, Derivative, State, StateHD, StateVec,
};

/// Boltzmann constant in Pa·Å³/K.
///
/// Pressures in reduced units (K/Å³) are converted to Pascal by multiplying with this constant.
pub const KB_A3: f64 = 1.380649e7;

#[cfg(test)]
mod tests {
    use crate::cubic::*;
    use crate::parameter::*;
    use crate::{
        Contributions, DensityInitialization, EosError, EosResult, PhaseEquilibrium, State,
    };
    use approx::*;
    use ndarray::arr1;
    use std::sync::Arc;

    fn pure_record_vec() -> Vec<PureRecord<PengRobinsonRecord>> {
        let records = r#"[
            {
                "identifier": {
                    "cas": "74-98-6",
                    "name": "propane",
                    "iupac_name": "propane",
                    "smiles": "CCC",
                    "inchi": "InChI=1/C3H8/c1-3-2/h3H2,1-2H3",
                    "formula": "C3H8"
                },
                "model_record": {
                    "tc": 369.96,
                    "pc": 4250000.0,
                    "acentric_factor": 0.153
                },
                "molarweight": 44.0962
            },
            {
                "identifier": {
                    "cas": "106-97-8",
                    "name": "butane",
                    "iupac_name": "butane",
                    "smiles": "CCCC",
                    "inchi": "InChI=1/C4H10/c1-3-4-2/h3-4H2,1-2H3",
                    "formula": "C4H10"
                },
                "model_record": {
                    "tc": 425.2,
                    "pc": 3800000.0,
                    "acentric_factor": 0.199
                },
                "molarweight": 58.123
            }
        ]"#;
        serde_json::from_str(records).expect("Unable to parse json.")
    }

    #[test]
    fn validate_residual_properties() -> EosResult<()> {
        let mixture = pure_record_vec();
        let propane = mixture[0].clone();
        let parameters = PengRobinsonParameters::new_pure(propane)?;
        let residual = Arc::new(PengRobinson::new(Arc::new(parameters)));

        let sr = State::new_nvt(&residual, 300.0, 1e24, &arr1(&[1e21]))?;

        // reference values from the analytic Peng-Robinson expressions
        let tc = 369.96;
        let pc = 4250000.0 / crate::KB_A3;
        let kappa = 0.37464 + (1.54226 - 0.26992 * 0.153) * 0.153;
        let alpha = (1.0 + kappa * (1.0 - (300.0f64 / tc).sqrt())).powi(2);
        let a = 0.45724 * tc * tc / pc * alpha;
        let b = 0.07780 * tc / pc;
        let v = 1e3;
        let p = 300.0 / (v - b) - a / (v * (v + b) + b * (v - b));

        assert_relative_eq!(sr.pressure(Contributions::Total), p, max_relative = 1e-10);
        assert_relative_eq!(
            sr.pressure(Contributions::Residual) + sr.pressure(Contributions::IdealGas),
            sr.pressure(Contributions::Total),
            max_relative = 1e-14
        );
        Ok(())
    }

    #[test]
    fn npt_round_trip() -> EosResult<()> {
        let mixture = pure_record_vec();
        let propane = mixture[0].clone();
        let parameters = PengRobinsonParameters::new_pure(propane)?;
        let residual = Arc::new(PengRobinson::new(Arc::new(parameters)));
        let moles = arr1(&[1.0]);

        for t in [250.0, 350.0, 450.0] {
            for p_pa in [1e3, 1e4, 1e5, 1e6, 1e7] {
                let p = p_pa / crate::KB_A3;
                let state = State::new_npt(&residual, t, p, &moles, DensityInitialization::None)?;
                assert_relative_eq!(state.pressure(Contributions::Total), p, max_relative = 1e-8);
            }
        }

        let t = 300.0;
        let vle = PhaseEquilibrium::pure(&residual, t, None, Default::default())?;
        let liquid = State::new_npt(
            &residual,
            t,
            vle.vapor().pressure(Contributions::Total),
            &moles,
            DensityInitialization::Liquid,
        )?;
        assert_relative_eq!(liquid.density, vle.liquid().density, max_relative = 1e-8);
        Ok(())
    }

    #[test]
    fn no_liquid_above_the_critical_temperature() -> EosResult<()> {
        let propane = pure_record_vec()[0].clone();
        let parameters = PengRobinsonParameters::new_pure(propane)?;
        let residual = Arc::new(PengRobinson::new(Arc::new(parameters)));
        let moles = arr1(&[1.0]);
        let p = 1e5 / crate::KB_A3;

        let liquid = State::new_npt(&residual, 500.0, p, &moles, DensityInitialization::Liquid);
        assert!(matches!(liquid, Err(EosError::NoPhysicalRoot { .. })));
        let vapor = State::new_npt(&residual, 500.0, p, &moles, DensityInitialization::Vapor)?;
        assert_relative_eq!(vapor.pressure(Contributions::Total), p, max_relative = 1e-8);
        Ok(())
    }
}
