#[cfg(feature = "pets")]
use crate::pets::Pets;
use phasekit_core::cubic::PengRobinson;
use phasekit_core::NoResidual;
use phasekit_derive::{Components, Residual};

/// Collection of the available residual Helmholtz energy models.
///
/// Useful wherever a single concrete model type is needed
/// instead of a generic parameter.
#[derive(Components, Residual)]
pub enum ResidualModel {
    NoResidual(NoResidual),
    PengRobinson(PengRobinson),
    #[cfg(feature = "pets")]
    Pets(Pets),
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::arr1;
    use phasekit_core::cubic::PengRobinsonParameters;
    use phasekit_core::{
        Components, Contributions, DensityInitialization, EosResult, PhaseEquilibrium, Residual,
        State,
    };
    use std::sync::Arc;

    #[test]
    fn ideal_gas_variant() -> EosResult<()> {
        let eos = Arc::new(ResidualModel::NoResidual(NoResidual(3)));
        assert_eq!(eos.components(), 3);
        assert_eq!(eos.subset(&[0, 2]).components(), 2);
        let moles = arr1(&[1.0, 2.0, 3.0]);
        let state = State::new_nvt(&eos, 250.0, 1e4, &moles)?;
        assert_relative_eq!(
            state.pressure(Contributions::Total) * 1e4,
            6.0 * 250.0,
            max_relative = 1e-12
        );
        Ok(())
    }

    #[test]
    fn peng_robinson_variant_matches_model() -> EosResult<()> {
        let parameters = Arc::new(PengRobinsonParameters::new_simple(
            &[369.96],
            &[4250000.0],
            &[0.153],
            &[44.0962],
        )?);
        let pr = Arc::new(PengRobinson::new(parameters.clone()));
        let model = Arc::new(ResidualModel::PengRobinson(PengRobinson::new(parameters)));
        assert_eq!(
            model.critical_point_guess(&arr1(&[1.0])),
            pr.critical_point_guess(&arr1(&[1.0]))
        );

        let moles = arr1(&[1.0]);
        let s1 = State::new_npt(&pr, 300.0, 1e-3, &moles, DensityInitialization::Liquid)?;
        let s2 = State::new_npt(&model, 300.0, 1e-3, &moles, DensityInitialization::Liquid)?;
        assert_relative_eq!(s1.density, s2.density, max_relative = 1e-12);

        let vle = PhaseEquilibrium::pure(&model, 300.0, None, Default::default())?;
        assert_relative_eq!(
            vle.vapor().pressure(Contributions::Total),
            vle.liquid().pressure(Contributions::Total),
            max_relative = 1e-8
        );
        Ok(())
    }
}
