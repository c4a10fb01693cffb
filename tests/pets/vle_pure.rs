use super::{argon, EPSILON_K};
use approx::assert_relative_eq;
use ndarray::arr1;
use phasekit_core::{
    Contributions, DensityInitialization, EosResult, PhaseDiagram, PhaseEquilibrium, State,
};

#[test]
fn vle_pure_temperature() -> EosResult<()> {
    let eos = argon();
    for t_red in [0.6, 0.8, 1.0] {
        let vle = PhaseEquilibrium::pure(&eos, t_red * EPSILON_K, None, Default::default())?;
        let (vapor, liquid) = (vle.vapor(), vle.liquid());
        assert!(liquid.density > vapor.density);
        assert_relative_eq!(
            vapor.pressure(Contributions::Total),
            liquid.pressure(Contributions::Total),
            max_relative = 1e-8
        );
        assert_relative_eq!(
            vapor.chemical_potential(Contributions::Total)[0],
            liquid.chemical_potential(Contributions::Total)[0],
            epsilon = 1e-8 * EPSILON_K
        );
    }
    Ok(())
}

#[test]
fn pressure_round_trip() -> EosResult<()> {
    let eos = argon();
    let t = 0.8 * EPSILON_K;
    let vle = PhaseEquilibrium::pure(&eos, t, None, Default::default())?;
    let p = vle.vapor().pressure(Contributions::Total);
    let moles = arr1(&[1.0]);

    let liquid = State::new_npt(&eos, t, 2.0 * p, &moles, DensityInitialization::Liquid)?;
    assert_relative_eq!(liquid.pressure(Contributions::Total), 2.0 * p, max_relative = 1e-8);
    let vapor = State::new_npt(&eos, t, 0.5 * p, &moles, DensityInitialization::Vapor)?;
    assert_relative_eq!(vapor.pressure(Contributions::Total), 0.5 * p, max_relative = 1e-8);
    assert!(liquid.density > vle.liquid().density);
    assert!(vapor.density < vle.vapor().density);
    Ok(())
}

#[test]
fn phase_diagram_covers_the_temperature_range() -> EosResult<()> {
    let eos = argon();
    let cp = State::critical_point(&eos, None, None, Default::default())?;
    let tc = cp.temperature;
    let diagram = PhaseDiagram::pure_range(&eos, 0.5 * tc, 0.99 * tc, 20, Default::default())?;
    assert_eq!(diagram.states.len() + diagram.dropped.len(), 20);
    assert!(diagram.states.len() >= 18);

    let temperature = diagram.temperature();
    let pressure = diagram.pressure();
    for i in 1..temperature.len() {
        assert!(temperature[i] > temperature[i - 1]);
        assert!(pressure[i] > pressure[i - 1]);
    }
    for vle in &diagram.states {
        assert!(vle.equilibrium_residual() < 1e-6);
    }
    Ok(())
}
