use super::{argon, EPSILON_K, SIGMA};
use approx::assert_relative_eq;
use phasekit_core::{Contributions, EosResult, State};

#[test]
fn critical_temperature_of_the_truncated_fluid() -> EosResult<()> {
    let eos = argon();
    let cp = State::critical_point(&eos, None, None, Default::default())?;

    // simulation results for the LJ fluid truncated and shifted at 2.5 sigma
    assert_relative_eq!(cp.temperature / EPSILON_K, 1.086, max_relative = 1e-2);
    assert_relative_eq!(cp.density * SIGMA.powi(3), 0.319, max_relative = 0.1);
    Ok(())
}

#[test]
fn critical_point_is_independent_of_initial_temperature() -> EosResult<()> {
    let eos = argon();
    let cp1 = State::critical_point(&eos, None, None, Default::default())?;
    let cp2 = State::critical_point(&eos, None, Some(0.8 * EPSILON_K), Default::default())?;
    assert_relative_eq!(cp1.temperature, cp2.temperature, max_relative = 1e-8);
    assert_relative_eq!(cp1.density, cp2.density, max_relative = 1e-6);

    // the isotherm is flat at the critical point
    let p = cp1.pressure(Contributions::Total);
    assert!(cp1.dp_drho().abs() * cp1.density / p < 1e-6);
    Ok(())
}
