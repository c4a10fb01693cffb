use super::{argon, EPSILON_K, SIGMA};
use approx::assert_relative_eq;
use ndarray::{Array1, Axis};
use phasekit_core::{
    Cancellation, Contributions, DensityInitialization, EosError, EosResult, PhaseEquilibrium,
    Residual, State, StateHD, Verbosity,
};
use phasekit_dft::interface::{solve_density_profile, GridSpec, PlanarInterface};
use phasekit_dft::{DFTSolver, HelmholtzEnergyFunctional, SurfaceTensionDiagram};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

const N_GRID: usize = 256;
const L_GRID: f64 = 150.0;

fn critical_temperature(eos: &Arc<phasekit::pets::Pets>) -> EosResult<f64> {
    Ok(State::critical_point(eos, None, None, Default::default())?.temperature)
}

#[test]
fn bulk_implementations_agree() {
    let func = argon();
    for density in [1e-4, 0.01, 0.025] {
        let state = StateHD::new(90.0, 1.0 / density, Array1::ones(1));
        let bulk: f64 = func.evaluate_bulk(&state).iter().map(|(_, a)| a).sum();
        assert_relative_eq!(
            bulk,
            func.residual_helmholtz_energy(&state),
            max_relative = 1e-10
        );
    }
}

#[test]
fn identical_bulk_phases_give_a_uniform_profile() -> EosResult<()> {
    let func = argon();
    let tc = critical_temperature(&func)?;
    let moles = Array1::ones(1);
    let liquid = State::new_npt(&func, 100.0, 0.5, &moles, DensityInitialization::Liquid)?;
    let grid = GridSpec {
        n_grid: 128,
        l_grid: 60.0,
        critical_temperature: tc,
    };
    let profile = solve_density_profile(&func, &liquid, &liquid, &grid, None)?;
    for &rho in profile.density.iter() {
        assert_relative_eq!(rho, liquid.density, max_relative = 1e-8);
    }
    assert_relative_eq!(
        profile.total_moles(),
        liquid.density * 60.0,
        max_relative = 1e-8
    );
    Ok(())
}

#[test]
fn supercritical_bulk_gives_a_uniform_profile() -> EosResult<()> {
    let func = argon();
    let tc = critical_temperature(&func)?;
    let bulk = State::new_pure(&func, 1.2 * tc, 0.01)?;
    let grid = GridSpec {
        n_grid: 128,
        l_grid: 60.0,
        critical_temperature: tc,
    };
    let profile = solve_density_profile(&func, &bulk, &bulk, &grid, None)?;
    for &rho in profile.density.iter() {
        assert_relative_eq!(rho, 0.01, max_relative = 1e-8);
    }
    assert_relative_eq!(profile.temperature, 1.2 * tc, max_relative = 1e-12);

    // the same holds exactly at the critical temperature of the grid
    let grid = GridSpec {
        critical_temperature: 1.2 * tc,
        ..grid
    };
    let profile = solve_density_profile(&func, &bulk, &bulk, &grid, None)?;
    for &rho in profile.density.iter() {
        assert_relative_eq!(rho, 0.01, max_relative = 1e-8);
    }
    Ok(())
}

#[test]
fn surface_tension_of_the_planar_interface() -> EosResult<()> {
    let func = argon();
    let tc = critical_temperature(&func)?;
    let t = 0.8 * EPSILON_K;
    let vle = PhaseEquilibrium::pure(&func, t, None, Default::default())?;
    let interface = PlanarInterface::from_tanh(&vle, N_GRID, L_GRID, tc, false)?.solve(None)?;

    let gamma = interface.surface_tension.expect("surface tension is evaluated");
    let gamma_red = gamma * SIGMA * SIGMA / EPSILON_K;
    assert!(gamma_red > 0.2 && gamma_red < 0.6, "gamma* = {gamma_red}");
    assert_relative_eq!(
        interface.surface_tension_mn_m().unwrap_or(f64::NAN),
        gamma * 1.380649,
        max_relative = 1e-12
    );

    // the liquid is on the left
    let rho = interface.profile.density.index_axis(Axis(0), 0);
    assert_relative_eq!(rho[0], vle.liquid().density, max_relative = 1e-10);
    assert_relative_eq!(rho[N_GRID - 1], vle.vapor().density, max_relative = 1e-10);

    let z = interface.equimolar_radius.expect("the bulk densities differ");
    assert!(z > 0.0 && z < L_GRID);
    let thickness = interface.interfacial_thickness((0.9, 0.1))?;
    assert!(thickness > SIGMA && thickness < 0.5 * L_GRID);
    Ok(())
}

#[test]
fn mismatched_bulk_phases_are_rejected() -> EosResult<()> {
    let func = argon();
    let tc = critical_temperature(&func)?;
    let t = 0.8 * EPSILON_K;
    let vle = PhaseEquilibrium::pure(&func, t, None, Default::default())?;
    let grid = GridSpec {
        n_grid: N_GRID,
        l_grid: L_GRID,
        critical_temperature: tc,
    };

    // vapor at half the saturation pressure is not in equilibrium with the liquid
    let p = vle.vapor().pressure(Contributions::Total);
    let moles = &vle.vapor().moles;
    let vapor = State::new_npt(&func, t, 0.5 * p, moles, DensityInitialization::Vapor)?;
    let result = solve_density_profile(&func, vle.liquid(), &vapor, &grid, None);
    assert!(matches!(result, Err(EosError::InvalidBulkState(_))));

    // bulk phases of a different functional instance
    let other = argon();
    let result = solve_density_profile(&other, vle.liquid(), vle.vapor(), &grid, None);
    assert!(matches!(result, Err(EosError::InvalidBulkState(_))));
    Ok(())
}

#[test]
fn surface_tension_vanishes_towards_the_critical_point() -> EosResult<()> {
    let func = argon();
    let tc = critical_temperature(&func)?;
    let vles = [0.6, 0.7, 0.8, 0.85]
        .iter()
        .map(|x| PhaseEquilibrium::pure(&func, x * tc, None, Default::default()))
        .collect::<EosResult<Vec<_>>>()?;
    let diagram = SurfaceTensionDiagram::new(&vles, N_GRID, L_GRID, tc, None);
    assert!(diagram.dropped.is_empty());

    let gamma = diagram.surface_tension();
    assert_eq!(gamma.len(), 4);
    assert!(gamma.iter().all(|&g| g > 0.0));
    for i in 1..gamma.len() {
        assert!(gamma[i] < gamma[i - 1]);
    }
    assert!(gamma[3] < 0.5 * gamma[0]);
    assert_eq!(diagram.temperature().len(), 4);
    assert_eq!(diagram.relative_adsorption().len(), 4);
    Ok(())
}

#[test]
fn cancelled_diagram_drops_all_points() -> EosResult<()> {
    let func = argon();
    let tc = critical_temperature(&func)?;
    let vles = [0.7, 0.8]
        .iter()
        .map(|x| PhaseEquilibrium::pure(&func, x * tc, None, Default::default()))
        .collect::<EosResult<Vec<_>>>()?;
    let cancel = Cancellation::from_flag(Arc::new(AtomicBool::new(true)));
    let solver = DFTSolver::default().cancel(cancel);
    let diagram = SurfaceTensionDiagram::new(&vles, N_GRID, L_GRID, tc, Some(&solver));
    assert!(diagram.profiles.is_empty());
    assert_eq!(diagram.dropped.len(), 2);
    assert_eq!(diagram.dropped[0].reason, EosError::Cancelled.to_string());
    Ok(())
}

#[test]
fn solver_stages_give_the_same_profile() -> EosResult<()> {
    let func = argon();
    let tc = critical_temperature(&func)?;
    let vle = PhaseEquilibrium::pure(&func, 0.75 * tc, None, Default::default())?;
    let interface = PlanarInterface::from_tanh(&vle, N_GRID, L_GRID, tc, true)?;

    let short_history = DFTSolver::new(Verbosity::None)
        .picard_iteration(None)
        .log()
        .max_iter(50)
        .tol(1e-5)
        .anderson_mixing(Some(10))
        .max_iter(500);
    let p1 = interface.clone().solve(Some(&short_history))?;
    let p2 = interface.solve(None)?;
    assert_relative_eq!(
        p1.surface_tension.unwrap_or(f64::NAN),
        p2.surface_tension.unwrap_or(f64::NAN),
        max_relative = 1e-5
    );
    Ok(())
}
