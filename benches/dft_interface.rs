//! Benchmarks for the calculation of density profiles
//! of planar vapor-liquid interfaces.
use criterion::{criterion_group, criterion_main, Criterion};
use ndarray::arr1;
use phasekit::hard_sphere::{FMTFunctional, FMTVersion};
use phasekit::pets::{Pets, PetsOptions, PetsParameters, PetsRecord};
use phasekit_core::parameter::{Identifier, Parameter, PureRecord};
use phasekit_core::{PhaseEquilibrium, State};
use phasekit_dft::interface::{solve_density_profile, GridSpec, PlanarInterface};
use phasekit_dft::DFTSolver;
use std::sync::Arc;

fn fmt(c: &mut Criterion) {
    let mut group = c.benchmark_group("DFT_uniform_fmt");

    let func = Arc::new(FMTFunctional::new(&arr1(&[1.0]), FMTVersion::WhiteBear));
    let bulk = State::new_pure(&func, 1.0, 0.75).unwrap();
    let grid = GridSpec {
        n_grid: 256,
        l_grid: 20.0,
        critical_temperature: 2.0,
    };
    group.bench_function("liquid", |b| {
        b.iter(|| solve_density_profile(&func, &bulk, &bulk, &grid, None).unwrap())
    });
}

fn pets(c: &mut Criterion) {
    let mut group = c.benchmark_group("DFT_interface_pets");
    let record = PureRecord::new(
        Identifier::from_name("argon"),
        39.948,
        PetsRecord::new(3.405, 119.8),
    );
    let parameters = Arc::new(PetsParameters::new_pure(record).unwrap());
    for (name, version) in [
        ("white_bear", FMTVersion::WhiteBear),
        ("anti_sym_white_bear", FMTVersion::AntiSymWhiteBear),
    ] {
        let options = PetsOptions {
            fmt_version: version,
            ..Default::default()
        };
        let func = Arc::new(Pets::with_options(parameters.clone(), options));
        let tc = State::critical_point(&func, None, None, Default::default())
            .unwrap()
            .temperature;
        let vle = PhaseEquilibrium::pure(&func, 0.8 * tc, None, Default::default()).unwrap();
        let solver = DFTSolver::default();
        group.bench_function(name, |b| {
            b.iter(|| {
                PlanarInterface::from_tanh(&vle, 256, 150.0, tc, false)
                    .unwrap()
                    .solve(Some(&solver))
                    .unwrap()
            })
        });
    }
}

criterion_group!(bench, fmt, pets);
criterion_main!(bench);
