use phasekit::pets::{Pets, PetsParameters, PetsRecord};
use phasekit_core::parameter::{Identifier, Parameter, PureRecord};
use std::sync::Arc;

mod critical_point;
mod dft;
mod vle_pure;

const EPSILON_K: f64 = 119.8;
const SIGMA: f64 = 3.405;

fn argon() -> Arc<Pets> {
    let record = PureRecord::new(
        Identifier::new(Some("7440-37-1"), Some("argon"), Some("Ar")),
        39.948,
        PetsRecord::new(SIGMA, EPSILON_K),
    );
    let parameters = PetsParameters::new_pure(record).expect("valid argon parameters");
    Arc::new(Pets::new(Arc::new(parameters)))
}
