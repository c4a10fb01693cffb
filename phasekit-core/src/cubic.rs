//! Implementation of the Peng-Robinson equation of state.
//!
//! This module acts as a reference on how a simple equation
//! of state - with a single contribution to the Helmholtz energy - can be implemented.
//! The implementation closely follows the form of the equations given in
//! [this wikipedia article](https://en.wikipedia.org/wiki/Cubic_equations_of_state#Peng%E2%80%93Robinson_equation_of_state).
use crate::equation_of_state::{Components, Residual};
use crate::parameter::{Identifier, Parameter, ParameterError, PureRecord};
use crate::state::StateHD;
use crate::KB_A3;
use ndarray::{Array1, Array2};
use num_dual::DualNum;
use serde::{Deserialize, Serialize};
use std::f64::consts::SQRT_2;
use std::fmt;
use std::sync::Arc;

/// Peng-Robinson parameters for a single substance.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct PengRobinsonRecord {
    /// critical temperature in Kelvin
    tc: f64,
    /// critical pressure in Pascal
    pc: f64,
    /// acentric factor
    acentric_factor: f64,
}

impl PengRobinsonRecord {
    /// Create a new pure substance record for the Peng-Robinson equation of state.
    pub fn new(tc: f64, pc: f64, acentric_factor: f64) -> Self {
        Self {
            tc,
            pc,
            acentric_factor,
        }
    }
}

impl std::fmt::Display for PengRobinsonRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PengRobinsonRecord(tc={} K", self.tc)?;
        write!(f, ", pc={} Pa", self.pc)?;
        write!(f, ", acentric factor={})", self.acentric_factor)
    }
}

/// Peng-Robinson parameters for one ore more substances.
pub struct PengRobinsonParameters {
    /// Critical temperature in Kelvin
    tc: Array1<f64>,
    a: Array1<f64>,
    b: Array1<f64>,
    /// Binary interaction parameter
    k_ij: Array2<f64>,
    kappa: Array1<f64>,
    /// Molar weight in units of g/mol
    molarweight: Array1<f64>,
    /// List of pure component records
    pure_records: Vec<PureRecord<PengRobinsonRecord>>,
}

impl std::fmt::Display for PengRobinsonParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.pure_records
            .iter()
            .try_for_each(|pr| writeln!(f, "{}", pr))?;
        writeln!(f, "\nk_ij:\n{}", self.k_ij)
    }
}

impl PengRobinsonParameters {
    /// Build a simple parameter set without binary interaction parameters.
    pub fn new_simple(
        tc: &[f64],
        pc: &[f64],
        acentric_factor: &[f64],
        molarweight: &[f64],
    ) -> Result<Self, ParameterError> {
        if [pc.len(), acentric_factor.len(), molarweight.len()]
            .iter()
            .any(|&l| l != tc.len())
        {
            return Err(ParameterError::IncompatibleParameters(String::from(
                "each component has to have parameters.",
            )));
        }
        let records = (0..tc.len())
            .map(|i| {
                let record = PengRobinsonRecord::new(tc[i], pc[i], acentric_factor[i]);
                PureRecord::new(Identifier::default(), molarweight[i], record)
            })
            .collect();
        PengRobinsonParameters::from_records(records, None)
    }

    /// Molar weights in g/mol.
    pub fn molarweight(&self) -> &Array1<f64> {
        &self.molarweight
    }
}

impl Parameter for PengRobinsonParameters {
    type Pure = PengRobinsonRecord;
    type Binary = f64;

    /// Creates parameters from pure component records.
    fn from_records(
        pure_records: Vec<PureRecord<Self::Pure>>,
        binary_records: Option<Array2<Self::Binary>>,
    ) -> Result<Self, ParameterError> {
        let n = pure_records.len();

        let mut tc = Array1::zeros(n);
        let mut a = Array1::zeros(n);
        let mut b = Array1::zeros(n);
        let mut molarweight = Array1::zeros(n);
        let mut kappa = Array1::zeros(n);

        for (i, record) in pure_records.iter().enumerate() {
            molarweight[i] = record.molarweight;
            let r = &record.model_record;
            if r.tc <= 0.0 || r.pc <= 0.0 {
                return Err(ParameterError::IncompatibleParameters(format!(
                    "critical properties of component {} have to be positive.",
                    i
                )));
            }
            tc[i] = r.tc;
            a[i] = 0.45724 * r.tc.powi(2) * KB_A3 / r.pc;
            b[i] = 0.07780 * r.tc * KB_A3 / r.pc;
            kappa[i] = 0.37464 + (1.54226 - 0.26992 * r.acentric_factor) * r.acentric_factor;
        }

        let k_ij = binary_records.unwrap_or_else(|| Array2::zeros([n; 2]));
        if k_ij.shape() != [n, n] {
            return Err(ParameterError::IncompatibleParameters(format!(
                "binary interaction parameters have to be a {n}x{n} matrix."
            )));
        }

        Ok(Self {
            tc,
            a,
            b,
            k_ij,
            kappa,
            molarweight,
            pure_records,
        })
    }

    fn records(&self) -> (&[PureRecord<PengRobinsonRecord>], Option<&Array2<f64>>) {
        (&self.pure_records, Some(&self.k_ij))
    }

    fn subset(&self, component_list: &[usize]) -> Self {
        let n = component_list.len();
        let select = |x: &Array1<f64>| Array1::from_shape_fn(n, |i| x[component_list[i]]);
        Self {
            tc: select(&self.tc),
            a: select(&self.a),
            b: select(&self.b),
            k_ij: Array2::from_shape_fn([n, n], |(i, j)| {
                self.k_ij[(component_list[i], component_list[j])]
            }),
            kappa: select(&self.kappa),
            molarweight: select(&self.molarweight),
            pure_records: component_list
                .iter()
                .map(|&i| self.pure_records[i].clone())
                .collect(),
        }
    }
}

/// A simple version of the Peng-Robinson equation of state.
pub struct PengRobinson {
    /// Parameters
    parameters: Arc<PengRobinsonParameters>,
}

impl PengRobinson {
    /// Create a new equation of state from a set of parameters.
    pub fn new(parameters: Arc<PengRobinsonParameters>) -> Self {
        Self { parameters }
    }

    fn helmholtz_energy<D: DualNum<f64> + Copy>(&self, state: &StateHD<D>) -> D {
        // temperature dependent a parameter
        let p = &self.parameters;
        let x = &state.molefracs;
        let ak = (&p.tc.mapv(|tc| (D::one() - (state.temperature / tc).sqrt())) * &p.kappa + 1.0)
            .mapv(|x| x.powi(2))
            * &p.a;

        // Mixing rules
        let mut ak_mix = D::zero();
        for i in 0..ak.len() {
            for j in 0..ak.len() {
                ak_mix += (ak[i] * ak[j]).sqrt() * (x[i] * x[j] * (1.0 - p.k_ij[(i, j)]));
            }
        }
        let b = (x * &p.b).sum();

        // Helmholtz energy
        let n = state.moles.sum();
        let v = state.volume;
        n * ((v / (v - b * n)).ln()
            - ak_mix / (b * SQRT_2 * 2.0 * state.temperature)
                * ((v + b * n * (1.0 + SQRT_2)) / (v + b * n * (1.0 - SQRT_2))).ln())
    }
}

impl fmt::Display for PengRobinson {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Peng Robinson")
    }
}

impl Components for PengRobinson {
    fn components(&self) -> usize {
        self.parameters.b.len()
    }

    fn subset(&self, component_list: &[usize]) -> Self {
        Self::new(Arc::new(self.parameters.subset(component_list)))
    }
}

impl Residual for PengRobinson {
    fn compute_max_density(&self, moles: &Array1<f64>) -> f64 {
        let b = (moles * &self.parameters.b).sum() / moles.sum();
        0.9 / b
    }

    fn residual_helmholtz_energy_contributions<D: DualNum<f64> + Copy>(
        &self,
        state: &StateHD<D>,
    ) -> Vec<(String, D)> {
        vec![("Peng Robinson".to_string(), self.helmholtz_energy(state))]
    }

    fn critical_point_guess(&self, moles: &Array1<f64>) -> f64 {
        (moles * &self.parameters.tc).sum() / moles.sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::{BinaryRecord, IdentifierOption};
    use crate::state::{Contributions, State};
    use crate::{EosResult, PhaseEquilibrium, SolverOptions, Verbosity};
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
    fn peng_robinson() -> EosResult<()> {
        let mixture = pure_record_vec();
        let propane = mixture[0].clone();
        let tc = propane.model_record.tc;
        let pc = propane.model_record.pc;
        let parameters = PengRobinsonParameters::from_records(vec![propane], None)?;
        let pr = Arc::new(PengRobinson::new(Arc::new(parameters)));
        let options = SolverOptions::new().verbosity(Verbosity::Iter);
        let cp = State::critical_point(&pr, None, None, options)?;
        assert_relative_eq!(cp.temperature, tc, max_relative = 1e-4);
        assert_relative_eq!(
            cp.pressure(Contributions::Total) * KB_A3,
            pc,
            max_relative = 1e-4
        );
        Ok(())
    }

    #[test]
    fn critical_temperature_literature() -> EosResult<()> {
        // experimental critical temperature of propane: 369.8 K
        let propane = pure_record_vec().remove(0);
        let parameters = PengRobinsonParameters::new_pure(propane)?;
        let pr = Arc::new(PengRobinson::new(Arc::new(parameters)));
        let cp = State::critical_point(&pr, None, None, Default::default())?;
        assert!((cp.temperature - 369.8).abs() / 369.8 < 0.01);
        assert!(cp.dp_dv(Contributions::Total).abs() * cp.volume / cp.pressure(Contributions::Total) < 1e-6);
        Ok(())
    }

    #[test]
    fn vapor_pressure_propane() -> EosResult<()> {
        let propane = pure_record_vec().remove(0);
        let parameters = PengRobinsonParameters::new_pure(propane)?;
        let pr = Arc::new(PengRobinson::new(Arc::new(parameters)));
        let vle = PhaseEquilibrium::pure(&pr, 300.0, None, Default::default())?;
        let p = vle.vapor().pressure(Contributions::Total) * KB_A3;
        // experimental vapor pressure of propane at 300 K: 9.98 bar
        assert_relative_eq!(p, 9.98e5, max_relative = 0.03);
        assert_relative_eq!(
            vle.vapor().pressure(Contributions::Total),
            vle.liquid().pressure(Contributions::Total),
            max_relative = 1e-10
        );
        assert_relative_eq!(
            vle.vapor().chemical_potential(Contributions::Total)[0],
            vle.liquid().chemical_potential(Contributions::Total)[0],
            max_relative = 1e-10
        );
        Ok(())
    }

    #[test]
    fn binary_parameters() -> EosResult<()> {
        let records = pure_record_vec();
        let binary = vec![BinaryRecord::new(
            records[0].identifier.clone(),
            records[1].identifier.clone(),
            0.03,
        )];
        let k_ij = PengRobinsonParameters::binary_matrix_from_records(
            &records,
            &binary,
            IdentifierOption::Cas,
        )?;
        let parameters = PengRobinsonParameters::from_records(records, k_ij)?;
        assert_eq!(parameters.records().1.map(|k| k[(1, 0)]), Some(0.03));

        let butane = PengRobinson::new(Arc::new(parameters)).subset(&[1]);
        assert_eq!(butane.components(), 1);
        assert_relative_eq!(butane.critical_point_guess(&arr1(&[1.0])), 425.2);
        Ok(())
    }
}
