use crate::hard_sphere::{HardSphereProperties, MonomerShape};
use ndarray::{Array, Array1, Array2};
use num_dual::DualNum;
use phasekit_core::parameter::{Parameter, ParameterError, PureRecord};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// PeTS parameter set.
///
/// Information for a pure substance.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct PetsRecord {
    /// Segment diameter in units of Angstrom
    pub sigma: f64,
    /// Energetic parameter in units of Kelvin
    pub epsilon_k: f64,
}

impl std::fmt::Display for PetsRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "PetsRecord(sigma={}, epsilon_k={})",
            self.sigma, self.epsilon_k
        )
    }
}

impl PetsRecord {
    pub fn new(sigma: f64, epsilon_k: f64) -> PetsRecord {
        PetsRecord { sigma, epsilon_k }
    }
}

/// Binary interaction parameter $k_{ij}$ of the dispersion energy.
#[derive(Serialize, Deserialize, Clone, Copy, Default, Debug)]
pub struct PetsBinaryRecord {
    k_ij: f64,
}

impl From<f64> for PetsBinaryRecord {
    fn from(k_ij: f64) -> Self {
        Self { k_ij }
    }
}

impl From<PetsBinaryRecord> for f64 {
    fn from(binary_record: PetsBinaryRecord) -> Self {
        binary_record.k_ij
    }
}

/// Parameters of the PeTS equation of state and Helmholtz energy functional.
///
/// Combining rules: $\sigma_{ij}=\frac{1}{2}\left(\sigma_i+\sigma_j\right)$ and
/// $\varepsilon_{ij}=\left(1-k_{ij}\right)\sqrt{\varepsilon_i\varepsilon_j}$.
#[derive(Debug, Clone)]
pub struct PetsParameters {
    pub molarweight: Array1<f64>,
    pub sigma: Array1<f64>,
    pub epsilon_k: Array1<f64>,
    pub k_ij: Array2<f64>,
    pub sigma_ij: Array2<f64>,
    pub epsilon_k_ij: Array2<f64>,
    pub pure_records: Vec<PureRecord<PetsRecord>>,
    pub binary_records: Option<Array2<PetsBinaryRecord>>,
}

impl Parameter for PetsParameters {
    type Pure = PetsRecord;
    type Binary = PetsBinaryRecord;

    fn from_records(
        pure_records: Vec<PureRecord<Self::Pure>>,
        binary_records: Option<Array2<PetsBinaryRecord>>,
    ) -> Result<Self, ParameterError> {
        let n = pure_records.len();
        if let Some(i) = pure_records.iter().position(|r| {
            !(r.model_record.sigma > 0.0 && r.model_record.epsilon_k > 0.0)
        }) {
            return Err(ParameterError::IncompatibleParameters(format!(
                "sigma and epsilon_k of component {i} have to be positive."
            )));
        }
        let k_ij = match &binary_records {
            Some(br) if br.shape() != [n, n] => {
                return Err(ParameterError::IncompatibleParameters(format!(
                    "binary interaction parameters have to be a {n}x{n} matrix."
                )))
            }
            Some(br) => br.mapv(f64::from),
            None => Array2::zeros((n, n)),
        };
        Ok(Self::build(pure_records, k_ij, binary_records))
    }

    fn records(&self) -> (&[PureRecord<PetsRecord>], Option<&Array2<PetsBinaryRecord>>) {
        (&self.pure_records, self.binary_records.as_ref())
    }

    fn subset(&self, component_list: &[usize]) -> Self {
        let pure_records = component_list
            .iter()
            .map(|&i| self.pure_records[i].clone())
            .collect();
        let k_ij = Array2::from_shape_fn((component_list.len(), component_list.len()), |(i, j)| {
            self.k_ij[[component_list[i], component_list[j]]]
        });
        let binary_records = self.binary_records.as_ref().map(|br| {
            br.select(ndarray::Axis(0), component_list)
                .select(ndarray::Axis(1), component_list)
        });
        Self::build(pure_records, k_ij, binary_records)
    }
}

impl PetsParameters {
    fn build(
        pure_records: Vec<PureRecord<PetsRecord>>,
        k_ij: Array2<f64>,
        binary_records: Option<Array2<PetsBinaryRecord>>,
    ) -> Self {
        let n = pure_records.len();
        let mut molarweight = Array::zeros(n);
        let mut sigma = Array::zeros(n);
        let mut epsilon_k = Array::zeros(n);
        for (i, record) in pure_records.iter().enumerate() {
            sigma[i] = record.model_record.sigma;
            epsilon_k[i] = record.model_record.epsilon_k;
            molarweight[i] = record.molarweight;
        }
        let epsilon_k_ij = Array2::from_shape_fn((n, n), |(i, j)| {
            (1.0 - k_ij[[i, j]]) * (epsilon_k[i] * epsilon_k[j]).sqrt()
        });
        let sigma_ij = Array2::from_shape_fn((n, n), |(i, j)| 0.5 * (sigma[i] + sigma[j]));
        Self {
            molarweight,
            sigma,
            epsilon_k,
            k_ij,
            sigma_ij,
            epsilon_k_ij,
            pure_records,
            binary_records,
        }
    }
}

impl HardSphereProperties for PetsParameters {
    fn monomer_shape(&self) -> MonomerShape<'_> {
        MonomerShape::Spherical(self.sigma.len())
    }

    fn hs_diameter<D: DualNum<f64> + Copy>(&self, temperature: D) -> Array1<D> {
        let ti = temperature.recip() * -3.052785558;
        Array::from_shape_fn(self.sigma.len(), |i| {
            -((ti * self.epsilon_k[i]).exp() * 0.127112544 - 1.0) * self.sigma[i]
        })
    }
}

impl PetsParameters {
    pub fn to_markdown(&self) -> String {
        let mut output = String::from("|component|molarweight|$\\sigma$|$\\varepsilon$|\n|-|-|-|-|");
        for (i, record) in self.pure_records.iter().enumerate() {
            let component = record
                .identifier
                .name
                .clone()
                .unwrap_or_else(|| format!("Component {}", i + 1));
            let _ = write!(
                output,
                "\n|{}|{}|{}|{}|",
                component, self.molarweight[i], self.sigma[i], self.epsilon_k[i],
            );
        }
        output
    }
}

impl std::fmt::Display for PetsParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PetsParameters(")?;
        write!(f, "\n\tmolarweight={}", self.molarweight)?;
        write!(f, "\n\tsigma={}", self.sigma)?;
        write!(f, "\n\tepsilon_k={}", self.epsilon_k)?;
        if self.k_ij.iter().any(|&k| k != 0.0) {
            write!(f, "\n\tk_ij=\n{}", self.k_ij)?;
        }
        write!(f, "\n)")
    }
}

#[cfg(test)]
pub mod utils {
    use super::*;
    use phasekit_core::parameter::{BinaryRecord, Identifier, IdentifierOption};

    const RECORDS: &str = r#"[
        {
            "identifier": {
                "cas": "7440-37-1",
                "name": "argon",
                "formula": "Ar"
            },
            "model_record": {
                "sigma": 3.4050,
                "epsilon_k": 119.8
            },
            "molarweight": 39.948
        },
        {
            "identifier": {
                "cas": "7439-90-9",
                "name": "krypton",
                "formula": "Kr"
            },
            "model_record": {
                "sigma": 3.6300,
                "epsilon_k": 163.10
            },
            "molarweight": 83.798
        }
    ]"#;

    fn parameters(substances: &[&str]) -> PetsParameters {
        PetsParameters::from_json_str(substances, RECORDS, None, IdentifierOption::Name)
            .expect("invalid test records")
    }

    pub fn argon_parameters() -> PetsParameters {
        parameters(&["argon"])
    }

    pub fn krypton_parameters() -> PetsParameters {
        parameters(&["krypton"])
    }

    pub fn argon_krypton_parameters() -> PetsParameters {
        parameters(&["argon", "krypton"])
    }

    #[test]
    fn combining_rules() {
        let p = argon_krypton_parameters();
        assert_eq!(p.sigma_ij[[0, 1]], 0.5 * (3.405 + 3.63));
        assert_eq!(p.epsilon_k_ij[[1, 0]], (119.8f64 * 163.1).sqrt());
        assert_eq!(p.to_markdown().lines().count(), 4);
    }

    #[test]
    fn binary_records_are_matched_by_identifier() {
        let binary = r#"[{"id1": {"name": "krypton"}, "id2": {"name": "argon"}, "model_record": {"k_ij": 0.1}}]"#;
        let p = PetsParameters::from_json_str(
            &["argon", "krypton"],
            RECORDS,
            Some(binary),
            IdentifierOption::Name,
        )
        .expect("invalid test records");
        assert_eq!(p.k_ij[[0, 1]], 0.1);
        assert_eq!(p.k_ij[[1, 0]], 0.1);
        assert_eq!(p.k_ij[[0, 0]], 0.0);

        let subset = p.subset(&[1]);
        assert_eq!(subset.sigma[0], 3.63);
        assert_eq!(subset.k_ij.shape(), &[1, 1]);

        let record = BinaryRecord::new(
            Identifier::from_name("argon"),
            Identifier::from_name("krypton"),
            PetsBinaryRecord::from(0.2),
        );
        let matrix = PetsParameters::binary_matrix_from_records(
            &p.pure_records,
            &[record],
            IdentifierOption::Name,
        )
        .expect("identifiers are available");
        assert_eq!(matrix.map(|m| f64::from(m[[1, 0]])), Some(0.2));
    }
}
