//! Structures and traits that can be used to build model parameters for equations of state.
use indexmap::IndexMap;
use ndarray::Array2;
use serde::de::DeserializeOwned;
use thiserror::Error;

mod identifier;
mod model_record;

pub use identifier::{Identifier, IdentifierOption};
pub use model_record::{BinaryRecord, PureRecord};

/// Constructor methods for parameters.
///
/// By implementing `Parameter` for a type, you define how parameters
/// of an equation of state can be constructed from a sequence of
/// single substance records and possibly binary interaction parameters.
pub trait Parameter
where
    Self: Sized,
{
    type Pure: Clone + DeserializeOwned;
    type Binary: Clone + DeserializeOwned + Default;

    /// Creates parameters from records for pure substances and possibly binary parameters.
    fn from_records(
        pure_records: Vec<PureRecord<Self::Pure>>,
        binary_records: Option<Array2<Self::Binary>>,
    ) -> Result<Self, ParameterError>;

    /// Creates parameters for a pure component from a pure record.
    fn new_pure(pure_record: PureRecord<Self::Pure>) -> Result<Self, ParameterError> {
        Self::from_records(vec![pure_record], None)
    }

    /// Creates parameters for a binary system from pure records and an optional
    /// binary interaction parameter.
    fn new_binary(
        pure_records: Vec<PureRecord<Self::Pure>>,
        binary_record: Option<Self::Binary>,
    ) -> Result<Self, ParameterError> {
        let binary_record = binary_record.map(|br| {
            Array2::from_shape_fn([2, 2], |(i, j)| {
                if i == j {
                    Self::Binary::default()
                } else {
                    br.clone()
                }
            })
        });
        Self::from_records(pure_records, binary_record)
    }

    /// Creates parameters from model records with default values for the molar weight,
    /// identifiers, and binary interaction parameters.
    fn from_model_records(model_records: Vec<Self::Pure>) -> Result<Self, ParameterError> {
        let pure_records = model_records
            .into_iter()
            .map(|r| PureRecord::new(Default::default(), Default::default(), r))
            .collect();
        Self::from_records(pure_records, None)
    }

    /// Return the original pure and binary records that were used to construct the parameters.
    #[allow(clippy::type_complexity)]
    fn records(&self) -> (&[PureRecord<Self::Pure>], Option<&Array2<Self::Binary>>);

    /// Helper function to build matrix from list of records in correct order.
    ///
    /// If the identifiers in `binary_records` are not a subset of those in
    /// `pure_records`, the `Default` implementation of Self::Binary is used.
    fn binary_matrix_from_records(
        pure_records: &[PureRecord<Self::Pure>],
        binary_records: &[BinaryRecord<Identifier, Self::Binary>],
        identifier_option: IdentifierOption,
    ) -> Result<Option<Array2<Self::Binary>>, ParameterError> {
        if binary_records.is_empty() {
            return Ok(None);
        }

        // Build Hashmap (id, id) -> BinaryRecord
        let binary_map: IndexMap<(String, String), Self::Binary> = binary_records
            .iter()
            .filter_map(|br| {
                let id1 = br.id1.get(identifier_option)?;
                let id2 = br.id2.get(identifier_option)?;
                Some(((id1.to_owned(), id2.to_owned()), br.model_record.clone()))
            })
            .collect();

        let ids = pure_records
            .iter()
            .enumerate()
            .map(|(i, pr)| {
                pr.identifier.get(identifier_option).ok_or_else(|| {
                    ParameterError::IncompatibleParameters(format!(
                        "No identifier for given identifier_option for pure record {}.",
                        i
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let n = pure_records.len();
        let key = |a: &str, b: &str| (a.to_owned(), b.to_owned());
        Ok(Some(Array2::from_shape_fn([n, n], |(i, j)| {
            binary_map
                .get(&key(ids[i], ids[j]))
                .or_else(|| binary_map.get(&key(ids[j], ids[i])))
                .cloned()
                .unwrap_or_default()
        })))
    }

    /// Creates parameters from substance information stored in json strings.
    fn from_json_str(
        substances: &[&str],
        pure_json: &str,
        binary_json: Option<&str>,
        identifier_option: IdentifierOption,
    ) -> Result<Self, ParameterError> {
        let records = PureRecord::from_json_str(substances, pure_json, identifier_option)?;
        let binary_records: Vec<BinaryRecord<Identifier, Self::Binary>> = match binary_json {
            Some(json) => serde_json::from_str(json)?,
            None => Vec::new(),
        };
        let record_matrix =
            Self::binary_matrix_from_records(&records, &binary_records, identifier_option)?;
        Self::from_records(records, record_matrix)
    }

    /// Return a parameter set containing the subset of components specified in `component_list`.
    fn subset(&self, component_list: &[usize]) -> Self;
}

/// Error type for incomplete parameter information and IO problems.
#[derive(Error, Debug)]
pub enum ParameterError {
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    #[error("The following component(s) were not found: {0}")]
    ComponentsNotFound(String),
    #[error("The identifier '{0}' is not known. ['cas', 'name', 'formula']")]
    IdentifierNotFound(String),
    #[error("Information missing.")]
    InsufficientInformation,
    #[error("Incompatible parameters: {0}")]
    IncompatibleParameters(String),
}
