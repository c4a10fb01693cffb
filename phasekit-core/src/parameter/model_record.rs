use super::{Identifier, IdentifierOption, ParameterError};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Model parameters of a single substance together with its identifier.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PureRecord<M> {
    pub identifier: Identifier,
    /// Molar weight in g/mol (0 if unknown).
    #[serde(default)]
    pub molarweight: f64,
    pub model_record: M,
}

impl<M> PureRecord<M> {
    pub fn new(identifier: Identifier, molarweight: f64, model_record: M) -> Self {
        Self {
            identifier,
            molarweight,
            model_record,
        }
    }

    /// Parse a json list of records and pick `substances` from it, in that order.
    ///
    /// If a substance occurs more than once in the list, the first record wins.
    pub fn from_json_str(
        substances: &[&str],
        json: &str,
        identifier_option: IdentifierOption,
    ) -> Result<Vec<Self>, ParameterError>
    where
        M: DeserializeOwned,
    {
        let mut selected: IndexMap<&str, Option<Self>> =
            substances.iter().map(|&s| (s, None)).collect();
        if selected.len() < substances.len() {
            return Err(ParameterError::IncompatibleParameters(
                "A substance was requested more than once.".into(),
            ));
        }

        for record in serde_json::from_str::<Vec<Self>>(json)? {
            let slot = record
                .identifier
                .get(identifier_option)
                .and_then(|id| selected.get_mut(id));
            if let Some(slot) = slot {
                slot.get_or_insert(record);
            }
        }

        let missing: Vec<_> = selected
            .iter()
            .filter_map(|(&id, record)| record.is_none().then_some(id))
            .collect();
        if !missing.is_empty() {
            return Err(ParameterError::ComponentsNotFound(missing.join(", ")));
        }
        Ok(selected.into_values().flatten().collect())
    }
}

impl<M: fmt::Display> fmt::Display for PureRecord<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PureRecord({}, molarweight={}, {})",
            self.identifier, self.molarweight, self.model_record
        )
    }
}

/// Interaction parameters of a pair of substances.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BinaryRecord<I, B> {
    pub id1: I,
    pub id2: I,
    pub model_record: B,
}

impl<I, B> BinaryRecord<I, B> {
    pub fn new(id1: I, id2: I, model_record: B) -> Self {
        Self {
            id1,
            id2,
            model_record,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize, Debug, Clone)]
    struct Segment {
        a: f64,
    }

    impl fmt::Display for Segment {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "a={}", self.a)
        }
    }

    const RECORDS: &str = r#"[
        {"identifier": {"cas": "1", "name": "first"}, "model_record": {"a": 1.0}},
        {"identifier": {"cas": "2"}, "molarweight": 16.0426, "model_record": {"a": 2.0}},
        {"identifier": {"cas": "2"}, "model_record": {"a": 3.0}}
    ]"#;

    #[test]
    fn records_are_selected_in_the_requested_order() -> Result<(), ParameterError> {
        let records = PureRecord::<Segment>::from_json_str(&["2", "1"], RECORDS, IdentifierOption::Cas)?;
        assert_eq!(records[0].model_record.a, 2.0);
        assert_eq!(records[0].molarweight, 16.0426);
        assert_eq!(records[1].molarweight, 0.0);
        assert_eq!(
            records[1].to_string(),
            "PureRecord(Identifier(cas=1, name=first), molarweight=0, a=1)"
        );
        Ok(())
    }

    #[test]
    fn missing_records() {
        let records =
            PureRecord::<Segment>::from_json_str(&["first", "3"], RECORDS, IdentifierOption::Name);
        assert!(matches!(records, Err(ParameterError::ComponentsNotFound(id)) if id == "3"));
    }
}
