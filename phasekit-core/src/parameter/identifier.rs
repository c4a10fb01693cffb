use super::ParameterError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Field of an [Identifier] that is used to look up records.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierOption {
    Cas,
    Name,
    Formula,
}

impl FromStr for IdentifierOption {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cas" => Ok(Self::Cas),
            "name" => Ok(Self::Name),
            "formula" => Ok(Self::Formula),
            _ => Err(ParameterError::IdentifierNotFound(s.to_owned())),
        }
    }
}

/// Names of a substance in a parameter set.
///
/// Unknown keys in the serialized form are ignored.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Identifier {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cas: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
}

impl Identifier {
    /// # Examples
    ///
    /// ```
    /// # use phasekit_core::parameter::{Identifier, IdentifierOption};
    /// let argon = Identifier::new(Some("7440-37-1"), Some("argon"), Some("Ar"));
    /// assert_eq!(argon.get(IdentifierOption::Name), Some("argon"));
    /// ```
    pub fn new(cas: Option<&str>, name: Option<&str>, formula: Option<&str>) -> Self {
        Self {
            cas: cas.map(Into::into),
            name: name.map(Into::into),
            formula: formula.map(Into::into),
        }
    }

    /// Identifier from a name only.
    pub fn from_name(name: &str) -> Self {
        Self::new(None, Some(name), None)
    }

    pub fn get(&self, option: IdentifierOption) -> Option<&str> {
        match option {
            IdentifierOption::Cas => self.cas.as_deref(),
            IdentifierOption::Name => self.name.as_deref(),
            IdentifierOption::Formula => self.formula.as_deref(),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<_> = [
            ("cas", IdentifierOption::Cas),
            ("name", IdentifierOption::Name),
            ("formula", IdentifierOption::Formula),
        ]
        .into_iter()
        .filter_map(|(key, option)| self.get(option).map(|id| format!("{key}={id}")))
        .collect();
        write!(f, "Identifier({})", ids.join(", "))
    }
}
