// src/schema/registry.rs

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaKeyword {
    pub keyword: String,
    /// Canonical area id written to the persisted files.
    pub area: String,
}

/// Keywords used to recognise columns in a publisher table.
///
/// Shipped in the settings file so that wording changes on the publisher
/// side are fixed by editing config, not code. `version` is logged with
/// every detection so a run can be traced back to the registry it used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRegistry {
    pub version: String,
    pub date: Vec<String>,
    pub period: Vec<String>,
    pub areas: Vec<AreaKeyword>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role<'a> {
    Date,
    Period,
    Area(&'a str),
}

impl KeywordRegistry {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.date.is_empty() || self.period.is_empty() || self.areas.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "registry {} needs date, period and area keywords",
                self.version
            )));
        }

        let mut owners: HashMap<&str, Role> = HashMap::new();
        let entries = self
            .date
            .iter()
            .map(|k| (k.as_str(), Role::Date))
            .chain(self.period.iter().map(|k| (k.as_str(), Role::Period)))
            .chain(
                self.areas
                    .iter()
                    .map(|a| (a.keyword.as_str(), Role::Area(a.area.as_str()))),
            );

        for (keyword, role) in entries {
            if keyword.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "registry {} contains an empty keyword",
                    self.version
                )));
            }
            if let Role::Area(area) = role {
                if area.trim().is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "keyword `{}` maps to an empty area id",
                        keyword
                    )));
                }
            }
            match owners.insert(keyword, role) {
                Some(prev) if prev != role => {
                    return Err(ConfigError::Invalid(format!(
                        "keyword `{}` is registered for both {:?} and {:?}",
                        keyword, prev, role
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}
