use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::core::encoder::{EncoderRegistry, UNKNOWN_CODE};
use crate::models::UserProfile;

/// Errors raised while assembling a model input vector
#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("feature columns {actual:?} do not match trained column order {expected:?}")]
    ConfigMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("no fitted encoder for column '{0}'")]
    UnfittedColumn(String),

    #[error("failed to read feature schema: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid feature schema: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Profile attribute a model column can be read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileField {
    Gender,
    AgeBracket,
    ResidenceArea,
    WorkplaceArea,
    HouseholdType,
    Weather,
    Month,
    Season,
}

impl ProfileField {
    /// Warehouse label for this attribute, `None` when an optional field is unset
    pub fn resolve(&self, profile: &UserProfile) -> Option<String> {
        match self {
            ProfileField::Gender => Some(profile.gender.label().to_string()),
            ProfileField::AgeBracket => Some(profile.age_bracket.label().to_string()),
            ProfileField::ResidenceArea => Some(profile.residence_area.clone()),
            ProfileField::WorkplaceArea => Some(profile.workplace_area.clone()),
            ProfileField::HouseholdType => Some(profile.household_type.label().to_string()),
            ProfileField::Weather => profile.weather.map(|w| w.label().to_string()),
            ProfileField::Month => profile.month.map(|m| m.to_string()),
            ProfileField::Season => profile.season().map(|s| s.label().to_string()),
        }
    }
}

/// Where a column's value comes from at prediction time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSource {
    /// Read from the submitted profile
    Field(ProfileField),
    /// Not collected by the form; a fixed value stands in
    Placeholder(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureColumn {
    /// Training column name, as understood by the history records
    pub name: String,
    pub source: FeatureSource,
    /// Used when an optional profile field is unset
    #[serde(default)]
    pub default: Option<String>,
}

impl FeatureColumn {
    pub fn field(name: &str, field: ProfileField) -> Self {
        Self {
            name: name.to_string(),
            source: FeatureSource::Field(field),
            default: None,
        }
    }

    pub fn placeholder(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            source: FeatureSource::Placeholder(value.to_string()),
            default: None,
        }
    }

    fn raw_value(&self, profile: &UserProfile) -> Option<String> {
        match &self.source {
            FeatureSource::Field(field) => field.resolve(profile).or_else(|| self.default.clone()),
            FeatureSource::Placeholder(value) => Some(value.clone()),
        }
    }
}

/// Ordered input columns for the store classifier and the spending regressor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub classifier: Vec<FeatureColumn>,
    pub regressor: Vec<FeatureColumn>,
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self {
            classifier: vec![
                FeatureColumn::placeholder("time_slot", "14-17"),
                FeatureColumn::placeholder("weekday", "weekday"),
                FeatureColumn::field("gender", ProfileField::Gender),
                FeatureColumn::field("age_group", ProfileField::AgeBracket),
                FeatureColumn::field("lifestyle", ProfileField::HouseholdType),
            ],
            regressor: vec![
                FeatureColumn::placeholder("card_type", "credit"),
                FeatureColumn::placeholder("weekday", "weekday"),
                FeatureColumn::field("gender", ProfileField::Gender),
                FeatureColumn::field("age_group", ProfileField::AgeBracket),
                FeatureColumn::field("lifestyle", ProfileField::HouseholdType),
                FeatureColumn::placeholder("time_slot", "14-17"),
            ],
        }
    }
}

impl FeatureSchema {
    /// Load a schema from a TOML file with `[[classifier]]` and `[[regressor]]` tables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, FeatureError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, FeatureError> {
        Ok(toml::from_str(text)?)
    }
}

/// Column names of a schema slice, in order
pub fn column_names(columns: &[FeatureColumn]) -> Vec<String> {
    columns.iter().map(|c| c.name.clone()).collect()
}

/// Turns a profile into the integer vector one model was trained on
#[derive(Debug, Clone, Copy)]
pub struct FeatureVectorBuilder<'a> {
    columns: &'a [FeatureColumn],
}

impl<'a> FeatureVectorBuilder<'a> {
    pub fn new(columns: &'a [FeatureColumn]) -> Self {
        Self { columns }
    }

    /// Encode `profile` column by column
    ///
    /// Values outside an encoder's fitted domain (and unset optional fields
    /// without a default) become [`UNKNOWN_CODE`] and are logged. A column
    /// layout that differs from `expected_columns` is a hard error.
    pub fn build(
        &self,
        profile: &UserProfile,
        expected_columns: &[String],
        encoders: &EncoderRegistry,
    ) -> Result<Vec<u32>, FeatureError> {
        let matches_layout = self.columns.len() == expected_columns.len()
            && self
                .columns
                .iter()
                .zip(expected_columns)
                .all(|(column, expected)| &column.name == expected);

        if !matches_layout {
            return Err(FeatureError::ConfigMismatch {
                expected: expected_columns.to_vec(),
                actual: column_names(self.columns),
            });
        }

        let mut vector = Vec::with_capacity(self.columns.len());
        for column in self.columns {
            let encoder = encoders
                .get(&column.name)
                .ok_or_else(|| FeatureError::UnfittedColumn(column.name.clone()))?;

            let code = match column.raw_value(profile) {
                Some(value) => match encoder.encode(&value) {
                    Ok(code) => code,
                    Err(unknown) => {
                        tracing::warn!(
                            column = %unknown.column,
                            value = %unknown.value,
                            "Unknown category, substituting default code"
                        );
                        UNKNOWN_CODE
                    }
                },
                None => {
                    tracing::warn!(column = %column.name, "Missing profile value, substituting default code");
                    UNKNOWN_CODE
                }
            };
            vector.push(code);
        }

        Ok(vector)
    }
}
