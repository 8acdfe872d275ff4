use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

/// Code substituted for a value that was never seen at fit time
pub const UNKNOWN_CODE: u32 = 0;

/// A value outside the domain an encoder was fitted on
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown category '{value}' for column '{column}'")]
pub struct UnknownCategory {
    pub column: String,
    pub value: String,
}

/// Maps the observed values of one categorical column to dense codes `[0, k)`
///
/// Codes follow sorted value order, so refitting on the same data always
/// yields the same mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelEncoder {
    column: String,
    classes: Vec<String>,
    index: HashMap<String, u32>,
}

impl LabelEncoder {
    pub fn fit<I, S>(column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let classes: Vec<String> = values
            .into_iter()
            .map(|v| v.as_ref().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let index = classes
            .iter()
            .enumerate()
            .map(|(code, value)| (value.clone(), code as u32))
            .collect();

        Self {
            column: column.to_string(),
            classes,
            index,
        }
    }

    pub fn encode(&self, value: &str) -> Result<u32, UnknownCategory> {
        self.index.get(value).copied().ok_or_else(|| UnknownCategory {
            column: self.column.clone(),
            value: value.to_string(),
        })
    }

    pub fn decode(&self, code: u32) -> Option<&str> {
        self.classes.get(code as usize).map(String::as_str)
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// Encoders for every categorical input column of one model
#[derive(Debug, Clone, Default)]
pub struct EncoderRegistry {
    encoders: HashMap<String, LabelEncoder>,
}

impl EncoderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit and register the encoder for `column`, replacing any previous one
    pub fn fit<I, S>(&mut self, column: &str, values: I) -> &LabelEncoder
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let encoder = LabelEncoder::fit(column, values);
        self.encoders.insert(column.to_string(), encoder);
        &self.encoders[column]
    }

    pub fn get(&self, column: &str) -> Option<&LabelEncoder> {
        self.encoders.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.encoders.contains_key(column)
    }

    pub fn len(&self) -> usize {
        self.encoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encoders.is_empty()
    }
}
