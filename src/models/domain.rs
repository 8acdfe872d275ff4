use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Customer gender as collected by the input form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn label(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

/// Age bracket, matching the warehouse `AGE_GROUP` buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgeBracket {
    #[serde(rename = "20s")]
    Twenties,
    #[serde(rename = "30s")]
    Thirties,
    #[serde(rename = "40s")]
    Forties,
    #[serde(rename = "50s+")]
    FiftiesPlus,
}

impl AgeBracket {
    pub fn label(&self) -> &'static str {
        match self {
            AgeBracket::Twenties => "20s",
            AgeBracket::Thirties => "30s",
            AgeBracket::Forties => "40s",
            AgeBracket::FiftiesPlus => "50s+",
        }
    }
}

/// Household composition; the warehouse calls this column `LIFESTYLE`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HouseholdType {
    Single,
    Newlywed,
    InfantFamily,
    TeenFamily,
    AdultChildFamily,
    Senior,
}

impl HouseholdType {
    pub fn label(&self) -> &'static str {
        match self {
            HouseholdType::Single => "single",
            HouseholdType::Newlywed => "newlywed",
            HouseholdType::InfantFamily => "infant_family",
            HouseholdType::TeenFamily => "teen_family",
            HouseholdType::AdultChildFamily => "adult_child_family",
            HouseholdType::Senior => "senior",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weather {
    Clear,
    Cloudy,
    Rain,
    Snow,
}

impl Weather {
    pub fn label(&self) -> &'static str {
        match self {
            Weather::Clear => "clear",
            Weather::Cloudy => "cloudy",
            Weather::Rain => "rain",
            Weather::Snow => "snow",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Autumn,
}

impl Season {
    /// Season for a month of the year (1-12). Out-of-range months have no season.
    pub fn from_month(month: u8) -> Option<Self> {
        match month {
            12 | 1 | 2 => Some(Season::Winter),
            3..=5 => Some(Season::Spring),
            6..=8 => Some(Season::Summer),
            9..=11 => Some(Season::Autumn),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Season::Winter => "winter",
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Autumn => "autumn",
        }
    }
}

/// Prospective customer described by the input form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub gender: Gender,
    pub age_bracket: AgeBracket,
    pub residence_area: String,
    pub workplace_area: String,
    pub household_type: HouseholdType,
    #[serde(default)]
    pub weather: Option<Weather>,
    #[serde(default)]
    pub month: Option<u8>,
}

impl UserProfile {
    pub fn season(&self) -> Option<Season> {
        self.month.and_then(Season::from_month)
    }
}

/// Store-choice probabilities and expected spending for one profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    /// Keyed by store display name; iteration order is class-label order
    pub store_probabilities: BTreeMap<String, f64>,
    pub spending: u64,
}

impl PredictionResult {
    /// Result returned whenever the predictor is not ready
    pub fn unavailable() -> Self {
        Self {
            store_probabilities: BTreeMap::new(),
            spending: 0,
        }
    }

    pub fn is_available(&self) -> bool {
        !self.store_probabilities.is_empty()
    }

    /// Store with the highest probability. Ties go to the first store in class-label order.
    pub fn top_store(&self) -> Option<(&str, f64)> {
        let mut best: Option<(&str, f64)> = None;
        for (store, &probability) in &self.store_probabilities {
            match best {
                Some((_, current)) if probability <= current => {}
                _ => best = Some((store.as_str(), probability)),
            }
        }
        best
    }

    /// Up to `limit` stores ordered by descending probability
    pub fn ranked(&self, limit: usize) -> Vec<StoreProbability> {
        let mut ranked: Vec<StoreProbability> = self
            .store_probabilities
            .iter()
            .map(|(store, &probability)| StoreProbability {
                store: store.clone(),
                probability,
            })
            .collect();

        // Stable sort keeps class-label order among equal probabilities
        ranked.sort_by(|a, b| {
            b.probability
                .partial_cmp(&a.probability)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.truncate(limit);
        ranked
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreProbability {
    pub store: String,
    pub probability: f64,
}

/// Location-based preference score for one store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreScoreRow {
    pub store: String,
    pub score: f64,
}

/// Which neighborhood role a visit ratio was measured for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationRole {
    Residence,
    Workplace,
}

impl LocationRole {
    /// `LOC_TYPE` code used by the ratio table
    pub fn code(&self) -> i32 {
        match self {
            LocationRole::Residence => 1,
            LocationRole::Workplace => 2,
        }
    }
}

/// Spending tier used to pick a marketing strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerTier {
    Premium,
    Gold,
    Standard,
}

/// Composite weights for the location preference score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationWeights {
    pub residence: f64,
    pub workplace: f64,
}

impl Default for LocationWeights {
    fn default() -> Self {
        Self {
            residence: 0.6,
            workplace: 0.4,
        }
    }
}
