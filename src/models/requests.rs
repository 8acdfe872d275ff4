use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};
use crate::models::domain::{AgeBracket, Gender, HouseholdType, UserProfile, Weather};

/// Neighborhood names must contain something besides whitespace
fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

/// Request body shared by the prediction and insight endpoints
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRequest {
    pub gender: Gender,
    pub age_bracket: AgeBracket,
    #[validate(custom(function = "not_blank"))]
    pub residence_area: String,
    #[validate(custom(function = "not_blank"))]
    pub workplace_area: String,
    pub household_type: HouseholdType,
    #[serde(default)]
    pub weather: Option<Weather>,
    #[serde(default)]
    #[validate(range(min = 1, max = 12))]
    pub month: Option<u8>,
}

impl From<ProfileRequest> for UserProfile {
    fn from(req: ProfileRequest) -> Self {
        UserProfile {
            gender: req.gender,
            age_bracket: req.age_bracket,
            residence_area: req.residence_area.trim().to_string(),
            workplace_area: req.workplace_area.trim().to_string(),
            household_type: req.household_type,
            weather: req.weather,
            month: req.month,
        }
    }
}

/// Request to score stores by residence and workplace
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StoreScoreRequest {
    #[validate(custom(function = "not_blank"))]
    pub residence_area: String,
    #[validate(custom(function = "not_blank"))]
    pub workplace_area: String,
}

/// Query string for the spending estimate endpoint
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SpendingQuery {
    #[validate(custom(function = "not_blank"))]
    pub residence_area: String,
}
