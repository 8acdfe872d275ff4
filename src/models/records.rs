use serde::{Deserialize, Serialize};

/// One historical department-store visit (warehouse `DEP_STORE_DATA`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitRecord {
    pub store: String,
    pub age_group: String,
    pub gender: String,
    pub time_slot: String,
    pub weekday: String,
    pub lifestyle: String,
}

impl VisitRecord {
    /// Value of a named training column, if the record carries it
    pub fn attribute(&self, column: &str) -> Option<&str> {
        match column {
            "age_group" => Some(&self.age_group),
            "gender" => Some(&self.gender),
            "time_slot" => Some(&self.time_slot),
            "weekday" => Some(&self.weekday),
            "lifestyle" => Some(&self.lifestyle),
            _ => None,
        }
    }
}

/// One historical card transaction aggregate (warehouse `SALES_KOR_LABELING`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub district: String,
    pub card_type: String,
    pub age_group: String,
    pub gender: String,
    pub time_slot: String,
    pub weekday: String,
    pub lifestyle: String,
    /// Department-store sales amount; may be null or non-finite in the source
    pub sales_amount: Option<f64>,
}

impl TransactionRecord {
    pub fn attribute(&self, column: &str) -> Option<&str> {
        match column {
            "card_type" => Some(&self.card_type),
            "age_group" => Some(&self.age_group),
            "gender" => Some(&self.gender),
            "time_slot" => Some(&self.time_slot),
            "weekday" => Some(&self.weekday),
            "lifestyle" => Some(&self.lifestyle),
            _ => None,
        }
    }
}

/// Share of a store's visits attributed to one neighborhood in one role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRatio {
    /// Raw store name as stored in the warehouse
    pub store: String,
    pub ratio: f64,
}

/// Raw `AVG_DEPARTMENT_STORE_SALES` cell for a neighborhood, as text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AverageSpendingRow {
    pub value: Option<String>,
}
