use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

use crate::models::{AverageSpendingRow, LocationRatio, LocationRole, TransactionRecord, VisitRecord};
use crate::services::warehouse::{Warehouse, WarehouseError};

const AGE_GROUPS: &[&str] = &["20s", "30s", "40s", "50s+"];
const GENDERS: &[&str] = &["male", "female"];
const TIME_SLOTS: &[&str] = &["09-11", "11-14", "14-17", "17-21"];
const WEEKDAY_FLAGS: &[&str] = &["weekday", "weekend"];
const LIFESTYLES: &[&str] = &[
    "single",
    "newlywed",
    "infant_family",
    "teen_family",
    "adult_child_family",
    "senior",
];
const CARD_TYPES: &[&str] = &["credit", "check"];

/// Warehouse held entirely in memory
///
/// Serves as the test double for every warehouse read and, filled by
/// [`InMemoryWarehouse::synthetic`], lets the service run without a database.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWarehouse {
    visits: Vec<VisitRecord>,
    transactions: Vec<TransactionRecord>,
    ratios: HashMap<(String, LocationRole), Vec<LocationRatio>>,
    spending: HashMap<String, Option<String>>,
    unreachable: bool,
}

impl InMemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// A warehouse whose every read fails, as if the connection were down
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    pub fn with_visits(mut self, visits: Vec<VisitRecord>) -> Self {
        self.visits = visits;
        self
    }

    pub fn with_transactions(mut self, transactions: Vec<TransactionRecord>) -> Self {
        self.transactions = transactions;
        self
    }

    pub fn with_ratio(mut self, area: &str, role: LocationRole, store: &str, ratio: f64) -> Self {
        self.ratios
            .entry((area.to_string(), role))
            .or_default()
            .push(LocationRatio {
                store: store.to_string(),
                ratio,
            });
        self
    }

    /// Register the raw spending cell for a neighborhood (`None` stores a null)
    pub fn with_average_spending(mut self, area: &str, value: Option<&str>) -> Self {
        self.spending
            .insert(area.to_string(), value.map(str::to_string));
        self
    }

    /// Random history over the given stores and districts, reproducible by `seed`
    ///
    /// Every district also gets residence and workplace ratios for every store
    /// and an average spending figure.
    pub fn synthetic(stores: &[String], districts: &[String], rows: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut warehouse = Self::new();

        if stores.is_empty() || districts.is_empty() {
            return warehouse;
        }

        warehouse.visits = (0..rows)
            .map(|_| VisitRecord {
                store: pick_owned(&mut rng, stores),
                age_group: pick(&mut rng, AGE_GROUPS),
                gender: pick(&mut rng, GENDERS),
                time_slot: pick(&mut rng, TIME_SLOTS),
                weekday: pick(&mut rng, WEEKDAY_FLAGS),
                lifestyle: pick(&mut rng, LIFESTYLES),
            })
            .collect();

        warehouse.transactions = (0..rows)
            .map(|_| TransactionRecord {
                district: pick_owned(&mut rng, districts),
                card_type: pick(&mut rng, CARD_TYPES),
                age_group: pick(&mut rng, AGE_GROUPS),
                gender: pick(&mut rng, GENDERS),
                time_slot: pick(&mut rng, TIME_SLOTS),
                weekday: pick(&mut rng, WEEKDAY_FLAGS),
                lifestyle: pick(&mut rng, LIFESTYLES),
                sales_amount: Some(rng.gen_range(10_000.0..1_000_000.0)),
            })
            .collect();

        for district in districts {
            for role in [LocationRole::Residence, LocationRole::Workplace] {
                let weights: Vec<f64> = stores.iter().map(|_| rng.gen_range(0.05..1.0)).collect();
                let total: f64 = weights.iter().sum();
                for (store, weight) in stores.iter().zip(weights) {
                    warehouse = warehouse.with_ratio(district, role, store, weight / total);
                }
            }
            let average = rng.gen_range(50_000..600_000).to_string();
            warehouse = warehouse.with_average_spending(district, Some(&average));
        }

        warehouse
    }
}

fn pick(rng: &mut StdRng, values: &[&str]) -> String {
    values.choose(rng).map(|v| v.to_string()).unwrap_or_default()
}

fn pick_owned(rng: &mut StdRng, values: &[String]) -> String {
    values.choose(rng).cloned().unwrap_or_default()
}

impl InMemoryWarehouse {
    fn check_reachable(&self) -> Result<(), WarehouseError> {
        if self.unreachable {
            Err(WarehouseError::Unavailable("in-memory warehouse marked unreachable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Warehouse for InMemoryWarehouse {
    async fn fetch_visit_records(&self, stores: &[String]) -> Result<Vec<VisitRecord>, WarehouseError> {
        self.check_reachable()?;
        Ok(self
            .visits
            .iter()
            .filter(|v| stores.contains(&v.store))
            .cloned()
            .collect())
    }

    async fn fetch_transaction_records(
        &self,
        districts: &[String],
    ) -> Result<Vec<TransactionRecord>, WarehouseError> {
        self.check_reachable()?;
        Ok(self
            .transactions
            .iter()
            .filter(|t| districts.contains(&t.district))
            .cloned()
            .collect())
    }

    async fn fetch_location_ratios(
        &self,
        area: &str,
        role: LocationRole,
    ) -> Result<Vec<LocationRatio>, WarehouseError> {
        self.check_reachable()?;
        Ok(self
            .ratios
            .get(&(area.to_string(), role))
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_average_spending(
        &self,
        area: &str,
    ) -> Result<Option<AverageSpendingRow>, WarehouseError> {
        self.check_reachable()?;
        Ok(self
            .spending
            .get(area)
            .map(|value| AverageSpendingRow { value: value.clone() }))
    }

    async fn health_check(&self) -> Result<bool, WarehouseError> {
        Ok(!self.unreachable)
    }
}
