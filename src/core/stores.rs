use std::collections::BTreeMap;

/// Maps raw warehouse store names to the names shown to users
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreDirectory {
    display_names: BTreeMap<String, String>,
}

impl StoreDirectory {
    pub fn new(display_names: BTreeMap<String, String>) -> Self {
        Self { display_names }
    }

    /// Display name for a raw store name; unmapped names pass through unchanged
    pub fn display_name(&self, raw: &str) -> String {
        self.display_names
            .get(raw)
            .cloned()
            .unwrap_or_else(|| raw.to_string())
    }

    /// Raw names known to the directory
    pub fn raw_names(&self) -> Vec<String> {
        self.display_names.keys().cloned().collect()
    }
}

impl<const N: usize> From<[(&str, &str); N]> for StoreDirectory {
    fn from(pairs: [(&str, &str); N]) -> Self {
        Self::new(
            pairs
                .into_iter()
                .map(|(raw, display)| (raw.to_string(), display.to_string()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_mapping() {
        let directory = StoreDirectory::from([("더현대서울", "Hyundai"), ("신세계_강남", "Shinsegae")]);
        assert_eq!(directory.display_name("더현대서울"), "Hyundai");
        assert_eq!(directory.display_name("Galleria"), "Galleria");
        assert_eq!(directory.raw_names(), vec!["더현대서울", "신세계_강남"]);
    }
}
