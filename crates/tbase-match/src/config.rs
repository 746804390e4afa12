use serde::{Deserialize, Serialize};

use tbase_plan::{is_valid_identifier, DemographicColumns, JoinType, PlanOptions};

use crate::errors::ConfigError;

/// Settings passed explicitly to the matching engine and batch runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Entity key column; the default join column of every table spec.
    pub key_column: String,
    pub join_type: JoinType,
    pub demographic_columns: DemographicColumns,
    pub csv_columns: CsvColumns,
    pub weights: NameWeights,
    /// Default acceptance threshold for demographic searches.
    pub threshold: f64,
    /// A name column counts as matched when its similarity exceeds this.
    pub field_threshold: f64,
    /// Filter the date of birth in SQL rather than after fetching.
    pub prefilter_date_of_birth: bool,
    /// Row cap when the date of birth is filtered after fetching.
    pub candidate_limit: u32,
    /// Compare keys as text; set for schemas whose key column is character data.
    pub text_keys: bool,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            key_column: "PatientID".to_string(),
            join_type: JoinType::Left,
            demographic_columns: DemographicColumns::default(),
            csv_columns: CsvColumns::default(),
            weights: NameWeights::default(),
            threshold: 0.8,
            field_threshold: 0.8,
            prefilter_date_of_birth: true,
            candidate_limit: 10_000,
            text_keys: false,
        }
    }
}

impl MatchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_identifier(&self.key_column) {
            return Err(ConfigError::invalid(
                "key_column",
                format!("'{}' is not a valid identifier", self.key_column),
            ));
        }
        check_unit_interval("threshold", self.threshold)?;
        check_unit_interval("field_threshold", self.field_threshold)?;
        self.weights.validate()?;
        if self.candidate_limit == 0 {
            return Err(ConfigError::invalid("candidate_limit", "must be positive"));
        }
        self.csv_columns.validate()
    }

    /// Plan options carrying the configured join type and anchor columns.
    pub fn plan_options(&self) -> PlanOptions {
        PlanOptions {
            join_type: self.join_type,
            demographic_columns: self.demographic_columns.clone(),
            text_keys: self.text_keys,
            ..PlanOptions::default()
        }
    }
}

fn check_unit_interval(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("{value} is outside [0, 1]")))
    }
}

/// CSV header names read by the batch runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvColumns {
    pub key: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: String,
}

impl Default for CsvColumns {
    fn default() -> Self {
        Self {
            key: "PatientID".to_string(),
            first_name: "FirstName".to_string(),
            last_name: "LastName".to_string(),
            date_of_birth: "DOB".to_string(),
        }
    }
}

impl CsvColumns {
    fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("csv_columns.key", &self.key),
            ("csv_columns.first_name", &self.first_name),
            ("csv_columns.last_name", &self.last_name),
            ("csv_columns.date_of_birth", &self.date_of_birth),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::invalid(field, "must not be blank"));
            }
        }
        Ok(())
    }
}

/// Weights of the first and last name in the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NameWeights {
    pub first_name: f64,
    pub last_name: f64,
}

impl Default for NameWeights {
    fn default() -> Self {
        Self {
            first_name: 0.5,
            last_name: 0.5,
        }
    }
}

impl NameWeights {
    fn validate(&self) -> Result<(), ConfigError> {
        for (field, weight) in [
            ("weights.first_name", self.first_name),
            ("weights.last_name", self.last_name),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::invalid(
                    field,
                    format!("{weight} must be a non-negative number"),
                ));
            }
        }
        if self.first_name + self.last_name <= 0.0 {
            return Err(ConfigError::invalid("weights", "weights must not sum to zero"));
        }
        Ok(())
    }
}
