//! Input validation for patient records.
//!
//! Validation turns a [`PatientRecordInput`] into a [`PatientRecord`],
//! collecting every violated field so a caller can fix the whole record
//! in one round trip.

use serde::Deserialize;

use crate::error::{FieldErrors, PredictorError, PredictorResult};
use crate::models::{BinaryFlag, FlagInput, Gender, PatientRecord, PatientRecordInput};

pub const MIN_AGE: i64 = 0;
pub const MAX_AGE: i64 = 120;

/// Accumulates per-field messages while a record is checked
#[derive(Debug, Default)]
struct FieldValidator {
    errors: FieldErrors,
}

impl FieldValidator {
    fn reject(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    /// Non-empty text, trimmed
    fn text(&mut self, field: &str, value: &str) -> String {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            self.reject(field, format!("{} must not be empty", field));
        }
        trimmed.to_string()
    }

    fn flag(&mut self, field: &str, value: &FlagInput) -> BinaryFlag {
        value.normalize().unwrap_or_else(|message| {
            self.reject(field, message);
            BinaryFlag::No
        })
    }

    fn finish(self, record: PatientRecord) -> PredictorResult<PatientRecord> {
        if self.errors.is_empty() {
            Ok(record)
        } else {
            Err(PredictorError::invalid_fields(self.errors))
        }
    }
}

impl PatientRecordInput {
    /// Decode a single JSON value, reporting decode failures as invalid input.
    pub fn from_json(value: &serde_json::Value) -> PredictorResult<Self> {
        Self::deserialize(value)
            .map_err(|e| PredictorError::malformed(format!("malformed patient record: {}", e)))
    }

    /// Check type and range constraints and normalize boolean-like fields.
    ///
    /// # Errors
    ///
    /// Returns [`PredictorError::InvalidInput`] listing every offending field.
    pub fn validate(&self) -> PredictorResult<PatientRecord> {
        let mut v = FieldValidator::default();

        let age = if (MIN_AGE..=MAX_AGE).contains(&self.age) {
            u8::try_from(self.age).unwrap_or_default()
        } else {
            v.reject(
                "Age",
                format!("Age must be between {} and {}, got {}", MIN_AGE, MAX_AGE, self.age),
            );
            0
        };

        let gender = self.gender.parse::<Gender>().unwrap_or_else(|message| {
            v.reject("Gender", message);
            Gender::Male
        });

        let doses_received = match u32::try_from(self.doses_received) {
            Ok(doses) => doses,
            Err(_) if self.doses_received < 0 => {
                v.reject(
                    "Doses_Received",
                    format!("Doses_Received must be >= 0, got {}", self.doses_received),
                );
                0
            }
            Err(_) => {
                v.reject("Doses_Received", "Doses_Received is out of range");
                0
            }
        };

        if !(self.bmi.is_finite() && self.bmi > 0.0) {
            v.reject("BMI", format!("BMI must be a positive number, got {}", self.bmi));
        }

        let record = PatientRecord {
            age,
            gender,
            region: v.text("Region", &self.region),
            preexisting_condition: v.text("Preexisting_Condition", &self.preexisting_condition),
            covid_strain: v.text("COVID_Strain", &self.covid_strain),
            symptoms: v.text("Symptoms", &self.symptoms),
            severity: v.text("Severity", &self.severity),
            icu_admission: v.flag("ICU_Admission", &self.icu_admission),
            ventilator_support: v.flag("Ventilator_Support", &self.ventilator_support),
            recovered: v.flag("Recovered", &self.recovered),
            reinfection: v.flag("Reinfection", &self.reinfection),
            vaccination_status: v.text("Vaccination_Status", &self.vaccination_status),
            doses_received,
            occupation: v.text("Occupation", &self.occupation),
            smoking_status: v.text("Smoking_Status", &self.smoking_status),
            bmi: self.bmi,
        };

        v.finish(record)
    }
}
