use serde::{de, Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Wire names of the sixteen model input columns, in canonical order.
pub const FEATURE_COLUMNS: [&str; 16] = [
    "Age",
    "Gender",
    "Region",
    "Preexisting_Condition",
    "COVID_Strain",
    "Symptoms",
    "Severity",
    "ICU_Admission",
    "Ventilator_Support",
    "Recovered",
    "Reinfection",
    "Vaccination_Status",
    "Doses_Received",
    "Occupation",
    "Smoking_Status",
    "BMI",
];

/// Canonical value of a boolean-like patient attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum BinaryFlag {
    Yes,
    No,
}

impl BinaryFlag {
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryFlag::Yes => "Yes",
            BinaryFlag::No => "No",
        }
    }
}

impl From<bool> for BinaryFlag {
    fn from(value: bool) -> Self {
        if value {
            BinaryFlag::Yes
        } else {
            BinaryFlag::No
        }
    }
}

impl FromStr for BinaryFlag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yes" | "true" => Ok(BinaryFlag::Yes),
            "no" | "false" => Ok(BinaryFlag::No),
            other => Err(format!("expected Yes/No or true/false, got '{}'", other)),
        }
    }
}

impl fmt::Display for BinaryFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boolean-like field as it arrives on the wire: a JSON boolean or text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum FlagInput {
    Bool(bool),
    Text(String),
}

impl FlagInput {
    /// Normalize into the canonical flag, or describe why the value is not accepted.
    pub fn normalize(&self) -> Result<BinaryFlag, String> {
        match self {
            FlagInput::Bool(value) => Ok(BinaryFlag::from(*value)),
            FlagInput::Text(text) => text.parse(),
        }
    }
}

impl From<BinaryFlag> for FlagInput {
    fn from(flag: BinaryFlag) -> Self {
        FlagInput::Text(flag.as_str().to_string())
    }
}

impl From<bool> for FlagInput {
    fn from(value: bool) -> Self {
        FlagInput::Bool(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
        }
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            _ => Err(format!("expected Male or Female, got '{}'", s.trim())),
        }
    }
}

/// Largest magnitude at which every integer is exactly representable as `f64`
const MAX_EXACT_FLOAT_INT: f64 = 9_007_199_254_740_992.0;

/// Accept a JSON integer, or a float with no fractional part such as `45.0`.
#[allow(clippy::cast_possible_truncation)]
fn integral<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Number {
        Int(i64),
        Float(f64),
    }

    match Number::deserialize(deserializer)? {
        Number::Int(value) => Ok(value),
        Number::Float(value) if value.fract() == 0.0 && value.abs() <= MAX_EXACT_FLOAT_INT => Ok(value as i64),
        Number::Float(value) => Err(de::Error::custom(format!("expected an integer, got {}", value))),
    }
}

/// Patient attributes as submitted by a caller, before validation.
///
/// Integers are kept signed and the boolean-like fields accept either a
/// JSON boolean or text so that out-of-range values reach validation and
/// are reported per field instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PatientRecordInput {
    /// Patient's age in years (0-120)
    #[serde(rename = "Age", deserialize_with = "integral")]
    pub age: i64,
    /// Male or Female
    #[serde(rename = "Gender")]
    pub gender: String,
    #[serde(rename = "Region")]
    pub region: String,
    #[serde(rename = "Preexisting_Condition")]
    pub preexisting_condition: String,
    #[serde(rename = "COVID_Strain")]
    pub covid_strain: String,
    #[serde(rename = "Symptoms")]
    pub symptoms: String,
    #[serde(rename = "Severity")]
    pub severity: String,
    #[serde(rename = "ICU_Admission")]
    pub icu_admission: FlagInput,
    #[serde(rename = "Ventilator_Support")]
    pub ventilator_support: FlagInput,
    #[serde(rename = "Recovered")]
    pub recovered: FlagInput,
    #[serde(rename = "Reinfection")]
    pub reinfection: FlagInput,
    #[serde(rename = "Vaccination_Status")]
    pub vaccination_status: String,
    /// Number of vaccine doses received (>= 0)
    #[serde(rename = "Doses_Received", deserialize_with = "integral")]
    pub doses_received: i64,
    #[serde(rename = "Occupation")]
    pub occupation: String,
    #[serde(rename = "Smoking_Status")]
    pub smoking_status: String,
    /// Body mass index (> 0)
    #[serde(rename = "BMI")]
    pub bmi: f64,
}

impl PatientRecordInput {
    /// The sample patient documented for the predict endpoint.
    pub fn example() -> Self {
        Self {
            age: 45,
            gender: "Male".to_string(),
            region: "North America".to_string(),
            preexisting_condition: "Diabetes".to_string(),
            covid_strain: "Delta".to_string(),
            symptoms: "Fever, Cough".to_string(),
            severity: "Moderate".to_string(),
            icu_admission: FlagInput::Text("No".to_string()),
            ventilator_support: FlagInput::Text("No".to_string()),
            recovered: FlagInput::Text("Yes".to_string()),
            reinfection: FlagInput::Text("No".to_string()),
            vaccination_status: "Fully Vaccinated".to_string(),
            doses_received: 2,
            occupation: "Healthcare Worker".to_string(),
            smoking_status: "Non-smoker".to_string(),
            bmi: 25.5,
        }
    }
}

/// A validated patient record. Only obtainable through
/// [`PatientRecordInput::validate`], and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientRecord {
    #[serde(rename = "Age")]
    pub(crate) age: u8,
    #[serde(rename = "Gender")]
    pub(crate) gender: Gender,
    #[serde(rename = "Region")]
    pub(crate) region: String,
    #[serde(rename = "Preexisting_Condition")]
    pub(crate) preexisting_condition: String,
    #[serde(rename = "COVID_Strain")]
    pub(crate) covid_strain: String,
    #[serde(rename = "Symptoms")]
    pub(crate) symptoms: String,
    #[serde(rename = "Severity")]
    pub(crate) severity: String,
    #[serde(rename = "ICU_Admission")]
    pub(crate) icu_admission: BinaryFlag,
    #[serde(rename = "Ventilator_Support")]
    pub(crate) ventilator_support: BinaryFlag,
    #[serde(rename = "Recovered")]
    pub(crate) recovered: BinaryFlag,
    #[serde(rename = "Reinfection")]
    pub(crate) reinfection: BinaryFlag,
    #[serde(rename = "Vaccination_Status")]
    pub(crate) vaccination_status: String,
    #[serde(rename = "Doses_Received")]
    pub(crate) doses_received: u32,
    #[serde(rename = "Occupation")]
    pub(crate) occupation: String,
    #[serde(rename = "Smoking_Status")]
    pub(crate) smoking_status: String,
    #[serde(rename = "BMI")]
    pub(crate) bmi: f64,
}

impl PatientRecord {
    pub fn age(&self) -> u8 {
        self.age
    }

    pub fn gender(&self) -> Gender {
        self.gender
    }

    pub fn doses_received(&self) -> u32 {
        self.doses_received
    }

    pub fn bmi(&self) -> f64 {
        self.bmi
    }

    /// Look up a single model column by its wire name.
    pub fn feature(&self, column: &str) -> Option<FeatureValue<'_>> {
        let value = match column {
            "Age" => FeatureValue::Number(f64::from(self.age)),
            "Gender" => FeatureValue::Category(self.gender.as_str()),
            "Region" => FeatureValue::Category(&self.region),
            "Preexisting_Condition" => FeatureValue::Category(&self.preexisting_condition),
            "COVID_Strain" => FeatureValue::Category(&self.covid_strain),
            "Symptoms" => FeatureValue::Category(&self.symptoms),
            "Severity" => FeatureValue::Category(&self.severity),
            "ICU_Admission" => FeatureValue::Category(self.icu_admission.as_str()),
            "Ventilator_Support" => FeatureValue::Category(self.ventilator_support.as_str()),
            "Recovered" => FeatureValue::Category(self.recovered.as_str()),
            "Reinfection" => FeatureValue::Category(self.reinfection.as_str()),
            "Vaccination_Status" => FeatureValue::Category(&self.vaccination_status),
            "Doses_Received" => FeatureValue::Number(f64::from(self.doses_received)),
            "Occupation" => FeatureValue::Category(&self.occupation),
            "Smoking_Status" => FeatureValue::Category(&self.smoking_status),
            "BMI" => FeatureValue::Number(self.bmi),
            _ => return None,
        };
        Some(value)
    }
}

impl From<&PatientRecord> for PatientRecordInput {
    fn from(record: &PatientRecord) -> Self {
        Self {
            age: i64::from(record.age),
            gender: record.gender.as_str().to_string(),
            region: record.region.clone(),
            preexisting_condition: record.preexisting_condition.clone(),
            covid_strain: record.covid_strain.clone(),
            symptoms: record.symptoms.clone(),
            severity: record.severity.clone(),
            icu_admission: record.icu_admission.into(),
            ventilator_support: record.ventilator_support.into(),
            recovered: record.recovered.into(),
            reinfection: record.reinfection.into(),
            vaccination_status: record.vaccination_status.clone(),
            doses_received: i64::from(record.doses_received),
            occupation: record.occupation.clone(),
            smoking_status: record.smoking_status.clone(),
            bmi: record.bmi,
        }
    }
}

/// A single cell of the tabular model input
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureValue<'a> {
    Number(f64),
    Category(&'a str),
}

impl fmt::Display for FeatureValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Number(n) => write!(f, "{}", n),
            FeatureValue::Category(c) => f.write_str(c),
        }
    }
}

/// One row of model input, columns in the order the bundle expects.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow<'a> {
    cells: Vec<(&'a str, FeatureValue<'a>)>,
}

impl<'a> FeatureRow<'a> {
    pub fn new(cells: Vec<(&'a str, FeatureValue<'a>)>) -> Self {
        Self { cells }
    }

    pub fn get(&self, column: &str) -> Option<FeatureValue<'a>> {
        self.cells
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| *value)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Outcome of a single prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PredictionResult {
    /// Predicted class label
    #[schema(example = "Hospitalized")]
    pub prediction: String,
    /// Raw class id produced by the classifier
    #[schema(example = 1)]
    pub prediction_numeric: i64,
    /// Probability per class label
    pub probabilities: BTreeMap<String, f64>,
    /// Maximum class probability
    #[schema(example = 0.82)]
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ServiceHealth {
    Healthy,
    Unhealthy,
}

/// Health check response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HealthStatus {
    pub status: ServiceHealth,
    pub model_loaded: bool,
}

/// Metadata describing the loaded model bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ModelInfo {
    #[schema(example = "Random Forest Classifier")]
    pub model_type: String,
    pub expected_features: Vec<String>,
    pub numerical_features: Vec<String>,
    pub categorical_features: Vec<String>,
    pub has_label_encoder: bool,
    pub target_classes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BatchItemStatus {
    Ok,
    Error,
}

/// Why a single batch entry could not be scored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BatchItemError {
    pub error_type: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub field_errors: BTreeMap<String, Vec<String>>,
}

/// Result for one patient of a batch, tagged with its input position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BatchPrediction {
    pub patient_index: usize,
    pub status: BatchItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction_numeric: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<BatchItemError>,
}

/// Batch prediction response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BatchPredictionResponse {
    pub total_patients: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub predictions: Vec<BatchPrediction>,
}
