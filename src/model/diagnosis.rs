//! Classifier output and patient facts consumed by the explanation pipeline

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Oldest age accepted from callers
pub const MAX_PATIENT_AGE: u32 = 130;

/// Longest classifier label accepted outside the known categories
pub const MAX_LABEL_CHARS: usize = 16;

/// Allowed deviation from 1.0 for the sum of per-category probabilities
const PROBABILITY_SUM_TOLERANCE: f64 = 0.05;

/// Validation failures for request fields
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("Diagnosis label must not be empty")]
    EmptyDiagnosis,

    #[error(
        "Diagnosis label must be a code of at most {max} letters, digits or '_-/+'",
        max = MAX_LABEL_CHARS
    )]
    MalformedDiagnosis,

    #[error("Confidence must be within [0, 1], got {0}")]
    ConfidenceOutOfRange(f64),

    #[error("Probability for '{label}' must be within [0, 1], got {value}")]
    ProbabilityOutOfRange { label: String, value: f64 },

    #[error("Probabilities must sum to 1 (got {0:.3})")]
    ProbabilitySum(f64),

    #[error("Age must be at most {MAX_PATIENT_AGE}, got {0}")]
    AgeOutOfRange(u32),

    #[error("Unsupported sex value: {0}")]
    UnknownSex(String),

    #[error("Message must not be empty")]
    EmptyMessage,
}

/// ECG diagnostic superclasses emitted by the classifier
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum DiagnosisCategory {
    /// Normal ECG
    Norm,
    /// Myocardial infarction
    Mi,
    /// ST/T changes
    Sttc,
    /// Conduction disturbance
    Cd,
    /// Hypertrophy
    Hyp,
}

impl DiagnosisCategory {
    pub const ALL: [DiagnosisCategory; 5] = [
        DiagnosisCategory::Norm,
        DiagnosisCategory::Mi,
        DiagnosisCategory::Sttc,
        DiagnosisCategory::Cd,
        DiagnosisCategory::Hyp,
    ];

    pub fn code(self) -> &'static str {
        match self {
            DiagnosisCategory::Norm => "NORM",
            DiagnosisCategory::Mi => "MI",
            DiagnosisCategory::Sttc => "STTC",
            DiagnosisCategory::Cd => "CD",
            DiagnosisCategory::Hyp => "HYP",
        }
    }

    /// Plain-language name used in prompts
    pub fn display_name(self) -> &'static str {
        match self {
            DiagnosisCategory::Norm => "Normal ECG",
            DiagnosisCategory::Mi => "Myocardial Infarction",
            DiagnosisCategory::Sttc => "ST/T Changes",
            DiagnosisCategory::Cd => "Conduction Disturbance",
            DiagnosisCategory::Hyp => "Hypertrophy",
        }
    }

    /// Parse a classifier code, case-insensitive
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.code().eq_ignore_ascii_case(code.trim()))
    }
}

/// Diagnosis label as received: a known category or a label outside the table
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DiagnosisLabel {
    Known(DiagnosisCategory),
    Unrecognized(String),
}

impl DiagnosisLabel {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyDiagnosis);
        }
        if let Some(category) = DiagnosisCategory::from_code(trimmed) {
            return Ok(DiagnosisLabel::Known(category));
        }
        // Unrecognized labels are echoed to the patient and the model, so only codes pass
        let code_like = trimmed.chars().count() <= MAX_LABEL_CHARS
            && trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '/' | '+'));
        if !code_like {
            return Err(ValidationError::MalformedDiagnosis);
        }
        Ok(DiagnosisLabel::Unrecognized(trimmed.to_string()))
    }

    pub fn category(&self) -> Option<DiagnosisCategory> {
        match self {
            DiagnosisLabel::Known(c) => Some(*c),
            DiagnosisLabel::Unrecognized(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            DiagnosisLabel::Known(c) => c.code(),
            DiagnosisLabel::Unrecognized(raw) => raw,
        }
    }
}

impl fmt::Display for DiagnosisLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifier result for one request
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnosis {
    label: DiagnosisLabel,
    confidence: f64,
    probabilities: Option<BTreeMap<String, f64>>,
}

impl Diagnosis {
    pub fn new(label: DiagnosisLabel, confidence: f64) -> Result<Self, ValidationError> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(ValidationError::ConfidenceOutOfRange(confidence));
        }
        Ok(Self {
            label,
            confidence,
            probabilities: None,
        })
    }

    /// Convenience for a known category at full confidence
    pub fn category(category: DiagnosisCategory) -> Self {
        Self {
            label: DiagnosisLabel::Known(category),
            confidence: 1.0,
            probabilities: None,
        }
    }

    /// Attach the per-category probability map, checking ranges and the sum
    pub fn with_probabilities(
        mut self,
        probabilities: BTreeMap<String, f64>,
    ) -> Result<Self, ValidationError> {
        for (label, value) in &probabilities {
            if !(0.0..=1.0).contains(value) {
                return Err(ValidationError::ProbabilityOutOfRange {
                    label: label.clone(),
                    value: *value,
                });
            }
        }
        let sum: f64 = probabilities.values().sum();
        if !probabilities.is_empty() && (sum - 1.0).abs() > PROBABILITY_SUM_TOLERANCE {
            return Err(ValidationError::ProbabilitySum(sum));
        }
        self.probabilities = Some(probabilities);
        Ok(self)
    }

    pub fn label(&self) -> &DiagnosisLabel {
        &self.label
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn probabilities(&self) -> Option<&BTreeMap<String, f64>> {
        self.probabilities.as_ref()
    }

    /// Name used when talking to the patient
    pub fn display_name(&self) -> String {
        match &self.label {
            DiagnosisLabel::Known(c) => format!("{} ({})", c.display_name(), c.code()),
            DiagnosisLabel::Unrecognized(raw) => raw.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    pub fn as_str(self) -> &'static str {
        match self {
            Sex::Male => "Male",
            Sex::Female => "Female",
        }
    }
}

impl FromStr for Sex {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" | "m" => Ok(Sex::Male),
            "female" | "f" => Ok(Sex::Female),
            _ => Err(ValidationError::UnknownSex(s.to_string())),
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Age brackets with inclusive bounds: 0-29, 30-49, 50+
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeBracket {
    YoungAdult,
    MiddleAged,
    Elderly,
}

impl AgeBracket {
    pub fn for_age(age: u32) -> Self {
        match age {
            0..=29 => AgeBracket::YoungAdult,
            30..=49 => AgeBracket::MiddleAged,
            _ => AgeBracket::Elderly,
        }
    }

    pub fn descriptor(self) -> &'static str {
        match self {
            AgeBracket::YoungAdult => "young adult",
            AgeBracket::MiddleAged => "middle-aged",
            AgeBracket::Elderly => "elderly",
        }
    }
}

/// Optional patient facts supplied with a request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatientContext {
    age: Option<u32>,
    sex: Option<Sex>,
}

impl PatientContext {
    pub fn new(age: Option<u32>, sex: Option<Sex>) -> Result<Self, ValidationError> {
        if let Some(age) = age
            && age > MAX_PATIENT_AGE
        {
            return Err(ValidationError::AgeOutOfRange(age));
        }
        Ok(Self { age, sex })
    }

    /// Parse the loosely typed request representation
    pub fn parse(age: Option<u32>, sex: Option<&str>) -> Result<Self, ValidationError> {
        let sex = match sex.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => Some(s.parse()?),
            None => None,
        };
        Self::new(age, sex)
    }

    pub fn age(&self) -> Option<u32> {
        self.age
    }

    pub fn sex(&self) -> Option<Sex> {
        self.sex
    }

    pub fn age_bracket(&self) -> Option<AgeBracket> {
        self.age.map(AgeBracket::for_age)
    }

    pub fn is_empty(&self) -> bool {
        self.age.is_none() && self.sex.is_none()
    }
}
