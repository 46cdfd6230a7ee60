//! Diagnosis-aware search term construction

use crate::model::{DiagnosisCategory, DiagnosisLabel, PatientContext};

/// Number of table terms blended into a chat query
const CHAT_QUERY_TERMS: usize = 2;

/// Search phrases per diagnosis category, in ranking order
#[derive(Debug, Clone)]
pub struct SearchTermTable {
    entries: Vec<(DiagnosisCategory, Vec<String>)>,
}

impl SearchTermTable {
    pub fn new(entries: Vec<(DiagnosisCategory, Vec<String>)>) -> Self {
        Self { entries }
    }

    pub fn terms(&self, category: DiagnosisCategory) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, terms)| terms.as_slice())
    }
}

impl Default for SearchTermTable {
    fn default() -> Self {
        let row = |category, terms: &[&str]| {
            (
                category,
                terms.iter().map(|t| t.to_string()).collect::<Vec<_>>(),
            )
        };
        Self::new(vec![
            row(
                DiagnosisCategory::Norm,
                &["normal sinus rhythm", "normal ECG", "healthy heart"],
            ),
            row(
                DiagnosisCategory::Mi,
                &["myocardial infarction", "heart attack", "MI", "coronary"],
            ),
            row(
                DiagnosisCategory::Sttc,
                &["ST-T changes", "ischemia", "ST segment", "T wave"],
            ),
            row(
                DiagnosisCategory::Cd,
                &["conduction disturbance", "bundle branch block", "AV block"],
            ),
            row(
                DiagnosisCategory::Hyp,
                &["hypertrophy", "LVH", "left ventricular", "thickened heart"],
            ),
        ])
    }
}

/// Turns a diagnosis and patient facts into ordered retrieval queries
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    table: SearchTermTable,
}

impl QueryBuilder {
    pub fn new(table: SearchTermTable) -> Self {
        Self { table }
    }

    /// Search terms for an initial explanation
    ///
    /// Table terms come first in table order, followed by the age-bracket
    /// descriptor when the age is known. Sex never becomes a search term.
    pub fn build_queries(&self, label: &DiagnosisLabel, patient: &PatientContext) -> Vec<String> {
        let mut queries = self.diagnosis_terms(label);

        if let Some(bracket) = patient.age_bracket() {
            queries.push(bracket.descriptor().to_string());
        }

        queries
    }

    /// A single query for a chat turn: the user's (sanitized) message plus the
    /// leading diagnosis terms
    pub fn build_chat_query(&self, label: &DiagnosisLabel, message: &str) -> Vec<String> {
        let terms = self.diagnosis_terms(label);
        let context = terms
            .iter()
            .take(CHAT_QUERY_TERMS)
            .cloned()
            .collect::<Vec<_>>()
            .join(" ");

        let message = message.trim();
        let query = match (message.is_empty(), context.is_empty()) {
            (true, _) => context,
            (false, true) => message.to_string(),
            (false, false) => format!("{} {}", message, context),
        };
        vec![query]
    }

    fn diagnosis_terms(&self, label: &DiagnosisLabel) -> Vec<String> {
        match label {
            DiagnosisLabel::Known(category) => match self.table.terms(*category) {
                Some(terms) if !terms.is_empty() => terms.to_vec(),
                _ => vec![category.code().to_string()],
            },
            DiagnosisLabel::Unrecognized(raw) => vec![raw.clone()],
        }
    }
}
