//! Canned explanations used when generation is unavailable

use crate::model::{DiagnosisCategory, DiagnosisLabel, PatientContext};

/// Per-category explanation texts, written for direct display to a patient
#[derive(Debug, Clone)]
pub struct FallbackTemplates {
    entries: Vec<(DiagnosisCategory, String)>,
}

impl FallbackTemplates {
    pub fn new(entries: Vec<(DiagnosisCategory, String)>) -> Self {
        Self { entries }
    }

    fn base_text(&self, label: &DiagnosisLabel) -> String {
        let known = label.category().and_then(|category| {
            self.entries
                .iter()
                .find(|(c, _)| *c == category)
                .map(|(_, text)| text.clone())
        });

        known.unwrap_or_else(|| {
            format!(
                "Your ECG shows {}. Please consult with a cardiologist for detailed \
                 interpretation.",
                label.as_str()
            )
        })
    }

    /// Render the template for a label, personalized with whatever patient facts are known
    pub fn render(&self, label: &DiagnosisLabel, patient: &PatientContext) -> String {
        let base = self.base_text(label);
        match personalization(patient) {
            Some(prefix) => format!("{}, {}", prefix, lowercase_first(&base)),
            None => base,
        }
    }
}

impl Default for FallbackTemplates {
    fn default() -> Self {
        Self::new(vec![
            (
                DiagnosisCategory::Norm,
                "Your ECG shows a normal rhythm. This is a good sign, indicating that your \
                 heart's electrical activity is functioning normally. Continue with regular \
                 check-ups and maintain a healthy lifestyle."
                    .to_string(),
            ),
            (
                DiagnosisCategory::Mi,
                "Your ECG indicates signs of Myocardial Infarction (heart attack). This is a \
                 serious condition that requires immediate medical attention. Please consult \
                 with a cardiologist urgently for proper evaluation and treatment."
                    .to_string(),
            ),
            (
                DiagnosisCategory::Sttc,
                "Your ECG shows ST-T changes, which may indicate ischemia (reduced blood flow \
                 to the heart). This requires medical evaluation. Please consult with a \
                 cardiologist to determine the cause and appropriate treatment."
                    .to_string(),
            ),
            (
                DiagnosisCategory::Cd,
                "Your ECG shows a conduction disturbance, which means there may be an issue \
                 with how electrical signals travel through your heart. Please consult with a \
                 cardiologist for further evaluation and management."
                    .to_string(),
            ),
            (
                DiagnosisCategory::Hyp,
                "Your ECG indicates signs of hypertrophy (thickening of the heart muscle). This \
                 may be related to high blood pressure or other conditions. Please consult with \
                 a cardiologist for proper evaluation and treatment recommendations."
                    .to_string(),
            ),
        ])
    }
}

/// "For an elderly male patient aged 70" and its partial variants
fn personalization(patient: &PatientContext) -> Option<String> {
    if patient.is_empty() {
        return None;
    }

    let mut words: Vec<String> = Vec::new();
    if let Some(bracket) = patient.age_bracket() {
        words.push(bracket.descriptor().to_string());
    }
    if let Some(sex) = patient.sex() {
        words.push(sex.as_str().to_lowercase());
    }
    words.push("patient".to_string());

    let mut phrase = words.join(" ");
    if let Some(age) = patient.age() {
        phrase.push_str(&format!(" aged {}", age));
    }

    let article = match phrase.chars().next() {
        Some('a' | 'e' | 'i' | 'o' | 'u') => "an",
        _ => "a",
    };
    Some(format!("For {} {}", article, phrase))
}

fn lowercase_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Sex;

    fn patient(age: Option<u32>, sex: Option<Sex>) -> PatientContext {
        PatientContext::new(age, sex).unwrap()
    }

    #[test]
    fn test_every_category_has_a_template() {
        let templates = FallbackTemplates::default();
        for category in DiagnosisCategory::ALL {
            let text =
                templates.render(&DiagnosisLabel::Known(category), &PatientContext::default());
            assert!(text.starts_with("Your ECG"), "{:?}", category);
            assert!(text.contains("cardiologist") || category == DiagnosisCategory::Norm);
        }
    }

    #[test]
    fn test_personalized_with_age_and_sex() {
        let text = FallbackTemplates::default().render(
            &DiagnosisLabel::Known(DiagnosisCategory::Norm),
            &patient(Some(70), Some(Sex::Male)),
        );
        assert!(
            text.starts_with("For an elderly male patient aged 70, your ECG shows a normal rhythm.")
        );
    }

    #[test]
    fn test_partial_personalization() {
        let templates = FallbackTemplates::default();
        let label = DiagnosisLabel::Known(DiagnosisCategory::Cd);

        assert!(
            templates
                .render(&label, &patient(None, Some(Sex::Female)))
                .starts_with("For a female patient, your ECG")
        );
        assert!(
            templates
                .render(&label, &patient(Some(35), None))
                .starts_with("For a middle-aged patient aged 35, your ECG")
        );
    }

    #[test]
    fn test_unrecognized_label_template() {
        let text = FallbackTemplates::default().render(
            &DiagnosisLabel::Unrecognized("AFIB".to_string()),
            &PatientContext::default(),
        );
        assert_eq!(
            text,
            "Your ECG shows AFIB. Please consult with a cardiologist for detailed interpretation."
        );
    }

    #[test]
    fn test_render_is_deterministic() {
        let templates = FallbackTemplates::default();
        let label = DiagnosisLabel::Known(DiagnosisCategory::Hyp);
        let p = patient(Some(45), Some(Sex::Female));
        assert_eq!(templates.render(&label, &p), templates.render(&label, &p));
    }
}
