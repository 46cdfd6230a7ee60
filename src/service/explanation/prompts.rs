//! Prompt assembly for explanations and chat turns

use crate::model::{ConversationTurn, Diagnosis, PatientContext, RetrievedChunk};

const NOT_PROVIDED: &str = "Not provided";

/// Echo of the prompt's final cue that some models repeat back
const EXPLANATION_CUE: &str = "Your explanation:";

const CHUNK_SEPARATOR: &str = "\n\n---\n\n";

const NO_CONTEXT: &str =
    "No reference material was retrieved. Rely on general, well-established cardiology knowledge.";

pub fn explanation_prompt(
    diagnosis: &Diagnosis,
    patient: &PatientContext,
    chunks: &[RetrievedChunk],
) -> String {
    format!(
        r#"You are a compassionate cardiologist explaining ECG results to a patient.

Patient Information:
- Age: {age}
- Sex: {sex}
- ECG Diagnosis: {diagnosis}

Medical Context (from guidelines):
{context}

Instructions:
1. Explain what the ECG diagnosis means in simple, patient-friendly language.
2. Discuss what this condition typically means for someone of this age and sex.
3. Explain what steps the patient should take next (e.g., follow-up appointments, lifestyle changes).
4. Be empathetic and reassuring while being medically accurate.
5. Do NOT provide specific medication dosages or treatment plans. Always recommend consulting with their cardiologist.
6. Keep the explanation under 250 words.

{cue}"#,
        age = age_line(patient),
        sex = sex_line(patient),
        diagnosis = diagnosis.display_name(),
        context = format_context(chunks),
        cue = EXPLANATION_CUE,
    )
}

pub fn chat_prompt(
    diagnosis: &Diagnosis,
    patient: &PatientContext,
    chunks: &[RetrievedChunk],
    history: &[ConversationTurn],
    question: &str,
) -> String {
    format!(
        r#"You are a helpful, empathetic medical assistant specializing in cardiology.
You are talking to a patient who recently received an ECG result.

Here is the patient's clinical information:
- Diagnosis: {diagnosis}
- Age: {age}
- Sex: {sex}

Relevant Medical Context (extracted from trusted medical guidelines):
{context}

Recent conversation:
{history}

Patient's Question:
"{question}"

Instructions for your reply:
1. Respond in a warm, patient-friendly tone.
2. Use simple, non-technical language unless necessary.
3. Provide medically accurate and safe information.
4. If discussing lifestyle or next steps, keep recommendations general.
5. Encourage the patient to consult their cardiologist for personalized guidance.
6. DO NOT give medication doses, treatment plans, or emergency advice.

Your response:"#,
        diagnosis = diagnosis.display_name(),
        age = age_line(patient),
        sex = sex_line(patient),
        context = format_context(chunks),
        history = format_history(history),
        question = question,
    )
}

/// Drop a leading echo of the explanation cue and surrounding whitespace
pub fn strip_prompt_echo(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix(EXPLANATION_CUE)
        .map(str::trim_start)
        .unwrap_or(trimmed)
}

fn age_line(patient: &PatientContext) -> String {
    match patient.age() {
        Some(age) => format!("{} years old", age),
        None => NOT_PROVIDED.to_string(),
    }
}

fn sex_line(patient: &PatientContext) -> &'static str {
    patient.sex().map(|s| s.as_str()).unwrap_or(NOT_PROVIDED)
}

fn format_context(chunks: &[RetrievedChunk]) -> String {
    if chunks.is_empty() {
        return NO_CONTEXT.to_string();
    }
    chunks
        .iter()
        .map(|chunk| format!("[Source: {}]\n{}", chunk.source, chunk.text.trim()))
        .collect::<Vec<_>>()
        .join(CHUNK_SEPARATOR)
}

fn format_history(history: &[ConversationTurn]) -> String {
    if history.is_empty() {
        return "(none)".to_string();
    }
    history
        .iter()
        .map(|turn| format!("{}: {}", turn.role.as_str(), turn.content))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DiagnosisCategory, Sex};

    fn chunk(source: &str, text: &str) -> RetrievedChunk {
        RetrievedChunk {
            text: text.to_string(),
            source: source.to_string(),
            score: 0.5,
        }
    }

    #[test]
    fn test_explanation_prompt_contents() {
        let prompt = explanation_prompt(
            &Diagnosis::category(DiagnosisCategory::Mi),
            &PatientContext::new(Some(65), Some(Sex::Male)).unwrap(),
            &[chunk("MI_Guide.pdf", "Blood flow stops."), chunk("Rehab.pdf", "Walk daily.")],
        );

        assert!(prompt.contains("compassionate cardiologist"));
        assert!(prompt.contains("Myocardial Infarction (MI)"));
        assert!(prompt.contains("65 years old"));
        assert!(prompt.contains("Sex: Male"));
        let context = "[Source: MI_Guide.pdf]\nBlood flow stops.\n\n---\n\n[Source: Rehab.pdf]";
        assert!(prompt.contains(context));
        assert!(prompt.contains("Do NOT provide specific medication dosages"));
        assert!(prompt.ends_with(EXPLANATION_CUE));
    }

    #[test]
    fn test_missing_patient_facts_are_marked() {
        let prompt = explanation_prompt(
            &Diagnosis::category(DiagnosisCategory::Norm),
            &PatientContext::default(),
            &[],
        );
        assert!(prompt.contains("Age: Not provided"));
        assert!(prompt.contains("Sex: Not provided"));
        assert!(prompt.contains(NO_CONTEXT));
    }

    #[test]
    fn test_chat_prompt_includes_history_and_question() {
        let history = vec![
            ConversationTurn::user("What is LVH?"),
            ConversationTurn::assistant("A thickened heart wall."),
        ];
        let prompt = chat_prompt(
            &Diagnosis::category(DiagnosisCategory::Hyp),
            &PatientContext::default(),
            &[],
            &history,
            "Can I exercise?",
        );
        assert!(prompt.contains("user: What is LVH?\nassistant: A thickened heart wall."));
        assert!(prompt.contains("\"Can I exercise?\""));
    }

    #[test]
    fn test_strip_prompt_echo() {
        assert_eq!(
            strip_prompt_echo("Your explanation:\n  Your heart is fine."),
            "Your heart is fine."
        );
        assert_eq!(strip_prompt_echo("  Your heart is fine. "), "Your heart is fine.");
        assert_eq!(strip_prompt_echo("Your explanation:"), "");
    }
}
