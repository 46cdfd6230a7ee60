//! Static guardrail rule tables
//!
//! Input rules run in declaration order: PII redaction first, then prompt-injection
//! heuristics over the redacted text. Output rules are a priority list; the first
//! matching rule decides the substitution.

use regex::Regex;
use std::sync::LazyLock;

use crate::model::{GuardrailRule, Severity};

/// Placeholder written over redacted PII
pub const REDACTION_PLACEHOLDER: &str = "[REDACTED]";

/// Replaces any response containing dosage or administration instructions
pub const SAFE_DOSAGE_MESSAGE: &str = "For any medications or dosages, please consult a \
cardiologist or your treating physician for personalized guidance.";

/// Replaces any response containing abusive language
pub const SAFE_TOXICITY_MESSAGE: &str = "I'm sorry, but I cannot respond in that way. \
Let's focus on helpful, respectful information about your heart health. \
Please consult your cardiologist for personalized medical advice.";

macro_rules! guardrail_pattern {
    ($name:ident, $regex_str:expr) => {
        pub static $name: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new($regex_str).ok());
    };
}

// ── PII ────────────────────────────────────────────────────────────────────
// A labelled field is redacted whatever the casing, up to three name words.
guardrail_pattern!(
    RE_PATIENT_NAME_FIELD,
    r"(?i)(patient\s*name\s*:\s*)[a-z][a-z'’\-]*(?:[ \t]+[a-z][a-z'’\-]*){0,2}"
);

// After an honorific the first word is always a name; a second word only when capitalized.
guardrail_pattern!(
    RE_HONORIFIC_NAME,
    r"\b((?i:mrs|mr|ms)\.)\s+(?i:[a-z][a-z'’\-]*)(?:[ \t]+[A-Z][A-Za-z'’\-]*)?"
);

// ── Prompt injection ───────────────────────────────────────────────────────
guardrail_pattern!(
    RE_IGNORE_PREVIOUS,
    r"(?i)\bignore\s+(?:all\s+)?(?:the\s+)?previous\s+instructions"
);

guardrail_pattern!(RE_DISREGARD_ABOVE, r"(?i)\bdisregard\s+the\s+above");

guardrail_pattern!(RE_YOU_ARE_NOW, r"(?i)\byou\s+are\s+now\s+(?:an?|the)\b");

guardrail_pattern!(RE_ACT_AS, r"(?i)\bact\s+as\s+(?:an?|the)\b");

guardrail_pattern!(
    RE_REVEAL_SYSTEM_PROMPT,
    r"(?i)\breveal\s+(?:your\s+|the\s+)?system\s+prompt"
);

// ── Output moderation ─────────────────────────────────────────────────────
guardrail_pattern!(
    RE_DOSAGE_INSTRUCTION,
    concat!(
        r"(?i)\b(?:take|taking|give|giving|administer|inject|swallow)\s+",
        r"(?:about\s+|up\s+to\s+)?\d+(?:[.,]\d+)?\s*",
        r"(?:mg|mcg|g|ml|milligrams?|micrograms?|grams?|units?|tablets?|pills?|capsules?)\b"
    )
);

guardrail_pattern!(
    RE_TOXIC_LANGUAGE,
    r"(?i)\b(?:idiot|stupid|useless|moron|dumb|kill\s+yourself|shut\s+up)\b"
);

/// A pattern applied to inbound user text
pub struct InputRule {
    pub rule: GuardrailRule,
    pub pattern_name: &'static str,
    pub regex: &'static LazyLock<Option<Regex>>,
    /// Replacement for redacting rules; `None` keeps the text and only records
    pub replacement: Option<&'static str>,
    pub severity: Severity,
    pub message: &'static str,
}

/// A pattern applied to generated text; a match replaces the whole response
pub struct OutputRule {
    pub rule: GuardrailRule,
    pub regex: &'static LazyLock<Option<Regex>>,
    pub substitution: &'static str,
    pub severity: Severity,
    pub message: &'static str,
}

const PII_MESSAGE: &str = "Detected possible patient-identifying information. Redacted.";
const INJECTION_MESSAGE: &str = "Detected prompt-injection style instruction in user input.";

pub static INPUT_RULES: [InputRule; 7] = [
    InputRule {
        rule: GuardrailRule::PiiRedaction,
        pattern_name: "patient_name_field",
        regex: &RE_PATIENT_NAME_FIELD,
        replacement: Some("${1}[REDACTED]"),
        severity: Severity::Warning,
        message: PII_MESSAGE,
    },
    InputRule {
        rule: GuardrailRule::PiiRedaction,
        pattern_name: "honorific_name",
        regex: &RE_HONORIFIC_NAME,
        replacement: Some("${1} [REDACTED]"),
        severity: Severity::Warning,
        message: PII_MESSAGE,
    },
    InputRule {
        rule: GuardrailRule::PromptInjectionHeuristic,
        pattern_name: "ignore_previous_instructions",
        regex: &RE_IGNORE_PREVIOUS,
        replacement: None,
        severity: Severity::Warning,
        message: INJECTION_MESSAGE,
    },
    InputRule {
        rule: GuardrailRule::PromptInjectionHeuristic,
        pattern_name: "disregard_the_above",
        regex: &RE_DISREGARD_ABOVE,
        replacement: None,
        severity: Severity::Warning,
        message: INJECTION_MESSAGE,
    },
    InputRule {
        rule: GuardrailRule::PromptInjectionHeuristic,
        pattern_name: "you_are_now",
        regex: &RE_YOU_ARE_NOW,
        replacement: None,
        severity: Severity::Warning,
        message: INJECTION_MESSAGE,
    },
    InputRule {
        rule: GuardrailRule::PromptInjectionHeuristic,
        pattern_name: "act_as",
        regex: &RE_ACT_AS,
        replacement: None,
        severity: Severity::Warning,
        message: INJECTION_MESSAGE,
    },
    InputRule {
        rule: GuardrailRule::PromptInjectionHeuristic,
        pattern_name: "reveal_system_prompt",
        regex: &RE_REVEAL_SYSTEM_PROMPT,
        replacement: None,
        severity: Severity::Warning,
        message: INJECTION_MESSAGE,
    },
];

/// Output moderation in priority order: dosage before toxicity
pub static OUTPUT_RULES: [OutputRule; 2] = [
    OutputRule {
        rule: GuardrailRule::BlockMedicationDosage,
        regex: &RE_DOSAGE_INSTRUCTION,
        substitution: SAFE_DOSAGE_MESSAGE,
        severity: Severity::Blocking,
        message: "Blocked explicit medication dosage advice and replaced it with safe \
cardiologist consultation guidance.",
    },
    OutputRule {
        rule: GuardrailRule::ToxicityFilter,
        regex: &RE_TOXIC_LANGUAGE,
        substitution: SAFE_TOXICITY_MESSAGE,
        severity: Severity::Blocking,
        message: "Detected potentially toxic or abusive language; replaced with safe response.",
    },
];

/// True when the pattern compiled and matches the text
pub fn pattern_matches(regex: &LazyLock<Option<Regex>>, text: &str) -> bool {
    regex.as_ref().is_some_and(|re| re.is_match(text))
}

/// Apply every redacting input rule without recording events
///
/// Used to scrub samples before they are attached to events.
pub fn redact_pii(text: &str) -> String {
    let mut redacted = text.to_string();
    for rule in INPUT_RULES.iter() {
        if let (Some(re), Some(replacement)) = (rule.regex.as_ref(), rule.replacement) {
            redacted = re.replace_all(&redacted, replacement).into_owned();
        }
    }
    redacted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_patterns_compile() {
        for rule in INPUT_RULES.iter() {
            assert!(rule.regex.is_some(), "{} failed to compile", rule.pattern_name);
        }
        for rule in OUTPUT_RULES.iter() {
            assert!(rule.regex.is_some(), "{} failed to compile", rule.rule);
        }
    }

    #[test]
    fn test_output_priority_is_dosage_first() {
        assert_eq!(OUTPUT_RULES[0].rule, GuardrailRule::BlockMedicationDosage);
        assert_eq!(OUTPUT_RULES[1].rule, GuardrailRule::ToxicityFilter);
    }

    #[test]
    fn test_dosage_pattern_variants() {
        for text in [
            "take 500 mg aspirin",
            "Take 81mg daily",
            "You should administer 2.5 mg of it",
            "give 10 ml every hour",
            "take 2 tablets after meals",
            "swallow up to 3 capsules",
        ] {
            assert!(pattern_matches(&RE_DOSAGE_INSTRUCTION, text), "{text}");
        }
        for text in [
            "Medication may be discussed with your cardiologist.",
            "Your heart rate was 72 beats per minute.",
            "Take time to rest and recover.",
        ] {
            assert!(!pattern_matches(&RE_DOSAGE_INSTRUCTION, text), "{text}");
        }
    }

    #[test]
    fn test_safe_messages_trigger_no_rule() {
        for text in [SAFE_DOSAGE_MESSAGE, SAFE_TOXICITY_MESSAGE] {
            for rule in OUTPUT_RULES.iter() {
                assert!(!pattern_matches(rule.regex, text));
            }
        }
    }

    #[test]
    fn test_name_field_redacted_in_any_casing() {
        for (input, expected) in [
            ("Patient name: John SMITH.", "Patient name: [REDACTED]."),
            ("patient name: john smith.", "patient name: [REDACTED]."),
            ("PATIENT NAME: JOHN SMITH", "PATIENT NAME: [REDACTED]"),
            ("Patient name: O'Brien.", "Patient name: [REDACTED]."),
            ("Patient name: Anne-Marie Dupont.", "Patient name: [REDACTED]."),
        ] {
            assert_eq!(redact_pii(input), expected, "{input}");
        }
    }

    #[test]
    fn test_honorific_redacted_in_any_casing() {
        assert_eq!(redact_pii("mr. smith asks"), "mr. [REDACTED] asks");
        assert_eq!(redact_pii("MRS. O'NEIL asks"), "MRS. [REDACTED] asks");
        assert_eq!(redact_pii("Ms. Anne-Marie Dupont asks"), "Ms. [REDACTED] asks");
    }

    #[test]
    fn test_redact_pii_covers_both_patterns() {
        let redacted = redact_pii("Patient name: John Smith, referred by Mrs. Jones");
        assert_eq!(
            redacted,
            "Patient name: [REDACTED], referred by Mrs. [REDACTED]"
        );
    }
}
