//! Hazardous-practice interception
//!
//! A fixed keyword list is matched against the user question only, never
//! against retrieved context or the generated answer. Matches do not block
//! generation; the answer is prefixed with a warning instead.

/// Warning line prepended to answers for hazardous questions.
pub const SAFETY_WARNING: &str = "WARNING: This practice can be dangerous. \
Do not mix agricultural chemicals with household substances. Consult your \
local agricultural extension officer before proceeding.";

const UNSAFE_KEYWORDS: [&str; 8] = [
    "mix pesticide",
    "mixing pesticide",
    "pesticide with bleach",
    "bleach with pesticide",
    "pesticide and bleach",
    "kerosene",
    "drink pesticide",
    "burn stubble with",
];

/// True when the question matches the hazardous-practice keyword list.
pub fn is_unsafe(question: &str) -> bool {
    let lower = question.to_lowercase();
    UNSAFE_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pesticide_bleach_is_unsafe() {
        assert!(is_unsafe("Can I mix pesticide with bleach?"));
        assert!(is_unsafe("Is bleach with pesticide stronger?"));
    }

    #[test]
    fn test_kerosene_is_unsafe() {
        assert!(is_unsafe("Spraying KEROSENE on crops for pests"));
    }

    #[test]
    fn test_ordinary_questions_pass() {
        assert!(!is_unsafe("Which pesticide works on aphids?"));
        assert!(!is_unsafe("Tomato price in Mumbai"));
    }

    #[test]
    fn test_warning_prefix() {
        assert!(SAFETY_WARNING.starts_with("WARNING:"));
    }
}
