//! Coarse keyword intent routing
//!
//! Decides which situational signals to fetch. The mandi set is checked
//! before the weather set; first match wins.

/// Question intent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Market-price question: fetch latest mandi quotes
    MandiPrices,
    /// Weather-sensitive question: fetch current and forecast weather
    WeatherAdvice,
    /// Everything else: weather context still helps
    GeneralAgri,
}

const MANDI_KEYWORDS: [&str; 4] = ["price", "rate", "mandi", "market"];
const WEATHER_KEYWORDS: [&str; 4] = ["weather", "rain", "temperature", "irrigation"];

/// Classify a question by substring match over fixed keyword sets.
pub fn classify_intent(question: &str) -> Intent {
    let lower = question.to_lowercase();
    if MANDI_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return Intent::MandiPrices;
    }
    if WEATHER_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return Intent::WeatherAdvice;
    }
    Intent::GeneralAgri
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mandi_keywords() {
        assert_eq!(classify_intent("Tomato price in Vashi?"), Intent::MandiPrices);
        assert_eq!(classify_intent("What RATE for onions"), Intent::MandiPrices);
        assert_eq!(classify_intent("nearest mandi"), Intent::MandiPrices);
    }

    #[test]
    fn test_weather_keywords() {
        assert_eq!(classify_intent("Will it rain tomorrow?"), Intent::WeatherAdvice);
        assert_eq!(
            classify_intent("Best irrigation schedule"),
            Intent::WeatherAdvice
        );
    }

    #[test]
    fn test_mandi_wins_over_weather() {
        // Both sets match; the mandi set is checked first.
        assert_eq!(
            classify_intent("market rates after rain"),
            Intent::MandiPrices
        );
    }

    #[test]
    fn test_fallback_is_general() {
        assert_eq!(classify_intent("How to treat leaf miner?"), Intent::GeneralAgri);
    }
}
