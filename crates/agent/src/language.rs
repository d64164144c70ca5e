//! Question language detection
//!
//! Script detection first (Devanagari), then stopword evidence for the
//! Latin-script languages. Confidence gates whether the detected language
//! overrides the configured default.

use clauselens_core::Language;

/// Detection outcome
#[derive(Debug, Clone)]
pub struct DetectionResult {
    pub language: Language,
    pub confidence: f64,
    /// How the detection was made ("script", "stopwords", "default")
    pub method: String,
}

/// Common short words per Latin-script language.
///
/// Words shared across languages are deliberately absent; evidence counts
/// only distinctive hits.
const STOPWORDS: &[(Language, &[&str])] = &[
    (
        Language::English,
        &["the", "and", "what", "how", "can", "this", "about", "does", "is", "are"],
    ),
    (
        Language::Spanish,
        &["el", "la", "los", "las", "qué", "cómo", "puedo", "este", "contrato", "cuál", "es"],
    ),
    (
        Language::French,
        &["le", "les", "quoi", "comment", "puis", "cette", "contrat", "quel", "est", "je"],
    ),
    (
        Language::German,
        &["der", "die", "das", "und", "wie", "kann", "ich", "vertrag", "was", "ist"],
    ),
    (
        Language::Portuguese,
        &["o", "os", "como", "posso", "este", "contrato", "qual", "é", "sobre", "que"],
    ),
];

/// Language detector
#[derive(Debug, Default, Clone, Copy)]
pub struct LanguageDetector;

impl LanguageDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn detect(&self, text: &str) -> DetectionResult {
        let chars: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
        if chars.is_empty() {
            return DetectionResult {
                language: Language::English,
                confidence: 0.0,
                method: "default".to_string(),
            };
        }

        // Script phase: Devanagari dominance means Hindi
        let devanagari = chars
            .iter()
            .filter(|c| ('\u{0900}'..='\u{097F}').contains(*c))
            .count();
        let devanagari_ratio = devanagari as f64 / chars.len() as f64;
        if devanagari_ratio > 0.3 {
            return DetectionResult {
                language: Language::Hindi,
                confidence: devanagari_ratio.min(0.95),
                method: "script".to_string(),
            };
        }

        // Stopword phase
        let words: Vec<String> = text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric() && c != 'é' && c != 'ó' && c != 'á')
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect();

        let mut best: Option<(Language, usize)> = None;
        for (language, stopwords) in STOPWORDS {
            let hits = words
                .iter()
                .filter(|w| stopwords.contains(&w.as_str()))
                .count();
            if hits > 0 && best.map_or(true, |(_, h)| hits > h) {
                best = Some((*language, hits));
            }
        }

        match best {
            Some((language, hits)) => {
                let confidence = (0.4 + hits as f64 * 0.15).min(0.95);
                DetectionResult {
                    language,
                    confidence,
                    method: "stopwords".to_string(),
                }
            },
            None => DetectionResult {
                language: Language::English,
                confidence: 0.3,
                method: "default".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_english() {
        let result = LanguageDetector::new().detect("How can I terminate this contract?");
        assert_eq!(result.language, Language::English);
        assert!(result.confidence > 0.5);
    }

    #[test]
    fn test_detects_spanish_with_high_confidence() {
        let result =
            LanguageDetector::new().detect("¿Cómo puedo cancelar este contrato? ¿Qué dice la cláusula?");
        assert_eq!(result.language, Language::Spanish);
        assert!(result.confidence > 0.8);
        assert_eq!(result.method, "stopwords");
    }

    #[test]
    fn test_detects_hindi_by_script() {
        let result = LanguageDetector::new().detect("मैं यह अनुबंध कैसे समाप्त कर सकता हूं?");
        assert_eq!(result.language, Language::Hindi);
        assert_eq!(result.method, "script");
    }

    #[test]
    fn test_empty_text_defaults() {
        let result = LanguageDetector::new().detect("   ");
        assert_eq!(result.language, Language::English);
        assert_eq!(result.confidence, 0.0);
    }
}
