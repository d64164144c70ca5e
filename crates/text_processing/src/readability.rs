//! Readability scoring
//!
//! Flesch-Kincaid grade level and Flesch reading ease from the standard
//! word/sentence/syllable counts. Pure functions; empty or degenerate input
//! yields all-zero metrics.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use clauselens_core::ReadabilityMetrics;

/// Raw readability measurements for one text
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TextMetrics {
    pub flesch_kincaid_grade: f64,
    pub flesch_reading_ease: f64,
    pub word_count: usize,
    pub sentence_count: usize,
    pub syllable_count: usize,
}

/// Comparison between a clause and its summary
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ReadabilityReport {
    pub original: TextMetrics,
    pub simplified: TextMetrics,
    /// Persisted per-clause metrics
    pub metrics: ReadabilityMetrics,
    /// Fraction of the original grade level removed by the summary
    pub overall_improvement_score: f64,
}

/// Readability scorer
#[derive(Debug, Default, Clone, Copy)]
pub struct ReadabilityScorer;

impl ReadabilityScorer {
    pub fn new() -> Self {
        Self
    }

    /// Compute metrics for a single text
    pub fn analyze(&self, text: &str) -> TextMetrics {
        let words: Vec<&str> = text.unicode_words().collect();
        let word_count = words.len();
        let sentence_count = count_sentences(text);

        if word_count == 0 || sentence_count == 0 {
            return TextMetrics::default();
        }

        let syllable_count: usize = words.iter().map(|w| count_syllables(w)).sum();

        let words_per_sentence = word_count as f64 / sentence_count as f64;
        let syllables_per_word = syllable_count as f64 / word_count as f64;

        let grade = 0.39 * words_per_sentence + 11.8 * syllables_per_word - 15.59;
        let ease = 206.835 - 1.015 * words_per_sentence - 84.6 * syllables_per_word;

        TextMetrics {
            flesch_kincaid_grade: grade.max(0.0),
            flesch_reading_ease: ease.clamp(0.0, 100.0),
            word_count,
            sentence_count,
            syllable_count,
        }
    }

    /// Compare a clause against its summary.
    ///
    /// `delta = original_grade - summary_grade`: positive means the summary
    /// reads at a lower grade level.
    pub fn compare(&self, original: &str, summary: &str) -> ReadabilityReport {
        let original_metrics = self.analyze(original);
        let summary_metrics = self.analyze(summary);

        let delta = original_metrics.flesch_kincaid_grade - summary_metrics.flesch_kincaid_grade;
        let improvement = if original_metrics.flesch_kincaid_grade > 0.0 {
            (delta / original_metrics.flesch_kincaid_grade).clamp(-1.0, 1.0)
        } else {
            0.0
        };

        ReadabilityReport {
            original: original_metrics,
            simplified: summary_metrics,
            metrics: ReadabilityMetrics {
                original_grade: original_metrics.flesch_kincaid_grade,
                summary_grade: summary_metrics.flesch_kincaid_grade,
                delta,
                flesch_score: summary_metrics.flesch_reading_ease,
            },
            overall_improvement_score: improvement,
        }
    }

    /// Baseline document-level readability stored on the document record
    pub fn baseline_map(&self, text: &str) -> HashMap<String, f64> {
        let metrics = self.analyze(text);
        HashMap::from([
            ("flesch_kincaid_grade".to_string(), metrics.flesch_kincaid_grade),
            ("flesch_reading_ease".to_string(), metrics.flesch_reading_ease),
            ("word_count".to_string(), metrics.word_count as f64),
            ("sentence_count".to_string(), metrics.sentence_count as f64),
        ])
    }

    /// Document-level aggregate across per-clause comparisons
    pub fn document_aggregate(&self, reports: &[ReadabilityReport]) -> HashMap<String, f64> {
        if reports.is_empty() {
            return HashMap::from([
                ("avg_grade_level_reduction".to_string(), 0.0),
                ("avg_summary_reading_ease".to_string(), 0.0),
                ("clauses_simplified".to_string(), 0.0),
            ]);
        }

        let n = reports.len() as f64;
        let avg_delta = reports.iter().map(|r| r.metrics.delta).sum::<f64>() / n;
        let avg_ease = reports
            .iter()
            .map(|r| r.simplified.flesch_reading_ease)
            .sum::<f64>()
            / n;
        let simplified = reports.iter().filter(|r| r.metrics.delta > 0.0).count() as f64;

        HashMap::from([
            ("avg_grade_level_reduction".to_string(), avg_delta),
            ("avg_summary_reading_ease".to_string(), avg_ease),
            ("clauses_simplified".to_string(), simplified),
        ])
    }
}

fn count_sentences(text: &str) -> usize {
    text.split(['.', '!', '?'])
        .filter(|s| s.chars().any(|c| c.is_alphanumeric()))
        .count()
}

/// Vowel-group syllable heuristic with a silent-e adjustment
fn count_syllables(word: &str) -> usize {
    let word = word.to_lowercase();
    let chars: Vec<char> = word.chars().filter(|c| c.is_alphabetic()).collect();
    if chars.is_empty() {
        return 0;
    }

    let is_vowel = |c: char| matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y');

    let mut count: usize = 0;
    let mut prev_was_vowel = false;
    for &c in &chars {
        let vowel = is_vowel(c);
        if vowel && !prev_was_vowel {
            count += 1;
        }
        prev_was_vowel = vowel;
    }

    // Trailing silent e
    if chars.len() > 2 && chars[chars.len() - 1] == 'e' && !is_vowel(chars[chars.len() - 2]) {
        count = count.saturating_sub(1);
    }

    count.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syllable_counts() {
        assert_eq!(count_syllables("cat"), 1);
        assert_eq!(count_syllables("table"), 2);
        assert_eq!(count_syllables("indemnification"), 6);
        assert_eq!(count_syllables("agree"), 2);
        // Silent e
        assert_eq!(count_syllables("mandate"), 2);
        // Never zero for a real word
        assert_eq!(count_syllables("the"), 1);
    }

    #[test]
    fn test_empty_text_yields_zeros() {
        let scorer = ReadabilityScorer::new();
        assert_eq!(scorer.analyze(""), TextMetrics::default());
        assert_eq!(scorer.analyze("   \n  "), TextMetrics::default());
    }

    #[test]
    fn test_simple_text_reads_easier_than_legalese() {
        let scorer = ReadabilityScorer::new();
        let legalese = "Notwithstanding the aforementioned indemnification obligations, \
                        the counterparty shall unconditionally remunerate all consequential \
                        expenditures attributable to contractual noncompliance.";
        let plain = "You must pay for any costs you cause. Keep it simple.";

        let hard = scorer.analyze(legalese);
        let easy = scorer.analyze(plain);
        assert!(hard.flesch_kincaid_grade > easy.flesch_kincaid_grade);
        assert!(hard.flesch_reading_ease < easy.flesch_reading_ease);
    }

    #[test]
    fn test_delta_sign_convention() {
        let scorer = ReadabilityScorer::new();
        let report = scorer.compare(
            "The indemnifying party shall remunerate extraordinary expenditures notwithstanding contractual stipulations.",
            "You pay the costs.",
        );
        // Positive delta means the summary is simpler
        assert!(report.metrics.delta > 0.0);
        assert_eq!(
            report.metrics.delta,
            report.metrics.original_grade - report.metrics.summary_grade
        );
    }

    #[test]
    fn test_document_aggregate_empty() {
        let scorer = ReadabilityScorer::new();
        let aggregate = scorer.document_aggregate(&[]);
        assert_eq!(aggregate["avg_grade_level_reduction"], 0.0);
    }
}
