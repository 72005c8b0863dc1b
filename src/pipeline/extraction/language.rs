//! Stage 2: lightweight language detection for the extracted text.
//!
//! Detects Spanish vs English using keyword frequency and diacritic
//! patterns. No external model; heuristic scoring is appropriate for
//! municipal policy plans, which are Spanish-first with occasional
//! English annexes.

use crate::capability::CapabilitySet;
use crate::models::Language;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::{Stage, StageError, StageStatus};

/// Common Spanish words and plan vocabulary unlikely in English text.
const SPANISH_INDICATORS: &[&str] = &[
    "el ", "la ", "los ", "las ", "un ", "una ", "de ", "del ", "en ", "y ",
    "que ", "con ", "por ", "para ", "se ", "su ", "al ", "como ", "más ",
    // Municipal-plan Spanish
    "municipio", "desarrollo", "plan", "programa", "meta", "estrategia",
    "diagnóstico", "territorio", "población", "inversión", "secretaría",
    "alcaldía", "vereda", "cuatrienio", "fortalecimiento", "implementación",
];

/// English indicators rarely found in Spanish text.
const ENGLISH_INDICATORS: &[&str] = &[
    "the ", "and ", "was ", "for ", "are ", "with ", "this ", "that ",
    "will ", "from ", "have ", "been ", "not ", "but ", "its ", "which ",
    // Policy English
    "development", "municipality", "program", "target", "strategy",
    "baseline", "investment", "strengthening", "implementation", "outcome",
];

/// Detect the primary language of extracted text.
///
/// Spanish wins ties: the source corpus is Spanish-first, and a wrong
/// Spanish guess degrades analysis less than a wrong English one.
pub fn detect_language(text: &str) -> Language {
    if text.trim().len() < 20 {
        return Language::Spanish;
    }

    let lower = text.to_lowercase();

    let spanish_score = count_indicators(&lower, SPANISH_INDICATORS);
    let english_score = count_indicators(&lower, ENGLISH_INDICATORS);

    // Spanish-specific characters are a strong signal on their own.
    let diacritic_bonus = count_spanish_diacritics(&lower);

    if spanish_score + diacritic_bonus >= english_score {
        Language::Spanish
    } else {
        Language::English
    }
}

fn count_indicators(lower_text: &str, indicators: &[&str]) -> u32 {
    let mut score = 0u32;
    for &indicator in indicators {
        score += lower_text.matches(indicator).count() as u32;
    }
    score
}

/// Count ñ, accented vowels and ¿¡ as Spanish evidence; every 2 hits
/// count as 1 point so short accent-heavy fragments don't dominate.
fn count_spanish_diacritics(lower_text: &str) -> u32 {
    let mut count = 0u32;
    for ch in lower_text.chars() {
        if matches!(ch, 'ñ' | 'á' | 'é' | 'í' | 'ó' | 'ú' | 'ü' | '¿' | '¡') {
            count += 1;
        }
    }
    count / 2
}

pub struct LanguageDetector;

impl Stage for LanguageDetector {
    fn name(&self) -> &'static str {
        "language_detector"
    }

    fn run(
        &self,
        ctx: &mut PipelineContext,
        _caps: &CapabilitySet,
    ) -> Result<StageStatus, StageError> {
        let raw = ctx
            .raw
            .as_ref()
            .ok_or_else(|| StageError::new("missing_input", "no raw document for detection"))?;

        let language = detect_language(&raw.text);
        tracing::info!(language = language.code(), "Language detected");
        ctx.language = Some(language);
        Ok(StageStatus::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_spanish_plan_text() {
        let text = "El plan de desarrollo del municipio define las metas del cuatrienio \
                    y el diagnóstico de la población rural.";
        assert_eq!(detect_language(text), Language::Spanish);
    }

    #[test]
    fn detects_english_policy_text() {
        let text = "The development plan for the municipality defines targets and the \
                    baseline for investment over the coming four years.";
        assert_eq!(detect_language(text), Language::English);
    }

    #[test]
    fn short_text_defaults_to_spanish() {
        assert_eq!(detect_language(""), Language::Spanish);
        assert_eq!(detect_language("PA01"), Language::Spanish);
        assert_eq!(detect_language("   "), Language::Spanish);
    }

    #[test]
    fn mixed_text_favors_spanish() {
        let text = "Plan de desarrollo municipal: the baseline and targets del programa.";
        assert_eq!(detect_language(text), Language::Spanish);
    }

    #[test]
    fn diacritics_boost_spanish_score() {
        let text = "Diagnóstico: población, inversión, educación, niñez, atención, gestión";
        assert_eq!(detect_language(text), Language::Spanish);
    }

    #[test]
    fn heavily_english_not_misdetected() {
        let text = "The municipality was granted funds for the program and the targets \
                    have been defined with the community. This will strengthen outcomes \
                    for the population and the investment from the national budget.";
        assert_eq!(detect_language(text), Language::English);
    }

    #[test]
    fn stage_requires_raw_document() {
        let mut ctx = PipelineContext::new("run-ld-0001", 1);
        let caps = CapabilitySet::probe(None);
        let err = LanguageDetector.run(&mut ctx, &caps).unwrap_err();
        assert_eq!(err.code, "missing_input");
    }
}
