//! Post-generation content filter.
//!
//! Answers must stay factual: no investment advice and no forecasts. A
//! response that passes gets a source attribution appended.

/// Terms that signal investment advice or return outlooks.
pub const INVESTMENT_TERMS: &[&str] = &["comprar", "vender", "inversión", "rentabilidad futura"];

/// Terms that signal predictions or estimates.
pub const PREDICTION_TERMS: &[&str] = &["predicción", "proyección", "estimado"];

pub const INVESTMENT_REFUSAL: &str =
    "⚠️ No se permiten recomendaciones de inversión ni proyecciones financieras.";

pub const PREDICTION_REFUSAL: &str =
    "⚠️ El sistema no realiza estimaciones ni predicciones. Solo resume información factual.";

pub const SOURCE_SUFFIX: &str = "\n\n📘 Fuente: Documentos IFRS públicos o reportes oficiales.";

/// Which rule a response tripped, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardrailVerdict {
    Investment,
    Prediction,
    Allowed,
}

/// Classify a response with a case-insensitive substring scan. Investment
/// terms are checked first.
pub fn classify(response: &str) -> GuardrailVerdict {
    let lowered = response.to_lowercase();
    if INVESTMENT_TERMS.iter().any(|t| lowered.contains(t)) {
        GuardrailVerdict::Investment
    } else if PREDICTION_TERMS.iter().any(|t| lowered.contains(t)) {
        GuardrailVerdict::Prediction
    } else {
        GuardrailVerdict::Allowed
    }
}

/// Replace advisory or predictive answers with a refusal, otherwise append
/// the source attribution.
pub fn ethical_guardrails(response: &str) -> String {
    match classify(response) {
        GuardrailVerdict::Investment => INVESTMENT_REFUSAL.to_string(),
        GuardrailVerdict::Prediction => PREDICTION_REFUSAL.to_string(),
        GuardrailVerdict::Allowed => format!("{response}{SOURCE_SUFFIX}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_investment_terms_refused() {
        assert_eq!(
            ethical_guardrails("Recomendamos COMPRAR acciones de YPF"),
            INVESTMENT_REFUSAL
        );
        assert_eq!(
            ethical_guardrails("La rentabilidad futura será alta"),
            INVESTMENT_REFUSAL
        );
    }

    #[test]
    fn test_investment_takes_precedence() {
        assert_eq!(
            ethical_guardrails("Predicción: conviene vender"),
            INVESTMENT_REFUSAL
        );
    }

    #[test]
    fn test_prediction_terms_refused() {
        assert_eq!(
            ethical_guardrails("Según nuestra PREDICCIÓN, crecerá"),
            PREDICTION_REFUSAL
        );
        assert_eq!(
            ethical_guardrails("El valor estimado es 10"),
            PREDICTION_REFUSAL
        );
    }

    #[test]
    fn test_factual_answer_gets_source() {
        let answer = "La deuda neta fue de USD 7.000 millones.";
        assert_eq!(
            ethical_guardrails(answer),
            "La deuda neta fue de USD 7.000 millones.\n\n📘 Fuente: Documentos IFRS públicos o reportes oficiales."
        );
    }

    #[test]
    fn test_substring_match_inside_words() {
        // "estimados" contains "estimado"
        assert_eq!(classify("Valores estimados"), GuardrailVerdict::Prediction);
        assert_eq!(classify(""), GuardrailVerdict::Allowed);
    }
}
