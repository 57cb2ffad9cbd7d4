//! Model name normalization
//!
//! Requested model names that only differ from a configured wildcard entry by
//! a variable suffix (per-request thinking budgets, custom GPT ids) are folded
//! onto that wildcard so they can match a channel.

/// Resolves a requested model name to the name channels are registered under
pub trait ModelNameNormalizer: Send + Sync {
    fn normalize(&self, model_name: &str) -> String;
}

/// Normalizer backed by [`normalize_model_name`]
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultModelNameNormalizer;

impl ModelNameNormalizer for DefaultModelNameNormalizer {
    fn normalize(&self, model_name: &str) -> String {
        normalize_model_name(model_name)
    }
}

const THINKING_BUDGET_PREFIXES: [&str; 3] =
    ["gemini-2.5-flash-lite", "gemini-2.5-flash", "gemini-2.5-pro"];

const GIZMO_PREFIXES: [&str; 2] = ["gpt-4-gizmo", "gpt-4o-gizmo"];

/// Map a requested model name onto its wildcard form
///
/// Names without a wildcard form are returned unchanged.
pub fn normalize_model_name(model_name: &str) -> String {
    // Longest prefix first: "gemini-2.5-flash-lite" also starts with "gemini-2.5-flash".
    let thinking_prefix = THINKING_BUDGET_PREFIXES
        .iter()
        .find(|p| model_name.starts_with(**p));
    if let Some(prefix) = thinking_prefix {
        if model_name.contains("-thinking-") {
            return format!("{}-thinking-*", prefix);
        }
    }

    if let Some(prefix) = GIZMO_PREFIXES.iter().find(|p| model_name.starts_with(**p)) {
        return format!("{}-*", prefix);
    }

    model_name.to_string()
}
