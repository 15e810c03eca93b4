//! Text normalization shared by Stage 2's evidence dedup and Stage 3's
//! context-name similarity (§4.F.6, §4.G.2).

/// Lowercases and strips punctuation so two statements differing only in
/// casing/punctuation hash to comparable token sets for Jaccard dedup.
pub fn normalize_for_dedup(statement: &str) -> String {
    statement
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Semantic-similarity proxy for context merging (§4.G.2: "LLM-judged"
/// similarity). `strsim`'s normalized Jaro-Winkler over the normalized
/// names stands in for the LLM judgment call for the deterministic merge
/// pass that follows the LLM's candidate-context proposal.
pub fn name_similarity(a: &str, b: &str) -> f32 {
    strsim::jaro_winkler(&normalize_for_dedup(a), &normalize_for_dedup(b)) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_punctuation_and_case() {
        assert_eq!(
            normalize_for_dedup("The Study, Found X!"),
            "the study found x"
        );
    }

    #[test]
    fn identical_names_are_maximally_similar() {
        assert_eq!(name_similarity("WTW methodology", "WTW methodology"), 1.0);
    }
}
