//! Composition tokenizer / 成分分词
//!
//! Compositions are free text such as "Paracetamol (500mg) + Caffeine (30mg)".
//! Tokens are whitespace-separated, lowercased, and only words longer than
//! [`MIN_TOKEN_CHARS`] characters count as ingredient tokens.

/// Tokens must be strictly longer than this / 最短词长
pub const MIN_TOKEN_CHARS: usize = 3;

/// Lowercased tokens longer than [`MIN_TOKEN_CHARS`], in text order (may repeat)
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() > MIN_TOKEN_CHARS)
        .collect()
}

/// Same as [`tokenize`] with duplicates removed, first occurrence kept / 去重分词
pub fn ingredient_tokens(text: &str) -> Vec<String> {
    let mut tokens = tokenize(text);
    let mut seen = std::collections::HashSet::new();
    tokens.retain(|t| seen.insert(t.clone()));
    tokens
}

/// Normalize text for case-insensitive substring matching / 标准化
pub fn normalize_for_search(text: &str) -> String {
    text.trim().to_lowercase()
}
