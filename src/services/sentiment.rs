//! Lexicon-based sentiment scoring for lyrics text
//!
//! Polarity is -1..1 (negative to positive) and subjectivity is 0..1
//! (objective to subjective). Both are the mean of the per-word scores of
//! every lexicon word found in the text; text with no lexicon hits scores
//! neutral (0, 0).

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

/// (polarity, subjectivity) per lexicon word
static LEXICON: Lazy<HashMap<&'static str, (f64, f64)>> = Lazy::new(|| {
    let entries: &[(&str, f64, f64)] = &[
        ("good", 0.7, 0.6),
        ("great", 0.8, 0.75),
        ("wonderful", 1.0, 1.0),
        ("beautiful", 0.85, 1.0),
        ("amazing", 0.6, 0.9),
        ("excellent", 1.0, 1.0),
        ("perfect", 1.0, 1.0),
        ("sweet", 0.35, 0.65),
        ("nice", 0.6, 1.0),
        ("best", 1.0, 0.3),
        ("better", 0.5, 0.5),
        ("happy", 0.8, 1.0),
        ("happiness", 0.8, 1.0),
        ("joy", 0.8, 0.8),
        ("love", 0.5, 0.6),
        ("loved", 0.7, 0.8),
        ("free", 0.4, 0.8),
        ("bright", 0.7, 0.8),
        ("shine", 0.5, 0.7),
        ("warm", 0.6, 0.6),
        ("smile", 0.3, 0.4),
        ("laugh", 0.4, 0.5),
        ("alive", 0.4, 0.5),
        ("true", 0.35, 0.65),
        ("right", 0.3, 0.55),
        ("strong", 0.45, 0.65),
        ("fun", 0.3, 0.2),
        ("paradise", 0.75, 0.9),
        ("sunshine", 0.6, 0.7),
        ("heaven", 0.5, 0.7),
        ("dream", 0.3, 0.5),
        ("hope", 0.4, 0.5),
        ("kiss", 0.4, 0.6),
        ("gentle", 0.5, 0.7),
        ("tender", 0.4, 0.7),
        ("young", 0.1, 0.3),
        ("gold", 0.3, 0.6),
        ("bad", -0.7, 0.65),
        ("terrible", -1.0, 1.0),
        ("horrible", -1.0, 1.0),
        ("awful", -1.0, 1.0),
        ("worst", -1.0, 0.3),
        ("wrong", -0.5, 0.55),
        ("sad", -0.5, 1.0),
        ("sadness", -0.5, 1.0),
        ("hate", -0.8, 0.9),
        ("pain", -0.6, 0.7),
        ("hurt", -0.6, 0.7),
        ("cry", -0.4, 0.6),
        ("crying", -0.4, 0.6),
        ("tears", -0.4, 0.6),
        ("lonely", -0.5, 0.8),
        ("alone", -0.3, 0.5),
        ("broken", -0.4, 0.6),
        ("dark", -0.3, 0.5),
        ("cold", -0.4, 0.55),
        ("dead", -0.6, 0.7),
        ("death", -0.6, 0.7),
        ("die", -0.5, 0.6),
        ("lost", -0.4, 0.5),
        ("fear", -0.6, 0.8),
        ("afraid", -0.6, 0.8),
        ("scared", -0.6, 0.8),
        ("angry", -0.7, 0.9),
        ("anger", -0.7, 0.9),
        ("mad", -0.6, 0.8),
        ("cruel", -0.8, 0.9),
        ("lie", -0.5, 0.7),
        ("lies", -0.5, 0.7),
        ("empty", -0.4, 0.6),
        ("sorrow", -0.6, 0.8),
        ("grief", -0.6, 0.8),
        ("miserable", -0.9, 1.0),
        ("bitter", -0.7, 0.8),
        ("sick", -0.7, 0.8),
    ];
    entries.iter().map(|&(w, p, s)| (w, (p, s))).collect()
});

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-zA-Z']+").unwrap());

/// Tokenize text into lowercase words
pub fn tokenize(text: &str) -> Vec<String> {
    WORD_RE
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Score a text, returning (polarity, subjectivity)
pub fn score(text: &str) -> (f64, f64) {
    let mut polarity_sum = 0.0;
    let mut subjectivity_sum = 0.0;
    let mut hits = 0usize;

    for word in tokenize(text) {
        if let Some(&(polarity, subjectivity)) = LEXICON.get(word.as_str()) {
            polarity_sum += polarity;
            subjectivity_sum += subjectivity;
            hits += 1;
        }
    }

    if hits == 0 {
        (0.0, 0.0)
    } else {
        (polarity_sum / hits as f64, subjectivity_sum / hits as f64)
    }
}
