//! Hand-rolled TF-IDF cosine similarity over a two-document corpus.
//!
//! No crate in the dependency stack provides an sklearn-equivalent
//! `TfidfVectorizer`, so this reimplements the pieces the severity
//! classifier actually needs: English stop-word filtering, 1-2 grams,
//! a `max_features` cap, smooth IDF, and L2-normalized cosine similarity.
//! Semantics follow scikit-learn's defaults (`smooth_idf=True`,
//! `norm='l2'`, `sublinear_tf=False`).

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

const MAX_FEATURES: usize = 1000;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w\w+\b").unwrap());

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "about", "above", "across", "after", "afterwards", "again", "against", "all",
        "almost", "alone", "along", "already", "also", "although", "always", "am", "among",
        "amongst", "an", "and", "another", "any", "anyhow", "anyone", "anything", "anyway",
        "anywhere", "are", "around", "as", "at", "back", "be", "became", "because", "become",
        "becomes", "becoming", "been", "before", "beforehand", "behind", "being", "below",
        "beside", "besides", "between", "beyond", "both", "but", "by", "can", "cannot", "could",
        "do", "does", "done", "down", "due", "during", "each", "eight", "either", "else",
        "elsewhere", "empty", "enough", "etc", "even", "ever", "every", "everyone", "everything",
        "everywhere", "except", "few", "first", "for", "former", "formerly", "found", "from",
        "front", "further", "had", "has", "have", "he", "hence", "her", "here", "hereafter",
        "hereby", "herein", "hereupon", "hers", "herself", "him", "himself", "his", "how",
        "however", "hundred", "i", "ie", "if", "in", "inc", "indeed", "into", "is", "it", "its",
        "itself", "keep", "last", "latter", "latterly", "least", "less", "made", "many", "may",
        "me", "meanwhile", "might", "more", "moreover", "most", "mostly", "much", "must", "my",
        "myself", "name", "namely", "neither", "never", "nevertheless", "next", "nine", "no",
        "nobody", "none", "noone", "nor", "not", "nothing", "now", "nowhere", "of", "off",
        "often", "on", "once", "one", "only", "onto", "or", "other", "others", "otherwise", "our",
        "ours", "ourselves", "out", "over", "own", "per", "perhaps", "please", "put", "rather",
        "re", "same", "see", "seem", "seemed", "seeming", "seems", "several", "she", "should",
        "show", "side", "since", "six", "sixty", "so", "some", "somehow", "someone", "something",
        "sometime", "sometimes", "somewhere", "still", "such", "take", "ten", "than", "that",
        "the", "their", "them", "themselves", "then", "thence", "there", "thereafter", "thereby",
        "therefore", "therein", "thereupon", "these", "they", "third", "this", "those", "though",
        "three", "through", "throughout", "thru", "thus", "to", "together", "too", "toward",
        "towards", "under", "until", "up", "upon", "us", "very", "via", "was", "we", "well",
        "were", "what", "whatever", "when", "whence", "whenever", "where", "whereafter",
        "whereas", "whereby", "wherein", "whereupon", "wherever", "whether", "which", "while",
        "whither", "who", "whoever", "whole", "whom", "whose", "why", "will", "with", "within",
        "without", "would", "yet", "you", "your", "yours", "yourself", "yourselves",
    ]
    .into_iter()
    .collect()
});

fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    TOKEN_RE
        .find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .filter(|t| !STOP_WORDS.contains(t.as_str()))
        .collect()
}

fn ngrams(tokens: &[String]) -> Vec<String> {
    let mut grams: Vec<String> = tokens.to_vec();
    for window in tokens.windows(2) {
        grams.push(format!("{} {}", window[0], window[1]));
    }
    grams
}

fn term_counts(grams: &[String]) -> HashMap<String, u32> {
    let mut counts = HashMap::new();
    for g in grams {
        *counts.entry(g.clone()).or_insert(0) += 1;
    }
    counts
}

/// TF-IDF cosine similarity between `old_text` and `new_text`, in `[0.0, 1.0]`.
/// Returns `0.0` if either text is blank, and `0.5` (matching the reference
/// implementation's exception fallback) if neither text yields any non-stop
/// tokens.
pub fn semantic_similarity(old_text: &str, new_text: &str) -> f64 {
    if old_text.trim().is_empty() || new_text.trim().is_empty() {
        return 0.0;
    }

    let old_grams = ngrams(&tokenize(old_text));
    let new_grams = ngrams(&tokenize(new_text));
    let old_counts = term_counts(&old_grams);
    let new_counts = term_counts(&new_grams);

    let mut vocab: HashSet<String> = old_counts.keys().chain(new_counts.keys()).cloned().collect();
    if vocab.is_empty() {
        return 0.5;
    }

    if vocab.len() > MAX_FEATURES {
        let mut by_total: Vec<(String, u32)> = vocab
            .into_iter()
            .map(|term| {
                let total = old_counts.get(&term).copied().unwrap_or(0) + new_counts.get(&term).copied().unwrap_or(0);
                (term, total)
            })
            .collect();
        by_total.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        by_total.truncate(MAX_FEATURES);
        vocab = by_total.into_iter().map(|(term, _)| term).collect();
    }

    let n_docs = 2.0f64;
    let mut old_vec = Vec::with_capacity(vocab.len());
    let mut new_vec = Vec::with_capacity(vocab.len());
    for term in &vocab {
        let df = (old_counts.contains_key(term) as u32 + new_counts.contains_key(term) as u32) as f64;
        let idf = (((1.0 + n_docs) / (1.0 + df)).ln()) + 1.0;
        old_vec.push(old_counts.get(term).copied().unwrap_or(0) as f64 * idf);
        new_vec.push(new_counts.get(term).copied().unwrap_or(0) as f64 * idf);
    }

    let old_norm = l2_norm(&old_vec);
    let new_norm = l2_norm(&new_vec);
    if old_norm == 0.0 || new_norm == 0.0 {
        return 0.0;
    }

    let dot: f64 = old_vec.iter().zip(new_vec.iter()).map(|(a, b)| a * b).sum();
    (dot / (old_norm * new_norm)).clamp(0.0, 1.0)
}

fn l2_norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// TF-IDF cosine similarity between `query` and each of `documents`, fit
/// over the combined corpus `[query, documents...]`. Used by the semantic
/// mapper to score a compliance document against every rule's content in
/// one vectorizer fit, same conventions as `semantic_similarity` (English
/// stop words, 1-2 grams, `max_features=1000`, smooth IDF, L2-normalized
/// cosine). Returns `0.0` for every document when `query` is blank.
pub fn corpus_cosine_similarities(query: &str, documents: &[&str]) -> Vec<f64> {
    if query.trim().is_empty() {
        return vec![0.0; documents.len()];
    }

    let query_counts = term_counts(&ngrams(&tokenize(query)));
    let doc_counts: Vec<HashMap<String, u32>> =
        documents.iter().map(|d| term_counts(&ngrams(&tokenize(d)))).collect();

    let mut vocab: HashSet<String> = query_counts.keys().cloned().collect();
    for counts in &doc_counts {
        vocab.extend(counts.keys().cloned());
    }
    if vocab.is_empty() {
        return vec![0.0; documents.len()];
    }

    if vocab.len() > MAX_FEATURES {
        let mut by_total: Vec<(String, u32)> = vocab
            .into_iter()
            .map(|term| {
                let mut total = query_counts.get(&term).copied().unwrap_or(0);
                for counts in &doc_counts {
                    total += counts.get(&term).copied().unwrap_or(0);
                }
                (term, total)
            })
            .collect();
        by_total.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        by_total.truncate(MAX_FEATURES);
        vocab = by_total.into_iter().map(|(term, _)| term).collect();
    }
    let vocab: Vec<String> = vocab.into_iter().collect();

    let n_docs = (documents.len() + 1) as f64;
    let idf_of: HashMap<&str, f64> = vocab
        .iter()
        .map(|term| {
            let mut df = if query_counts.contains_key(term) { 1 } else { 0 };
            for counts in &doc_counts {
                if counts.contains_key(term) {
                    df += 1;
                }
            }
            let idf = (((1.0 + n_docs) / (1.0 + df as f64)).ln()) + 1.0;
            (term.as_str(), idf)
        })
        .collect();

    let vectorize = |counts: &HashMap<String, u32>| -> Vec<f64> {
        vocab.iter().map(|term| counts.get(term).copied().unwrap_or(0) as f64 * idf_of[term.as_str()]).collect()
    };

    let query_vec = vectorize(&query_counts);
    let query_norm = l2_norm(&query_vec);

    doc_counts
        .iter()
        .map(|counts| {
            let doc_vec = vectorize(counts);
            let doc_norm = l2_norm(&doc_vec);
            if query_norm == 0.0 || doc_norm == 0.0 {
                return 0.0;
            }
            let dot: f64 = query_vec.iter().zip(doc_vec.iter()).map(|(a, b)| a * b).sum();
            (dot / (query_norm * doc_norm)).clamp(0.0, 1.0)
        })
        .collect()
}

#[cfg(test)]
mod corpus_tests {
    use super::corpus_cosine_similarities;

    #[test]
    fn ranks_closer_document_higher() {
        let query = "Our AI system implements risk management procedures.";
        let docs = [
            "Providers shall perform risk management throughout the AI system lifecycle.",
            "Notified bodies charge proportionate conformity assessment fees.",
        ];
        let sims = corpus_cosine_similarities(query, &docs);
        assert!(sims[0] > sims[1]);
    }

    #[test]
    fn blank_query_yields_all_zero() {
        let docs = ["some rule content", "more rule content"];
        let sims = corpus_cosine_similarities("   ", &docs);
        assert_eq!(sims, vec![0.0, 0.0]);
    }

    #[test]
    fn empty_document_list_yields_empty_vec() {
        assert!(corpus_cosine_similarities("query text", &[]).is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_has_similarity_one() {
        let text = "Providers shall establish a quality management system for high-risk AI systems.";
        let sim = semantic_similarity(text, text);
        assert!((sim - 1.0).abs() < 1e-9, "expected ~1.0, got {sim}");
    }

    #[test]
    fn unrelated_texts_have_low_similarity() {
        let old = "Providers shall establish a quality management system.";
        let new = "Notified bodies shall charge reasonable and proportionate fees.";
        let sim = semantic_similarity(old, new);
        assert!(sim < 0.5, "expected low similarity, got {sim}");
    }

    #[test]
    fn minor_addition_keeps_high_similarity() {
        let old = "Providers shall establish and maintain technical documentation for high-risk AI systems.";
        let new = "Providers shall establish and maintain comprehensive technical documentation for high-risk AI systems.";
        let sim = semantic_similarity(old, new);
        assert!(sim > 0.6, "expected high similarity, got {sim}");
    }

    #[test]
    fn blank_text_yields_zero() {
        assert_eq!(semantic_similarity("", "something"), 0.0);
        assert_eq!(semantic_similarity("something", "   "), 0.0);
    }
}
