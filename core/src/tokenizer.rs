use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::{BTreeMap, HashSet};
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref WORD: Regex = Regex::new(r"(?u)\b\w\w+\b").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "about","above","after","again","against","all","also","am","an","and","any","are","aren","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","cannot","could","couldn",
            "did","didn","do","does","doesn","doing","don","down","during",
            "each","either","else","etc","ever","every","few","for","from","further",
            "get","got","had","hadn","has","hasn","have","haven","having","he","her","here","hers","herself","him","himself","his","how",
            "if","in","into","is","isn","it","its","itself",
            "just","let","ll","may","me","might","more","most","must","mustn","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "please","re","same","she","should","shouldn","so","some","such",
            "than","that","the","their","theirs","them","themselves","then","there","these","they","this","those","through","to","too",
            "under","until","up","us","ve","very",
            "was","wasn","we","were","weren","what","when","where","which","while","who","whom","why","will","with","won","would","wouldn",
            "you","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(token)
}

/// Normalize text into index terms: NFKC, lowercase, words of two or more
/// word characters, stopword removal, and English stemming when `stem` is set.
///
/// Queries and corpus questions must both go through this function with the
/// same `stem` flag, otherwise query terms will not line up with the index vocabulary.
pub fn tokenize(text: &str, stem: bool) -> Vec<String> {
    let normalized = text.nfkc().collect::<String>().to_lowercase();
    WORD.find_iter(&normalized)
        .map(|m| m.as_str())
        .filter(|token| !is_stopword(token))
        .map(|token| if stem { STEMMER.stem(token).into_owned() } else { token.to_string() })
        .collect()
}

/// Raw term counts for one text, ordered by term for stable iteration.
pub fn term_counts(text: &str, stem: bool) -> BTreeMap<String, u32> {
    let mut counts = BTreeMap::new();
    for term in tokenize(text, stem) {
        *counts.entry(term).or_insert(0) += 1;
    }
    counts
}
