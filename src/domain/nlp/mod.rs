//! Text primitives: tokenization, TF-IDF, n-gram and fuzzy scores

pub mod fuzzy;
pub mod ngram;
pub mod simd;
pub mod tfidf;
pub mod tokenizer;

pub use ngram::{ngram_similarity, packed_ngrams, TRIGRAM};
pub use tfidf::{cosine_similarity, SparseVector, TfIdf};
pub use tokenizer::{is_stop_word, item_text, theme_text, tokenize, tokenize_filtered};
