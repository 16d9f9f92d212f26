// src/ingest/classify.rs
//! Optional sentiment tagging of collected records. The collector asks the configured
//! classifier once per new candidate; a classifier that has no opinion leaves the
//! record unlabelled and the digest renders it without a badge.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::record::{Record, Sentiment};

#[async_trait]
pub trait Classifier: Send + Sync + fmt::Debug {
    async fn classify(&self, rec: &Record) -> Option<Sentiment>;
    fn name(&self) -> &'static str;
}

pub type DynClassifier = Arc<dyn Classifier>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierKind {
    #[default]
    None,
    Lexicon,
}

/// `[collector.sentiment]`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SentimentSettings {
    #[serde(default)]
    pub kind: ClassifierKind,
    #[serde(default)]
    pub positive: Vec<String>,
    #[serde(default)]
    pub negative: Vec<String>,
}

impl SentimentSettings {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.kind == ClassifierKind::Lexicon && self.positive.is_empty() && self.negative.is_empty()
        {
            anyhow::bail!("lexicon classifier needs at least one positive or negative word");
        }
        Ok(())
    }
}

/// Build the configured classifier, or `None` when tagging is off.
pub fn build_classifier(cfg: &SentimentSettings) -> Option<DynClassifier> {
    match cfg.kind {
        ClassifierKind::None => None,
        ClassifierKind::Lexicon => Some(Arc::new(LexiconClassifier::new(
            &cfg.positive,
            &cfg.negative,
        ))),
    }
}

/// Never labels anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledClassifier;

#[async_trait]
impl Classifier for DisabledClassifier {
    async fn classify(&self, _rec: &Record) -> Option<Sentiment> {
        None
    }
    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Word-list scoring over title and snippet. A negator in the three tokens before a
/// word flips its sign.
#[derive(Debug, Clone)]
pub struct LexiconClassifier {
    weights: HashMap<String, i32>,
}

impl LexiconClassifier {
    pub fn new(positive: &[String], negative: &[String]) -> Self {
        let mut weights = HashMap::new();
        for w in positive {
            if let Some(t) = tokenize(w).next() {
                weights.insert(t, 1);
            }
        }
        for w in negative {
            if let Some(t) = tokenize(w).next() {
                weights.insert(t, -1);
            }
        }
        Self { weights }
    }

    pub fn score_text(&self, text: &str) -> i32 {
        let tokens: Vec<String> = tokenize(text).collect();
        let mut score = 0;
        for (i, tok) in tokens.iter().enumerate() {
            let base = self.weights.get(tok).copied().unwrap_or(0);
            if base == 0 {
                continue;
            }
            let negated = (1..=3).any(|k| i >= k && is_negator(&tokens[i - k]));
            score += if negated { -base } else { base };
        }
        score
    }
}

#[async_trait]
impl Classifier for LexiconClassifier {
    async fn classify(&self, rec: &Record) -> Option<Sentiment> {
        let mut text = rec.title.clone();
        if let Some(s) = &rec.snippet {
            text.push(' ');
            text.push_str(s);
        }
        Some(match self.score_text(&text) {
            s if s > 0 => Sentiment::Positive,
            s if s < 0 => Sentiment::Negative,
            _ => Sentiment::Neutral,
        })
    }
    fn name(&self) -> &'static str {
        "lexicon"
    }
}

fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "no" | "nunca" | "sin" | "jamás" | "ni" | "not" | "never" | "without"
    )
}
