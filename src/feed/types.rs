use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Article Identifier
// ============================================================================

/// Opaque article identifier.
///
/// The backend hands ids out as JSON integers or strings depending on the
/// column type; both normalize to the same string form so that set
/// membership survives a round-trip through local storage.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ArticleId(String);

impl ArticleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ArticleId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<i64> for ArticleId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for ArticleId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Signed(i64),
            Unsigned(u64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => Self(s),
            RawId::Signed(n) => Self(n.to_string()),
            RawId::Unsigned(n) => Self(n.to_string()),
        })
    }
}

// ============================================================================
// Sentiment
// ============================================================================

/// Sentiment label attached to an article by the analysis backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
    #[default]
    Unknown,
}

impl Sentiment {
    /// Case-insensitive parse; anything unrecognized is `Unknown`.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "positive" => Sentiment::Positive,
            "negative" => Sentiment::Negative,
            "neutral" => Sentiment::Neutral,
            _ => Sentiment::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
            Sentiment::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Sentiment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = Option::<String>::deserialize(deserializer)?;
        Ok(label.as_deref().map(Sentiment::parse).unwrap_or_default())
    }
}

// ============================================================================
// Article
// ============================================================================

/// A fetched news article. Immutable once fetched.
///
/// String fields use `Arc<str>` so the dashboard can hand out rows without
/// copying bodies around.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub id: ArticleId,
    pub title: Arc<str>,
    pub author: Option<Arc<str>>,
    pub published: Option<DateTime<Utc>>,
    pub summary: Option<Arc<str>>,
    pub content: Option<Arc<str>>,
    pub sentiment: Sentiment,
    pub category: Option<Arc<str>>,
    pub url: Option<Arc<str>>,
}

impl Article {
    /// Minimal article with only an id and title set.
    pub fn new(id: impl Into<ArticleId>, title: &str) -> Self {
        Self {
            id: id.into(),
            title: Arc::from(title),
            author: None,
            published: None,
            summary: None,
            content: None,
            sentiment: Sentiment::Unknown,
            category: None,
            url: None,
        }
    }

    /// Text fields a topic filter may match against, in match order.
    pub fn topic_fields(&self) -> impl Iterator<Item = &str> {
        [&self.category, &self.summary, &self.content]
            .into_iter()
            .filter_map(|field| field.as_deref())
    }
}
