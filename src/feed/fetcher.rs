use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;

use super::types::{Article, ArticleId, Sentiment};
use crate::remote::{GraphQlClient, GraphQlError};
use crate::session::Session;

const FEED_QUERY: &str = r#"
query {
  sentiment_analysis {
    id
    news_title
    news_content
    sentiment
    created_at
    news_summary
    news_author
    news_url
  }
}
"#;

#[derive(Deserialize)]
struct FeedData {
    #[serde(default)]
    sentiment_analysis: Vec<ArticleRecord>,
}

/// Wire form of one `sentiment_analysis` row.
#[derive(Deserialize)]
struct ArticleRecord {
    id: ArticleId,
    #[serde(default)]
    news_title: Option<String>,
    #[serde(default)]
    news_content: Option<String>,
    #[serde(default)]
    sentiment: Sentiment,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    news_summary: Option<String>,
    #[serde(default)]
    news_author: Option<String>,
    #[serde(default)]
    news_url: Option<String>,
    #[serde(default)]
    category: Option<String>,
}

impl ArticleRecord {
    fn into_article(self) -> Article {
        Article {
            id: self.id,
            title: Arc::from(self.news_title.unwrap_or_default()),
            author: non_empty(self.news_author),
            published: self.created_at.as_deref().and_then(parse_timestamp),
            summary: non_empty(self.news_summary),
            content: non_empty(self.news_content),
            sentiment: self.sentiment,
            category: non_empty(self.category),
            url: non_empty(self.news_url),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<Arc<str>> {
    value.filter(|s| !s.trim().is_empty()).map(Arc::from)
}

/// Hasura emits `timestamptz` with an offset and `timestamp` without one.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    match NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        Ok(naive) => Some(naive.and_utc()),
        Err(e) => {
            tracing::debug!(raw = %raw, error = %e, "Unparseable article timestamp");
            None
        }
    }
}

/// Retrieves the sentiment-tagged article collection.
///
/// Takes a [`Session`], which only the session gate hands out, so a fetch
/// cannot be attempted without an authenticated identity.
#[derive(Clone)]
pub struct FeedClient {
    graphql: GraphQlClient,
}

impl FeedClient {
    pub fn new(graphql: GraphQlClient) -> Self {
        Self { graphql }
    }

    /// Fetch articles in backend order.
    pub async fn fetch_articles(&self, session: &Session) -> Result<Vec<Article>, GraphQlError> {
        let data: FeedData = self
            .graphql
            .request(&session.access_token, FEED_QUERY, serde_json::json!({}))
            .await?;

        let articles: Vec<Article> = data
            .sentiment_analysis
            .into_iter()
            .map(ArticleRecord::into_article)
            .collect();
        tracing::info!(
            endpoint = %self.graphql.endpoint(),
            count = articles.len(),
            "Fetched news feed"
        );
        Ok(articles)
    }

    /// Like [`fetch_articles`](Self::fetch_articles), but a failure is logged
    /// and yields an empty feed.
    pub async fn load_feed(&self, session: &Session) -> Vec<Article> {
        match self.fetch_articles(session).await {
            Ok(articles) => articles,
            Err(e) => {
                tracing::warn!(identity = %session.identity, error = %e, "Feed fetch failed, showing empty feed");
                Vec::new()
            }
        }
    }
}
