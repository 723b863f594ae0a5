//! News feed: article types and the authenticated fetcher.
//!
//! - [`types`] - `Article`, its opaque `ArticleId` and `Sentiment` label
//! - [`fetcher`] - GraphQL retrieval of the article collection

mod fetcher;
mod types;

pub use fetcher::FeedClient;
pub use types::{Article, ArticleId, Sentiment};
