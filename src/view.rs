//! Feed view model: derive the visible article list from the fetched feed and
//! the identity's preferences, then cut it to the pager's window.
//!
//! Everything here is pure. The [`Dashboard`](crate::app::Dashboard) owns the
//! inputs and calls into this module on every render.

use crate::feed::Article;
use crate::preferences::{UserPreferenceState, ViewMode};

/// Articles shown before the first "show more".
pub const DEFAULT_PAGE_SIZE: usize = 9;

/// Filter `articles` by view mode, or by topic when the view is `All`.
///
/// Fetched order is kept. Duplicate ids stay as separate rows; they share
/// read/saved membership since that is keyed by id.
pub fn derive<'a>(articles: &'a [Article], prefs: &UserPreferenceState) -> Vec<&'a Article> {
    match prefs.view_mode {
        ViewMode::SavedOnly => articles.iter().filter(|a| prefs.is_saved(&a.id)).collect(),
        ViewMode::ReadOnly => articles.iter().filter(|a| prefs.is_read(&a.id)).collect(),
        ViewMode::All if prefs.selected_topics.is_empty() => articles.iter().collect(),
        ViewMode::All => {
            let needles: Vec<String> = prefs
                .selected_topics
                .iter()
                .map(|t| t.to_lowercase())
                .collect();
            articles
                .iter()
                .filter(|a| matches_any_topic(a, &needles))
                .collect()
        }
    }
}

/// `needles` must already be lowercased.
fn matches_any_topic(article: &Article, needles: &[String]) -> bool {
    article.topic_fields().any(|field| {
        let haystack = field.to_lowercase();
        needles.iter().any(|needle| haystack.contains(needle.as_str()))
    })
}

/// The first `shown` items, or all of them when there are fewer.
pub fn paginate<T>(filtered: &[T], shown: usize) -> &[T] {
    &filtered[..shown.min(filtered.len())]
}

// ============================================================================
// Pager
// ============================================================================

/// Pagination cursor: how many derived rows are currently revealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    page_size: usize,
    shown: usize,
}

impl Pager {
    /// A zero page size would never reveal anything, so it is raised to one.
    pub fn new(page_size: usize) -> Self {
        let page_size = page_size.max(1);
        Self {
            page_size,
            shown: page_size,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn shown(&self) -> usize {
        self.shown
    }

    pub fn show_more(&mut self) {
        self.shown = self.shown.saturating_add(self.page_size);
    }

    /// Reveal exactly the first `pages` pages (at least one).
    pub fn show_pages(&mut self, pages: usize) {
        self.shown = self.page_size.saturating_mul(pages.max(1));
    }

    /// Back to the first page. Called whenever the view mode changes.
    pub fn reset(&mut self) {
        self.shown = self.page_size;
    }

    /// Whether a "show more" control should be offered for `len` rows.
    pub fn has_more(&self, len: usize) -> bool {
        len > self.shown
    }
}

impl Default for Pager {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::ArticleId;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn with_category(id: &str, category: &str) -> Article {
        Article {
            category: Some(Arc::from(category)),
            ..Article::new(id, &format!("Article {id}"))
        }
    }

    fn ids(articles: &[&Article]) -> Vec<String> {
        articles.iter().map(|a| a.id.to_string()).collect()
    }

    fn two_articles() -> Vec<Article> {
        vec![with_category("1", "Tech"), with_category("2", "Sports")]
    }

    #[test]
    fn test_topic_match_is_case_insensitive_substring() {
        let prefs = UserPreferenceState {
            selected_topics: vec!["tech".to_string()],
            ..Default::default()
        };
        assert_eq!(ids(&derive(&two_articles(), &prefs)), vec!["1"]);
    }

    #[test]
    fn test_saved_view_ignores_topics() {
        let mut prefs = UserPreferenceState {
            selected_topics: vec!["tech".to_string()],
            view_mode: ViewMode::SavedOnly,
            ..Default::default()
        };
        prefs.toggle_saved(&ArticleId::from("2"));
        assert_eq!(ids(&derive(&two_articles(), &prefs)), vec!["2"]);
    }

    #[test]
    fn test_read_view_ignores_topics() {
        let mut prefs = UserPreferenceState {
            selected_topics: vec!["sports".to_string()],
            view_mode: ViewMode::ReadOnly,
            ..Default::default()
        };
        prefs.toggle_read(&ArticleId::from("1"));
        assert_eq!(ids(&derive(&two_articles(), &prefs)), vec!["1"]);
    }

    #[test]
    fn test_no_topics_keeps_everything_in_order() {
        let articles = vec![
            with_category("3", "Health"),
            with_category("1", "Tech"),
            with_category("2", "Sports"),
        ];
        let derived = derive(&articles, &UserPreferenceState::default());
        assert_eq!(ids(&derived), vec!["3", "1", "2"]);
    }

    #[test]
    fn test_match_in_summary_or_content() {
        let by_summary = Article {
            summary: Some(Arc::from("New BUSINESS rules")),
            ..Article::new("1", "a")
        };
        let by_content = Article {
            content: Some(Arc::from("The match went to penalties. sports desk")),
            ..Article::new("2", "b")
        };
        let neither = with_category("3", "Weather");
        let articles = vec![by_summary, by_content, neither];

        let prefs = UserPreferenceState {
            selected_topics: vec!["Business".to_string(), "Sports".to_string()],
            ..Default::default()
        };
        assert_eq!(ids(&derive(&articles, &prefs)), vec!["1", "2"]);
    }

    #[test]
    fn test_article_without_topic_fields() {
        let articles = vec![Article::new("1", "Bare")];
        let filtered = UserPreferenceState {
            selected_topics: vec!["tech".to_string()],
            ..Default::default()
        };
        assert!(derive(&articles, &filtered).is_empty());
        assert_eq!(derive(&articles, &UserPreferenceState::default()).len(), 1);
    }

    #[test]
    fn test_duplicate_ids_share_membership() {
        let articles = vec![with_category("7", "Tech"), with_category("7", "Tech")];
        let mut prefs = UserPreferenceState {
            view_mode: ViewMode::SavedOnly,
            ..Default::default()
        };
        assert!(derive(&articles, &prefs).is_empty());
        prefs.toggle_saved(&ArticleId::from("7"));
        assert_eq!(derive(&articles, &prefs).len(), 2);
    }

    #[test]
    fn test_paginate_twenty_items() {
        let items: Vec<u32> = (0..20).collect();
        let mut pager = Pager::new(9);
        assert_eq!(paginate(&items, pager.shown()).len(), 9);
        assert!(pager.has_more(items.len()));

        pager.show_more();
        assert_eq!(paginate(&items, pager.shown()).len(), 18);

        pager.show_more();
        assert_eq!(paginate(&items, pager.shown()), &items[..]);
        assert!(!pager.has_more(items.len()));

        pager.reset();
        assert_eq!(pager.shown(), 9);
    }

    #[test]
    fn test_paginate_short_and_empty() {
        let items = [1, 2, 3];
        assert_eq!(paginate(&items, 9), &[1, 2, 3]);
        assert!(paginate::<u8>(&[], 9).is_empty());
    }

    #[test]
    fn test_show_pages_jumps_directly() {
        let mut pager = Pager::new(9);
        pager.show_pages(3);
        assert_eq!(pager.shown(), 27);
        pager.show_pages(0);
        assert_eq!(pager.shown(), 9);

        pager.show_pages(usize::MAX);
        assert_eq!(pager.shown(), usize::MAX);
        assert!(!pager.has_more(20));
    }

    #[test]
    fn test_zero_page_size_is_raised() {
        let pager = Pager::new(0);
        assert_eq!(pager.page_size(), 1);
        assert_eq!(pager.shown(), 1);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        const TOPICS: &[&str] = &["Tech", "Sports", "Health", "Business"];

        fn arb_article() -> impl Strategy<Value = Article> {
            (0u8..6, proptest::option::of(0usize..TOPICS.len())).prop_map(|(id, topic)| {
                let mut article = Article::new(ArticleId::from(i64::from(id)), "t");
                article.category = topic.map(|i| Arc::from(TOPICS[i]));
                article
            })
        }

        fn arb_prefs() -> impl Strategy<Value = UserPreferenceState> {
            (
                proptest::collection::btree_set(0u8..6, 0..4),
                proptest::collection::btree_set(0u8..6, 0..4),
                proptest::sample::subsequence(TOPICS.to_vec(), 0..3),
                prop_oneof![
                    Just(ViewMode::All),
                    Just(ViewMode::SavedOnly),
                    Just(ViewMode::ReadOnly)
                ],
            )
                .prop_map(|(read, saved, topics, view_mode)| UserPreferenceState {
                    read_article_ids: read.into_iter().map(|i| ArticleId::from(i64::from(i))).collect(),
                    saved_article_ids: saved.into_iter().map(|i| ArticleId::from(i64::from(i))).collect(),
                    selected_topics: topics.into_iter().map(str::to_lowercase).collect(),
                    view_mode,
                })
        }

        proptest! {
            #[test]
            fn derive_is_idempotent(
                articles in proptest::collection::vec(arb_article(), 0..20),
                prefs in arb_prefs(),
            ) {
                prop_assert_eq!(derive(&articles, &prefs), derive(&articles, &prefs));
            }

            #[test]
            fn derive_preserves_fetch_order(
                articles in proptest::collection::vec(arb_article(), 0..20),
                prefs in arb_prefs(),
            ) {
                let positions: Vec<usize> = derive(&articles, &prefs)
                    .into_iter()
                    .map(|kept| articles.iter().position(|a| std::ptr::eq(a, kept)).unwrap())
                    .collect();
                prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));
            }

            #[test]
            fn toggle_read_leaves_topics_and_view(
                prefs in arb_prefs(),
                id in 0u8..6,
            ) {
                let mut toggled = prefs.clone();
                toggled.toggle_read(&ArticleId::from(i64::from(id)));
                prop_assert_eq!(&toggled.selected_topics, &prefs.selected_topics);
                prop_assert_eq!(toggled.view_mode, prefs.view_mode);
                prop_assert_eq!(&toggled.saved_article_ids, &prefs.saved_article_ids);
            }

            #[test]
            fn paginate_never_exceeds_shown(len in 0usize..50, page in 1usize..12, clicks in 0usize..5) {
                let items: Vec<usize> = (0..len).collect();
                let mut pager = Pager::new(page);
                for _ in 0..clicks {
                    pager.show_more();
                }
                let window = paginate(&items, pager.shown());
                prop_assert_eq!(window.len(), len.min(page * (clicks + 1)));
                prop_assert_eq!(pager.has_more(len), len > window.len());
            }
        }
    }
}
