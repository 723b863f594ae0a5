use std::sync::Arc;

use crate::feed::{Article, ArticleId, FeedClient};
use crate::preferences::{PreferenceStore, UserPreferenceState, ViewMode};
use crate::session::{Redirect, SessionGate, SessionIdentity};
use crate::sync::SyncHandle;
use crate::view::{self, Pager};

// ============================================================================
// Dashboard
// ============================================================================

/// Owner of one identity's dashboard state: the fetched feed, the preference
/// state and the pagination cursor.
///
/// Every mutating method changes the in-memory state, awaits the local save of
/// the full snapshot, and only then hands the same snapshot to the sync hook.
/// Each save therefore reflects exactly the interaction that triggered it.
pub struct Dashboard {
    identity: SessionIdentity,
    store: PreferenceStore,
    sync: SyncHandle,
    prefs: UserPreferenceState,
    /// `Arc` so callers can hold a feed snapshot while the dashboard refreshes.
    articles: Arc<Vec<Article>>,
    pager: Pager,
}

impl Dashboard {
    /// Load the identity's stored preferences. The caller obtains `identity`
    /// from the session gate.
    pub async fn open(
        identity: SessionIdentity,
        store: PreferenceStore,
        sync: SyncHandle,
        page_size: usize,
    ) -> Self {
        let prefs = store.load(&identity).await;
        Self {
            identity,
            store,
            sync,
            prefs,
            articles: Arc::new(Vec::new()),
            pager: Pager::new(page_size),
        }
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub fn preferences(&self) -> &UserPreferenceState {
        &self.prefs
    }

    pub fn view_mode(&self) -> ViewMode {
        self.prefs.view_mode
    }

    pub fn pager(&self) -> Pager {
        self.pager
    }

    pub fn articles(&self) -> Arc<Vec<Article>> {
        Arc::clone(&self.articles)
    }

    // ------------------------------------------------------------------------
    // Feed
    // ------------------------------------------------------------------------

    /// Swap in a freshly fetched feed. The pager is left alone.
    pub fn replace_articles(&mut self, articles: Vec<Article>) {
        self.articles = Arc::new(articles);
    }

    /// Re-check the session, then fetch. A fetch failure leaves an empty feed.
    ///
    /// Returns the number of fetched articles. On a redirect nothing is
    /// fetched and the current feed is kept.
    pub async fn refresh(&mut self, gate: &SessionGate, feed: &FeedClient) -> Result<usize, Redirect> {
        let session = gate.ensure_authenticated().await?;
        if session.identity != self.identity {
            tracing::warn!(
                dashboard = %self.identity,
                session = %session.identity,
                "Session identity changed under the dashboard"
            );
            return Err(Redirect::SignIn);
        }

        let articles = feed.load_feed(&session).await;
        let count = articles.len();
        self.replace_articles(articles);
        Ok(count)
    }

    pub fn find_article(&self, id: &ArticleId) -> Option<&Article> {
        self.articles.iter().find(|a| &a.id == id)
    }

    // ------------------------------------------------------------------------
    // Derived view
    // ------------------------------------------------------------------------

    /// Every article that passes the current filters, in fetched order.
    pub fn filtered(&self) -> Vec<&Article> {
        view::derive(&self.articles, &self.prefs)
    }

    /// The filtered list cut to the pager's window.
    pub fn visible(&self) -> Vec<&Article> {
        let mut filtered = self.filtered();
        filtered.truncate(self.pager.shown());
        filtered
    }

    pub fn has_more(&self) -> bool {
        self.pager.has_more(self.filtered().len())
    }

    pub fn show_more(&mut self) {
        self.pager.show_more();
    }

    pub fn show_pages(&mut self, pages: usize) {
        self.pager.show_pages(pages);
    }

    // ------------------------------------------------------------------------
    // Interactions
    // ------------------------------------------------------------------------

    /// Returns whether the article is now read.
    pub async fn toggle_read(&mut self, id: &ArticleId) -> bool {
        let now_read = self.prefs.toggle_read(id);
        tracing::debug!(article = %id, read = now_read, "Toggled read");
        self.persist().await;
        now_read
    }

    /// Returns whether the article is now saved.
    pub async fn toggle_saved(&mut self, id: &ArticleId) -> bool {
        let now_saved = self.prefs.toggle_saved(id);
        tracing::debug!(article = %id, saved = now_saved, "Toggled saved");
        self.persist().await;
        now_saved
    }

    /// Returns whether the topic is now selected.
    pub async fn toggle_topic(&mut self, topic: &str) -> bool {
        let selected = self.prefs.toggle_topic(topic);
        tracing::debug!(topic = %topic, selected, "Toggled topic");
        self.persist().await;
        selected
    }

    pub async fn clear_topics(&mut self) {
        self.prefs.selected_topics.clear();
        self.persist().await;
    }

    /// Home always lands on the unfiltered-by-set view.
    pub async fn show_home(&mut self) -> ViewMode {
        self.switch_view(ViewMode::All).await
    }

    /// Saved view, or back to `All` when already there.
    pub async fn toggle_saved_view(&mut self) -> ViewMode {
        let next = match self.prefs.view_mode {
            ViewMode::SavedOnly => ViewMode::All,
            _ => ViewMode::SavedOnly,
        };
        self.switch_view(next).await
    }

    /// Read view, or back to `All` when already there.
    pub async fn toggle_read_view(&mut self) -> ViewMode {
        let next = match self.prefs.view_mode {
            ViewMode::ReadOnly => ViewMode::All,
            _ => ViewMode::ReadOnly,
        };
        self.switch_view(next).await
    }

    async fn switch_view(&mut self, mode: ViewMode) -> ViewMode {
        if self.prefs.view_mode != mode {
            self.prefs.view_mode = mode;
            self.pager.reset();
            tracing::debug!(view_mode = mode.as_str(), "Switched view");
        }
        self.persist().await;
        mode
    }

    async fn persist(&self) {
        self.store.save(&self.identity, &self.prefs).await;
        self.sync.notify(&self.identity, &self.prefs);
    }

    // ------------------------------------------------------------------------
    // Display helpers
    // ------------------------------------------------------------------------

    pub fn saved_count(&self) -> usize {
        self.prefs.saved_article_ids.len()
    }

    pub fn read_count(&self) -> usize {
        self.prefs.read_article_ids.len()
    }

    /// Label for the topic picker.
    pub fn topic_label(&self) -> String {
        match self.prefs.selected_topics.len() {
            0 => "Select preferences".to_string(),
            n => format!("{n} selected"),
        }
    }

    /// Shown when the filtered list is empty.
    pub fn empty_message(&self) -> &'static str {
        match self.prefs.view_mode {
            ViewMode::SavedOnly => "No saved articles yet.",
            ViewMode::ReadOnly => "No read articles yet.",
            ViewMode::All => "No news available at the moment.",
        }
    }

    /// Wait for any pending remote sync, then drop the dashboard.
    pub async fn close(self) {
        self.sync.shutdown().await;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;
    use pretty_assertions::assert_eq;

    async fn open_dashboard(db: &Database, id: &str) -> Dashboard {
        Dashboard::open(
            SessionIdentity::new(id),
            PreferenceStore::new(db.clone()),
            SyncHandle::disabled(),
            9,
        )
        .await
    }

    fn twenty_articles() -> Vec<Article> {
        (1..=20)
            .map(|i| {
                let mut a = Article::new(i64::from(i), &format!("Story {i}"));
                a.category = Some(Arc::from(if i % 2 == 0 { "Sports" } else { "Technology" }));
                a
            })
            .collect()
    }

    #[tokio::test]
    async fn test_open_fresh_identity_has_defaults() {
        let db = Database::open(":memory:").await.unwrap();
        let dash = open_dashboard(&db, "user-1").await;

        assert_eq!(dash.preferences(), &UserPreferenceState::default());
        assert_eq!(dash.pager().shown(), 9);
        assert!(dash.visible().is_empty());
        assert_eq!(dash.empty_message(), "No news available at the moment.");
        assert_eq!(dash.topic_label(), "Select preferences");
    }

    #[tokio::test]
    async fn test_pagination_nine_then_eighteen() {
        let db = Database::open(":memory:").await.unwrap();
        let mut dash = open_dashboard(&db, "user-1").await;
        dash.replace_articles(twenty_articles());

        assert_eq!(dash.visible().len(), 9);
        assert!(dash.has_more());
        dash.show_more();
        assert_eq!(dash.visible().len(), 18);
        dash.show_more();
        assert_eq!(dash.visible().len(), 20);
        assert!(!dash.has_more());
    }

    #[tokio::test]
    async fn test_show_pages_with_huge_count() {
        let db = Database::open(":memory:").await.unwrap();
        let mut dash = open_dashboard(&db, "user-1").await;
        dash.replace_articles(twenty_articles());

        dash.show_pages(2);
        assert_eq!(dash.visible().len(), 18);
        dash.show_pages(usize::MAX);
        assert_eq!(dash.visible().len(), 20);
        assert!(!dash.has_more());
    }

    #[tokio::test]
    async fn test_toggle_does_not_move_pager() {
        let db = Database::open(":memory:").await.unwrap();
        let mut dash = open_dashboard(&db, "user-1").await;
        dash.replace_articles(twenty_articles());
        dash.show_more();

        assert!(dash.toggle_read(&ArticleId::from("3")).await);
        assert!(dash.toggle_saved(&ArticleId::from("3")).await);
        assert_eq!(dash.pager().shown(), 18);
        assert_eq!(dash.view_mode(), ViewMode::All);
        assert_eq!((dash.read_count(), dash.saved_count()), (1, 1));
    }

    #[tokio::test]
    async fn test_view_change_resets_pager() {
        let db = Database::open(":memory:").await.unwrap();
        let mut dash = open_dashboard(&db, "user-1").await;
        dash.replace_articles(twenty_articles());
        dash.show_more();

        assert_eq!(dash.toggle_saved_view().await, ViewMode::SavedOnly);
        assert_eq!(dash.pager().shown(), 9);
        assert_eq!(dash.empty_message(), "No saved articles yet.");
    }

    #[tokio::test]
    async fn test_view_controls_toggle_back_to_all() {
        let db = Database::open(":memory:").await.unwrap();
        let mut dash = open_dashboard(&db, "user-1").await;

        assert_eq!(dash.toggle_saved_view().await, ViewMode::SavedOnly);
        assert_eq!(dash.toggle_saved_view().await, ViewMode::All);
        assert_eq!(dash.toggle_read_view().await, ViewMode::ReadOnly);
        assert_eq!(dash.empty_message(), "No read articles yet.");
        assert_eq!(dash.toggle_saved_view().await, ViewMode::SavedOnly);
        assert_eq!(dash.show_home().await, ViewMode::All);
        assert_eq!(dash.show_home().await, ViewMode::All);
    }

    #[tokio::test]
    async fn test_topics_filter_only_in_all_view() {
        let db = Database::open(":memory:").await.unwrap();
        let mut dash = open_dashboard(&db, "user-1").await;
        dash.replace_articles(twenty_articles());

        assert!(dash.toggle_topic("sports").await);
        assert_eq!(dash.topic_label(), "1 selected");
        assert_eq!(dash.filtered().len(), 10);
        assert!(dash.filtered().iter().all(|a| a.category.as_deref() == Some("Sports")));

        dash.toggle_saved(&ArticleId::from("1")).await;
        dash.toggle_saved_view().await;
        let saved: Vec<_> = dash.filtered().iter().map(|a| a.id.to_string()).collect();
        assert_eq!(saved, vec!["1"]);

        dash.show_home().await;
        dash.clear_topics().await;
        assert_eq!(dash.filtered().len(), 20);
    }

    #[tokio::test]
    async fn test_every_mutation_is_persisted() {
        let db = Database::open(":memory:").await.unwrap();
        {
            let mut dash = open_dashboard(&db, "user-1").await;
            dash.toggle_read(&ArticleId::from("5")).await;
            dash.toggle_topic("Health").await;
            dash.toggle_read_view().await;
        }

        let reopened = open_dashboard(&db, "user-1").await;
        let prefs = reopened.preferences();
        assert!(prefs.is_read(&ArticleId::from("5")));
        assert_eq!(prefs.selected_topics, vec!["Health".to_string()]);
        assert_eq!(prefs.view_mode, ViewMode::ReadOnly);
        assert_eq!(reopened.pager().shown(), 9);

        let other = open_dashboard(&db, "user-2").await;
        assert_eq!(other.preferences(), &UserPreferenceState::default());
    }

    #[tokio::test]
    async fn test_refresh_without_session_fetches_nothing() {
        use crate::remote::GraphQlClient;
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let db = Database::open(":memory:").await.unwrap();
        let gate = SessionGate::new(db.clone());
        let feed = FeedClient::new(GraphQlClient::new(reqwest::Client::new(), &mock_server.uri()));
        let mut dash = open_dashboard(&db, "user-1").await;
        dash.replace_articles(twenty_articles());

        assert_eq!(dash.refresh(&gate, &feed).await, Err(Redirect::SignIn));
        assert_eq!(dash.articles().len(), 20);
    }

    #[tokio::test]
    async fn test_duplicate_ids_toggle_together() {
        let db = Database::open(":memory:").await.unwrap();
        let mut dash = open_dashboard(&db, "user-1").await;
        dash.replace_articles(vec![Article::new("7", "a"), Article::new("7", "b")]);

        dash.toggle_saved(&ArticleId::from("7")).await;
        dash.toggle_saved_view().await;
        assert_eq!(dash.visible().len(), 2);
        assert_eq!(dash.find_article(&ArticleId::from("7")).map(|a| &*a.title), Some("a"));
    }
}
