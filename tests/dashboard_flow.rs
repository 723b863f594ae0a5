//! End-to-end dashboard flow against mocked auth and GraphQL services:
//! sign in, load the feed, filter, paginate, mirror, sign out.

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use reachnews::app::Dashboard;
use reachnews::feed::{ArticleId, FeedClient};
use reachnews::preferences::{PreferenceStore, ViewMode};
use reachnews::remote::{AuthClient, GraphQlClient, ProfileClient};
use reachnews::session::{Redirect, SessionGate};
use reachnews::storage::Database;
use reachnews::sync::{spawn_profile_sync, SyncHandle};

fn feed_rows(count: usize) -> serde_json::Value {
    let rows: Vec<_> = (1..=count)
        .map(|i| {
            json!({
                "id": i,
                "news_title": format!("Story {i}"),
                "news_content": if i % 3 == 0 { "A new chip from a technology giant." } else { "Local weather update." },
                "sentiment": if i % 2 == 0 { "negative" } else { "positive" },
                "created_at": "2025-02-01T08:00:00+00:00",
                "news_summary": null,
                "news_author": "Desk",
                "news_url": format!("https://news.example.com/{i}")
            })
        })
        .collect();
    json!({ "data": { "sentiment_analysis": rows } })
}

async fn mount_auth(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/auth/signin/email-password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "session": {
                "accessToken": "jwt",
                "accessTokenExpiresIn": 900,
                "refreshToken": "refresh",
                "user": { "id": "user-1", "email": "ada@example.com", "displayName": "Ada" }
            }
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/signout"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
}

async fn mount_feed(server: &MockServer, count: usize) {
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("sentiment_analysis"))
        .respond_with(ResponseTemplate::new(200).set_body_json(feed_rows(count)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_session_flow() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_feed(&server, 20).await;

    let db = Database::open(":memory:").await.unwrap();
    let gate = SessionGate::new(db.clone());
    let auth = AuthClient::new(reqwest::Client::new(), &format!("{}/auth", server.uri()));
    let graphql = GraphQlClient::new(reqwest::Client::new(), &format!("{}/graphql", server.uri()));
    let feed = FeedClient::new(graphql);

    // No session yet: the gate redirects before anything is loaded.
    assert!(matches!(gate.ensure_authenticated().await, Err(Redirect::SignIn)));

    let password = SecretString::from("pw".to_string());
    let session = auth.sign_in("ada@example.com", &password).await.unwrap();
    gate.establish(&session).await.unwrap();
    let session = gate.ensure_authenticated().await.unwrap();

    let mut dash = Dashboard::open(
        session.identity.clone(),
        PreferenceStore::new(db.clone()),
        SyncHandle::disabled(),
        9,
    )
    .await;
    assert_eq!(dash.refresh(&gate, &feed).await, Ok(20));
    assert_eq!(dash.visible().len(), 9);
    dash.show_more();
    assert_eq!(dash.visible().len(), 18);

    // Topic filter matches content case-insensitively.
    dash.toggle_topic("Technology").await;
    let ids: Vec<String> = dash.filtered().iter().map(|a| a.id.to_string()).collect();
    assert_eq!(ids, vec!["3", "6", "9", "12", "15", "18"]);

    dash.toggle_saved(&ArticleId::from("20")).await;
    dash.toggle_read(&ArticleId::from("3")).await;
    assert_eq!(dash.toggle_saved_view().await, ViewMode::SavedOnly);
    assert_eq!(dash.pager().shown(), 9);
    let saved: Vec<String> = dash.visible().iter().map(|a| a.id.to_string()).collect();
    assert_eq!(saved, vec!["20"]);
    dash.close().await;

    // Reopening restores everything except the pager.
    let dash = Dashboard::open(
        session.identity.clone(),
        PreferenceStore::new(db.clone()),
        SyncHandle::disabled(),
        9,
    )
    .await;
    assert_eq!(dash.view_mode(), ViewMode::SavedOnly);
    assert_eq!((dash.saved_count(), dash.read_count()), (1, 1));
    assert_eq!(dash.topic_label(), "1 selected");
    dash.close().await;

    // Sign-out wipes the local record and the session.
    gate.sign_out(&auth).await;
    assert!(matches!(gate.ensure_authenticated().await, Err(Redirect::SignIn)));
    let fresh = Dashboard::open(
        session.identity.clone(),
        PreferenceStore::new(db),
        SyncHandle::disabled(),
        9,
    )
    .await;
    assert_eq!(fresh.view_mode(), ViewMode::All);
    assert_eq!(fresh.saved_count(), 0);
}

#[tokio::test]
async fn test_feed_failure_shows_empty_state() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let db = Database::open(":memory:").await.unwrap();
    let gate = SessionGate::new(db.clone());
    let auth_server = MockServer::start().await;
    mount_auth(&auth_server).await;
    let auth = AuthClient::new(reqwest::Client::new(), &format!("{}/auth", auth_server.uri()));
    let session = auth
        .sign_in("ada@example.com", &SecretString::from("pw".to_string()))
        .await
        .unwrap();
    gate.establish(&session).await.unwrap();

    let feed = FeedClient::new(GraphQlClient::new(reqwest::Client::new(), &server.uri()));
    let mut dash = Dashboard::open(
        session.identity.clone(),
        PreferenceStore::new(db),
        SyncHandle::disabled(),
        9,
    )
    .await;

    assert_eq!(dash.refresh(&gate, &feed).await, Ok(0));
    assert!(dash.visible().is_empty());
    assert_eq!(dash.empty_message(), "No news available at the moment.");
}

#[tokio::test]
async fn test_remote_mirror_failure_never_blocks_local_save() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("update_user_profiles"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let db = Database::open(":memory:").await.unwrap();
    let auth = AuthClient::new(reqwest::Client::new(), &format!("{}/auth", server.uri()));
    let session = auth
        .sign_in("ada@example.com", &SecretString::from("pw".to_string()))
        .await
        .unwrap();
    let graphql = GraphQlClient::new(reqwest::Client::new(), &format!("{}/graphql", server.uri()));
    let sync = spawn_profile_sync(ProfileClient::new(graphql, &session));

    let mut dash = Dashboard::open(
        session.identity.clone(),
        PreferenceStore::new(db.clone()),
        sync,
        9,
    )
    .await;
    assert!(dash.toggle_saved(&ArticleId::from("5")).await);
    assert!(dash.toggle_read(&ArticleId::from("5")).await);
    dash.close().await;

    let requests = server.received_requests().await.unwrap();
    let mirrored = requests
        .iter()
        .filter(|r| String::from_utf8_lossy(&r.body).contains("update_user_profiles"))
        .count();
    assert!((1..=2).contains(&mirrored));

    let stored = PreferenceStore::new(db).load(&session.identity).await;
    assert!(stored.is_saved(&ArticleId::from("5")));
    assert!(stored.is_read(&ArticleId::from("5")));
}
