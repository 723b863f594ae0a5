use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{json, Value};

use super::graphql::{GraphQlClient, GraphQlError};
use crate::feed::ArticleId;
use crate::preferences::{UserPreferenceState, ViewMode};
use crate::session::{Session, SessionIdentity};

const UPDATE_PROFILE_MUTATION: &str = r#"
mutation UpdateUserProfile(
  $user_id: uuid!,
  $preferences: jsonb!,
  $display_mode: String!,
  $saved_articles: jsonb!,
  $read_articles: jsonb!
) {
  update_user_profiles(
    where: { id: { _eq: $user_id } },
    _set: {
      preferences: $preferences,
      display_mode: $display_mode,
      saved_articles: $saved_articles,
      read_articles: $read_articles
    }
  ) {
    affected_rows
  }
}
"#;

const GET_PROFILE_QUERY: &str = r#"
query GetUserProfile($user_id: uuid!) {
  user_profiles_by_pk(id: $user_id) {
    preferences
    saved_articles
    read_articles
    display_mode
  }
}
"#;

const FIND_PROFILE_QUERY: &str = r#"
query GetUser($email: String!) {
  user_profiles(where: { email: { _eq: $email } }) {
    id
  }
}
"#;

const INSERT_PROFILE_MUTATION: &str = r#"
mutation InsertUser($id: uuid!, $email: String!) {
  insert_user_profiles_one(object: { id: $id, email: $email }) {
    id
  }
}
"#;

/// Remote copy of a user's preferences.
///
/// Never authoritative: it is only written from local snapshots and read
/// for display.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RemoteProfile {
    pub topics: Vec<String>,
    pub display_mode: ViewMode,
    pub saved_articles: Vec<ArticleId>,
    pub read_articles: Vec<ArticleId>,
}

#[derive(Deserialize)]
struct UpdateData {
    update_user_profiles: Option<AffectedRows>,
}

#[derive(Deserialize)]
struct AffectedRows {
    affected_rows: u64,
}

#[derive(Deserialize)]
struct ProfileData {
    user_profiles_by_pk: Option<ProfileRow>,
}

#[derive(Deserialize)]
struct ProfileRow {
    #[serde(default)]
    preferences: Value,
    #[serde(default)]
    saved_articles: Value,
    #[serde(default)]
    read_articles: Value,
    #[serde(default)]
    display_mode: Option<String>,
}

#[derive(Deserialize)]
struct FindData {
    user_profiles: Vec<Value>,
}

/// GraphQL client for the `user_profiles` table, bound to one session's token.
#[derive(Clone)]
pub struct ProfileClient {
    graphql: GraphQlClient,
    access_token: SecretString,
}

impl ProfileClient {
    pub fn new(graphql: GraphQlClient, session: &Session) -> Self {
        Self {
            graphql,
            access_token: session.access_token.clone(),
        }
    }

    /// Overwrite the remote profile's preference columns with `state`.
    pub async fn push_preferences(
        &self,
        identity: &SessionIdentity,
        state: &UserPreferenceState,
    ) -> Result<(), GraphQlError> {
        let variables = json!({
            "user_id": identity.as_str(),
            "preferences": { "preferences": state.selected_topics },
            "display_mode": state.view_mode.as_str(),
            "saved_articles": state.saved_article_ids,
            "read_articles": state.read_article_ids,
        });

        let data: UpdateData = self
            .graphql
            .request(&self.access_token, UPDATE_PROFILE_MUTATION, variables)
            .await?;

        match data.update_user_profiles {
            Some(rows) if rows.affected_rows > 0 => {
                tracing::debug!(identity = %identity, "Mirrored preferences to remote profile");
            }
            _ => {
                tracing::warn!(identity = %identity, "Remote profile row missing, nothing updated");
            }
        }
        Ok(())
    }

    /// Fetch the remote profile; a missing row yields the defaults.
    pub async fn fetch_profile(
        &self,
        identity: &SessionIdentity,
    ) -> Result<RemoteProfile, GraphQlError> {
        let data: ProfileData = self
            .graphql
            .request(
                &self.access_token,
                GET_PROFILE_QUERY,
                json!({ "user_id": identity.as_str() }),
            )
            .await?;

        let Some(row) = data.user_profiles_by_pk else {
            tracing::debug!(identity = %identity, "No remote profile, using defaults");
            return Ok(RemoteProfile::default());
        };

        Ok(RemoteProfile {
            topics: topics_from_value(&row.preferences),
            display_mode: row.display_mode.map(ViewMode::from).unwrap_or_default(),
            saved_articles: ids_from_value(&row.saved_articles),
            read_articles: ids_from_value(&row.read_articles),
        })
    }

    /// Create the profile row for a freshly signed-in user when none exists
    /// for their email yet.
    pub async fn ensure_profile(&self, session: &Session) -> Result<(), GraphQlError> {
        let found: FindData = self
            .graphql
            .request(
                &self.access_token,
                FIND_PROFILE_QUERY,
                json!({ "email": session.email }),
            )
            .await?;

        if !found.user_profiles.is_empty() {
            return Ok(());
        }

        let _: Value = self
            .graphql
            .request(
                &self.access_token,
                INSERT_PROFILE_MUTATION,
                json!({ "id": session.identity.as_str(), "email": session.email }),
            )
            .await?;
        tracing::info!(identity = %session.identity, "Created remote profile");
        Ok(())
    }
}

/// Topics come back as `{"preferences": [...]}`, or as a bare array from
/// older rows.
fn topics_from_value(value: &Value) -> Vec<String> {
    let list = match value {
        Value::Object(map) => map.get("preferences"),
        Value::Array(_) => Some(value),
        _ => None,
    };
    list.and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Article lists may hold bare ids or whole article objects, and older rows
/// stored the list as a JSON-encoded string.
fn ids_from_value(value: &Value) -> Vec<ArticleId> {
    match value {
        Value::String(encoded) => serde_json::from_str::<Value>(encoded)
            .map(|decoded| match decoded {
                Value::Array(_) => ids_from_value(&decoded),
                _ => Vec::new(),
            })
            .unwrap_or_default(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| {
                let id = match item {
                    Value::Object(map) => map.get("id")?,
                    other => other,
                };
                serde_json::from_value::<ArticleId>(id.clone()).ok()
            })
            .collect(),
        _ => Vec::new(),
    }
}
