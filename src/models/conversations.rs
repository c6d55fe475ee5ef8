use serde::{Deserialize, Serialize};

/// Backend-issued conversation identifier.
pub type ConversationId = i64;

/// Which side of the marketplace an account is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Promoter,
}

/// The authenticated account, as returned by `GET /user`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
}

/// `GET /user` answers either with the user or with `{ "data": user }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CurrentUserEnvelope {
    Data { data: CurrentUser },
    Bare(CurrentUser),
}

impl CurrentUserEnvelope {
    pub fn into_inner(self) -> CurrentUser {
        match self {
            Self::Data { data } | Self::Bare(data) => data,
        }
    }
}

// ── DTOs ──

/// Request body for `POST /conversations`: create or reuse the conversation
/// with another user.
#[derive(Debug, Clone, Serialize)]
pub struct OpenConversation {
    pub user_id: i64,
}

/// Response for `POST /conversations`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationOpened {
    pub conversation_id: ConversationId,
}
