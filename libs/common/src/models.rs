//! Wire models shared by the services and the client store
//!
//! JSON field names are camelCase on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Public view of a user, also used for activity attendees
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub username: String,
    pub display_name: String,
    pub bio: Option<String>,
    pub image: Option<String>,
    #[serde(default)]
    pub following: bool,
    #[serde(default)]
    pub followers_count: i64,
    #[serde(default)]
    pub following_count: i64,
}

impl Profile {
    pub fn new(username: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            display_name: display_name.into(),
            bio: None,
            image: None,
            following: false,
            followers_count: 0,
            following_count: 0,
        }
    }
}

/// Activity as returned by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityDto {
    pub id: Uuid,
    pub title: String,
    pub date: DateTime<Utc>,
    pub description: String,
    pub category: String,
    pub city: String,
    pub venue: String,
    pub is_cancelled: bool,
    pub host_username: String,
    #[serde(default)]
    pub attendees: Vec<Profile>,
}

impl ActivityDto {
    pub fn is_attended_by(&self, username: &str) -> bool {
        self.attendees.iter().any(|a| a.username == username)
    }

    pub fn host(&self) -> Option<&Profile> {
        self.attendees
            .iter()
            .find(|a| a.username == self.host_username)
    }
}

/// Create/edit payload for an activity
///
/// The client generates the id on create; edits take the id from the route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityInput {
    pub id: Option<Uuid>,
    #[serde(default)]
    pub title: String,
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub venue: String,
}

impl From<&ActivityDto> for ActivityInput {
    fn from(activity: &ActivityDto) -> Self {
        Self {
            id: Some(activity.id),
            title: activity.title.clone(),
            date: Some(activity.date),
            description: activity.description.clone(),
            category: activity.category.clone(),
            city: activity.city.clone(),
            venue: activity.venue.clone(),
        }
    }
}

/// Chat comment as relayed to subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDto {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub body: String,
    pub username: String,
    pub display_name: String,
    pub image: Option<String>,
}

/// Events pushed from the relay to a subscriber
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerChatEvent {
    /// Full history, newest first, sent once on connect
    LoadComments(Vec<CommentDto>),
    /// A comment someone just posted
    ReceiveComment(CommentDto),
}

/// Events sent from a subscriber to the relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientChatEvent {
    SendComment(NewComment),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub body: String,
    pub activity_id: Uuid,
}

/// Session payload returned by the account endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub username: String,
    pub display_name: String,
    pub image: Option<String>,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub username: String,
}
