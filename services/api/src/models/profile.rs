//! Follow list parameters

use serde::Deserialize;

/// Which side of the follow relation to list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowPredicate {
    #[default]
    Followers,
    Following,
}

/// Query string of `GET /follow/:username`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FollowParams {
    #[serde(default)]
    pub predicate: FollowPredicate,
}
