//! Request handlers
//!
//! One function per request kind. Each returns `Ok(None)` when the addressed
//! entity does not exist and an `Outcome` otherwise; HTTP concerns stay in
//! `routes`.

use anyhow::Result;
use chrono::Utc;
use common::{
    Outcome, PagedList,
    filter::ActivityParams,
    jwt::Claims,
    models::{ActivityDto, ActivityInput, CommentDto, NewComment, Profile},
};
use uuid::Uuid;

use crate::{models::FollowPredicate, state::AppState};

pub async fn list_activities(
    state: &AppState,
    claims: &Claims,
    params: &ActivityParams,
) -> Result<Option<Outcome<PagedList<ActivityDto>>>> {
    let page = state
        .activities
        .list(
            claims.sub,
            params.filter(),
            params.effective_start_date(Utc::now()),
            params.paging(),
        )
        .await?;

    Ok(Some(Outcome::success(page)))
}

pub async fn activity_details(
    state: &AppState,
    claims: &Claims,
    id: Uuid,
) -> Result<Option<Outcome<ActivityDto>>> {
    let activity = state.activities.details(id, claims.sub).await?;
    Ok(activity.map(Outcome::success))
}

pub async fn create_activity(
    state: &AppState,
    claims: &Claims,
    input: &ActivityInput,
) -> Result<Option<Outcome<()>>> {
    let created = state.activities.create(input, claims.sub).await?;
    Ok(Some(Outcome::from_persisted(created, (), "Failed to create activity")))
}

pub async fn edit_activity(
    state: &AppState,
    id: Uuid,
    input: &ActivityInput,
) -> Result<Option<Outcome<()>>> {
    if !state.activities.exists(id).await? {
        return Ok(None);
    }

    let updated = state.activities.update(id, input).await?;
    Ok(Some(Outcome::from_persisted(updated, (), "Failed to update activity")))
}

pub async fn delete_activity(state: &AppState, id: Uuid) -> Result<Option<Outcome<()>>> {
    if !state.activities.exists(id).await? {
        return Ok(None);
    }

    let deleted = state.activities.delete(id).await?;
    Ok(Some(Outcome::from_persisted(deleted, (), "Failed to delete the activity")))
}

pub async fn update_attendance(
    state: &AppState,
    claims: &Claims,
    id: Uuid,
) -> Result<Option<Outcome<()>>> {
    let change = state.activities.update_attendance(id, claims.sub).await?;
    Ok(change.map(|_| Outcome::success(())))
}

pub async fn profile_details(
    state: &AppState,
    claims: &Claims,
    username: &str,
) -> Result<Option<Outcome<Profile>>> {
    let profile = state.profiles.find(username, claims.sub).await?;
    Ok(profile.map(Outcome::success))
}

pub async fn toggle_follow(
    state: &AppState,
    claims: &Claims,
    username: &str,
) -> Result<Option<Outcome<()>>> {
    state.profiles.toggle_follow(claims.sub, username).await
}

pub async fn follow_list(
    state: &AppState,
    claims: &Claims,
    username: &str,
    predicate: FollowPredicate,
) -> Result<Option<Outcome<Vec<Profile>>>> {
    let profiles = state
        .profiles
        .follow_list(username, predicate, claims.sub)
        .await?;
    Ok(Some(Outcome::success(profiles)))
}

pub async fn create_comment(
    state: &AppState,
    claims: &Claims,
    new_comment: NewComment,
) -> Result<Option<Outcome<CommentDto>>> {
    let body = new_comment.body.trim();
    if body.is_empty() {
        return Ok(Some(Outcome::failure("Comment body is required")));
    }

    let comment = state
        .comments
        .create(new_comment.activity_id, claims.sub, body)
        .await?;
    Ok(comment.map(Outcome::success))
}
