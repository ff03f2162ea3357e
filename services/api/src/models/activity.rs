//! Activity rows and their assembly into wire DTOs

use chrono::{DateTime, Utc};
use common::models::{ActivityDto, Profile};
use sqlx::FromRow;
use std::collections::HashMap;
use uuid::Uuid;

/// Activity row as stored
#[derive(Debug, Clone, FromRow)]
pub struct ActivityRow {
    pub id: Uuid,
    pub title: String,
    pub date: DateTime<Utc>,
    pub description: String,
    pub category: String,
    pub city: String,
    pub venue: String,
    pub is_cancelled: bool,
}

/// Attendee joined with the user's public profile
#[derive(Debug, Clone)]
pub struct AttendeeRow {
    pub activity_id: Uuid,
    pub is_host: bool,
    pub profile: Profile,
}

/// What `attend` does for the calling user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceChange {
    /// The host flips the cancelled flag; the host is never removed
    ToggleCancelled,
    /// An attendee leaves
    Remove,
    /// A new attendee joins
    Add,
}

impl AttendanceChange {
    /// `membership` is `Some(is_host)` when the user already attends
    pub fn decide(membership: Option<bool>) -> Self {
        match membership {
            Some(true) => AttendanceChange::ToggleCancelled,
            Some(false) => AttendanceChange::Remove,
            None => AttendanceChange::Add,
        }
    }
}

/// Attach attendees to their activities, keeping the row order
pub fn assemble(rows: Vec<ActivityRow>, attendees: Vec<AttendeeRow>) -> Vec<ActivityDto> {
    let mut by_activity: HashMap<Uuid, Vec<AttendeeRow>> = HashMap::new();
    for attendee in attendees {
        by_activity.entry(attendee.activity_id).or_default().push(attendee);
    }

    rows.into_iter()
        .map(|row| {
            let attendees = by_activity.remove(&row.id).unwrap_or_default();
            let host_username = attendees
                .iter()
                .find(|a| a.is_host)
                .map(|a| a.profile.username.clone())
                .unwrap_or_default();

            ActivityDto {
                id: row.id,
                title: row.title,
                date: row.date,
                description: row.description,
                category: row.category,
                city: row.city,
                venue: row.venue,
                is_cancelled: row.is_cancelled,
                host_username,
                attendees: attendees.into_iter().map(|a| a.profile).collect(),
            }
        })
        .collect()
}
