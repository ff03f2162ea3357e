//! Activity list filtering
//!
//! The predicate here is the in-memory statement of the filter that the
//! activity repository expresses in SQL.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{models::ActivityDto, paging::PagingParams};

/// Query string of `GET /activities`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityParams {
    pub page_number: Option<u32>,
    pub page_size: Option<u32>,
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_going: bool,
    #[serde(default)]
    pub is_host: bool,
}

impl ActivityParams {
    pub fn paging(&self) -> PagingParams {
        PagingParams::from_query(self.page_number, self.page_size)
    }

    pub fn filter(&self) -> ActivityFilter {
        ActivityFilter::from_flags(self.is_going, self.is_host)
    }

    /// Lower date bound; activities in the past are hidden by default
    pub fn effective_start_date(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.start_date.unwrap_or(now)
    }
}

/// Which relation to the current user an activity must have
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivityFilter {
    #[default]
    All,
    IsGoing,
    IsHost,
}

impl ActivityFilter {
    /// Conflicting flags cancel out to `All`
    pub fn from_flags(is_going: bool, is_host: bool) -> Self {
        match (is_going, is_host) {
            (true, false) => ActivityFilter::IsGoing,
            (false, true) => ActivityFilter::IsHost,
            _ => ActivityFilter::All,
        }
    }

    pub fn matches(
        &self,
        activity: &ActivityDto,
        username: &str,
        start_date: DateTime<Utc>,
    ) -> bool {
        if activity.date < start_date {
            return false;
        }

        match self {
            ActivityFilter::All => true,
            ActivityFilter::IsGoing => activity.is_attended_by(username),
            ActivityFilter::IsHost => activity.host_username == username,
        }
    }
}

/// Apply the filter and the date ordering to an in-memory collection
///
/// Ties on date are broken by id so paging over the result is stable.
pub fn filter_activities<'a, I>(
    activities: I,
    filter: ActivityFilter,
    username: &str,
    start_date: DateTime<Utc>,
) -> Vec<&'a ActivityDto>
where
    I: IntoIterator<Item = &'a ActivityDto>,
{
    let mut matching: Vec<&ActivityDto> = activities
        .into_iter()
        .filter(|a| filter.matches(a, username, start_date))
        .collect();
    matching.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));
    matching
}
