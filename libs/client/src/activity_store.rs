//! Client-side activity registry
//!
//! Activities are kept in a registry keyed by id; list and grouped views are
//! derived from it on every access. Each mutation bumps a version counter
//! that observers can watch.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use chrono::{DateTime, Utc};
use common::{
    PaginationHeader, PagingParams,
    error::ValidationErrors,
    filter::{ActivityFilter, ActivityParams},
    models::{ActivityDto, ActivityInput, Profile, UserDto},
};
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    agent::ActivitiesApi,
    error::{ClientError, ClientResult},
};

/// An activity as seen by the current user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityView {
    pub activity: ActivityDto,
    pub is_going: bool,
    pub is_host: bool,
    pub host: Option<Profile>,
}

impl ActivityView {
    pub fn new(activity: ActivityDto, username: Option<&str>) -> Self {
        let is_going = username.is_some_and(|name| activity.is_attended_by(name));
        let is_host = username.is_some_and(|name| activity.host_username == name);
        let host = activity.host().cloned();

        Self {
            activity,
            is_going,
            is_host,
            host,
        }
    }

    pub fn id(&self) -> Uuid {
        self.activity.id
    }
}

/// Filter applied to the activity list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityPredicate {
    pub filter: ActivityFilter,
    pub start_date: DateTime<Utc>,
}

impl Default for ActivityPredicate {
    fn default() -> Self {
        Self {
            filter: ActivityFilter::All,
            start_date: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateChange {
    All,
    IsGoing,
    IsHost,
    StartDate(DateTime<Utc>),
}

impl ActivityPredicate {
    /// The filter flags replace each other; the start date is kept across them
    pub fn apply(&mut self, change: PredicateChange) {
        match change {
            PredicateChange::All => self.filter = ActivityFilter::All,
            PredicateChange::IsGoing => self.filter = ActivityFilter::IsGoing,
            PredicateChange::IsHost => self.filter = ActivityFilter::IsHost,
            PredicateChange::StartDate(date) => self.start_date = date,
        }
    }

    /// Query string for a list request
    pub fn params(&self, paging: PagingParams) -> ActivityParams {
        ActivityParams {
            page_number: Some(paging.page_number()),
            page_size: Some(paging.page_size()),
            start_date: Some(self.start_date),
            is_going: self.filter == ActivityFilter::IsGoing,
            is_host: self.filter == ActivityFilter::IsHost,
        }
    }
}

#[derive(Debug, Default)]
struct ActivityState {
    registry: HashMap<Uuid, ActivityView>,
    selected: Option<Uuid>,
    loading: bool,
    loading_initial: bool,
    pagination: Option<PaginationHeader>,
    paging_params: PagingParams,
    predicate: ActivityPredicate,
}

pub struct ActivityStore<A> {
    api: A,
    user: watch::Receiver<Option<UserDto>>,
    state: Mutex<ActivityState>,
    version: watch::Sender<u64>,
}

impl<A: ActivitiesApi> ActivityStore<A> {
    /// `user` follows the signed-in user; it decides `is_going` and `is_host`
    pub fn new(api: A, user: watch::Receiver<Option<UserDto>>) -> Self {
        let (version, _) = watch::channel(0);

        Self {
            api,
            user,
            state: Mutex::new(ActivityState::default()),
            version,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ActivityState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut ActivityState) -> R) -> R {
        let result = f(&mut self.lock());
        self.version.send_modify(|version| *version += 1);
        result
    }

    fn current_user(&self) -> Option<UserDto> {
        self.user.borrow().clone()
    }

    fn current_profile(&self) -> ClientResult<Profile> {
        let user = self.current_user().ok_or(ClientError::NotSignedIn)?;
        let mut profile = Profile::new(user.username, user.display_name);
        profile.image = user.image;
        Ok(profile)
    }

    fn view(&self, activity: ActivityDto) -> ActivityView {
        let user = self.current_user();
        ActivityView::new(activity, user.as_ref().map(|u| u.username.as_str()))
    }

    /// Version counter bumped on every mutation
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    /// Registry contents ordered by date
    pub fn activities_by_date(&self) -> Vec<ActivityView> {
        let mut activities: Vec<ActivityView> = self.lock().registry.values().cloned().collect();
        activities.sort_by(|a, b| {
            a.activity
                .date
                .cmp(&b.activity.date)
                .then_with(|| a.id().cmp(&b.id()))
        });
        activities
    }

    /// Activities grouped by calendar day (`YYYY-MM-DD`), days in order
    pub fn grouped_activities(&self) -> Vec<(String, Vec<ActivityView>)> {
        let mut groups: Vec<(String, Vec<ActivityView>)> = Vec::new();

        for view in self.activities_by_date() {
            let day = view.activity.date.format("%Y-%m-%d").to_string();
            match groups.last_mut() {
                Some((current, views)) if *current == day => views.push(view),
                _ => groups.push((day, vec![view])),
            }
        }

        groups
    }

    pub fn activity(&self, id: Uuid) -> Option<ActivityView> {
        self.lock().registry.get(&id).cloned()
    }

    pub fn selected_activity(&self) -> Option<ActivityView> {
        let state = self.lock();
        state.selected.and_then(|id| state.registry.get(&id).cloned())
    }

    pub fn loading(&self) -> bool {
        self.lock().loading
    }

    pub fn loading_initial(&self) -> bool {
        self.lock().loading_initial
    }

    pub fn pagination(&self) -> Option<PaginationHeader> {
        self.lock().pagination
    }

    pub fn paging_params(&self) -> PagingParams {
        self.lock().paging_params
    }

    pub fn predicate(&self) -> ActivityPredicate {
        self.lock().predicate.clone()
    }

    /// Fetch the page described by the paging params and predicate into the registry
    pub async fn load_activities(&self) -> ClientResult<()> {
        let params = {
            let mut state = self.lock();
            state.loading_initial = true;
            state.predicate.params(state.paging_params)
        };

        let result = self.api.list(&params).await;

        self.mutate(|state| {
            state.loading_initial = false;
            let page = result?;
            debug!("Loaded {} activities", page.items.len());
            for activity in page.items {
                let view = self.view(activity);
                state.registry.insert(view.id(), view);
            }
            state.pagination = page.pagination;
            Ok(())
        })
    }

    /// Select an activity, fetching it when the registry does not have it
    pub async fn load_activity(&self, id: Uuid) -> ClientResult<ActivityView> {
        if let Some(view) = self.activity(id) {
            self.mutate(|state| state.selected = Some(id));
            return Ok(view);
        }

        self.lock().loading_initial = true;
        let result = self.api.details(id).await;

        self.mutate(|state| {
            state.loading_initial = false;
            let view = self.view(result?);
            state.registry.insert(id, view.clone());
            state.selected = Some(id);
            Ok(view)
        })
    }

    /// Create an activity hosted by the current user; returns its id
    pub async fn create_activity(&self, input: ActivityInput) -> ClientResult<Uuid> {
        let host = self.current_profile()?;
        let date = input
            .date
            .ok_or_else(|| ValidationErrors::single("date", "Date is required"))?;
        let id = input.id.unwrap_or_else(Uuid::new_v4);
        let input = ActivityInput {
            id: Some(id),
            ..input
        };

        self.lock().loading = true;
        let result = self.api.create(&input).await;

        self.mutate(|state| {
            state.loading = false;
            result?;

            let activity = ActivityDto {
                id,
                title: input.title,
                date,
                description: input.description,
                category: input.category,
                city: input.city,
                venue: input.venue,
                is_cancelled: false,
                host_username: host.username.clone(),
                attendees: vec![host.clone()],
            };
            state.registry.insert(
                id,
                ActivityView {
                    activity,
                    is_going: true,
                    is_host: true,
                    host: Some(host),
                },
            );
            state.selected = Some(id);
            info!("Created activity {}", id);
            Ok(id)
        })
    }

    /// Store edited fields; attendees and host are kept as they are
    pub async fn update_activity(&self, input: ActivityInput) -> ClientResult<()> {
        let id = input
            .id
            .ok_or_else(|| ValidationErrors::single("id", "Id is required"))?;
        let date = input
            .date
            .ok_or_else(|| ValidationErrors::single("date", "Date is required"))?;

        self.lock().loading = true;
        let result = self.api.update(id, &input).await;

        self.mutate(|state| {
            state.loading = false;
            result?;

            if let Some(mut view) = state.registry.get(&id).cloned() {
                let activity = &mut view.activity;
                activity.title = input.title;
                activity.date = date;
                activity.description = input.description;
                activity.category = input.category;
                activity.city = input.city;
                activity.venue = input.venue;
                state.registry.insert(id, view);
            }
            state.selected = Some(id);
            Ok(())
        })
    }

    pub async fn delete_activity(&self, id: Uuid) -> ClientResult<()> {
        self.lock().loading = true;
        let result = self.api.delete(id).await;

        self.mutate(|state| {
            state.loading = false;
            result?;

            state.registry.remove(&id);
            if state.selected == Some(id) {
                state.selected = None;
            }
            info!("Deleted activity {}", id);
            Ok(())
        })
    }

    /// Join or leave the selected activity.
    ///
    /// The local change is applied before the request and kept if it fails.
    /// For the host the server toggles cancellation instead, and so does this.
    pub async fn update_attendance(&self) -> ClientResult<()> {
        let selected = self.selected_activity().ok_or(ClientError::NothingSelected)?;
        if selected.is_host {
            return self.cancel_activity_toggle().await;
        }

        let user = self.current_profile()?;
        let id = selected.id();
        self.mutate(|state| {
            state.loading = true;
            if let Some(mut view) = state.registry.get(&id).cloned() {
                if view.is_going {
                    view.activity
                        .attendees
                        .retain(|attendee| attendee.username != user.username);
                    view.is_going = false;
                } else {
                    view.activity.attendees.push(user);
                    view.is_going = true;
                }
                state.registry.insert(id, view);
            }
        });

        let result = self.api.attend(id).await;
        self.mutate(|state| state.loading = false);
        result
    }

    /// Host only: flip the cancelled flag of the selected activity
    pub async fn cancel_activity_toggle(&self) -> ClientResult<()> {
        let selected = self.selected_activity().ok_or(ClientError::NothingSelected)?;
        if !selected.is_host {
            return Err(ClientError::Forbidden);
        }

        let id = selected.id();
        self.mutate(|state| {
            state.loading = true;
            if let Some(mut view) = state.registry.get(&id).cloned() {
                view.activity.is_cancelled = !view.activity.is_cancelled;
                state.registry.insert(id, view);
            }
        });

        let result = self.api.attend(id).await;
        self.mutate(|state| state.loading = false);
        result
    }

    pub fn clear_selected_activity(&self) {
        self.mutate(|state| state.selected = None);
    }

    pub fn set_paging_params(&self, paging_params: PagingParams) {
        self.mutate(|state| state.paging_params = paging_params);
    }

    /// Change the list filter; paging restarts and the registry is emptied
    pub fn set_predicate(&self, change: PredicateChange) {
        self.mutate(|state| {
            state.predicate.apply(change);
            state.paging_params = PagingParams::default();
            state.registry.clear();
        });
    }
}
