//! The store context handed to the UI layer

use crate::{
    activity_store::ActivityStore,
    agent::{AccountApi, ActivitiesApi, HttpAgent},
    common_store::CommonStore,
    comment_store::CommentStore,
    config::ClientConfig,
    error::ClientResult,
    user_store::UserStore,
};

/// Every client store, wired to one shared [`CommonStore`]
pub struct Store<Act, Acc> {
    pub common: CommonStore,
    pub users: UserStore<Acc>,
    pub activities: ActivityStore<Act>,
    pub comments: CommentStore,
}

impl Store<HttpAgent, HttpAgent> {
    /// Stores backed by the HTTP agent
    pub fn connect(config: ClientConfig) -> ClientResult<Self> {
        let common = CommonStore::new();
        let agent = HttpAgent::new(config.clone(), common.clone())?;

        Ok(Self::with_agents(agent.clone(), agent, config, common))
    }
}

impl<Act: ActivitiesApi, Acc: AccountApi + 'static> Store<Act, Acc> {
    pub fn with_agents(
        activities: Act,
        account: Acc,
        config: ClientConfig,
        common: CommonStore,
    ) -> Self {
        let users = UserStore::new(account, common.clone());
        let activities = ActivityStore::new(activities, users.subscribe());
        let comments = CommentStore::new(config.chat_url, common.clone());

        Self {
            common,
            users,
            activities,
            comments,
        }
    }

    /// Restore a session from a stored token, then mark the app loaded
    pub async fn load(&self, token: Option<String>) -> ClientResult<()> {
        let result = match token {
            Some(token) => {
                self.common.set_token(Some(token));
                let restored = self.users.get_user().await.map(|_| ());
                if restored.is_err() {
                    self.users.logout();
                }
                restored
            }
            None => Ok(()),
        };

        self.common.set_app_loaded();
        result
    }

    /// End the session and drop everything tied to it
    pub fn logout(&self) {
        self.users.logout();
        self.comments.clear_comments();
        self.activities.clear_selected_activity();
    }
}
