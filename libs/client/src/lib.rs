//! Client state store for the Reactivities application
//!
//! The stores keep what a UI needs between renders: the signed-in user and
//! token renewal, an activity registry with derived views, the live comments
//! of one activity and a little shared state. They reach the services through
//! the traits in [`agent`].

pub mod activity_store;
pub mod agent;
pub mod comment_store;
pub mod common_store;
pub mod config;
pub mod error;
pub mod store;
pub mod user_store;

pub use activity_store::{ActivityStore, ActivityView, PredicateChange};
pub use agent::{AccountApi, ActivitiesApi, HttpAgent, Page};
pub use comment_store::CommentStore;
pub use common_store::CommonStore;
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use store::Store;
pub use user_store::UserStore;
