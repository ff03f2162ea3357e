//! Application state shared across handlers

use common::jwt::JwtService;
use sqlx::PgPool;

use crate::{
    chat::ChatHub,
    repositories::{ActivityRepository, CommentRepository, ProfileRepository},
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub jwt_service: JwtService,
    pub activities: ActivityRepository,
    pub comments: CommentRepository,
    pub profiles: ProfileRepository,
    pub chat: ChatHub,
}

impl AppState {
    pub fn new(db_pool: PgPool, jwt_service: JwtService) -> Self {
        Self {
            activities: ActivityRepository::new(db_pool.clone()),
            comments: CommentRepository::new(db_pool.clone()),
            profiles: ProfileRepository::new(db_pool.clone()),
            chat: ChatHub::default(),
            jwt_service,
            db_pool,
        }
    }
}
