//! Repositories for database operations

pub mod activity;
pub mod comment;
pub mod profile;

pub use activity::ActivityRepository;
pub use comment::CommentRepository;
pub use profile::ProfileRepository;
