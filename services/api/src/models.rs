//! Storage-side models of the activities service

pub mod activity;
pub mod profile;

pub use activity::{ActivityRow, AttendanceChange, AttendeeRow};
pub use profile::{FollowParams, FollowPredicate};
