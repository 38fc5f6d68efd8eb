//! HTTP handlers

pub mod health;
pub mod monitoring;
pub mod notification;
pub mod profiles;

pub use health::health_check;
pub use monitoring::{get_status, restart};
pub use notification::{
    get_notifications, get_unread_count, mark_all_as_read, mark_as_read, stream_notifications,
};
pub use profiles::{get_crop_schedule, get_profile, list_profiles};
