mod account;
mod auth;
mod health_check;
mod uploads;

pub use account::{change_password, get_current_user, update_account, update_avatar, update_cover_image};
pub use auth::{login, logout, refresh_access_token, register};
pub use health_check::health_check;
