pub mod input;
pub mod presence;
pub mod service;

pub use input::{complete_signup, ProfileInput};
pub use presence::{is_online, last_active, LastActive};
pub use service::{fetch_profile, record_login, record_logout};
