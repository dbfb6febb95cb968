pub mod orders;
pub mod telegram;
pub mod users;
