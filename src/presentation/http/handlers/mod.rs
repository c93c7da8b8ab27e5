pub mod comments;
pub mod health;
pub mod messages;
pub mod ws;
