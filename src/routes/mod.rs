pub mod auth;
pub mod health;
pub mod profiles;
pub mod reviews;
