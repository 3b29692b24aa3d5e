pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod health;
pub mod onboarding;
pub mod state;
pub mod users;
