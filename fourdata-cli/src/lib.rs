pub mod auth;
pub mod config;
pub mod display;
pub mod explore;
pub mod identity;
pub mod import;
pub mod listing;
pub mod lucky;
pub mod profile;
pub mod schedule;
pub mod subscription;
