pub mod activities;
pub mod auth;
pub mod civs;
pub mod dashboard;
pub mod health;
pub mod messages;
pub mod notifications;
pub mod permissions;
pub mod photos;
pub mod projects;
pub mod reports;
pub mod roles;
pub mod users;
