pub mod api;
pub mod commands;
pub mod models;
pub mod services;
pub mod session;
pub mod store;
pub mod validators;
pub mod views;
