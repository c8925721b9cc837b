pub mod api;
pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod crud;
pub mod database;
pub mod error;
pub mod handlers;
pub mod schema;
pub mod services;
