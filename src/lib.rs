pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod observability;
pub mod policy;
pub mod repositories;
pub mod services;
