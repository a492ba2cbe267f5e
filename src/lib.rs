//! User accounts over HTTP: registration, login with access/refresh JWTs,
//! and soft-deleting user CRUD.

pub mod app;
pub mod auth;
pub mod config;
pub mod errors;
pub mod state;
pub mod users;
