// src/handlers/mod.rs

pub mod admin;
pub mod assignments;
pub mod auth;
pub mod lessons;
pub mod progress;
pub mod resources;
pub mod schedules;
pub mod students;
pub mod topics;
