// src/models/mod.rs

pub mod assignment;
pub mod lesson;
pub mod progress;
pub mod resource;
pub mod schedule;
pub mod student;
pub mod topic;
pub mod user;
