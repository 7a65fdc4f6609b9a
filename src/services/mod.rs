// src/services/mod.rs

pub mod access;
pub mod bulk;
pub mod cascade;
pub mod catalog;
pub mod ordering;
pub mod palette;
pub mod progress;
pub mod schedule;
