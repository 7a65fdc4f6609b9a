// src/utils/mod.rs

pub mod csrf;
pub mod extract;
pub mod hash;
pub mod html;
pub mod jwt;
pub mod rate_limit;

/// Opaque primary key for new rows.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
