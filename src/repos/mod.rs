pub mod cache;
pub mod incident;
pub mod location;
