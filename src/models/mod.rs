pub mod incident;
pub mod location;
