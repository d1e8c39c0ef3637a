pub mod config;
pub mod db;
pub mod errors;
pub mod geo;
pub mod models;
pub mod queue;
pub mod repos;
pub mod services;
pub mod workers;
