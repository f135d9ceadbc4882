pub mod config;
pub mod dao;
pub mod error;
pub mod model;
pub mod registry;
pub mod routes;
pub mod utils;
