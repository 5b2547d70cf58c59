pub mod backends;
pub mod metrics;
pub mod models;
pub mod service;
pub mod store;
pub mod table;
pub mod view;
