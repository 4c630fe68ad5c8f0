// Library for tests to access modules

pub mod config;
pub mod error;
pub mod events;
pub mod history;
pub mod models;
pub mod monitor;
pub mod poller;
pub mod registry;
pub mod render;
pub mod routes;
pub mod sparkline;
pub mod version;
