// Library for tests to access modules

pub mod adapter;
pub mod aggregator;
pub mod buffer;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod models;
pub mod reconcile;
pub mod routes;
pub mod source;
pub mod worker;
