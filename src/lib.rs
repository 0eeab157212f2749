// Library for tests to access modules

pub mod config;
pub mod grouping;
pub mod inventory_repo;
pub mod matcher;
pub mod models;
pub mod prom_repo;
pub mod routes;
pub mod scheduler;
pub mod series;
pub mod snapshot_cache;
pub mod worker;
