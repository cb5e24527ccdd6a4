// Library for tests to access modules

pub mod config;
pub mod context;
pub mod counter;
pub mod error;
pub mod events;
pub mod history_repo;
pub mod maintenance_worker;
pub mod models;
pub mod ping_prober;
pub mod registry;
pub mod routes;
pub mod sampler;
pub mod scheduler;
pub mod sink;
pub mod transport;
pub mod version;
