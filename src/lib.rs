pub mod actor;
pub mod bondster;
pub mod clock;
pub mod config;
pub mod duration;
pub mod metrics;
pub mod models;
pub mod openbank;
pub mod scheduler;
pub mod storage;
pub mod sync;
pub mod timeshift;
