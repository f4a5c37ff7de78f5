pub mod client;
pub mod config;
pub mod errors;
pub mod histogram;
pub mod merge;
pub mod metrics;
pub mod operations;
pub mod rate_limiter;
pub mod report;
pub mod results;
pub mod runner;
pub mod stop;
pub mod utils;
pub mod worker;
pub mod workload;
