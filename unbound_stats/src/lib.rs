//! Library surface for unbound_stats: stats parsing, host config, remote-control
//! client, publishers and the poll loop. Exposed so integration tests can drive them.

pub mod collector;
pub mod config;
pub mod control;
pub mod error;
pub mod health;
pub mod hosts;
pub mod parser;
pub mod publish;
pub mod scheduler;
pub mod tls;
pub mod types;
