pub mod archive;
pub mod arguments;
pub mod commands;
pub mod config;
pub mod errors;
pub mod fees;
pub mod ledger;
pub mod logger;
pub mod market;
pub mod monkey;
pub mod pending;
pub mod positions;
pub mod run;
pub mod settlement;
