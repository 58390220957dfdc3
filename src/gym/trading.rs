pub mod action;
pub mod config;
pub mod env;
pub mod execution;
pub mod ledger;
pub mod observation;
