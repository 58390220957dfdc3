pub mod agent;
pub mod data;
pub mod data_provider;
pub mod error;
pub mod gym;
pub mod macros;
pub mod math;
pub mod prelude;
pub mod report;
