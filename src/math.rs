pub mod rate;
pub mod returns;
