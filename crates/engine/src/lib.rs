pub mod calculations;
pub mod persistence;
pub mod risk;
pub mod service;
pub mod store;
