pub mod config;
pub mod delivery;
pub mod device;
pub mod generator;
pub mod models;
pub mod receiver;
