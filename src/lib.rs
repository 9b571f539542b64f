pub mod cache;
pub mod config;
pub mod normalize;
pub mod sheet;
pub mod stage;
