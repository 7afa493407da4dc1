pub mod batch;
pub mod config;
pub mod menu;
pub mod process;
pub mod validate;
