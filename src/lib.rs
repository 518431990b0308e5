// Timelapse - Library Entry Point

pub mod constants;
pub mod error;
pub mod config;
pub mod tools;
pub mod data;
pub mod db;
pub mod metadata;
pub mod scan;
pub mod select;
