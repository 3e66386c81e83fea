pub mod error;
pub mod invalidate;
pub mod jobs;
pub mod reader;
pub mod refresh;
pub mod repos;
pub mod service;
