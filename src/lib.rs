pub mod config;
pub mod crawler;
pub mod evolution;
pub mod history;
pub mod report;
