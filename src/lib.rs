pub mod config;
pub mod document;
pub mod history;
pub mod inspector;
pub mod model;
pub mod python;
pub mod scanner;
pub mod universal;
