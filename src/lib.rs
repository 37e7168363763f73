pub mod aggregate;
pub mod config;
pub mod fetch;
pub mod geo;
pub mod pipeline;
pub mod ratio;
pub mod reference;
pub mod report;
