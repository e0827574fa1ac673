pub mod config;
pub mod diagnostics;
pub mod error;
pub mod join;
pub mod loader;
pub mod master;
pub mod pipeline;
pub mod report;
pub mod sla;
pub mod timestamps;
