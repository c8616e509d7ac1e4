pub mod exporter;
pub mod handlers;
pub mod router;
