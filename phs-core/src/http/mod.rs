mod client;

pub use client::MonitoredClient;
