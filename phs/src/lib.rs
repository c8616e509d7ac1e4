pub mod api;
pub mod app_state;
pub mod http;
pub mod init_telemetry;
pub mod settings;
pub mod stop_flag;
