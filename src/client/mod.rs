pub mod client_config;
pub mod client_events;
pub mod connection_manager;
pub mod packet_connection;
pub mod transport;
