pub mod packet_store;
