pub mod packet_sink;
