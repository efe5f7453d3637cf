pub mod packet;
pub mod reassembler;
pub mod request;
