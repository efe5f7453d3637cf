use bytes::{BufMut, BytesMut};
use num_enum::IntoPrimitive;

#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, IntoPrimitive)]
pub enum CallType {
    StreamAllPackets = 1,
    ResendPacket = 2,
}

/// Requests are client-initiated and unframed: the call type byte determines the length.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Request {
    StreamAllPackets,
    ResendPacket { sequence: i32 },
}
impl Request {
    pub fn call_type(&self) -> CallType {
        match self {
            Request::StreamAllPackets => CallType::StreamAllPackets,
            Request::ResendPacket { .. } => CallType::ResendPacket,
        }
    }

    pub fn ser(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.call_type().into());
        if let Request::ResendPacket { sequence } = self {
            buf.put_i32(*sequence);
        }
    }

    pub fn to_bytes(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(5);
        self.ser(&mut buf);
        buf
    }
}
