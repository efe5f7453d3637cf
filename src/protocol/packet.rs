use bytes::Buf;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Every record on the wire has exactly this length, there is no other framing
pub const FRAME_LEN: usize = 17;

pub const SYMBOL_LEN: usize = 4;

#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, TryFromPrimitive, IntoPrimitive)]
pub enum Side {
    Buy = b'B',
    Sell = b'S',
}
impl Serialize for Side {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let c: u8 = (*self).into();
        serializer.serialize_char(c as char)
    }
}

/// A single record. The fields are public, so validation is only guaranteed for packets returned
///  by [Packet::decode].
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize)]
pub struct Packet {
    pub symbol: String,
    #[serde(rename = "buySellIndicator")]
    pub side: Side,
    pub quantity: i32,
    pub price: i32,
    pub sequence: i32,
}

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum DecodeError {
    #[error("frame has {0} bytes, expected {len}", len = FRAME_LEN)]
    InvalidFrameLength(usize),
    #[error("symbol {0:?} is not {len} printable ASCII characters", len = SYMBOL_LEN)]
    InvalidSymbol(Vec<u8>),
    #[error("side indicator {0:#04x} is neither 'B' nor 'S'")]
    InvalidSide(u8),
    #[error("quantity {0} is not positive")]
    NonPositiveQuantity(i32),
    #[error("price {0} is not positive")]
    NonPositivePrice(i32),
    #[error("sequence number {0} is negative")]
    NegativeSequence(i32),
}

impl Packet {
    /// Field layout (all integers big-endian):
    ///
    /// ```ascii
    /// 0       4    5          9          13         17
    /// | symbol | side | quantity | price | sequence |
    /// ```
    pub fn decode(mut frame: &[u8]) -> Result<Packet, DecodeError> {
        if frame.len() != FRAME_LEN {
            return Err(DecodeError::InvalidFrameLength(frame.len()));
        }

        let raw_symbol = &frame[..SYMBOL_LEN];
        if !raw_symbol.iter().all(|b| b.is_ascii_graphic()) {
            return Err(DecodeError::InvalidSymbol(raw_symbol.to_vec()));
        }
        let symbol = String::from_utf8_lossy(raw_symbol).into_owned();
        frame.advance(SYMBOL_LEN);

        let raw_side = frame.get_u8();
        let side = Side::try_from_primitive(raw_side)
            .map_err(|_| DecodeError::InvalidSide(raw_side))?;

        let quantity = frame.get_i32();
        if quantity <= 0 {
            return Err(DecodeError::NonPositiveQuantity(quantity));
        }
        let price = frame.get_i32();
        if price <= 0 {
            return Err(DecodeError::NonPositivePrice(price));
        }
        let sequence = frame.get_i32();
        if sequence < 0 {
            return Err(DecodeError::NegativeSequence(sequence));
        }

        Ok(Packet {
            symbol,
            side,
            quantity,
            price,
            sequence,
        })
    }
}

/// Builds the raw wire representation of a record without validating it - for tests that need
///  malformed frames
#[cfg(test)]
pub fn raw_frame(symbol: &[u8; 4], side: u8, quantity: i32, price: i32, sequence: i32) -> Vec<u8> {
    use bytes::BufMut;

    let mut buf = Vec::with_capacity(FRAME_LEN);
    buf.put_slice(symbol);
    buf.put_u8(side);
    buf.put_i32(quantity);
    buf.put_i32(price);
    buf.put_i32(sequence);
    buf
}
