use byteorder::{BigEndian, ByteOrder};

use crate::{check_len, CodecError, Record};

/// A single completed buy or sell on the marketplace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub id: u128,
    /// Links the transaction to the order/offer that produced it.
    pub correlation_id: u128,
    pub account_id: u32,
    pub time: u32,
    pub item_id: u32,
    /// Positive for buys, negative for sells.
    pub quantity: i32,
    pub price: i32,
    pub amount_spent: i32,
}

impl Record for Transaction {
    const SIZE: usize = 56;
    const KIND: &'static str = "transactions";
    const ID_OFFSET: usize = 0;
    const TIME_OFFSET: usize = 36;

    fn id(&self) -> u128 {
        self.id
    }

    fn account_id(&self) -> u32 {
        self.account_id
    }

    fn time(&self) -> u32 {
        self.time
    }

    // Transactions are immutable once recorded.
    fn updated_time(&self) -> u32 {
        self.time
    }

    fn encode_into(&self, buf: &mut [u8]) {
        BigEndian::write_u128(&mut buf[0..16], self.id);
        BigEndian::write_u128(&mut buf[16..32], self.correlation_id);
        BigEndian::write_u32(&mut buf[32..36], self.account_id);
        BigEndian::write_u32(&mut buf[36..40], self.time);
        BigEndian::write_u32(&mut buf[40..44], self.item_id);
        BigEndian::write_i32(&mut buf[44..48], self.quantity);
        BigEndian::write_i32(&mut buf[48..52], self.price);
        BigEndian::write_i32(&mut buf[52..56], self.amount_spent);
    }

    fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        check_len(bytes, Self::SIZE)?;
        Ok(Self {
            id: BigEndian::read_u128(&bytes[0..16]),
            correlation_id: BigEndian::read_u128(&bytes[16..32]),
            account_id: BigEndian::read_u32(&bytes[32..36]),
            time: BigEndian::read_u32(&bytes[36..40]),
            item_id: BigEndian::read_u32(&bytes[40..44]),
            quantity: BigEndian::read_i32(&bytes[44..48]),
            price: BigEndian::read_i32(&bytes[48..52]),
            amount_spent: BigEndian::read_i32(&bytes[52..56]),
        })
    }
}
