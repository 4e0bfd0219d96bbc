use record::{Flip, FlipStatus, Transaction};

/// 2025-01-01T00:00:00Z
pub const Q1_2025: u32 = 1_735_689_600;
/// 2025-04-01T00:00:00Z
pub const Q2_2025: u32 = 1_743_465_600;

pub fn tx(account_id: u32, id: u128, time: u32) -> Transaction {
    Transaction {
        id,
        correlation_id: 0,
        account_id,
        time,
        item_id: 1,
        quantity: 1,
        price: 10,
        amount_spent: 10,
    }
}

pub fn flip(account_id: u32, id: u128, opened_time: u32, updated_time: u32) -> Flip {
    Flip {
        id,
        account_id,
        item_id: 1,
        opened_time,
        opened_qty: 10,
        spent: 100,
        closed_time: 0,
        closed_qty: 0,
        received_post_tax: 0,
        profit: 0,
        tax_paid: 0,
        status: FlipStatus::Buying,
        updated_time,
        deleted: false,
    }
}

pub fn keys(records: &[Transaction]) -> Vec<(u32, u128)> {
    records.iter().map(|r| (r.time, r.id)).collect()
}
