mod naming_tests;

use record::{Flip, FlipStatus, Transaction};

pub(crate) fn make_tx(account_id: u32, id: u128, time: u32) -> Transaction {
    Transaction {
        id,
        correlation_id: id.wrapping_mul(31),
        account_id,
        time,
        item_id: 2,
        quantity: 10,
        price: 100,
        amount_spent: 1_000,
    }
}

pub(crate) fn make_flip(id: u128, opened_time: u32, updated_time: u32) -> Flip {
    Flip {
        id,
        account_id: 7,
        item_id: 11802,
        opened_time,
        opened_qty: 1,
        spent: 1_000,
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
