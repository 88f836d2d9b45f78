//! Domain models for the plaza backend

mod shop;
mod voucher;
mod voucher_order;

pub use shop::{Shop, ShopCreate, ShopUpdate};
pub use voucher::{SeckillVoucher, Voucher, VoucherWithSeckill};
pub use voucher_order::VoucherOrder;
