//! Kibble
//!
//! Kibble is a pricing and order-lifecycle engine for a pet-store storefront: discount
//! resolution, cart pricing, stock-gated checkout and the order state machine.

pub mod audit;
pub mod cart;
pub mod catalog;
pub mod discounts;
pub mod events;
pub mod orders;
pub mod prelude;
pub mod pricing;
pub mod products;
pub mod stock;
