//! Kibble prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    audit::{AuditEntry, AuditError, AuditTrail},
    cart::{Cart, CartError, CartLine},
    catalog::{BulkOutcome, Catalog, CatalogError},
    discounts::{
        Discount, DiscountError, DiscountKey, DiscountKind, DiscountStatus, Resolution, TimeSlot,
        TimeSlotError,
    },
    events::{OrderEvent, OrderEvents},
    orders::{
        CheckoutError, Order, OrderError, OrderKey, OrderLine, OrderStatus, Orders, ReturnRequest,
    },
    pricing::{OrderSummary, PricingError, ShippingMethod},
    products::{Category, CategoryKey, Product, ProductKey, ProductStatus},
    stock::StockError,
};
