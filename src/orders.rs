//! Orders
//!
//! Order snapshots and the state machine governing them. Forward
//! progression is operator-driven and strictly one step at a time; the
//! engine re-validates every transition server-side regardless of what the
//! UI exposed. Time-gated actions (cancel while pending, return within
//! three days of completion) take the server clock, never a client-supplied
//! instant. Every status change appends an audit entry and publishes a
//! live-update event.

use std::fmt;

use jiff::{SignedDuration, Zoned};
use rustc_hash::FxHashSet;
use rusty_money::{Money, iso::Currency};
use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    audit::AuditTrail,
    cart::{Cart, CartLine},
    catalog::{BulkOutcome, Catalog},
    discounts::DiscountKey,
    events::{OrderEvent, OrderEvents},
    pricing::{self, OrderSummary, PricingError, ShippingMethod},
    products::ProductKey,
    stock::{self, StockError},
};

new_key_type! {
    /// Order Key
    pub struct OrderKey;
}

/// How long after completion a return may still be requested.
pub const RETURN_WINDOW: SignedDuration = SignedDuration::from_hours(72);

/// Errors raised at checkout. Nothing is mutated on any error path.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// No cart line is selected.
    #[error("no selected lines to check out")]
    NothingSelected,

    /// A selected line refers to a product that no longer exists.
    #[error("product not found")]
    ProductNotFound(ProductKey),

    /// A selected line no longer fits within available stock.
    #[error("requested quantity exceeds stock; {available} available")]
    Stock {
        /// The offending product.
        product: ProductKey,

        /// Units currently sellable.
        available: u64,
    },

    /// The order-level voucher does not exist.
    #[error("voucher not found")]
    VoucherNotFound,

    /// Errors bubbled up from pricing.
    #[error(transparent)]
    Pricing(#[from] PricingError),
}

/// Errors raised by lifecycle operations. "Already done" variants are
/// distinct from "not allowed" ones so the UI can hide an action rather
/// than show an error.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Unknown order key.
    #[error("order not found")]
    NotFound,

    /// The requested forward transition skips a step or runs backwards.
    #[error("cannot move order from {from} to {to}")]
    Ineligible {
        /// Status the order is in.
        from: OrderStatus,

        /// Status that was requested.
        to: OrderStatus,
    },

    /// A second cancel on an already cancelled order.
    #[error("order is already cancelled")]
    AlreadyCancelled,

    /// Cancellation is only permitted while the order is pending.
    #[error("order in status {0} can no longer be cancelled")]
    NotCancellable(OrderStatus),

    /// A return was already accepted for this order.
    #[error("order has already been returned")]
    AlreadyReturned,

    /// Returns require a completed order.
    #[error("order in status {0} is not eligible for return")]
    NotCompleted(OrderStatus),

    /// More than the return window has passed since completion.
    #[error("return window of {RETURN_WINDOW:#} has expired")]
    ReturnWindowExpired,

    /// Return requests carry a mandatory reason.
    #[error("return reason must not be empty")]
    EmptyReturnReason,

    /// This (order, product) pair was already rated.
    #[error("product already rated for this order")]
    AlreadyRated,

    /// Ratings require a completed order.
    #[error("order in status {0} cannot be rated")]
    NotRatable(OrderStatus),

    /// The product is not part of this order.
    #[error("product is not part of this order")]
    NotInOrder,
}

/// Order status, from placement to one of three terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Placed, not yet picked up by an operator. Cancellable.
    Pending,

    /// Being prepared.
    Processing,

    /// Handed to the carrier.
    Shipping,

    /// Delivered. Opens the rating and return windows.
    Completed,

    /// Terminal: cancelled while pending.
    Cancelled,

    /// Terminal: returned after completion.
    Returned,
}

impl OrderStatus {
    /// The single permitted forward step, if any.
    #[must_use]
    pub fn next(self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Pending => Some(OrderStatus::Processing),
            OrderStatus::Processing => Some(OrderStatus::Shipping),
            OrderStatus::Shipping => Some(OrderStatus::Completed),
            OrderStatus::Completed | OrderStatus::Cancelled | OrderStatus::Returned => None,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipping => "shipping",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Returned => "returned",
        };

        f.write_str(name)
    }
}

/// An accepted return request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnRequest {
    /// Whether the request was accepted. Accepted requests block further
    /// ones.
    pub returned: bool,

    /// Mandatory, non-empty reason.
    pub reason: String,

    /// Optional free-text detail.
    pub description: Option<String>,
}

/// A purchased line, snapshotted at checkout.
#[derive(Debug, Clone)]
pub struct OrderLine {
    /// The product purchased.
    pub product: ProductKey,

    /// Product name at purchase time.
    pub name: String,

    /// Units purchased.
    pub quantity: u64,

    /// Unit price actually charged (after the line discount).
    pub unit_price: Money<'static, Currency>,

    /// Whole-percent equivalent of the line discount, for display.
    pub discount_percent: Option<i64>,

    /// `unit_price * quantity`.
    pub amount: Money<'static, Currency>,
}

/// Order
#[derive(Debug, Clone)]
pub struct Order {
    customer: Uuid,
    lines: Vec<OrderLine>,
    summary: OrderSummary,
    status: OrderStatus,
    voucher: Option<DiscountKey>,
    shipping: ShippingMethod,
    return_request: Option<ReturnRequest>,
    rated: FxHashSet<ProductKey>,
    audit: AuditTrail,
}

impl Order {
    /// The customer who placed the order.
    #[must_use]
    pub fn customer(&self) -> Uuid {
        self.customer
    }

    /// The purchased lines, in cart order.
    #[must_use]
    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    /// The monetary summary computed at checkout.
    #[must_use]
    pub fn summary(&self) -> &OrderSummary {
        &self.summary
    }

    /// Current lifecycle status.
    #[must_use]
    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// The order-level voucher, if one was applied.
    #[must_use]
    pub fn voucher(&self) -> Option<DiscountKey> {
        self.voucher
    }

    /// The shipping method chosen at checkout.
    #[must_use]
    pub fn shipping(&self) -> ShippingMethod {
        self.shipping
    }

    /// The accepted return request, if any.
    #[must_use]
    pub fn return_request(&self) -> Option<&ReturnRequest> {
        self.return_request.as_ref()
    }

    /// Whether this (order, product) pair has been rated.
    #[must_use]
    pub fn is_rated(&self, product: ProductKey) -> bool {
        self.rated.contains(&product)
    }

    /// Create/update history. Status changes append here.
    #[must_use]
    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }
}

/// The order store: owns every order, drives the state machine, and
/// publishes a live-update event for each transition.
#[derive(Debug, Default)]
pub struct Orders {
    orders: SlotMap<OrderKey, Order>,
    events: OrderEvents,
}

impl Orders {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to status-transition events.
    #[must_use]
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<OrderEvent> {
        self.events.subscribe()
    }

    /// An order by key.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::NotFound`] for unknown keys.
    pub fn order(&self, key: OrderKey) -> Result<&Order, OrderError> {
        self.orders.get(key).ok_or(OrderError::NotFound)
    }

    /// Creates an order from the cart's selected lines, atomically from the
    /// client's perspective: stock is re-validated against fresh product
    /// state, sales are recorded, and only then are the lines removed from
    /// the cart. On any error the cart and catalog are unchanged.
    ///
    /// # Errors
    ///
    /// - [`CheckoutError::NothingSelected`]: no line is selected.
    /// - [`CheckoutError::ProductNotFound`] / [`CheckoutError::Stock`]: a
    ///   line no longer matches the catalog.
    /// - [`CheckoutError::VoucherNotFound`]: the voucher key is dangling.
    /// - [`CheckoutError::Pricing`]: the summary could not be computed.
    pub fn checkout(
        &mut self,
        catalog: &mut Catalog,
        cart: &mut Cart,
        voucher: Option<DiscountKey>,
        shipping: ShippingMethod,
        actor: Uuid,
        now: &Zoned,
    ) -> Result<OrderKey, CheckoutError> {
        let selected: Vec<CartLine> = cart.selected_lines().cloned().collect();

        if selected.is_empty() {
            return Err(CheckoutError::NothingSelected);
        }

        let mut lines = Vec::with_capacity(selected.len());

        for line in &selected {
            let product = catalog
                .product(line.product)
                .map_err(|_err| CheckoutError::ProductNotFound(line.product))?;

            stock::ensure_within_stock(product, line.quantity).map_err(|err| {
                CheckoutError::Stock {
                    product: line.product,
                    available: match err {
                        StockError::Exceeded { available } => available,
                        StockError::OutOfStock => 0,
                    },
                }
            })?;

            lines.push(OrderLine {
                product: line.product,
                name: product.name.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price(),
                discount_percent: line.discount_percent,
                amount: pricing::line_amount(line)?,
            });
        }

        let voucher_ref = match voucher {
            Some(key) => Some(
                catalog
                    .discount(key)
                    .map_err(|_err| CheckoutError::VoucherNotFound)?,
            ),
            None => None,
        };

        let summary = pricing::price_lines(&selected, voucher_ref, shipping, now)?;

        for line in &selected {
            catalog
                .record_sale(line.product, line.quantity)
                .map_err(|_err| CheckoutError::Stock {
                    product: line.product,
                    available: 0,
                })?;
        }

        cart.remove_selected();

        let key = self.orders.insert(Order {
            customer: cart.owner(),
            lines,
            summary,
            status: OrderStatus::Pending,
            voucher,
            shipping,
            return_request: None,
            rated: FxHashSet::default(),
            audit: AuditTrail::new(actor, now),
        });

        tracing::info!(
            order = ?key,
            customer = %cart.owner(),
            total = summary.total.to_minor_units(),
            "order placed"
        );

        Ok(key)
    }

    /// Moves an order one step forward. Skipping steps or moving backwards
    /// is rejected here regardless of what the caller's UI offered.
    ///
    /// # Errors
    ///
    /// - [`OrderError::NotFound`]: unknown key.
    /// - [`OrderError::Ineligible`]: `to` is not the single permitted next
    ///   step.
    pub fn advance(
        &mut self,
        key: OrderKey,
        to: OrderStatus,
        actor: Uuid,
        now: &Zoned,
    ) -> Result<(), OrderError> {
        let order = self.orders.get_mut(key).ok_or(OrderError::NotFound)?;
        let from = order.status;

        if from.next() != Some(to) {
            return Err(OrderError::Ineligible { from, to });
        }

        Self::transition(&self.events, key, order, to, actor, now);

        Ok(())
    }

    /// Moves several orders forward; one failure does not block the rest.
    pub fn advance_many(
        &mut self,
        keys: &[OrderKey],
        to: OrderStatus,
        actor: Uuid,
        now: &Zoned,
    ) -> BulkOutcome {
        let mut succeeded = 0;
        let mut failed = 0;

        for &key in keys {
            if self.advance(key, to, actor, now).is_ok() {
                succeeded += 1;
            } else {
                failed += 1;
            }
        }

        tracing::info!(succeeded, failed, %to, "bulk order status change");

        BulkOutcome { succeeded, failed }
    }

    /// Customer-initiated cancellation, permitted only while pending.
    ///
    /// # Errors
    ///
    /// - [`OrderError::NotFound`]: unknown key.
    /// - [`OrderError::AlreadyCancelled`]: a second cancel; the double
    ///   submit is rejected, not silently absorbed.
    /// - [`OrderError::NotCancellable`]: processing has already begun.
    pub fn cancel(&mut self, key: OrderKey, actor: Uuid, now: &Zoned) -> Result<(), OrderError> {
        let order = self.orders.get_mut(key).ok_or(OrderError::NotFound)?;

        match order.status {
            OrderStatus::Pending => {
                Self::transition(&self.events, key, order, OrderStatus::Cancelled, actor, now);
                Ok(())
            }
            OrderStatus::Cancelled => Err(OrderError::AlreadyCancelled),
            status => Err(OrderError::NotCancellable(status)),
        }
    }

    /// Files a return request against a completed order. Acceptance flips
    /// the order to `Returned` and blocks further requests.
    ///
    /// # Errors
    ///
    /// - [`OrderError::NotFound`]: unknown key.
    /// - [`OrderError::EmptyReturnReason`]: the mandatory reason is blank.
    /// - [`OrderError::AlreadyReturned`]: an accepted request exists.
    /// - [`OrderError::NotCompleted`]: the order never completed.
    /// - [`OrderError::ReturnWindowExpired`]: more than [`RETURN_WINDOW`]
    ///   has passed since completion.
    pub fn request_return(
        &mut self,
        key: OrderKey,
        reason: &str,
        description: Option<String>,
        actor: Uuid,
        now: &Zoned,
    ) -> Result<(), OrderError> {
        let order = self.orders.get_mut(key).ok_or(OrderError::NotFound)?;

        if reason.trim().is_empty() {
            return Err(OrderError::EmptyReturnReason);
        }

        if order.status == OrderStatus::Returned
            || order.return_request.as_ref().is_some_and(|r| r.returned)
        {
            return Err(OrderError::AlreadyReturned);
        }

        if order.status != OrderStatus::Completed {
            return Err(OrderError::NotCompleted(order.status));
        }

        // Completion instant: the latest update entry (the transition to
        // `Completed`), falling back to creation.
        let completed_at = order.audit.last_touched();

        if now.timestamp().duration_since(completed_at) > RETURN_WINDOW {
            return Err(OrderError::ReturnWindowExpired);
        }

        order.return_request = Some(ReturnRequest {
            returned: true,
            reason: reason.to_owned(),
            description,
        });

        Self::transition(&self.events, key, order, OrderStatus::Returned, actor, now);

        Ok(())
    }

    /// Rates a purchased line item, once per (order, product) pair.
    ///
    /// # Errors
    ///
    /// - [`OrderError::NotFound`]: unknown key.
    /// - [`OrderError::NotRatable`]: the order is not completed.
    /// - [`OrderError::NotInOrder`]: the product is not a line of this
    ///   order.
    /// - [`OrderError::AlreadyRated`]: a duplicate attempt; the stored
    ///   rating is untouched.
    pub fn rate(&mut self, key: OrderKey, product: ProductKey) -> Result<(), OrderError> {
        let order = self.orders.get_mut(key).ok_or(OrderError::NotFound)?;

        if order.status != OrderStatus::Completed {
            return Err(OrderError::NotRatable(order.status));
        }

        if !order.lines.iter().any(|line| line.product == product) {
            return Err(OrderError::NotInOrder);
        }

        if !order.rated.insert(product) {
            return Err(OrderError::AlreadyRated);
        }

        Ok(())
    }

    /// Applies a validated transition: status flip, audit entry, event.
    fn transition(
        events: &OrderEvents,
        key: OrderKey,
        order: &mut Order,
        to: OrderStatus,
        actor: Uuid,
        now: &Zoned,
    ) {
        let from = order.status;

        order.status = to;
        order.audit.record_update(actor, now);

        tracing::info!(order = ?key, %from, %to, "order status changed");

        events.publish(OrderEvent {
            order: key,
            from,
            to,
            at: now.timestamp(),
        });
    }
}
