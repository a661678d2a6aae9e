//! Stock ledger
//!
//! Derives the real-time sellable quantity of a product from its recorded
//! totals: `available = quantity - sold_count`, floored at zero. The caller
//! is expected to pass the freshest product state it has; client-side caches
//! of availability are advisory only.

use thiserror::Error;

use crate::products::Product;

/// Errors raised by stock gates.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StockError {
    /// Nothing left to sell; the action must be refused outright rather than
    /// clamped.
    #[error("product is out of stock")]
    OutOfStock,

    /// The requested quantity exceeds what is left.
    #[error("requested quantity exceeds stock; {available} available")]
    Exceeded {
        /// Units currently sellable.
        available: u64,
    },
}

/// Units currently sellable for the product.
///
/// Never negative: `sold_count` overshooting `quantity` (which this engine's
/// own logic refuses to produce) saturates to zero rather than underflowing.
#[must_use]
pub fn available(product: &Product) -> u64 {
    product.quantity.saturating_sub(product.sold_count)
}

/// Gate for add-to-cart / buy-now: the product must have at least one unit
/// left.
///
/// # Errors
///
/// Returns [`StockError::OutOfStock`] when nothing is left.
pub fn ensure_sellable(product: &Product) -> Result<(), StockError> {
    if available(product) == 0 {
        Err(StockError::OutOfStock)
    } else {
        Ok(())
    }
}

/// Gate for quantity changes and checkout: `requested` units must fit within
/// the available stock.
///
/// # Errors
///
/// Returns [`StockError::Exceeded`] with the current available count when
/// the request does not fit.
pub fn ensure_within_stock(product: &Product, requested: u64) -> Result<(), StockError> {
    let available = available(product);

    if requested > available {
        Err(StockError::Exceeded { available })
    } else {
        Ok(())
    }
}
