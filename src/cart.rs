//! Cart
//!
//! The set of line items a customer has selected, with quantities and
//! selection flags. Prices are snapshotted at add time; stock checks are
//! made against the freshest product state the caller holds, through
//! [`crate::stock`]. One line per product: re-adding a product merges into
//! the existing line and refreshes its price snapshot.

use rusty_money::{Money, iso::Currency};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    discounts::{DiscountError, DiscountKey, Resolution},
    products::{CategoryKey, Product, ProductKey},
    stock::{self, StockError},
};

/// Errors raised by cart mutations. The cart is left unchanged on every
/// error path.
#[derive(Debug, Error)]
pub enum CartError {
    /// Stock gate refused the mutation.
    #[error(transparent)]
    Stock(#[from] StockError),

    /// A quantity of zero is never a valid line.
    #[error("quantity must be at least 1")]
    InvalidQuantity,

    /// The product does not exist (or is hidden).
    #[error("product not found")]
    ProductNotFound(ProductKey),

    /// No line for this product in the cart.
    #[error("cart line not found")]
    LineNotFound(ProductKey),

    /// Discount resolution failed while snapshotting a line price.
    #[error(transparent)]
    Discount(#[from] DiscountError),
}

/// One product entry in a cart.
#[derive(Debug, Clone)]
pub struct CartLine {
    /// Product this line refers to.
    pub product: ProductKey,

    /// Category of the product at add time.
    pub category: CategoryKey,

    /// Units requested, at least 1.
    pub quantity: u64,

    /// Whether the line takes part in pricing and checkout.
    pub selected: bool,

    /// Product price snapshotted at add time.
    pub price_original: Money<'static, Currency>,

    /// Line price after the product's own discount, when one applied.
    pub price_after_discount: Option<Money<'static, Currency>>,

    /// The discount that produced the snapshot, if any.
    pub discount: Option<DiscountKey>,

    /// Whole-percent equivalent of the line discount, for display.
    pub discount_percent: Option<i64>,
}

impl CartLine {
    /// Snapshots a line from current product state and a resolved discount.
    #[must_use]
    pub fn snapshot(
        product: ProductKey,
        state: &Product,
        resolution: &Resolution,
        quantity: u64,
    ) -> Self {
        Self {
            product,
            category: state.category,
            quantity,
            selected: true,
            price_original: state.price,
            price_after_discount: resolution.active.then_some(resolution.final_price),
            discount: resolution.active.then_some(state.discount).flatten(),
            discount_percent: resolution.active.then_some(resolution.percent_equivalent),
        }
    }

    /// The unit price this line contributes to pricing: the resolved
    /// discounted price when one was snapshotted and is positive, otherwise
    /// the original snapshot.
    #[must_use]
    pub fn unit_price(&self) -> Money<'static, Currency> {
        match self.price_after_discount {
            Some(price) if price.to_minor_units() > 0 => price,
            _ => self.price_original,
        }
    }

    /// Whether a line-level discount applied at add time.
    #[must_use]
    pub fn applied_discount(&self) -> bool {
        self.price_after_discount.is_some()
    }
}

/// Cart
#[derive(Debug, Clone)]
pub struct Cart {
    owner: Uuid,
    lines: Vec<CartLine>,
}

impl Cart {
    /// Creates an empty cart for a customer.
    #[must_use]
    pub fn new(owner: Uuid) -> Self {
        Self {
            owner,
            lines: Vec::new(),
        }
    }

    /// The owning customer.
    #[must_use]
    pub fn owner(&self) -> Uuid {
        self.owner
    }

    /// Adds a snapshotted line, merging with an existing line for the same
    /// product. `available` is the fresh stock count for the product.
    ///
    /// # Errors
    ///
    /// - [`CartError::InvalidQuantity`]: the line quantity is 0.
    /// - [`CartError::Stock`]: the product is out of stock, or the combined
    ///   quantity exceeds `available`. The cart is unchanged.
    pub fn add(&mut self, line: CartLine, available: u64) -> Result<(), CartError> {
        if line.quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }

        if available == 0 {
            return Err(StockError::OutOfStock.into());
        }

        let combined = match self.line(line.product) {
            // A sum past u64::MAX cannot fit any stock either.
            Some(existing) => existing
                .quantity
                .checked_add(line.quantity)
                .ok_or(StockError::Exceeded { available })?,
            None => line.quantity,
        };

        if combined > available {
            return Err(StockError::Exceeded { available }.into());
        }

        if let Some(existing) = self.lines.iter_mut().find(|l| l.product == line.product) {
            // Merge: keep selection, take the fresh price snapshot.
            *existing = CartLine {
                quantity: combined,
                selected: existing.selected,
                ..line
            };
        } else {
            self.lines.push(line);
        }

        Ok(())
    }

    /// Increments a line's quantity by one, stock permitting.
    ///
    /// # Errors
    ///
    /// - [`CartError::LineNotFound`]: no line for this product.
    /// - [`CartError::Stock`]: the incremented quantity would exceed
    ///   `available`. The line is unchanged.
    pub fn increase(&mut self, product: ProductKey, available: u64) -> Result<u64, CartError> {
        let line = self
            .lines
            .iter_mut()
            .find(|l| l.product == product)
            .ok_or(CartError::LineNotFound(product))?;

        if line.quantity >= available {
            return Err(StockError::Exceeded { available }.into());
        }

        line.quantity += 1;

        Ok(line.quantity)
    }

    /// Decrements a line's quantity by one, flooring at 1. Removal is a
    /// distinct explicit action, never reachable via decrement.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::LineNotFound`] when no line exists for the
    /// product.
    pub fn decrease(&mut self, product: ProductKey) -> Result<u64, CartError> {
        let line = self
            .lines
            .iter_mut()
            .find(|l| l.product == product)
            .ok_or(CartError::LineNotFound(product))?;

        if line.quantity > 1 {
            line.quantity -= 1;
        }

        Ok(line.quantity)
    }

    /// Toggles whether a line takes part in pricing and checkout.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::LineNotFound`] when no line exists for the
    /// product.
    pub fn set_selected(&mut self, product: ProductKey, selected: bool) -> Result<(), CartError> {
        let line = self
            .lines
            .iter_mut()
            .find(|l| l.product == product)
            .ok_or(CartError::LineNotFound(product))?;

        line.selected = selected;

        Ok(())
    }

    /// Removes a line outright.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::LineNotFound`] when no line exists for the
    /// product.
    pub fn remove(&mut self, product: ProductKey) -> Result<CartLine, CartError> {
        let index = self
            .lines
            .iter()
            .position(|l| l.product == product)
            .ok_or(CartError::LineNotFound(product))?;

        Ok(self.lines.remove(index))
    }

    /// Removes every selected line. Called after order creation succeeds.
    pub fn remove_selected(&mut self) {
        self.lines.retain(|line| !line.selected);
    }

    /// The line for a product, if present.
    #[must_use]
    pub fn line(&self, product: ProductKey) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.product == product)
    }

    /// Iterate over every line, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &CartLine> {
        self.lines.iter()
    }

    /// Iterate over the selected lines only.
    pub fn selected_lines(&self) -> impl Iterator<Item = &CartLine> {
        self.lines.iter().filter(|line| line.selected)
    }

    /// Number of lines in the cart.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use jiff::{Zoned, civil, tz::TimeZone};
    use rusty_money::iso::VND;
    use testresult::TestResult;

    use crate::discounts::Resolution;

    use super::*;

    fn clock() -> TestResult<Zoned> {
        Ok(civil::date(2026, 3, 1)
            .at(9, 0, 0, 0)
            .to_zoned(TimeZone::UTC)?)
    }

    fn product(price: i64, quantity: u64) -> TestResult<(ProductKey, Product)> {
        let mut keys = slotmap::SlotMap::<ProductKey, ()>::with_key();
        let key = keys.insert(());

        let product = Product::new(
            "Cat tree",
            Money::from_minor(price, VND),
            quantity,
            CategoryKey::default(),
            Uuid::now_v7(),
            &clock()?,
        );

        Ok((key, product))
    }

    fn plain_line(key: ProductKey, state: &Product, quantity: u64) -> CartLine {
        CartLine::snapshot(key, state, &Resolution::passthrough(state.price), quantity)
    }

    #[test]
    fn add_line_snapshots_price() -> TestResult {
        let (key, state) = product(100_000, 10)?;
        let mut cart = Cart::new(Uuid::now_v7());

        cart.add(plain_line(key, &state, 2), stock::available(&state))?;

        let line = cart.line(key).ok_or("line missing")?;

        assert_eq!(line.quantity, 2);
        assert!(line.selected);
        assert_eq!(line.unit_price(), Money::from_minor(100_000, VND));
        assert!(!line.applied_discount());

        Ok(())
    }

    #[test]
    fn add_out_of_stock_is_refused() -> TestResult {
        let (key, mut state) = product(100_000, 5)?;
        state.sold_count = 5;

        let mut cart = Cart::new(Uuid::now_v7());
        let result = cart.add(plain_line(key, &state, 1), stock::available(&state));

        assert!(matches!(
            result,
            Err(CartError::Stock(StockError::OutOfStock))
        ));
        assert!(cart.is_empty());

        Ok(())
    }

    #[test]
    fn merge_on_readd_is_stock_gated() -> TestResult {
        let (key, state) = product(100_000, 5)?;
        let mut cart = Cart::new(Uuid::now_v7());

        cart.add(plain_line(key, &state, 3), 5)?;

        // 3 already in the cart + 3 more would exceed the 5 available.
        let result = cart.add(plain_line(key, &state, 3), 5);

        assert!(matches!(
            result,
            Err(CartError::Stock(StockError::Exceeded { available: 5 }))
        ));

        // The existing line is untouched.
        assert_eq!(cart.line(key).map(|l| l.quantity), Some(3));

        cart.add(plain_line(key, &state, 2), 5)?;

        assert_eq!(cart.line(key).map(|l| l.quantity), Some(5));
        assert_eq!(cart.len(), 1);

        Ok(())
    }

    #[test]
    fn merge_rejects_quantity_sum_past_u64_max() -> TestResult {
        let (key, state) = product(100_000, 10)?;
        let mut cart = Cart::new(Uuid::now_v7());

        cart.add(plain_line(key, &state, 2), 10)?;

        // The combined quantity overflows u64; the merge must be refused,
        // not wrapped into a tiny quantity that slips past the stock gate.
        let result = cart.add(plain_line(key, &state, u64::MAX), 10);

        assert!(matches!(
            result,
            Err(CartError::Stock(StockError::Exceeded { available: 10 }))
        ));
        assert_eq!(cart.line(key).map(|l| l.quantity), Some(2));

        Ok(())
    }

    #[test]
    fn increase_rejects_beyond_available() -> TestResult {
        let (key, state) = product(100_000, 3)?;
        let mut cart = Cart::new(Uuid::now_v7());

        cart.add(plain_line(key, &state, 3), 3)?;

        let result = cart.increase(key, 3);

        assert!(matches!(
            result,
            Err(CartError::Stock(StockError::Exceeded { available: 3 }))
        ));
        assert_eq!(cart.line(key).map(|l| l.quantity), Some(3));

        Ok(())
    }

    #[test]
    fn decrease_floors_at_one() -> TestResult {
        let (key, state) = product(100_000, 5)?;
        let mut cart = Cart::new(Uuid::now_v7());

        cart.add(plain_line(key, &state, 2), 5)?;

        assert_eq!(cart.decrease(key)?, 1);
        assert_eq!(cart.decrease(key)?, 1);
        assert_eq!(cart.line(key).map(|l| l.quantity), Some(1));

        Ok(())
    }

    #[test]
    fn remove_selected_keeps_unselected_lines() -> TestResult {
        // Mint both keys from one map so the two lines are distinct products.
        let mut keys = slotmap::SlotMap::<ProductKey, ()>::with_key();
        let key_a = keys.insert(());
        let key_b = keys.insert(());
        let (_, state_a) = product(100_000, 5)?;
        let (_, state_b) = product(50_000, 5)?;

        let mut cart = Cart::new(Uuid::now_v7());
        cart.add(plain_line(key_a, &state_a, 1), 5)?;
        cart.add(plain_line(key_b, &state_b, 1), 5)?;

        cart.set_selected(key_b, false)?;
        cart.remove_selected();

        assert_eq!(cart.len(), 1);
        assert!(cart.line(key_a).is_none());
        assert!(cart.line(key_b).is_some());

        Ok(())
    }

    #[test]
    fn unknown_line_operations_return_not_found() -> TestResult {
        let (key, _) = product(100_000, 5)?;
        let mut cart = Cart::new(Uuid::now_v7());

        assert!(matches!(
            cart.increase(key, 5),
            Err(CartError::LineNotFound(_))
        ));
        assert!(matches!(cart.decrease(key), Err(CartError::LineNotFound(_))));
        assert!(matches!(
            cart.remove(key),
            Err(CartError::LineNotFound(_))
        ));

        Ok(())
    }

    #[test]
    fn zero_quantity_line_is_invalid() -> TestResult {
        let (key, state) = product(100_000, 5)?;
        let mut cart = Cart::new(Uuid::now_v7());

        let result = cart.add(plain_line(key, &state, 0), 5);

        assert!(matches!(result, Err(CartError::InvalidQuantity)));

        Ok(())
    }
}
