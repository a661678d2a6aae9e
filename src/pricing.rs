//! Pricing
//!
//! Combines per-line discounts and an optional order-level voucher into the
//! monetary summary a customer owes: subtotal, shipping fee, voucher
//! discount and total. The order voucher is applied exactly once, as a
//! subtraction from the line-discounted subtotal; unit prices are never
//! re-adjusted by it.

use jiff::Zoned;
use rusty_money::{Money, MoneyError, iso::Currency};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    cart::CartLine,
    discounts::{self, Discount, DiscountError, DiscountKind},
};

/// Errors that can occur while pricing a set of lines.
#[derive(Debug, Error)]
pub enum PricingError {
    /// No selected lines were provided, so currency could not be determined.
    #[error("no selected lines; cannot determine currency")]
    NoLines,

    /// A line amount (unit price times quantity) overflowed.
    #[error("line amount cannot be represented")]
    AmountOverflow,

    /// Wrapped money arithmetic or currency mismatch error.
    #[error(transparent)]
    Money(#[from] MoneyError),

    /// Errors bubbled up from voucher resolution.
    #[error(transparent)]
    Discount(#[from] DiscountError),
}

/// How the order ships. The tariff is a fixed table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShippingMethod {
    /// No-cost delivery.
    Free,

    /// Standard courier.
    Standard,

    /// Express courier.
    Express,
}

impl ShippingMethod {
    /// The flat fee for this method, in the given currency's minor units.
    #[must_use]
    pub fn fee(self, currency: &'static Currency) -> Money<'static, Currency> {
        let minor = match self {
            ShippingMethod::Free => 0,
            ShippingMethod::Standard => 15_000,
            ShippingMethod::Express => 25_000,
        };

        Money::from_minor(minor, currency)
    }
}

/// Monetary summary of an order: what the selected lines cost, what the
/// voucher removed, what shipping adds, and the total owed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderSummary {
    /// Sum of line-discounted unit prices times quantities, before the
    /// order-level voucher.
    pub subtotal: Money<'static, Currency>,

    /// Shipping fee after any free-shipping voucher.
    pub shipping_fee: Money<'static, Currency>,

    /// Amount the order-level voucher removed from the subtotal. Zero for a
    /// free-shipping voucher; that benefit is carried by the fee instead,
    /// never double-counted here.
    pub voucher_discount: Money<'static, Currency>,

    /// `subtotal - voucher_discount + shipping_fee`, never negative.
    pub total: Money<'static, Currency>,
}

/// Prices the selected lines with an optional order-level voucher.
///
/// Only lines with `selected == true` participate. An inactive or
/// out-of-window voucher silently degrades to no discount; surfacing invalid
/// codes to the user is the catalog's explicit-redemption path, not a
/// pricing concern.
///
/// # Errors
///
/// - [`PricingError::NoLines`]: no line is selected.
/// - [`PricingError::AmountOverflow`]: a line amount overflowed.
/// - [`PricingError::Money`] / [`PricingError::Discount`]: wrapped
///   arithmetic errors.
pub fn price_lines(
    lines: &[CartLine],
    voucher: Option<&Discount>,
    shipping: ShippingMethod,
    now: &Zoned,
) -> Result<OrderSummary, PricingError> {
    let mut selected = lines.iter().filter(|line| line.selected).peekable();

    let currency = selected
        .peek()
        .map(|line| line.unit_price().currency())
        .ok_or(PricingError::NoLines)?;

    let subtotal = selected.try_fold(Money::from_minor(0, currency), |acc, line| {
        line_amount(line).and_then(|amount| acc.add(amount).map_err(PricingError::from))
    })?;

    let resolution = discounts::resolve(subtotal, voucher, now)?;

    let free_shipping = resolution.active
        && matches!(
            voucher.map(|v| v.kind),
            Some(DiscountKind::FreeShipping)
        );

    let shipping_fee = if free_shipping {
        Money::from_minor(0, currency)
    } else {
        shipping.fee(currency)
    };

    // `resolve` already clamps the discounted subtotal at zero, so the
    // voucher discount never exceeds the subtotal and the total never goes
    // negative.
    let voucher_discount = resolution.discount_amount;
    let total = resolution.final_price.add(shipping_fee)?;

    Ok(OrderSummary {
        subtotal,
        shipping_fee,
        voucher_discount,
        total,
    })
}

/// Unit price times quantity, in minor units, checked.
///
/// # Errors
///
/// Returns [`PricingError::AmountOverflow`] when the product cannot be
/// represented in minor units.
pub fn line_amount(line: &CartLine) -> Result<Money<'static, Currency>, PricingError> {
    let unit = line.unit_price();
    let quantity = i64::try_from(line.quantity).map_err(|_err| PricingError::AmountOverflow)?;

    let minor = unit
        .to_minor_units()
        .checked_mul(quantity)
        .ok_or(PricingError::AmountOverflow)?;

    Ok(Money::from_minor(minor, unit.currency()))
}

#[cfg(test)]
mod tests {
    use decimal_percentage::Percentage;
    use jiff::{civil, tz::TimeZone};
    use rusty_money::iso::VND;
    use testresult::TestResult;
    use uuid::Uuid;

    use crate::{
        cart::CartLine,
        discounts::Resolution,
        products::{CategoryKey, Product, ProductKey},
    };

    use super::*;

    fn clock() -> TestResult<Zoned> {
        Ok(civil::date(2026, 3, 1)
            .at(9, 0, 0, 0)
            .to_zoned(TimeZone::UTC)?)
    }

    fn line(price: i64, quantity: u64, selected: bool) -> TestResult<CartLine> {
        let state = Product::new(
            "Dog bed",
            Money::from_minor(price, VND),
            100,
            CategoryKey::default(),
            Uuid::now_v7(),
            &clock()?,
        );

        let mut line = CartLine::snapshot(
            ProductKey::default(),
            &state,
            &Resolution::passthrough(state.price),
            quantity,
        );
        line.selected = selected;

        Ok(line)
    }

    fn discounted_line(price: i64, fraction: f64, quantity: u64) -> TestResult<CartLine> {
        let state = Product::new(
            "Dog bed",
            Money::from_minor(price, VND),
            100,
            CategoryKey::default(),
            Uuid::now_v7(),
            &clock()?,
        );

        let discount = Discount::new(
            "LINE",
            DiscountKind::Percent(Percentage::from(fraction)),
            Uuid::now_v7(),
            &clock()?,
        );

        let resolution = discounts::resolve(state.price, Some(&discount), &clock()?)?;

        Ok(CartLine::snapshot(
            ProductKey::default(),
            &state,
            &resolution,
            quantity,
        ))
    }

    #[test]
    fn worked_example_with_line_discount_and_amount_voucher() -> TestResult {
        // Base price 100,000, line discount 10% -> unit 90,000, quantity 2
        // -> subtotal 180,000; order voucher 20,000 off; free shipping
        // method -> total 160,000.
        let lines = vec![discounted_line(100_000, 0.10, 2)?];

        let voucher = Discount::new(
            "WELCOME20K",
            DiscountKind::AmountOff(Money::from_minor(20_000, VND)),
            Uuid::now_v7(),
            &clock()?,
        );

        let summary = price_lines(&lines, Some(&voucher), ShippingMethod::Free, &clock()?)?;

        assert_eq!(summary.subtotal, Money::from_minor(180_000, VND));
        assert_eq!(summary.voucher_discount, Money::from_minor(20_000, VND));
        assert_eq!(summary.shipping_fee, Money::from_minor(0, VND));
        assert_eq!(summary.total, Money::from_minor(160_000, VND));

        Ok(())
    }

    #[test]
    fn shipping_voucher_zeroes_express_fee_only() -> TestResult {
        let lines = vec![line(100_000, 1, true)?];

        let voucher = Discount::new(
            "SHIPFREE",
            DiscountKind::FreeShipping,
            Uuid::now_v7(),
            &clock()?,
        );

        let summary = price_lines(&lines, Some(&voucher), ShippingMethod::Express, &clock()?)?;

        // The benefit is attributed entirely to shipping, not double-counted
        // as a product discount.
        assert_eq!(summary.shipping_fee, Money::from_minor(0, VND));
        assert_eq!(summary.voucher_discount, Money::from_minor(0, VND));
        assert_eq!(summary.total, Money::from_minor(100_000, VND));

        Ok(())
    }

    #[test]
    fn express_fee_applies_without_voucher() -> TestResult {
        let lines = vec![line(100_000, 1, true)?];

        let summary = price_lines(&lines, None, ShippingMethod::Express, &clock()?)?;

        assert_eq!(summary.shipping_fee, Money::from_minor(25_000, VND));
        assert_eq!(summary.total, Money::from_minor(125_000, VND));

        Ok(())
    }

    #[test]
    fn unselected_lines_do_not_participate() -> TestResult {
        let lines = vec![line(100_000, 1, true)?, line(999_000, 3, false)?];

        let summary = price_lines(&lines, None, ShippingMethod::Free, &clock()?)?;

        assert_eq!(summary.subtotal, Money::from_minor(100_000, VND));

        Ok(())
    }

    #[test]
    fn no_selected_lines_is_an_error() -> TestResult {
        let lines = vec![line(100_000, 1, false)?];

        assert!(matches!(
            price_lines(&lines, None, ShippingMethod::Free, &clock()?),
            Err(PricingError::NoLines)
        ));

        Ok(())
    }

    #[test]
    fn percent_voucher_is_applied_once() -> TestResult {
        // 10% order voucher on a 200,000 subtotal removes exactly 20,000;
        // the total reflects a single application.
        let lines = vec![line(100_000, 2, true)?];

        let voucher = Discount::new(
            "TENOFF",
            DiscountKind::Percent(Percentage::from(0.10)),
            Uuid::now_v7(),
            &clock()?,
        );

        let summary = price_lines(&lines, Some(&voucher), ShippingMethod::Standard, &clock()?)?;

        assert_eq!(summary.subtotal, Money::from_minor(200_000, VND));
        assert_eq!(summary.voucher_discount, Money::from_minor(20_000, VND));
        assert_eq!(summary.shipping_fee, Money::from_minor(15_000, VND));
        assert_eq!(summary.total, Money::from_minor(195_000, VND));

        Ok(())
    }

    #[test]
    fn oversized_amount_voucher_cannot_push_total_negative() -> TestResult {
        let lines = vec![line(30_000, 1, true)?];

        let voucher = Discount::new(
            "HUGE",
            DiscountKind::AmountOff(Money::from_minor(500_000, VND)),
            Uuid::now_v7(),
            &clock()?,
        );

        let summary = price_lines(&lines, Some(&voucher), ShippingMethod::Free, &clock()?)?;

        assert_eq!(summary.voucher_discount, Money::from_minor(30_000, VND));
        assert_eq!(summary.total, Money::from_minor(0, VND));

        Ok(())
    }

    #[test]
    fn inactive_voucher_degrades_to_undiscounted_total() -> TestResult {
        let lines = vec![line(100_000, 1, true)?];

        let mut voucher = Discount::new(
            "EXPIRED",
            DiscountKind::AmountOff(Money::from_minor(20_000, VND)),
            Uuid::now_v7(),
            &clock()?,
        );
        voucher.status = crate::discounts::DiscountStatus::Inactive;

        let summary = price_lines(&lines, Some(&voucher), ShippingMethod::Free, &clock()?)?;

        assert_eq!(summary.voucher_discount, Money::from_minor(0, VND));
        assert_eq!(summary.total, Money::from_minor(100_000, VND));

        Ok(())
    }
}
