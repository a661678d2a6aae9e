//! Discounts
//!
//! Discount and voucher definitions plus the resolver that turns one into a
//! concrete price adjustment. A discount attached to a product is a
//! line-level voucher; the same definition applied at checkout is an
//! order-level voucher. Both resolve through [`resolve`]; only the
//! aggregation stage differs.

use decimal_percentage::Percentage;
use jiff::{Zoned, civil};
use rust_decimal::{
    Decimal, RoundingStrategy,
    prelude::{FromPrimitive, ToPrimitive},
};
use rusty_money::{Money, MoneyError, iso::Currency};
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use smallvec::SmallVec;
use thiserror::Error;
use uuid::Uuid;

use crate::audit::AuditTrail;

new_key_type! {
    /// Discount Key
    pub struct DiscountKey;
}

/// Errors specific to discount resolution.
#[derive(Debug, Error)]
pub enum DiscountError {
    /// Percentage calculation could not be safely converted.
    #[error("percentage conversion overflowed or was not finite")]
    PercentConversion,

    /// Wrapped money arithmetic or currency mismatch error.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Errors rejected at discount creation/edit time.
///
/// These are data-entry invariants, distinct from the redemption-time window
/// check performed by [`resolve`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeSlotError {
    /// The slot ends at or before it starts.
    #[error("time slot ends at or before it starts")]
    EmptyWindow,

    /// The slot's end instant was already in the past when the slot was
    /// created.
    #[error("time slot has already ended")]
    AlreadyEnded,
}

/// Whether a discount may currently be redeemed at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscountStatus {
    /// Redeemable (time slots permitting).
    Active,

    /// Disabled by an operator.
    Inactive,
}

/// The concrete benefit a discount grants.
#[derive(Debug, Clone, Copy)]
pub enum DiscountKind {
    /// Reduce the price by a fraction (`Percentage::from(0.10)` is 10% off).
    Percent(Percentage),

    /// Subtract a fixed amount from the price, floored at zero.
    AmountOff(Money<'static, Currency>),

    /// Leave item prices untouched; zero the shipping fee at the order
    /// aggregation stage instead.
    FreeShipping,
}

/// A redemption window: one civil date with a start/end time range,
/// half-open at the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    date: civil::Date,
    start: civil::Time,
    end: civil::Time,
}

impl TimeSlot {
    /// Creates a slot, enforcing the data-entry invariants.
    ///
    /// # Errors
    ///
    /// - [`TimeSlotError::EmptyWindow`]: `end <= start`.
    /// - [`TimeSlotError::AlreadyEnded`]: the slot's end instant is not
    ///   after `created`.
    pub fn new(
        date: civil::Date,
        start: civil::Time,
        end: civil::Time,
        created: &Zoned,
    ) -> Result<Self, TimeSlotError> {
        if end <= start {
            return Err(TimeSlotError::EmptyWindow);
        }

        if date.to_datetime(end) <= created.datetime() {
            return Err(TimeSlotError::AlreadyEnded);
        }

        Ok(Self { date, start, end })
    }

    /// Whether the wall-clock instant falls within `[start, end)`.
    #[must_use]
    pub fn contains(&self, at: civil::DateTime) -> bool {
        at >= self.date.to_datetime(self.start) && at < self.date.to_datetime(self.end)
    }
}

/// Discount / voucher definition.
#[derive(Debug, Clone)]
pub struct Discount {
    /// Redemption code, unique within a catalog.
    pub code: String,

    /// The benefit granted.
    pub kind: DiscountKind,

    /// Operator-controlled status.
    pub status: DiscountStatus,

    /// Optional redemption windows. Empty means always redeemable.
    pub time_slots: SmallVec<[TimeSlot; 4]>,

    /// Create/update/delete history
    pub audit: AuditTrail,
}

impl Discount {
    /// Creates an active discount with no time restrictions.
    #[must_use]
    pub fn new(code: impl Into<String>, kind: DiscountKind, actor: Uuid, now: &Zoned) -> Self {
        Self {
            code: code.into(),
            kind,
            status: DiscountStatus::Active,
            time_slots: SmallVec::new(),
            audit: AuditTrail::new(actor, now),
        }
    }

    /// Restricts redemption to the given time slots.
    #[must_use]
    pub fn with_slots(mut self, slots: impl IntoIterator<Item = TimeSlot>) -> Self {
        self.time_slots = slots.into_iter().collect();
        self
    }

    /// Whether `now` falls inside at least one slot (or no slots restrict
    /// this discount).
    #[must_use]
    pub fn in_window(&self, now: &Zoned) -> bool {
        self.time_slots.is_empty()
            || self
                .time_slots
                .iter()
                .any(|slot| slot.contains(now.datetime()))
    }

    /// Whether the discount may be redeemed at this instant: active, not
    /// soft-deleted, and inside a redemption window.
    #[must_use]
    pub fn is_redeemable(&self, now: &Zoned) -> bool {
        self.status == DiscountStatus::Active && !self.audit.is_deleted() && self.in_window(now)
    }
}

/// The outcome of resolving a discount against a base price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    /// Price after the discount, never negative and never above the base.
    pub final_price: Money<'static, Currency>,

    /// Monetary amount actually removed (post-clamping).
    pub discount_amount: Money<'static, Currency>,

    /// Whole-percent equivalent of the reduction, for display.
    pub percent_equivalent: i64,

    /// Whether the discount applied at all.
    pub active: bool,
}

impl Resolution {
    /// The undiscounted outcome: a missing, disabled, out-of-window or
    /// zero-valued discount prices at the base rate.
    #[must_use]
    pub fn passthrough(base: Money<'static, Currency>) -> Self {
        Self {
            final_price: base,
            discount_amount: Money::from_minor(0, base.currency()),
            percent_equivalent: 0,
            active: false,
        }
    }
}

/// Resolves a discount against a base price at a given instant.
///
/// Inactive, soft-deleted, out-of-window and non-positive discounts degrade
/// silently to the base price; that is a pricing outcome, not an error. The
/// error path is reserved for arithmetic that cannot be represented.
///
/// # Errors
///
/// - [`DiscountError::PercentConversion`]: percent arithmetic overflowed.
/// - [`DiscountError::Money`]: money arithmetic or currency mismatch.
pub fn resolve(
    base: Money<'static, Currency>,
    discount: Option<&Discount>,
    now: &Zoned,
) -> Result<Resolution, DiscountError> {
    let Some(discount) = discount else {
        return Ok(Resolution::passthrough(base));
    };

    if !discount.is_redeemable(now) {
        return Ok(Resolution::passthrough(base));
    }

    match discount.kind {
        DiscountKind::Percent(percent) => {
            if percent * Decimal::ONE <= Decimal::ZERO {
                return Ok(Resolution::passthrough(base));
            }

            let off_minor = percent_of_minor(percent, base.to_minor_units())?;
            let final_price = floor_at_zero(base.sub(Money::from_minor(off_minor, base.currency()))?);

            Ok(Resolution {
                final_price,
                discount_amount: base.sub(final_price)?,
                percent_equivalent: whole_percent(percent)?,
                active: true,
            })
        }
        DiscountKind::AmountOff(value) => {
            if value.to_minor_units() <= 0 {
                return Ok(Resolution::passthrough(base));
            }

            let final_price = floor_at_zero(base.sub(value)?);
            let discount_amount = base.sub(final_price)?;

            Ok(Resolution {
                final_price,
                discount_amount,
                percent_equivalent: amount_as_percent_of(value, base)?,
                active: true,
            })
        }
        DiscountKind::FreeShipping => Ok(Resolution {
            final_price: base,
            discount_amount: Money::from_minor(0, base.currency()),
            percent_equivalent: 0,
            active: true,
        }),
    }
}

/// Discount amount in minor units for a percentage of a minor-unit amount,
/// rounded midpoint-away-from-zero.
///
/// # Errors
///
/// Returns [`DiscountError::PercentConversion`] when the product cannot be
/// represented.
pub fn percent_of_minor(percent: Percentage, minor: i64) -> Result<i64, DiscountError> {
    let minor = Decimal::from_i64(minor).ok_or(DiscountError::PercentConversion)?;

    (percent * Decimal::ONE)
        .checked_mul(minor)
        .ok_or(DiscountError::PercentConversion)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(DiscountError::PercentConversion)
}

/// Clamp a possibly negative money value at zero.
fn floor_at_zero(money: Money<'static, Currency>) -> Money<'static, Currency> {
    if money.to_minor_units() < 0 {
        Money::from_minor(0, money.currency())
    } else {
        money
    }
}

/// `Percentage::from(0.10)` -> `10`.
fn whole_percent(percent: Percentage) -> Result<i64, DiscountError> {
    (percent * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(DiscountError::PercentConversion)
}

/// `round(value / base * 100)`, or 0 when the base is not positive.
fn amount_as_percent_of(
    value: Money<'static, Currency>,
    base: Money<'static, Currency>,
) -> Result<i64, DiscountError> {
    let base_minor = base.to_minor_units();

    if base_minor <= 0 {
        return Ok(0);
    }

    let value = Decimal::from_i64(value.to_minor_units()).ok_or(DiscountError::PercentConversion)?;
    let base = Decimal::from_i64(base_minor).ok_or(DiscountError::PercentConversion)?;

    value
        .checked_div(base)
        .ok_or(DiscountError::PercentConversion)?
        .checked_mul(Decimal::ONE_HUNDRED)
        .ok_or(DiscountError::PercentConversion)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(DiscountError::PercentConversion)
}
