//! Products
//!
//! Catalog entities for the storefront: products (food and accessories) and
//! the categories they hang off. Monetary values are [`Money`] in minor
//! units; stock and sales are plain counters interpreted by
//! [`crate::stock`].

use jiff::Zoned;
use rusty_money::{Money, iso::Currency};
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use uuid::Uuid;

use crate::{audit::AuditTrail, discounts::DiscountKey};

new_key_type! {
    /// Product Key
    pub struct ProductKey;
}

new_key_type! {
    /// Category Key
    pub struct CategoryKey;
}

/// Whether a product is visible to the storefront.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductStatus {
    /// Listed and sellable (stock permitting).
    Active,

    /// Hidden from the storefront.
    Inactive,
}

/// Product
#[derive(Debug, Clone)]
pub struct Product {
    /// Product name
    pub name: String,

    /// Base unit price
    pub price: Money<'static, Currency>,

    /// Total units ever stocked
    pub quantity: u64,

    /// Units sold to date
    pub sold_count: u64,

    /// Line-level discount attached to the product, if any
    pub discount: Option<DiscountKey>,

    /// Owning category
    pub category: CategoryKey,

    /// Listing status
    pub status: ProductStatus,

    /// Create/update/delete history
    pub audit: AuditTrail,
}

impl Product {
    /// Creates an active product with no sales and no attached discount.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        price: Money<'static, Currency>,
        quantity: u64,
        category: CategoryKey,
        actor: Uuid,
        now: &Zoned,
    ) -> Self {
        Self {
            name: name.into(),
            price,
            quantity,
            sold_count: 0,
            discount: None,
            category,
            status: ProductStatus::Active,
            audit: AuditTrail::new(actor, now),
        }
    }

    /// Attaches a line-level discount.
    #[must_use]
    pub fn with_discount(mut self, discount: DiscountKey) -> Self {
        self.discount = Some(discount);
        self
    }
}

/// Category
#[derive(Debug, Clone)]
pub struct Category {
    /// Category name
    pub name: String,

    /// Create/update/delete history
    pub audit: AuditTrail,
}

impl Category {
    /// Creates a category.
    #[must_use]
    pub fn new(name: impl Into<String>, actor: Uuid, now: &Zoned) -> Self {
        Self {
            name: name.into(),
            audit: AuditTrail::new(actor, now),
        }
    }
}

#[cfg(test)]
mod tests {
    use jiff::{civil, tz::TimeZone};
    use rusty_money::iso::VND;
    use testresult::TestResult;

    use super::*;

    #[test]
    fn new_product_starts_active_with_no_sales() -> TestResult {
        let now = civil::date(2026, 3, 1)
            .at(9, 0, 0, 0)
            .to_zoned(TimeZone::UTC)?;

        let product = Product::new(
            "Salmon cat food",
            Money::from_minor(100_000, VND),
            25,
            CategoryKey::default(),
            Uuid::now_v7(),
            &now,
        );

        assert_eq!(product.status, ProductStatus::Active);
        assert_eq!(product.sold_count, 0);
        assert!(product.discount.is_none());
        assert!(!product.audit.is_deleted());

        Ok(())
    }
}
