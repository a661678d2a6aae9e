//! Catalog
//!
//! In-memory store for products, categories and discounts: the data
//! contract the persistence collaborator must honor. Every admin mutation
//! funnels through an update chokepoint that appends exactly one audit
//! entry; hard deletion is only reachable from an already soft-deleted
//! state. Bulk operations treat each item independently and report partial
//! success counts.

use jiff::Zoned;
use rustc_hash::FxHashMap;
use slotmap::SlotMap;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    audit::AuditError,
    cart::{Cart, CartError, CartLine},
    discounts::{self, Discount, DiscountKey},
    products::{Category, CategoryKey, Product, ProductKey, ProductStatus},
    stock::{self, StockError},
};

/// Errors raised by catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The entity does not exist or is soft-deleted.
    #[error("entity not found")]
    NotFound,

    /// A discount with this code already exists.
    #[error("discount code already exists")]
    DuplicateCode,

    /// No discount carries this code.
    #[error("unknown discount code")]
    UnknownCode,

    /// The code exists but is disabled, deleted, or outside its redemption
    /// window.
    #[error("discount code is not currently redeemable")]
    InactiveCode,

    /// Recording the sale would push `sold_count` past `quantity`.
    #[error(transparent)]
    Stock(#[from] StockError),

    /// Hard-delete guard refused the operation.
    #[error(transparent)]
    Audit(#[from] AuditError),
}

/// Outcome of a bulk operation: per-item successes and failures, neither
/// blocking the other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkOutcome {
    /// Items that were mutated.
    pub succeeded: usize,

    /// Items that were skipped with an error.
    pub failed: usize,
}

impl BulkOutcome {
    fn record<T, E>(&mut self, result: &Result<T, E>) {
        if result.is_ok() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// Keyed stores for the storefront's catalog entities.
#[derive(Debug, Default)]
pub struct Catalog {
    products: SlotMap<ProductKey, Product>,
    categories: SlotMap<CategoryKey, Category>,
    discounts: SlotMap<DiscountKey, Discount>,
    codes: FxHashMap<String, DiscountKey>,
}

impl Catalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a category.
    pub fn add_category(&mut self, category: Category) -> CategoryKey {
        self.categories.insert(category)
    }

    /// A live category.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] for unknown or soft-deleted keys.
    pub fn category(&self, key: CategoryKey) -> Result<&Category, CatalogError> {
        self.categories
            .get(key)
            .filter(|category| !category.audit.is_deleted())
            .ok_or(CatalogError::NotFound)
    }

    /// Applies a mutation to a live category and appends one audit entry.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] for unknown or soft-deleted keys.
    pub fn update_category(
        &mut self,
        key: CategoryKey,
        actor: Uuid,
        now: &Zoned,
        apply: impl FnOnce(&mut Category),
    ) -> Result<(), CatalogError> {
        let category = self
            .categories
            .get_mut(key)
            .filter(|category| !category.audit.is_deleted())
            .ok_or(CatalogError::NotFound)?;

        apply(category);
        category.audit.record_update(actor, now);

        Ok(())
    }

    /// Soft-deletes a category.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] for unknown or already-deleted
    /// keys.
    pub fn soft_delete_category(
        &mut self,
        key: CategoryKey,
        actor: Uuid,
        now: &Zoned,
    ) -> Result<(), CatalogError> {
        let category = self
            .categories
            .get_mut(key)
            .filter(|category| !category.audit.is_deleted())
            .ok_or(CatalogError::NotFound)?;

        category.audit.record_delete(actor, now);

        Ok(())
    }

    /// Clears a category's soft-delete marker, keeping its history.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] for unknown keys.
    pub fn restore_category(&mut self, key: CategoryKey) -> Result<(), CatalogError> {
        let category = self.categories.get_mut(key).ok_or(CatalogError::NotFound)?;

        category.audit.restore();

        Ok(())
    }

    /// Irreversibly removes a category. Only reachable from a soft-deleted
    /// state.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::NotFound`]: unknown key.
    /// - [`CatalogError::Audit`]: the category was never soft-deleted.
    pub fn purge_category(&mut self, key: CategoryKey) -> Result<Category, CatalogError> {
        let category = self.categories.get(key).ok_or(CatalogError::NotFound)?;

        category.audit.ensure_purgeable()?;

        self.categories.remove(key).ok_or(CatalogError::NotFound)
    }

    /// Inserts a product.
    pub fn add_product(&mut self, product: Product) -> ProductKey {
        self.products.insert(product)
    }

    /// A live product.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] for unknown or soft-deleted keys.
    pub fn product(&self, key: ProductKey) -> Result<&Product, CatalogError> {
        self.products
            .get(key)
            .filter(|product| !product.audit.is_deleted())
            .ok_or(CatalogError::NotFound)
    }

    /// Applies a mutation to a live product and appends one audit entry.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] for unknown or soft-deleted keys.
    pub fn update_product(
        &mut self,
        key: ProductKey,
        actor: Uuid,
        now: &Zoned,
        apply: impl FnOnce(&mut Product),
    ) -> Result<(), CatalogError> {
        let product = self
            .products
            .get_mut(key)
            .filter(|product| !product.audit.is_deleted())
            .ok_or(CatalogError::NotFound)?;

        apply(product);
        product.audit.record_update(actor, now);

        Ok(())
    }

    /// Soft-deletes a product.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] for unknown or already-deleted
    /// keys.
    pub fn soft_delete_product(
        &mut self,
        key: ProductKey,
        actor: Uuid,
        now: &Zoned,
    ) -> Result<(), CatalogError> {
        let product = self
            .products
            .get_mut(key)
            .filter(|product| !product.audit.is_deleted())
            .ok_or(CatalogError::NotFound)?;

        product.audit.record_delete(actor, now);
        tracing::debug!(?key, "product soft-deleted");

        Ok(())
    }

    /// Clears a product's soft-delete marker, keeping its history.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] for unknown keys.
    pub fn restore_product(&mut self, key: ProductKey) -> Result<(), CatalogError> {
        let product = self.products.get_mut(key).ok_or(CatalogError::NotFound)?;

        product.audit.restore();

        Ok(())
    }

    /// Irreversibly removes a product. Only reachable from a soft-deleted
    /// state.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::NotFound`]: unknown key.
    /// - [`CatalogError::Audit`]: the product was never soft-deleted.
    pub fn purge_product(&mut self, key: ProductKey) -> Result<Product, CatalogError> {
        let product = self.products.get(key).ok_or(CatalogError::NotFound)?;

        product.audit.ensure_purgeable()?;

        self.products.remove(key).ok_or(CatalogError::NotFound)
    }

    /// Records `quantity` units sold, after checkout has validated stock.
    /// `sold_count` never exceeds `quantity` through this path.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::NotFound`]: unknown or soft-deleted key.
    /// - [`CatalogError::Stock`]: the sale would oversell the product.
    pub fn record_sale(&mut self, key: ProductKey, quantity: u64) -> Result<(), CatalogError> {
        let product = self
            .products
            .get_mut(key)
            .filter(|product| !product.audit.is_deleted())
            .ok_or(CatalogError::NotFound)?;

        stock::ensure_within_stock(product, quantity)?;
        product.sold_count += quantity;

        tracing::debug!(?key, quantity, sold = product.sold_count, "sale recorded");

        Ok(())
    }

    /// Inserts a discount, enforcing code uniqueness.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::DuplicateCode`] when the code is taken.
    pub fn add_discount(&mut self, discount: Discount) -> Result<DiscountKey, CatalogError> {
        if self.codes.contains_key(&discount.code) {
            return Err(CatalogError::DuplicateCode);
        }

        let code = discount.code.clone();
        let key = self.discounts.insert(discount);
        self.codes.insert(code, key);

        Ok(key)
    }

    /// A live discount.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] for unknown or soft-deleted keys.
    pub fn discount(&self, key: DiscountKey) -> Result<&Discount, CatalogError> {
        self.discounts
            .get(key)
            .filter(|discount| !discount.audit.is_deleted())
            .ok_or(CatalogError::NotFound)
    }

    /// Applies a mutation to a live discount and appends one audit entry.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] for unknown or soft-deleted keys.
    pub fn update_discount(
        &mut self,
        key: DiscountKey,
        actor: Uuid,
        now: &Zoned,
        apply: impl FnOnce(&mut Discount),
    ) -> Result<(), CatalogError> {
        let discount = self
            .discounts
            .get_mut(key)
            .filter(|discount| !discount.audit.is_deleted())
            .ok_or(CatalogError::NotFound)?;

        apply(discount);
        discount.audit.record_update(actor, now);

        Ok(())
    }

    /// Soft-deletes a discount.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] for unknown or already-deleted
    /// keys.
    pub fn soft_delete_discount(
        &mut self,
        key: DiscountKey,
        actor: Uuid,
        now: &Zoned,
    ) -> Result<(), CatalogError> {
        let discount = self
            .discounts
            .get_mut(key)
            .filter(|discount| !discount.audit.is_deleted())
            .ok_or(CatalogError::NotFound)?;

        discount.audit.record_delete(actor, now);

        Ok(())
    }

    /// Irreversibly removes a discount. Only reachable from a soft-deleted
    /// state; the code becomes available again.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::NotFound`]: unknown key.
    /// - [`CatalogError::Audit`]: the discount was never soft-deleted.
    pub fn purge_discount(&mut self, key: DiscountKey) -> Result<Discount, CatalogError> {
        let discount = self.discounts.get(key).ok_or(CatalogError::NotFound)?;

        discount.audit.ensure_purgeable()?;

        let discount = self.discounts.remove(key).ok_or(CatalogError::NotFound)?;
        self.codes.remove(&discount.code);

        Ok(discount)
    }

    /// Looks up a voucher a customer explicitly typed in. Unlike silent
    /// pricing degradation, an invalid code here is surfaced to the user.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::UnknownCode`]: no discount carries this code.
    /// - [`CatalogError::InactiveCode`]: the code is disabled, deleted, or
    ///   outside its redemption window.
    pub fn redeem_voucher(
        &self,
        code: &str,
        now: &Zoned,
    ) -> Result<(DiscountKey, &Discount), CatalogError> {
        let key = *self.codes.get(code).ok_or(CatalogError::UnknownCode)?;

        let discount = self
            .discounts
            .get(key)
            .ok_or(CatalogError::UnknownCode)?;

        if !discount.is_redeemable(now) {
            return Err(CatalogError::InactiveCode);
        }

        Ok((key, discount))
    }

    /// Adds a product to a cart: resolves the product's own discount into a
    /// price snapshot and gates on fresh stock. The authoritative
    /// availability check happens here, server-side, not in the client.
    ///
    /// # Errors
    ///
    /// - [`CartError::ProductNotFound`]: unknown, soft-deleted, or inactive
    ///   product.
    /// - [`CartError::Stock`]: out of stock, or the quantity does not fit.
    pub fn add_to_cart(
        &self,
        cart: &mut Cart,
        key: ProductKey,
        quantity: u64,
        now: &Zoned,
    ) -> Result<(), CartError> {
        let product = self.sellable_product(key)?;

        stock::ensure_sellable(product)?;

        let discount = product.discount.and_then(|d| self.discount(d).ok());
        let resolution = discounts::resolve(product.price, discount, now)?;
        let line = CartLine::snapshot(key, product, &resolution, quantity);

        cart.add(line, stock::available(product))
    }

    /// Increments a cart line against fresh stock.
    ///
    /// # Errors
    ///
    /// - [`CartError::ProductNotFound`]: unknown, soft-deleted, or inactive
    ///   product.
    /// - [`CartError::LineNotFound`] / [`CartError::Stock`]: from the cart.
    pub fn increase_line(&self, cart: &mut Cart, key: ProductKey) -> Result<u64, CartError> {
        let product = self.sellable_product(key)?;

        cart.increase(key, stock::available(product))
    }

    /// Soft-deletes several products; one failure does not block the rest.
    pub fn soft_delete_products(
        &mut self,
        keys: &[ProductKey],
        actor: Uuid,
        now: &Zoned,
    ) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();

        for &key in keys {
            outcome.record(&self.soft_delete_product(key, actor, now));
        }

        tracing::info!(
            succeeded = outcome.succeeded,
            failed = outcome.failed,
            "bulk product delete"
        );

        outcome
    }

    /// Sets the status on several products; one failure does not block the
    /// rest.
    pub fn set_product_status_many(
        &mut self,
        keys: &[ProductKey],
        status: ProductStatus,
        actor: Uuid,
        now: &Zoned,
    ) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();

        for &key in keys {
            outcome.record(&self.update_product(key, actor, now, |product| {
                product.status = status;
            }));
        }

        tracing::info!(
            succeeded = outcome.succeeded,
            failed = outcome.failed,
            ?status,
            "bulk product status change"
        );

        outcome
    }

    /// A product the storefront may sell: live and active.
    fn sellable_product(&self, key: ProductKey) -> Result<&Product, CartError> {
        self.product(key)
            .ok()
            .filter(|product| product.status == ProductStatus::Active)
            .ok_or(CartError::ProductNotFound(key))
    }
}
