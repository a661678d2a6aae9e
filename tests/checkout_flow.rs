//! Integration test walking the full storefront flow: seed a catalog,
//! build a cart, redeem a voucher, check out, drive the order through its
//! lifecycle, and exercise the post-completion actions (return, rating).
//!
//! Worked pricing (VND, minor unit = 1 dong):
//!
//! 1. Dog bed: 100,000 with a 10% window-gated discount -> 90,000 each.
//! 2. Salmon cat food: 25,000, no discount, quantity 2 -> 50,000.
//!    - Subtotal: 90,000 + 50,000 = 140,000.
//! 3. Voucher `WELCOME25`: 25,000 off the subtotal -> 115,000.
//! 4. Express shipping: +25,000.
//!
//! Expected total: 140,000.

use decimal_percentage::Percentage;
use jiff::{SignedDuration, Zoned, civil, tz::TimeZone};
use rusty_money::{Money, iso::VND};
use testresult::TestResult;
use uuid::Uuid;

use kibble::prelude::*;

/// A fixed server clock inside the discount window.
fn clock() -> TestResult<Zoned> {
    Ok(civil::date(2026, 3, 1)
        .at(9, 0, 0, 0)
        .to_zoned(TimeZone::UTC)?)
}

struct Store {
    catalog: Catalog,
    orders: Orders,
    dog_bed: ProductKey,
    cat_food: ProductKey,
}

/// Catalog with a window-gated product discount and an amount-off voucher.
fn seed() -> TestResult<Store> {
    let now = clock()?;
    let admin = Uuid::now_v7();
    let mut catalog = Catalog::new();

    let bedding = catalog.add_category(Category::new("Bedding", admin, &now));
    let food = catalog.add_category(Category::new("Food", admin, &now));

    let morning_slot = TimeSlot::new(
        civil::date(2026, 3, 1),
        civil::time(8, 0, 0, 0),
        civil::time(18, 0, 0, 0),
        &now,
    )?;

    let ten_off = catalog.add_discount(
        Discount::new(
            "BED10",
            DiscountKind::Percent(Percentage::from(0.10)),
            admin,
            &now,
        )
        .with_slots([morning_slot]),
    )?;

    catalog.add_discount(Discount::new(
        "WELCOME25",
        DiscountKind::AmountOff(Money::from_minor(25_000, VND)),
        admin,
        &now,
    ))?;

    let dog_bed = catalog.add_product(
        Product::new(
            "Orthopedic dog bed",
            Money::from_minor(100_000, VND),
            5,
            bedding,
            admin,
            &now,
        )
        .with_discount(ten_off),
    );

    let cat_food = catalog.add_product(Product::new(
        "Salmon cat food",
        Money::from_minor(25_000, VND),
        20,
        food,
        admin,
        &now,
    ));

    Ok(Store {
        catalog,
        orders: Orders::new(),
        dog_bed,
        cat_food,
    })
}

#[test]
fn full_checkout_and_lifecycle() -> TestResult {
    let now = clock()?;
    let customer = Uuid::now_v7();
    let mut store = seed()?;

    // Build the cart. The dog bed's discount is inside its window, so the
    // line snapshot carries the discounted price.
    let mut cart = Cart::new(customer);
    store.catalog.add_to_cart(&mut cart, store.dog_bed, 1, &now)?;
    store.catalog.add_to_cart(&mut cart, store.cat_food, 2, &now)?;

    let bed_line = cart.line(store.dog_bed).ok_or(CartError::LineNotFound(store.dog_bed))?;
    assert_eq!(bed_line.unit_price(), Money::from_minor(90_000, VND));
    assert_eq!(bed_line.discount_percent, Some(10));

    // Redeem the voucher and listen for lifecycle events before checkout.
    let (voucher, _) = store.catalog.redeem_voucher("WELCOME25", &now)?;
    let mut events = store.orders.subscribe();

    let key = store.orders.checkout(
        &mut store.catalog,
        &mut cart,
        Some(voucher),
        ShippingMethod::Express,
        customer,
        &now,
    )?;

    let order = store.orders.order(key)?;

    assert_eq!(order.status(), OrderStatus::Pending);
    assert_eq!(order.summary().subtotal, Money::from_minor(140_000, VND));
    assert_eq!(order.summary().voucher_discount, Money::from_minor(25_000, VND));
    assert_eq!(order.summary().shipping_fee, Money::from_minor(25_000, VND));
    assert_eq!(order.summary().total, Money::from_minor(140_000, VND));

    // Checkout committed the sale and emptied the cart.
    assert!(cart.is_empty());
    assert_eq!(store.catalog.product(store.dog_bed)?.sold_count, 1);
    assert_eq!(store.catalog.product(store.cat_food)?.sold_count, 2);

    // Operator drives the order forward, one step at a time.
    let operator = Uuid::now_v7();
    store.orders.advance(key, OrderStatus::Processing, operator, &now)?;
    store.orders.advance(key, OrderStatus::Shipping, operator, &now)?;
    store.orders.advance(key, OrderStatus::Completed, operator, &now)?;

    assert_eq!(store.orders.order(key)?.status(), OrderStatus::Completed);

    // Each transition reached the live-update channel in order.
    for expected in [
        OrderStatus::Processing,
        OrderStatus::Shipping,
        OrderStatus::Completed,
    ] {
        assert_eq!(events.try_recv()?.to, expected);
    }

    // Completed orders can be rated, once per product.
    store.orders.rate(key, store.dog_bed)?;
    assert!(matches!(
        store.orders.rate(key, store.dog_bed),
        Err(OrderError::AlreadyRated)
    ));

    // A return filed just inside the three-day window is accepted.
    let later = now.checked_add(SignedDuration::from_hours(71))?;
    store
        .orders
        .request_return(key, "too small", Some("dog outgrew it".into()), customer, &later)?;

    let order = store.orders.order(key)?;
    assert_eq!(order.status(), OrderStatus::Returned);
    assert!(order.return_request().is_some_and(|r| r.returned));

    assert_eq!(events.try_recv()?.to, OrderStatus::Returned);

    Ok(())
}

#[test]
fn voucher_outside_window_is_not_redeemable() -> TestResult {
    let store = seed()?;

    // 19:00 is past the discount's 18:00 close.
    let evening = civil::date(2026, 3, 1)
        .at(19, 0, 0, 0)
        .to_zoned(TimeZone::UTC)?;

    let result = store.catalog.redeem_voucher("BED10", &evening);

    assert!(matches!(result, Err(CatalogError::InactiveCode)));

    Ok(())
}

#[test]
fn cancelled_order_stays_cancelled() -> TestResult {
    let now = clock()?;
    let customer = Uuid::now_v7();
    let mut store = seed()?;

    let mut cart = Cart::new(customer);
    store.catalog.add_to_cart(&mut cart, store.cat_food, 1, &now)?;

    let key = store.orders.checkout(
        &mut store.catalog,
        &mut cart,
        None,
        ShippingMethod::Standard,
        customer,
        &now,
    )?;

    store.orders.cancel(key, customer, &now)?;

    assert!(matches!(
        store.orders.cancel(key, customer, &now),
        Err(OrderError::AlreadyCancelled)
    ));
    assert!(matches!(
        store
            .orders
            .advance(key, OrderStatus::Processing, customer, &now),
        Err(OrderError::Ineligible { .. })
    ));

    Ok(())
}
