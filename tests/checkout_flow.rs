use ambulante_pos::{
    cart::{Cart, CartLineSnapshot},
    db::{DbPool, create_pool},
    error::AppError,
    middleware::auth::AuthSeller,
    models::{ORDER_CLOSED, ORDER_OPEN},
    services::{inventory, order_service},
};
use rust_decimal::Decimal;
use uuid::Uuid;

// Each test seeds its own establishment, so tests stay isolated without
// truncating shared tables between runs.
async fn setup_pool() -> anyhow::Result<Option<DbPool>> {
    let database_url =
        match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
            Ok(url) => url,
            Err(_) => {
                eprintln!(
                    "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run checkout flow tests."
                );
                return Ok(None);
            }
        };

    let pool = create_pool(&database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(Some(pool))
}

async fn seed_establishment(pool: &DbPool) -> anyhow::Result<AuthSeller> {
    let establishment_id = Uuid::new_v4();
    sqlx::query("INSERT INTO establishments (id, name) VALUES ($1, $2)")
        .bind(establishment_id)
        .bind(format!("test-{establishment_id}"))
        .execute(pool)
        .await?;

    Ok(AuthSeller {
        seller_id: Uuid::new_v4(),
        establishment_id,
        role: "seller".into(),
    })
}

async fn seed_product(
    pool: &DbPool,
    seller: &AuthSeller,
    name: &str,
    price: &str,
    stock: i32,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO products (id, establishment_id, name, category, price, stock)
        VALUES ($1, $2, $3, NULL, $4::numeric, $5)
        "#,
    )
    .bind(id)
    .bind(seller.establishment_id)
    .bind(name)
    .bind(price)
    .bind(stock)
    .execute(pool)
    .await?;
    Ok(id)
}

async fn seed_customer(pool: &DbPool, seller: &AuthSeller, name: &str) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO customers (id, establishment_id, name, status) VALUES ($1, $2, $3, 'New')",
    )
    .bind(id)
    .bind(seller.establishment_id)
    .bind(name)
    .execute(pool)
    .await?;
    Ok(id)
}

fn line(id: Uuid, name: &str, price: &str, quantity: i32, stock: i32) -> CartLineSnapshot {
    CartLineSnapshot {
        id,
        name: name.into(),
        price: price.parse().unwrap(),
        quantity,
        stock,
    }
}

async fn stock_of(pool: &DbPool, product_id: Uuid) -> anyhow::Result<i32> {
    let (stock,): (i32,) = sqlx::query_as("SELECT stock FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_one(pool)
        .await?;
    Ok(stock)
}

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

#[tokio::test]
async fn quick_sale_commits_order_lines_and_stock() -> anyhow::Result<()> {
    let Some(pool) = setup_pool().await? else {
        return Ok(());
    };
    let seller = seed_establishment(&pool).await?;
    let p1 = seed_product(&pool, &seller, "P1", "5.00", 10).await?;
    let p2 = seed_product(&pool, &seller, "P2", "3.50", 4).await?;
    let customer = seed_customer(&pool, &seller, "C1").await?;

    let mut cart = Cart::from_snapshot(vec![
        line(p1, "P1", "5.00", 2, 10),
        line(p2, "P2", "3.50", 1, 4),
    ])?;

    let resp = order_service::quick_sale(&pool, &seller, &mut cart, customer, "pix").await?;
    let outcome = resp.data.unwrap();

    assert_eq!(outcome.order.status, ORDER_CLOSED);
    assert_eq!(outcome.order.total, dec("13.50"));
    assert_eq!(outcome.order.payment_method.as_deref(), Some("pix"));
    assert_eq!(outcome.items.len(), 2);
    assert!(outcome.pending_settlement.is_empty());
    assert!(cart.is_empty(), "cart must be cleared after success");

    assert_eq!(stock_of(&pool, p1).await?, 8);
    assert_eq!(stock_of(&pool, p2).await?, 3);

    // Every line settled, unit prices captured.
    let (unsettled,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM order_items WHERE order_id = $1 AND NOT settled",
    )
    .bind(outcome.order.id)
    .fetch_one(&pool)
    .await?;
    assert_eq!(unsettled, 0);

    Ok(())
}

#[tokio::test]
async fn quick_sale_aborts_before_any_write_on_stale_snapshot() -> anyhow::Result<()> {
    let Some(pool) = setup_pool().await? else {
        return Ok(());
    };
    let seller = seed_establishment(&pool).await?;
    // The snapshot claims 5 in stock, but another seller got there first.
    let p1 = seed_product(&pool, &seller, "P1", "5.00", 1).await?;
    let customer = seed_customer(&pool, &seller, "C1").await?;

    let mut cart = Cart::from_snapshot(vec![line(p1, "P1", "5.00", 2, 5)])?;
    let err = order_service::quick_sale(&pool, &seller, &mut cart, customer, "pix")
        .await
        .unwrap_err();

    match err {
        AppError::InsufficientStock { available, .. } => assert_eq!(available, 1),
        other => panic!("expected InsufficientStock, got {other:?}"),
    }
    assert!(!cart.is_empty(), "cart must survive a validation failure");

    let (orders,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM orders WHERE establishment_id = $1")
            .bind(seller.establishment_id)
            .fetch_one(&pool)
            .await?;
    assert_eq!(orders, 0, "no order rows may be written");
    assert_eq!(stock_of(&pool, p1).await?, 1);

    Ok(())
}

#[tokio::test]
async fn decrement_is_conditional_and_never_negative() -> anyhow::Result<()> {
    let Some(pool) = setup_pool().await? else {
        return Ok(());
    };
    let seller = seed_establishment(&pool).await?;
    let p1 = seed_product(&pool, &seller, "P1", "5.00", 3).await?;

    let err = inventory::decrement(&pool, seller.establishment_id, p1, 5)
        .await
        .unwrap_err();
    match err {
        AppError::InsufficientStock { product, available } => {
            assert_eq!(product, "P1");
            assert_eq!(available, 3);
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }
    assert_eq!(stock_of(&pool, p1).await?, 3, "failed decrement must not change stock");

    assert_eq!(inventory::decrement(&pool, seller.establishment_id, p1, 3).await?, 0);
    assert_eq!(inventory::get_stock(&pool, seller.establishment_id, p1).await?, 0);

    Ok(())
}

#[tokio::test]
async fn concurrent_sales_never_oversell() -> anyhow::Result<()> {
    let Some(pool) = setup_pool().await? else {
        return Ok(());
    };
    let seller = seed_establishment(&pool).await?;
    let p1 = seed_product(&pool, &seller, "P1", "5.00", 3).await?;
    let c1 = seed_customer(&pool, &seller, "C1").await?;
    let c2 = seed_customer(&pool, &seller, "C2").await?;

    let mut cart_a = Cart::from_snapshot(vec![line(p1, "P1", "5.00", 2, 3)])?;
    let mut cart_b = Cart::from_snapshot(vec![line(p1, "P1", "5.00", 2, 3)])?;

    let (a, b) = tokio::join!(
        order_service::quick_sale(&pool, &seller, &mut cart_a, c1, "pix"),
        order_service::quick_sale(&pool, &seller, &mut cart_b, c2, "pix"),
    );

    // Exactly one decrement may apply, so exactly one workflow fully
    // settles. The loser either aborts at validation or commits with the
    // settlement left pending for reconciliation.
    let fully_settled = [&a, &b]
        .iter()
        .filter(|r| {
            r.as_ref()
                .ok()
                .and_then(|resp| resp.data.as_ref())
                .is_some_and(|o| o.pending_settlement.is_empty())
        })
        .count();
    assert_eq!(fully_settled, 1, "exactly one sale may settle stock");

    for result in [a, b] {
        match result {
            Ok(resp) => {
                let outcome = resp.data.unwrap();
                assert!(
                    outcome.pending_settlement.is_empty()
                        || outcome.pending_settlement == vec![p1]
                );
            }
            Err(AppError::InsufficientStock { available, .. }) => assert!(available < 2),
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(stock_of(&pool, p1).await?, 1, "3 - 2 = 1, never negative");

    Ok(())
}

#[tokio::test]
async fn tab_lifecycle_open_quick_add_close() -> anyhow::Result<()> {
    let Some(pool) = setup_pool().await? else {
        return Ok(());
    };
    let seller = seed_establishment(&pool).await?;
    let p3 = seed_product(&pool, &seller, "P3", "10.00", 5).await?;
    let customer = seed_customer(&pool, &seller, "C1").await?;

    let mut cart = Cart::from_snapshot(vec![line(p3, "P3", "10.00", 1, 5)])?;
    let opened = order_service::open_tab(&pool, &seller, &mut cart, customer)
        .await?
        .data
        .unwrap();
    assert_eq!(opened.order.status, ORDER_OPEN);
    assert!(cart.is_empty());
    assert_eq!(stock_of(&pool, p3).await?, 5, "opening a tab must not touch stock");

    // Quick-add appends its own row; no merge, no decrement yet.
    let item = order_service::quick_add_item(&pool, &seller, opened.order.id, p3)
        .await?
        .data
        .unwrap();
    assert_eq!(item.quantity, 1);
    assert_eq!(item.unit_price, dec("10.00"));
    assert_eq!(stock_of(&pool, p3).await?, 5);

    let closed = order_service::close_order(&pool, &seller, opened.order.id, "dinheiro")
        .await?
        .data
        .unwrap();
    assert_eq!(closed.order.status, ORDER_CLOSED);
    assert_eq!(closed.order.total, dec("20.00"));
    assert_eq!(closed.items.len(), 2);
    assert!(closed.pending_settlement.is_empty());
    // The summed quantity is decremented exactly once, not once per add.
    assert_eq!(stock_of(&pool, p3).await?, 3);

    // Aberto -> Fechado happens exactly once.
    let err = order_service::close_order(&pool, &seller, opened.order.id, "pix")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert_eq!(stock_of(&pool, p3).await?, 3, "second close must not decrement again");

    Ok(())
}

#[tokio::test]
async fn quick_add_rejects_closed_orders_and_empty_stock() -> anyhow::Result<()> {
    let Some(pool) = setup_pool().await? else {
        return Ok(());
    };
    let seller = seed_establishment(&pool).await?;
    let in_stock = seed_product(&pool, &seller, "P1", "5.00", 5).await?;
    let sold_out = seed_product(&pool, &seller, "P2", "5.00", 0).await?;
    let customer = seed_customer(&pool, &seller, "C1").await?;

    let mut cart = Cart::from_snapshot(vec![line(in_stock, "P1", "5.00", 1, 5)])?;
    let tab = order_service::open_tab(&pool, &seller, &mut cart, customer)
        .await?
        .data
        .unwrap();

    let err = order_service::quick_add_item(&pool, &seller, tab.order.id, sold_out)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock { available: 0, .. }));

    order_service::close_order(&pool, &seller, tab.order.id, "pix").await?;
    let err = order_service::quick_add_item(&pool, &seller, tab.order.id, in_stock)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    Ok(())
}

#[tokio::test]
async fn reconcile_rejects_summed_quantity_beyond_ledger_range() -> anyhow::Result<()> {
    let Some(pool) = setup_pool().await? else {
        return Ok(());
    };
    let seller = seed_establishment(&pool).await?;
    let p1 = seed_product(&pool, &seller, "P1", "5.00", 10).await?;
    let customer = seed_customer(&pool, &seller, "C1").await?;

    // Each row fits i32, but the per-product sum does not.
    let order_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO orders (id, establishment_id, customer_id, total, status, payment_method)
        VALUES ($1, $2, $3, 10.00, $4, 'pix')
        "#,
    )
    .bind(order_id)
    .bind(seller.establishment_id)
    .bind(customer)
    .bind(ORDER_CLOSED)
    .execute(&pool)
    .await?;
    for _ in 0..2 {
        sqlx::query(
            r#"
            INSERT INTO order_items (id, order_id, product_id, quantity, unit_price, settled)
            VALUES ($1, $2, $3, 1500000000, 5.00, FALSE)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(order_id)
        .bind(p1)
        .execute(&pool)
        .await?;
    }

    let err = order_service::reconcile_order(&pool, &seller, order_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::MalformedRecord(_)));
    assert_eq!(stock_of(&pool, p1).await?, 10, "no decrement may apply");

    Ok(())
}

#[tokio::test]
async fn reconcile_settles_interrupted_checkout() -> anyhow::Result<()> {
    let Some(pool) = setup_pool().await? else {
        return Ok(());
    };
    let seller = seed_establishment(&pool).await?;
    let p1 = seed_product(&pool, &seller, "P1", "5.00", 10).await?;
    let customer = seed_customer(&pool, &seller, "C1").await?;

    // Fixture for a checkout that committed its rows but crashed before
    // settling stock: closed order, line still unsettled.
    let order_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO orders (id, establishment_id, customer_id, total, status, payment_method)
        VALUES ($1, $2, $3, 10.00, $4, 'pix')
        "#,
    )
    .bind(order_id)
    .bind(seller.establishment_id)
    .bind(customer)
    .bind(ORDER_CLOSED)
    .execute(&pool)
    .await?;
    sqlx::query(
        r#"
        INSERT INTO order_items (id, order_id, product_id, quantity, unit_price, settled)
        VALUES ($1, $2, $3, 2, 5.00, FALSE)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(order_id)
    .bind(p1)
    .execute(&pool)
    .await?;

    let outcome = order_service::reconcile_order(&pool, &seller, order_id)
        .await?
        .data
        .unwrap();
    assert_eq!(outcome.settled, vec![p1]);
    assert!(outcome.pending_settlement.is_empty());
    assert_eq!(stock_of(&pool, p1).await?, 8);

    // Idempotent: settled lines are never decremented twice.
    let again = order_service::reconcile_order(&pool, &seller, order_id)
        .await?
        .data
        .unwrap();
    assert!(again.settled.is_empty());
    assert!(again.pending_settlement.is_empty());
    assert_eq!(stock_of(&pool, p1).await?, 8);

    Ok(())
}
