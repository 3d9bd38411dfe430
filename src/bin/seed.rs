use ambulante_pos::{config::AppConfig, db::create_pool};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let establishment_id = ensure_establishment(&pool, "Barraca do Zé").await?;
    seed_products(&pool, establishment_id).await?;
    seed_customers(&pool, establishment_id).await?;

    println!("Seed completed. Establishment ID: {establishment_id}");
    Ok(())
}

async fn ensure_establishment(pool: &sqlx::PgPool, name: &str) -> anyhow::Result<Uuid> {
    let existing: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM establishments WHERE name = $1")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    if let Some((id,)) = existing {
        return Ok(id);
    }

    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO establishments (id, name) VALUES ($1, $2)")
        .bind(id)
        .bind(name)
        .execute(pool)
        .await?;

    println!("Created establishment {name}");
    Ok(id)
}

async fn seed_products(pool: &sqlx::PgPool, establishment_id: Uuid) -> anyhow::Result<()> {
    let products = vec![
        ("Água Mineral", "Bebidas", "2.50", 120),
        ("Refrigerante Lata", "Bebidas", "5.00", 80),
        ("Espetinho de Carne", "Comidas", "7.90", 40),
        ("Pastel de Queijo", "Comidas", "6.00", 60),
        ("Cerveja Long Neck", "Bebidas", "8.00", 100),
    ];

    for (name, category, price, stock) in products {
        sqlx::query(
            r#"
            INSERT INTO products (id, establishment_id, name, category, price, stock)
            SELECT $1, $2, $3, $4, $5::numeric, $6
            WHERE NOT EXISTS (
                SELECT 1 FROM products WHERE establishment_id = $2 AND name = $3
            )
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(establishment_id)
        .bind(name)
        .bind(category)
        .bind(price)
        .bind(stock)
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}

async fn seed_customers(pool: &sqlx::PgPool, establishment_id: Uuid) -> anyhow::Result<()> {
    let customers = vec![
        ("Margô", "11987654321", "Active"),
        ("Seu Antônio", "11912345678", "New"),
    ];

    for (name, phone, status) in customers {
        sqlx::query(
            r#"
            INSERT INTO customers (id, establishment_id, name, phone, status)
            SELECT $1, $2, $3, $4, $5
            WHERE NOT EXISTS (
                SELECT 1 FROM customers WHERE establishment_id = $2 AND phone = $4
            )
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(establishment_id)
        .bind(name)
        .bind(phone)
        .bind(status)
        .execute(pool)
        .await?;
    }

    println!("Seeded customers");
    Ok(())
}
