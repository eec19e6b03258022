use resale_shop_api::{
    config::AppConfig,
    db::create_pool,
    services::auth_service::hash_password,
};
use serde_json::json;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let username = std::env::var("ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string());
    let password = std::env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "Admin123!".to_string());
    let admin_id = ensure_admin(&pool, &username, &password).await?;
    seed_brands(&pool).await?;
    seed_products(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}");
    Ok(())
}

async fn ensure_admin(pool: &sqlx::PgPool, username: &str, password: &str) -> anyhow::Result<Uuid> {
    let password_hash =
        hash_password(password).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    // Existing accounts keep their password; only the admin flag is restored.
    let (user_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, username, password_hash, full_name, is_active, is_admin)
        VALUES ($1, $2, $3, 'Administrator', TRUE, TRUE)
        ON CONFLICT (username) DO UPDATE SET is_admin = TRUE, is_active = TRUE
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(username)
    .bind(password_hash)
    .fetch_one(pool)
    .await?;

    println!("Ensured admin {username}");
    Ok(user_id)
}

async fn seed_brands(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    for name in ["Zara Kids", "H&M", "Mothercare", "Reima", "Gulliver"] {
        sqlx::query(
            r#"
            INSERT INTO brands (id, name)
            VALUES ($1, $2)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .execute(pool)
        .await?;
    }
    println!("Seeded brands");
    Ok(())
}

async fn seed_products(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let existing: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products")
        .fetch_one(pool)
        .await?;
    if existing.0 > 0 {
        println!("Products already present, skipping");
        return Ok(());
    }

    // (name, brand, size, color, gender, condition, price in kopecks, stock)
    let products = vec![
        ("Летнее платье", "Zara Kids", "110", "Розовый", "girl", "Отличное", 89_000_i64, 1),
        ("Джинсы прямые", "H&M", "122", "Синий", "boy", "Хорошее", 65_000, 1),
        ("Комбинезон зимний", "Reima", "98", "Красный", "unisex", "Отличное", 320_000, 1),
        ("Боди набор 3 шт", "Mothercare", "68", "Белый", "unisex", "Новое", 120_000, 2),
    ];

    for (name, brand, size, color, gender, condition, price, stock) in products {
        sqlx::query(
            r#"
            INSERT INTO products
                (id, name, brand, size, color, gender, condition, price, quantity_in_stock, images)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(brand)
        .bind(size)
        .bind(color)
        .bind(gender)
        .bind(condition)
        .bind(price)
        .bind(stock)
        .bind(json!([]))
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
