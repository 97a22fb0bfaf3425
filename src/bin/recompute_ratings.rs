//! Script to backfill aggregate ratings from the reviews table.
//!
//! Normally the rating is recomputed inside the review-submission transaction;
//! this exists for repair after manual review edits or data imports.

use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use std::env;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt::init();

    // Database connection
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    tracing::info!("Connected to database. Recomputing aggregate ratings...");

    // Same server-side AVG the submission path uses; users without reviews
    // fall back to 0.
    let query = r#"
        UPDATE users u
        SET rating = COALESCE(
            (SELECT AVG(r.rating)::float8 FROM reviews r WHERE r.user_id = u.id),
            0
        )
    "#;

    let result = sqlx::query(query).execute(&pool).await?;

    tracing::info!(
        "Recompute complete. Updated {} user ratings.",
        result.rows_affected()
    );

    Ok(())
}
