use sift_core::executor::sqlite::SqlitePool;
use sift_core::{query, QueryBuilder};
use sqlx::sqlite::SqlitePoolOptions;

#[derive(Debug, serde::Deserialize)]
#[allow(dead_code)]
struct Book {
    id: i64,
    title: String,
    author: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Sift SQLite - Usage Example ===\n");

    // One connection, so every statement sees the same in-memory database
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    let pool = SqlitePool::from_pool(pool);
    sqlx::query("CREATE TABLE books (id INTEGER PRIMARY KEY, title TEXT, author TEXT, year INTEGER)")
        .execute(pool.inner())
        .await?;
    sqlx::query(
        "INSERT INTO books (title, author, year) VALUES \
         ('Dune', 'Herbert', 1965), ('Neuromancer', 'Gibson', 1984), ('Hyperion', 'Simmons', 1989)",
    )
    .execute(pool.inner())
    .await?;

    let recent = query(&pool)
        .table("books")
        .select(vec!["id", "title", "author"])
        .where_("year", "gt", 1970)?
        .order_by(["-year"]);
    println!("SQL: {}", recent.to_sql());

    for row in recent.get().await? {
        let book: Book = row.deserialize()?;
        println!("  {book:?}");
    }

    let count = query(&pool)
        .table("books")
        .where_("author", "has", "er")?
        .get_total_rows()
        .await?;
    println!("\nBooks by authors containing 'er': {count}");

    Ok(())
}
