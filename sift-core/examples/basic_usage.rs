use sift_core::{op, query, Executor, QueryBuilder, Result, Row, Value};

/// Prints what it is asked to run instead of talking to a database
struct DryRun;

impl Executor for DryRun {
    async fn fetch_all(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        println!("   would run: {sql}\n   with: {params:?}");
        Ok(Vec::new())
    }

    async fn fetch_optional(&self, sql: &str, params: &[Value]) -> Result<Option<Row>> {
        println!("   would run: {sql}\n   with: {params:?}");
        Ok(None)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let db = DryRun;

    // Filters arriving as (column, operator token, value) triples, e.g. from a query string
    let filters = [
        ("age", "ge", "18"),
        ("name", "sw", "Jo"),
        ("role", "in", "admin,editor"),
        ("deleted_at", "null", "true"),
    ];

    let mut users = query(&db)
        .table("users")
        .select(("users.id", "users.name", "teams.name"))
        .left_join("teams", "users.team_id", "teams.id");
    for (column, operator, value) in filters {
        users = users.where_(column, operator, value)?;
    }
    // "+name" sent unencoded in a URL arrives as " name"
    let users = users
        .where_("score", op::GT, 100)?
        .order_by(["-created_at", " name"])
        .limit(10)
        .offset(20);

    println!("1. Page of users:");
    println!("   SQL: {}", users.to_sql());
    println!("   Parameters: {:?}\n", users.parameters());

    println!("2. Total before paging:");
    users.clone().get_total_rows().await?;

    println!("\n3. Fetching the page:");
    let rows = users.get().await?;
    println!("   {} rows", rows.len());

    // Unknown operators are rejected before they reach the SQL
    if let Err(e) = query(&db).table("users").where_("age", "between", "1,5") {
        println!("\n4. Rejected: {e}");
    }

    Ok(())
}
