use anyhow::Result;
use records_migrate::schema::TARGET_TABLES;
use records_migrate::util::db::connect_target;
use records_migrate::util::env as env_util;

fn is_undefined_table(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("42P01"),
        _ => false,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_util::bootstrap_cli("table_counts");

    let pool = connect_target().await?;

    use std::fmt::Write as _;
    let mut out = String::new();
    writeln!(out, "TARGET TABLE COUNTS:").ok();
    for table in TARGET_TABLES {
        let sql = format!("SELECT count(*) FROM {table}");
        match sqlx::query_scalar::<_, i64>(&sql)
            .persistent(false)
            .fetch_one(&pool)
            .await
        {
            Ok(n) => writeln!(out, "{table}: {n}").ok(),
            Err(e) if is_undefined_table(&e) => writeln!(out, "{table}: <missing>").ok(),
            Err(e) => return Err(e.into()),
        };
    }
    print!("{out}");
    Ok(())
}
