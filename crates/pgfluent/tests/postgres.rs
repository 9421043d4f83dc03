//! End-to-end tests against a live PostgreSQL.
//!
//! Skipped unless `DATABASE_URL` is set (a `.env` file is honoured).

use pgfluent::prelude::*;
use pgfluent::{IsolationLevel, PoolStats};
use rust_decimal::Decimal;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Default, Clone, PartialEq)]
struct Person {
    id: i64,
    name: String,
    age: i32,
    email: Option<String>,
}

impl Record for Person {
    fn scan(&mut self, column: &str, value: Value) -> Result<(), ScanError> {
        match column {
            "id" => self.id = value.get()?,
            "name" => self.name = value.get()?,
            "age" => self.age = value.get()?,
            "email" => self.email = value.get()?,
            _ => return Err(ScanError::UnknownColumn),
        }
        Ok(())
    }
}

fn connect(test: &str) -> Option<Connection> {
    dotenvy::dotenv().ok();
    match ConnectionConfig::from_env() {
        Ok(config) => Some(
            Connection::connect(config.max_pool_size(4).acquire_timeout(Duration::from_secs(5)))
                .expect("valid DATABASE_URL"),
        ),
        Err(_) => {
            eprintln!("DATABASE_URL is not set; skipping {test}");
            None
        }
    }
}

fn unique_table(prefix: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before UNIX_EPOCH")
        .as_nanos();
    format!("pgfluent_{prefix}_{}_{}", std::process::id(), nanos % 1_000_000_000)
}

async fn create_people(db: &Connection, table: &str) -> SqlResult<()> {
    db.exec(
        &format!(
            "CREATE TABLE {table} (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                age INT4 NOT NULL,
                email TEXT
            )"
        ),
        (),
    )
    .await
    .map(|_| ())
}

async fn drop_table(db: &Connection, table: &str) {
    let _ = db.exec(&format!("DROP TABLE IF EXISTS {table}"), ()).await;
}

async fn count(db: &Connection, table: &str) -> SqlResult<i64> {
    db.select().table(table)?.count().await
}

#[tokio::test]
async fn crud_roundtrip() -> SqlResult<()> {
    let Some(db) = connect("crud_roundtrip") else {
        return Ok(());
    };
    db.ping().await?;
    let table = unique_table("crud");
    create_people(&db, &table).await?;

    let mut alice = Person::default();
    db.insert()
        .table(&table)?
        .columns(&["name", "age", "email"])?
        .values(("alice", 31, "alice@example.com"))
        .exec_returning(&mut alice)
        .await?;
    assert!(alice.id > 0);
    assert_eq!(alice.email.as_deref(), Some("alice@example.com"));

    let inserted = db
        .insert()
        .table(&table)?
        .columns(&["name", "age", "email"])?
        .values(("bob", 17, None::<String>))
        .values(("carol", 45, "carol@example.com"))
        .exec()
        .await?;
    assert_eq!(inserted, 2);

    let adults = db
        .select()
        .table(&table)?
        .where_("age >= ?", [18])
        .order_by("name")?
        .scan_all(Person::default)
        .await?;
    let names: Vec<&str> = adults.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["alice", "carol"]);

    let updated = db
        .update()
        .table(&table)?
        .set("age", 18)?
        .where_eq("name", "bob")?
        .exec()
        .await?;
    assert_eq!(updated, 1);

    let mut bob = Person::default();
    db.select()
        .table(&table)?
        .where_eq("name", "bob")?
        .scan(&mut bob)
        .await?;
    assert_eq!(bob.age, 18);
    assert_eq!(bob.email, None);

    let none = db
        .select()
        .table(&table)?
        .where_eq("name", "nobody")?
        .scan_all(Person::default)
        .await?;
    assert!(none.is_empty());

    let err = db
        .select()
        .table(&table)?
        .where_eq("name", "nobody")?
        .scan(&mut bob)
        .await
        .unwrap_err();
    assert!(err.is_no_rows());

    let grouped = db
        .select()
        .select(&["age"])?
        .table(&table)?
        .group_by(&["age"])?
        .having("COUNT(*) >= ?", [1])
        .count()
        .await?;
    assert_eq!(grouped, 3);

    let deleted = db.delete().table(&table)?.where_in("name", ["alice", "bob"])?.exec().await?;
    assert_eq!(deleted, 2);
    let deleted = db.delete().table(&table)?.exec().await?;
    assert_eq!(deleted, 1);

    drop_table(&db, &table).await;
    Ok(())
}

#[derive(Debug, Default)]
struct Product {
    name: String,
    price: Decimal,
    tags: Vec<String>,
}

impl Record for Product {
    fn scan(&mut self, column: &str, value: Value) -> Result<(), ScanError> {
        match column {
            "name" => self.name = value.get()?,
            "price" => self.price = value.get()?,
            "tags" => self.tags = value.get()?,
            _ => {}
        }
        Ok(())
    }
}

#[tokio::test]
async fn numeric_and_array_columns() -> SqlResult<()> {
    let Some(db) = connect("numeric_and_array_columns") else {
        return Ok(());
    };
    let table = unique_table("num");
    db.exec(
        &format!(
            "CREATE TABLE {table} (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL,
                price NUMERIC(10, 2) NOT NULL,
                qty INT8 NOT NULL,
                tags TEXT[] NOT NULL DEFAULT '{{}}'
            )"
        ),
        (),
    )
    .await?;

    db.insert()
        .table(&table)?
        .columns(&["name", "price", "qty", "tags"])?
        .values(("pen", Decimal::new(250, 2), 4, vec!["office", "blue"]))
        .values(("ink", 7, 6, Value::array(Vec::<String>::new())))
        .exec()
        .await?;

    let pricey = db
        .select()
        .table(&table)?
        .select(&["name", "price", "tags"])?
        .where_("price > ?", [5])
        .scan_all(Product::default)
        .await?;
    assert_eq!(pricey.len(), 1);
    assert_eq!(pricey[0].name, "ink");
    assert_eq!(pricey[0].price, Decimal::from(7));
    assert!(pricey[0].tags.is_empty());

    let mut pen = Product::default();
    db.select()
        .table(&table)?
        .where_eq("name", "pen")?
        .scan(&mut pen)
        .await?;
    assert_eq!(pen.price, Decimal::new(250, 2));
    assert_eq!(pen.tags, vec!["office".to_string(), "blue".to_string()]);

    let tagged = db
        .select()
        .table(&table)?
        .where_("tags && ?", [Value::from(vec!["blue"])])
        .count()
        .await?;
    assert_eq!(tagged, 1);

    db.update()
        .table(&table)?
        .set("price", 1.5)?
        .where_eq("name", "pen")?
        .exec()
        .await?;

    let mut totals: Vec<(String, Value)> = Vec::new();
    db.select()
        .table(&table)?
        .select(&["SUM(qty) AS total_qty", "AVG(price) AS avg_price"])?
        .scan(&mut totals)
        .await?;
    let total_qty: i64 = totals[0].1.clone().get().map_err(|source| SqlError::Scan {
        column: "total_qty".into(),
        source,
    })?;
    assert_eq!(total_qty, 10);
    assert_eq!(totals[1].1, Value::Decimal(Decimal::new(425, 2)));

    drop_table(&db, &table).await;
    Ok(())
}

async fn insert_dup(db: &Connection, table: &str) -> SqlResult<u64> {
    db.insert()
        .table(table)?
        .columns(&["name", "age"])?
        .values(("dup", 1))
        .exec()
        .await
}

#[tokio::test]
async fn unique_violation_is_classified() -> SqlResult<()> {
    let Some(db) = connect("unique_violation_is_classified") else {
        return Ok(());
    };
    let table = unique_table("uniq");
    create_people(&db, &table).await?;

    insert_dup(&db, &table).await?;
    let err = insert_dup(&db, &table).await.unwrap_err();
    assert!(err.is_unique_violation());
    assert_eq!(err.sqlstate(), Some("23505"));

    drop_table(&db, &table).await;
    Ok(())
}

#[tokio::test]
async fn transaction_commit_and_rollback() -> SqlResult<()> {
    let Some(db) = connect("transaction_commit_and_rollback") else {
        return Ok(());
    };
    let table = unique_table("tx");
    create_people(&db, &table).await?;

    let tx = db.begin().await?;
    tx.insert()
        .table(&table)?
        .columns(&["name", "age"])?
        .values(("kept", 1))
        .exec()
        .await?;
    tx.commit().await?;
    assert_eq!(count(&db, &table).await?, 1);

    let tx = db
        .begin_with(TransactionOptions::new().isolation_level(IsolationLevel::Serializable))
        .await?;
    tx.insert()
        .table(&table)?
        .columns(&["name", "age"])?
        .values(("discarded", 2))
        .exec()
        .await?;
    let inside = tx.select().table(&table)?.count().await?;
    assert_eq!(inside, 2);
    tx.rollback().await?;
    assert_eq!(count(&db, &table).await?, 1);

    drop_table(&db, &table).await;
    Ok(())
}

#[tokio::test]
async fn savepoints_undo_part_of_a_transaction() -> SqlResult<()> {
    let Some(db) = connect("savepoints_undo_part_of_a_transaction") else {
        return Ok(());
    };
    let table = unique_table("sp");
    create_people(&db, &table).await?;

    let tx = db.begin().await?;
    tx.insert()
        .table(&table)?
        .columns(&["name", "age"])?
        .values(("first", 1))
        .exec()
        .await?;
    tx.savepoint("before_second").await?;
    tx.insert()
        .table(&table)?
        .columns(&["name", "age"])?
        .values(("second", 2))
        .exec()
        .await?;
    tx.rollback_to("before_second").await?;
    tx.release("before_second").await?;
    assert!(tx.savepoint("bad name; --").await.unwrap_err().is_validation());
    tx.commit().await?;

    assert_eq!(count(&db, &table).await?, 1);
    drop_table(&db, &table).await;
    Ok(())
}

#[tokio::test]
async fn dropped_transaction_is_rolled_back() -> SqlResult<()> {
    let Some(db) = connect("dropped_transaction_is_rolled_back") else {
        return Ok(());
    };
    let table = unique_table("drop");
    create_people(&db, &table).await?;

    {
        let tx = db.begin().await?;
        tx.insert()
            .table(&table)?
            .columns(&["name", "age"])?
            .values(("ghost", 1))
            .exec()
            .await?;
    }

    // The rollback runs on a spawned task; wait for the session to come back.
    for _ in 0..50 {
        if db.stats().acquired == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(db.stats().acquired, 0);
    assert_eq!(count(&db, &table).await?, 0);

    drop_table(&db, &table).await;
    Ok(())
}

#[tokio::test]
async fn stats_and_close() -> SqlResult<()> {
    let Some(db) = connect("stats_and_close") else {
        return Ok(());
    };
    db.ping().await?;
    let stats: PoolStats = db.stats();
    assert_eq!(stats.max_size, 4);
    assert!(stats.total >= 1);
    assert_eq!(stats.acquired, 0);

    db.close();
    assert!(db.ping().await.unwrap_err().is_closed());
    Ok(())
}
