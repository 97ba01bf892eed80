use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use engine::{Engine, EngineError, Money, NewTransactionCmd, Split, SplitTotals, TransactionType};
use migration::MigratorTrait;

async fn engine_with_users(ids: &[&str]) -> Engine {
    let db: DatabaseConnection = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let backend = db.get_database_backend();
    let now = Utc::now();
    for (offset, id) in ids.iter().enumerate() {
        db.execute(Statement::from_sql_and_values(
            backend,
            "INSERT INTO users (id, name, email, password, created_at) VALUES (?, ?, ?, ?, ?)",
            vec![
                (*id).into(),
                (*id).into(),
                format!("{id}@example.com").into(),
                "password".into(),
                (now + Duration::seconds(offset as i64)).into(),
            ],
        ))
        .await
        .unwrap();
    }
    Engine::builder().database(db).build().await.unwrap()
}

fn rp(units: i64) -> Money {
    Money::from_units(units).unwrap()
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
}

fn at(d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, d, h, 0, 0).unwrap()
}

async fn record(
    engine: &Engine,
    user: &str,
    kind: TransactionType,
    units: i64,
    spent_at: DateTime<Utc>,
    split: Split,
) -> engine::Transaction {
    engine
        .create_transaction(
            NewTransactionCmd::new(user, kind, rp(units), spent_at)
                .description("test")
                .split(split),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn own_shared_expense_is_split_between_me_and_shared() {
    let engine = engine_with_users(&["alice", "bob"]).await;
    record(
        &engine,
        "alice",
        TransactionType::Expense,
        40_000,
        at(10, 12),
        Split::Amounts(vec![rp(25_000), rp(15_000)]),
    )
    .await;

    let summary = engine
        .period_summary("alice", Some(day(1)), Some(day(30)))
        .await
        .unwrap();
    assert_eq!(summary.total_expense, rp(40_000));
    assert_eq!(
        summary.total_splited,
        SplitTotals {
            me: rp(25_000),
            shared: rp(15_000)
        }
    );
    assert_eq!(summary.counterpart_id.as_deref(), Some("bob"));
    assert_eq!(summary.counterpart_expense, Money::ZERO);
    assert_eq!(summary.counterpart_splited, SplitTotals::default());
}

#[tokio::test]
async fn counterpart_side_mirrors_own_side() {
    let engine = engine_with_users(&["alice", "bob"]).await;
    record(
        &engine,
        "alice",
        TransactionType::Expense,
        40_000,
        at(3, 9),
        Split::Amounts(vec![rp(25_000), rp(15_000)]),
    )
    .await;
    record(
        &engine,
        "bob",
        TransactionType::Expense,
        10_000,
        at(4, 9),
        Split::Amounts(vec![rp(6_000), rp(4_000)]),
    )
    .await;
    record(&engine, "bob", TransactionType::Expense, 5_000, at(5, 9), Split::Unshared).await;
    record(&engine, "alice", TransactionType::Income, 1_000_000, at(1, 0), Split::Unshared).await;

    let summary = engine
        .period_summary("alice", Some(day(1)), Some(day(30)))
        .await
        .unwrap();
    assert_eq!(summary.total_income, rp(1_000_000));
    assert_eq!(summary.total_expense, rp(40_000));
    assert_eq!(summary.counterpart_expense, rp(15_000));
    assert_eq!(summary.total_splited.me, rp(25_000));
    assert_eq!(summary.total_splited.shared, rp(15_000));
    assert_eq!(summary.counterpart_splited.me, rp(6_000));
    assert_eq!(summary.counterpart_splited.shared, rp(4_000));

    // Seen from the other side the numbers swap places.
    let mirrored = engine
        .period_summary("bob", Some(day(1)), Some(day(30)))
        .await
        .unwrap();
    assert_eq!(mirrored.total_expense, rp(15_000));
    assert_eq!(mirrored.counterpart_expense, rp(40_000));
    assert_eq!(mirrored.total_splited, summary.counterpart_splited);
    assert_eq!(mirrored.counterpart_splited, summary.total_splited);
}

#[tokio::test]
async fn range_is_inclusive_by_day_and_skips_deleted() {
    let engine = engine_with_users(&["alice", "bob"]).await;
    record(&engine, "alice", TransactionType::Expense, 100, at(1, 0), Split::Unshared).await;
    record(&engine, "alice", TransactionType::Expense, 200, at(2, 23), Split::Unshared).await;
    record(&engine, "alice", TransactionType::Expense, 400, at(3, 0), Split::Unshared).await;
    let deleted = record(
        &engine,
        "alice",
        TransactionType::Expense,
        800,
        at(2, 12),
        Split::Percentages(vec!["50".parse().unwrap(), "50".parse().unwrap()]),
    )
    .await;
    engine.delete_transaction(deleted.id, "alice").await.unwrap();

    let summary = engine
        .period_summary("alice", Some(day(1)), Some(day(2)))
        .await
        .unwrap();
    assert_eq!(summary.total_expense, rp(300));
    assert_eq!(summary.total_splited, SplitTotals::default());

    let err = engine
        .period_summary("alice", Some(day(2)), Some(day(1)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
}

#[tokio::test]
async fn lone_user_has_no_counterpart() {
    let engine = engine_with_users(&["alice"]).await;
    record(&engine, "alice", TransactionType::Expense, 100, Utc::now(), Split::Unshared).await;

    // Defaults to the current month.
    let summary = engine.period_summary("alice", None, None).await.unwrap();
    assert_eq!(summary.counterpart_id, None);
    assert_eq!(summary.total_expense, rp(100));
    assert_eq!(summary.counterpart_expense, Money::ZERO);
}
