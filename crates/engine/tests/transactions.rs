use std::error::Error;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use engine::{
    Engine, EngineError, ListQuery, Money, NewTransactionCmd, Percent, Recognizer, Split,
    TransactionPatch, TransactionQuery, TransactionType, parse_sort,
};
use migration::MigratorTrait;

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let backend = db.get_database_backend();
    let now = Utc::now();
    for (offset, id) in ["alice", "bob", "carol"].into_iter().enumerate() {
        db.execute(Statement::from_sql_and_values(
            backend,
            "INSERT INTO users (id, name, email, password, created_at) VALUES (?, ?, ?, ?, ?)",
            vec![
                id.into(),
                id.into(),
                format!("{id}@example.com").into(),
                "password".into(),
                (now + Duration::seconds(offset as i64)).into(),
            ],
        ))
        .await
        .unwrap();
    }
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

async fn count_rows(db: &DatabaseConnection, table: &str) -> i64 {
    let row = db
        .query_one(Statement::from_string(
            db.get_database_backend(),
            format!("SELECT COUNT(*) AS n FROM {table}"),
        ))
        .await
        .unwrap()
        .unwrap();
    row.try_get::<i64>("", "n").unwrap()
}

fn rp(units: i64) -> Money {
    Money::from_units(units).unwrap()
}

fn pct(raw: &str) -> Percent {
    raw.parse().unwrap()
}

fn expense(user: &str, units: i64) -> NewTransactionCmd {
    NewTransactionCmd::new(user, TransactionType::Expense, rp(units), Utc::now())
}

struct CannedRecognizer(Result<&'static str, &'static str>);

#[async_trait]
impl Recognizer for CannedRecognizer {
    async fn recognize(
        &self,
        _system_prompt: &str,
        _text: &str,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        match self.0 {
            Ok(content) => Ok(content.to_string()),
            Err(reason) => Err(reason.into()),
        }
    }
}

#[tokio::test]
async fn percentage_split_creates_two_equal_shares() {
    let (engine, _db) = engine_with_db().await;

    let tx = engine
        .create_transaction(
            expense("alice", 50_000)
                .description("makan ayam")
                .category("food")
                .split(Split::Percentages(vec![pct("50"), pct("50")]))
                .counterpart("bob"),
        )
        .await
        .unwrap();

    assert!(tx.is_shared);
    assert_eq!(tx.shares.len(), 2);
    assert_eq!(tx.shares[0].user_id, "alice");
    assert_eq!(tx.shares[1].user_id, "bob");
    assert_eq!(tx.shares[0].amount, rp(25_000));
    assert_eq!(tx.shares[1].amount, rp(25_000));
    assert_eq!(tx.shares[0].percentage.to_string(), "50.00");
    assert_eq!(tx.shares[1].percentage.to_string(), "50.00");

    let stored = engine.transaction(tx.id, "alice").await.unwrap();
    assert_eq!(stored.shares_total(), stored.amount);
    assert_eq!(stored.shares, tx.shares);
}

#[tokio::test]
async fn absolute_split_derives_percentages() {
    let (engine, _db) = engine_with_db().await;

    let tx = engine
        .create_transaction(
            expense("alice", 100_000)
                .description("belanja")
                .split(Split::Amounts(vec![rp(30_000), rp(70_000)])),
        )
        .await
        .unwrap();

    // No explicit counterpart: the oldest other user is used.
    assert_eq!(tx.shares[1].user_id, "bob");
    assert_eq!(tx.shares[0].amount, rp(30_000));
    assert_eq!(tx.shares[1].amount, rp(70_000));
    assert_eq!(tx.shares[0].percentage.to_string(), "30.00");
    assert_eq!(tx.shares[1].percentage.to_string(), "70.00");
    assert_eq!(tx.category, "belanja");
}

#[tokio::test]
async fn rejected_split_writes_nothing() {
    let (engine, db) = engine_with_db().await;

    let err = engine
        .create_transaction(
            expense("alice", 100_000).split(Split::Amounts(vec![rp(30_000), rp(60_000)])),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidSplit(_)));

    let err = engine
        .create_transaction(expense("alice", 100).split(Split::Percentages(vec![
            pct("30"),
            pct("30"),
            pct("40"),
        ])))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidSplit(_)));

    let err = engine
        .create_transaction(
            expense("alice", 100)
                .split(Split::Percentages(vec![pct("50"), pct("50")]))
                .counterpart("nobody"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));

    assert_eq!(count_rows(&db, "transactions").await, 0);
    assert_eq!(count_rows(&db, "transaction_shares").await, 0);
}

#[tokio::test]
async fn zero_amount_is_invalid() {
    let (engine, _db) = engine_with_db().await;
    let err = engine
        .create_transaction(NewTransactionCmd::new(
            "alice",
            TransactionType::Expense,
            Money::ZERO,
            Utc::now(),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));
}

#[tokio::test]
async fn share_holders_can_read_but_only_owner_can_write() {
    let (engine, _db) = engine_with_db().await;
    let tx = engine
        .create_transaction(
            expense("alice", 40_000).split(Split::Amounts(vec![rp(25_000), rp(15_000)])),
        )
        .await
        .unwrap();

    assert_eq!(engine.transaction(tx.id, "bob").await.unwrap().id, tx.id);
    assert!(matches!(
        engine.transaction(tx.id, "carol").await.unwrap_err(),
        EngineError::Forbidden(_)
    ));
    assert!(matches!(
        engine
            .update_transaction(tx.id, "bob", TransactionPatch::new().description("mine"))
            .await
            .unwrap_err(),
        EngineError::Forbidden(_)
    ));
    assert!(matches!(
        engine.delete_transaction(tx.id, "bob").await.unwrap_err(),
        EngineError::Forbidden(_)
    ));
    assert!(matches!(
        engine
            .transaction(uuid::Uuid::now_v7(), "alice")
            .await
            .unwrap_err(),
        EngineError::KeyNotFound(_)
    ));
}

#[tokio::test]
async fn amount_update_reallocates_stored_percentages() {
    let (engine, _db) = engine_with_db().await;
    let tx = engine
        .create_transaction(
            expense("alice", 40_000).split(Split::Amounts(vec![rp(25_000), rp(15_000)])),
        )
        .await
        .unwrap();

    let updated = engine
        .update_transaction(
            tx.id,
            "alice",
            TransactionPatch::new().amount(rp(80_000)).category("Groceries"),
        )
        .await
        .unwrap();
    assert_eq!(updated.amount, rp(80_000));
    assert_eq!(updated.category, "Groceries");
    assert_eq!(updated.shares[0].amount, rp(50_000));
    assert_eq!(updated.shares[1].amount, rp(30_000));
    assert_eq!(updated.shares_total(), updated.amount);

    let unshared = engine
        .update_transaction(tx.id, "alice", TransactionPatch::new().split(Split::Unshared))
        .await
        .unwrap();
    assert!(!unshared.is_shared);
    assert!(unshared.shares.is_empty());
}

#[tokio::test]
async fn invalid_new_split_leaves_transaction_untouched() {
    let (engine, _db) = engine_with_db().await;
    let tx = engine
        .create_transaction(
            expense("alice", 100).split(Split::Percentages(vec![pct("50"), pct("50")])),
        )
        .await
        .unwrap();

    let err = engine
        .update_transaction(
            tx.id,
            "alice",
            TransactionPatch::new()
                .amount(rp(200))
                .split(Split::Amounts(vec![rp(100), rp(50)])),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidSplit(_)));

    let stored = engine.transaction(tx.id, "alice").await.unwrap();
    assert_eq!(stored.amount, rp(100));
    assert_eq!(stored.shares, tx.shares);
}

#[tokio::test]
async fn delete_removes_shares() {
    let (engine, db) = engine_with_db().await;
    let tx = engine
        .create_transaction(
            expense("alice", 40_000).split(Split::Amounts(vec![rp(25_000), rp(15_000)])),
        )
        .await
        .unwrap();
    assert_eq!(count_rows(&db, "transaction_shares").await, 2);

    engine.delete_transaction(tx.id, "alice").await.unwrap();

    assert_eq!(count_rows(&db, "transaction_shares").await, 0);
    // The row is kept, soft-deleted.
    assert_eq!(count_rows(&db, "transactions").await, 1);
    assert!(matches!(
        engine.transaction(tx.id, "alice").await.unwrap_err(),
        EngineError::KeyNotFound(_)
    ));
    let page = engine
        .transactions("alice", &TransactionQuery::new())
        .await
        .unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn list_filters_sorts_and_paginates() {
    let (engine, _db) = engine_with_db().await;
    for (units, description) in [(10, "Kopi pagi"), (30, "Bensin"), (20, "kopi sore")] {
        engine
            .create_transaction(expense("alice", units).description(description))
            .await
            .unwrap();
    }
    engine
        .create_transaction(expense("bob", 99).description("kopi bob"))
        .await
        .unwrap();

    let page = engine
        .transactions("alice", &TransactionQuery::new())
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.page, 1);
    assert_eq!(page.size, 10);
    // Newest first.
    assert_eq!(page.items[0].description, "kopi sore");

    let page = engine
        .transactions("alice", &TransactionQuery::new().keyword("KOPI"))
        .await
        .unwrap();
    assert_eq!(page.total, 2);

    let page = engine
        .transactions(
            "alice",
            &TransactionQuery::new()
                .sort(parse_sort("-amount").unwrap())
                .page(2, 1),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].amount, rp(20));
}

#[tokio::test]
async fn recognized_text_is_stored_with_shares() {
    let (engine, _db) = engine_with_db().await;
    let recognizer = CannedRecognizer(Ok(r#"```json
{
  "description": "makan ayam",
  "amount": 50000,
  "transaction_type": "EXPENSE",
  "is_shared": true,
  "category": "food",
  "transaction_shares": [
    {"user_id": "alice", "percentage": 50, "amount": 25000},
    {"user_id": "bob", "percentage": 50, "amount": 25000}
  ]
}
```"#));

    let tx = engine
        .record_from_text(&recognizer, "alice", "makan ayam 50000 (shelly 50%, blessy 50%)")
        .await
        .unwrap();
    assert_eq!(tx.transaction_type, TransactionType::Expense);
    assert_eq!(tx.amount, rp(50_000));
    assert_eq!(tx.shares.len(), 2);
    assert_eq!(tx.shares[1].user_id, "bob");
    assert_eq!(tx.shares_total(), tx.amount);

    let stored = engine.transaction(tx.id, "alice").await.unwrap();
    assert_eq!(stored.shares_total(), stored.amount);
}

#[tokio::test]
async fn failed_recognition_writes_nothing() {
    let (engine, db) = engine_with_db().await;

    let cases = [
        CannedRecognizer(Ok("I am not JSON")),
        CannedRecognizer(Err("upstream timeout")),
        // Breakdown that does not add up to the total.
        CannedRecognizer(Ok(
            r#"{"amount": 100, "is_shared": true,
                "transaction_shares": [{"amount": 10}, {"amount": 10}]}"#,
        )),
    ];
    for recognizer in cases {
        let err = engine
            .record_from_text(&recognizer, "alice", "beli sesuatu 100")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::RecognitionFailed(_)), "{err}");
    }

    assert_eq!(count_rows(&db, "transactions").await, 0);
    assert_eq!(count_rows(&db, "transaction_shares").await, 0);
}

#[tokio::test]
async fn new_wallet_records_initial_balance() {
    let (engine, db) = engine_with_db().await;

    let wallet = engine.new_wallet("alice", "Cash", rp(150_000)).await.unwrap();
    assert_eq!(wallet.balance, rp(150_000));

    let page = engine
        .transactions("alice", &TransactionQuery::new())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    let opening = &page.items[0];
    assert_eq!(opening.category, "opname");
    assert_eq!(opening.description, "Initial balance");
    assert_eq!(opening.transaction_type, TransactionType::Income);

    let err = engine.new_wallet("alice", "cash", Money::ZERO).await.unwrap_err();
    assert_eq!(err, EngineError::ExistingKey("cash".to_string()));
    assert_eq!(count_rows(&db, "wallets").await, 1);

    engine.new_wallet("alice", "Bank", Money::ZERO).await.unwrap();
    let wallets = engine.wallets("alice", &ListQuery::new()).await.unwrap();
    assert_eq!(wallets.total, 2);
    assert_eq!(count_rows(&db, "transactions").await, 1);

    assert!(matches!(
        engine.wallet(wallet.id, "bob").await.unwrap_err(),
        EngineError::Forbidden(_)
    ));
    let renamed = engine.rename_wallet(wallet.id, "alice", "Dompet").await.unwrap();
    assert_eq!(renamed.name, "Dompet");
    engine.delete_wallet(wallet.id, "alice").await.unwrap();
    assert!(matches!(
        engine.wallet(wallet.id, "alice").await.unwrap_err(),
        EngineError::KeyNotFound(_)
    ));
}

#[tokio::test]
async fn users_link_and_resolve_counterparts() {
    let (engine, _db) = engine_with_db().await;

    assert_eq!(
        engine.counterpart_of("alice").await.unwrap().map(|u| u.id),
        Some("bob".to_string())
    );
    assert_eq!(
        engine.counterpart_of("bob").await.unwrap().map(|u| u.id),
        Some("alice".to_string())
    );

    assert!(
        engine
            .authenticate("ALICE@example.com", "password")
            .await
            .unwrap()
            .is_some()
    );
    assert!(
        engine
            .authenticate("alice@example.com", "wrong")
            .await
            .unwrap()
            .is_none()
    );

    engine.link_telegram("alice@example.com", 42).await.unwrap();
    // Moving the chat identity unlinks the previous user.
    engine.link_telegram("bob@example.com", 42).await.unwrap();
    let linked = engine.user_by_telegram_id(42).await.unwrap().unwrap();
    assert_eq!(linked.id, "bob");
    assert_eq!(engine.user("alice").await.unwrap().telegram_id, None);

    assert!(matches!(
        engine.link_telegram("ghost@example.com", 7).await.unwrap_err(),
        EngineError::KeyNotFound(_)
    ));

    let dave = engine
        .new_user("Dave", "Dave@Example.com", "secret")
        .await
        .unwrap();
    assert_eq!(dave.email, "dave@example.com");
    assert!(matches!(
        engine
            .new_user("Dave", "dave@example.com", "secret")
            .await
            .unwrap_err(),
        EngineError::ExistingKey(_)
    ));
}

#[tokio::test]
async fn huge_split_or_page_is_rejected_without_panicking() {
    let (engine, db) = engine_with_db().await;

    let err = engine
        .create_transaction(
            NewTransactionCmd::new("alice", TransactionType::Expense, Money::new(100), Utc::now())
                .split(Split::Amounts(vec![Money::new(i64::MAX), Money::new(i64::MAX)])),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidSplit(_)));
    assert_eq!(count_rows(&db, "transactions").await, 0);

    let err = engine
        .transactions("alice", &TransactionQuery::new().page(u64::MAX, 10))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
    let err = engine
        .wallets("alice", &ListQuery::new().page(u64::MAX, 100))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
}

#[tokio::test]
async fn users_by_ids_skips_unknown_ids() {
    let (engine, _db) = engine_with_db().await;
    let ids = ["carol", "ghost", "alice"].map(String::from);
    let found: Vec<String> = engine
        .users_by_ids(&ids)
        .await
        .unwrap()
        .into_iter()
        .map(|user| user.id)
        .collect();
    assert_eq!(found, vec!["alice", "carol"]);
    assert!(engine.users_by_ids(&[]).await.unwrap().is_empty());
}
