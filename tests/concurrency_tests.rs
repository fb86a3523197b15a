use loan_engine::application::engine::LoanLifecycleEngine;
use loan_engine::domain::command::{ApproveLoan, CreateLoan, InvestLoan, Proof};
use loan_engine::domain::loan::LoanStatus;
use loan_engine::domain::money::{Amount, Balance, Rate};
use loan_engine::domain::ports::LoanStoreBox;
use loan_engine::error::LoanError;
use loan_engine::infrastructure::in_memory::{InMemoryLoanStore, InMemoryNotifier};
#[cfg(feature = "storage-rocksdb")]
use loan_engine::infrastructure::rocksdb::RocksDbLoanStore;
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

async fn approved_loan(engine: &LoanLifecycleEngine, principal: Decimal) -> uuid::Uuid {
    let uuid = engine
        .propose(CreateLoan {
            uuid: None,
            borrower_id: "borrower-1".to_string(),
            principal_amount: Amount::new(principal).unwrap(),
            interest_rate: Rate::new(dec!(10)).unwrap(),
            roi_rate: Rate::new(dec!(7)).unwrap(),
        })
        .await
        .unwrap();
    engine
        .approve(ApproveLoan {
            loan_uuid: uuid,
            employee_id: "emp-1".to_string(),
            proofs: vec![Proof {
                proof_url: "https://proofs.example/visit.jpg".to_string(),
                category: "field_visit".to_string(),
            }],
            approved_at: chrono::Utc::now(),
        })
        .await
        .unwrap();
    uuid
}

/// Fires randomized concurrent investments at one loan and checks the funding invariant.
async fn assert_concurrent_investments_never_exceed_principal(store: LoanStoreBox) {
    let engine = Arc::new(LoanLifecycleEngine::new(
        store,
        Box::new(InMemoryNotifier::new()),
    ));
    let principal = dec!(1000);
    let uuid = approved_loan(&engine, principal).await;

    let amounts: Vec<Decimal> = {
        let mut rng = rand::thread_rng();
        (0..64)
            .map(|_| Decimal::new(rng.gen_range(1_00..=150_00), 2))
            .collect()
    };

    let handles: Vec<_> = amounts
        .iter()
        .enumerate()
        .map(|(i, amount)| {
            let engine = Arc::clone(&engine);
            let cmd = InvestLoan {
                loan_uuid: uuid,
                investor_id: format!("investor-{}", i),
                amount: Amount::new(*amount).unwrap(),
            };
            tokio::spawn(async move { engine.invest(cmd).await })
        })
        .collect();

    let mut accepted = Decimal::ZERO;
    for (handle, amount) in handles.into_iter().zip(&amounts) {
        match handle.await.unwrap() {
            Ok(()) => accepted += *amount,
            Err(LoanError::LimitExceeded(_)) | Err(LoanError::InvalidState(_)) => {}
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    let loan = engine.loan(uuid).await.unwrap();
    let recorded: Decimal = engine
        .investments(uuid)
        .await
        .unwrap()
        .iter()
        .map(|i| i.amount.value())
        .sum();

    assert!(loan.invested_amount.value() <= principal);
    assert_eq!(loan.invested_amount, Balance::new(accepted));
    assert_eq!(recorded, accepted);
    assert_eq!(
        loan.status == LoanStatus::Invested,
        loan.invested_amount.value() == principal
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_investments_never_exceed_principal() {
    assert_concurrent_investments_never_exceed_principal(Box::new(InMemoryLoanStore::new())).await;
}

#[cfg(feature = "storage-rocksdb")]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_investments_never_exceed_principal_rocksdb() {
    let dir = tempfile::tempdir().unwrap();
    let store = RocksDbLoanStore::open(dir.path()).unwrap();

    assert_concurrent_investments_never_exceed_principal(Box::new(store)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_exactly_one_of_two_full_investments_wins() {
    let store = InMemoryLoanStore::new();
    let engine = Arc::new(LoanLifecycleEngine::new(
        Box::new(store),
        Box::new(InMemoryNotifier::new()),
    ));
    let uuid = approved_loan(&engine, dec!(500)).await;

    let spawn_invest = |investor: &str| {
        let engine = Arc::clone(&engine);
        let cmd = InvestLoan {
            loan_uuid: uuid,
            investor_id: investor.to_string(),
            amount: Amount::new(dec!(500)).unwrap(),
        };
        tokio::spawn(async move { engine.invest(cmd).await })
    };
    let first = spawn_invest("investor-a");
    let second = spawn_invest("investor-b");

    let outcomes = [first.await.unwrap(), second.await.unwrap()];
    assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);

    let loan = engine.loan(uuid).await.unwrap();
    assert_eq!(loan.status, LoanStatus::Invested);
    assert_eq!(loan.invested_amount, Balance::new(dec!(500)));
    assert_eq!(engine.investments(uuid).await.unwrap().len(), 1);
}
