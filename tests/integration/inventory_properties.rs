//! Randomised operation sequences must never break the copy invariants

use chrono::Duration;
use proptest::prelude::*;

use crate::common::{assert_inventory_consistent, fixture};
use librams_server::error::AppError;

#[derive(Debug, Clone)]
enum Op {
    Issue { book: usize, borrower: usize },
    Return { pick: usize },
    Extend { pick: usize, days: i64 },
    Advance { hours: i64 },
    Sweep,
    Resize { book: usize, total: i32 },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..3usize, 0..4usize).prop_map(|(book, borrower)| Op::Issue { book, borrower }),
        3 => (0..16usize).prop_map(|pick| Op::Return { pick }),
        1 => (0..16usize, -2..10i64).prop_map(|(pick, days)| Op::Extend { pick, days }),
        1 => (1..72i64).prop_map(|hours| Op::Advance { hours }),
        1 => Just(Op::Sweep),
        1 => (0..3usize, 1..5i32).prop_map(|(book, total)| Op::Resize { book, total }),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_counters_track_active_issues(ops in prop::collection::vec(op(), 1..40)) {
        runtime().block_on(async {
            let f = fixture().await;
            let books = vec![
                f.book("Kindred", "prop-1", 1).await,
                f.book("Parable of the Sower", "prop-2", 2).await,
                f.book("Dawn", "prop-3", 3).await,
            ];
            let mut borrowers = vec![f.student.clone()];
            for name in ["Lauren", "Dana", "Lilith"] {
                borrowers.push(f.student_named(name).await);
            }

            for op in ops {
                let issued_ids: Vec<i32> = f.store.issues().await.iter().map(|i| i.id).collect();
                let pick = |n: usize| issued_ids.get(n % issued_ids.len().max(1)).copied();

                match op {
                    Op::Issue { book, borrower } => {
                        let result = f
                            .services
                            .issues
                            .allocate(f.new_issue(&books[book], &borrowers[borrower], f.tomorrow()))
                            .await;
                        assert!(
                            matches!(
                                result,
                                Ok(_) | Err(AppError::NoCopiesAvailable) | Err(AppError::DuplicateActiveLoan)
                            ),
                            "unexpected allocate result: {:?}",
                            result
                        );
                    }
                    Op::Return { pick: n } => {
                        if let Some(id) = pick(n) {
                            let result = f.services.issues.return_issue(id).await;
                            assert!(
                                matches!(result, Ok(_) | Err(AppError::LoanNotActiveOrMissing)),
                                "unexpected return result: {:?}",
                                result
                            );
                        }
                    }
                    Op::Extend { pick: n, days } => {
                        if let Some(id) = pick(n) {
                            let due = f.now() + Duration::days(days);
                            let result = f.services.issues.extend_due_date(id, due).await;
                            assert!(
                                matches!(
                                    result,
                                    Ok(_) | Err(AppError::LoanNotActive) | Err(AppError::InvalidDueDate(_))
                                ),
                                "unexpected extend result: {:?}",
                                result
                            );
                        }
                    }
                    Op::Advance { hours } => f.clock.advance(Duration::hours(hours)),
                    Op::Sweep => {
                        f.services.issues.sweep_overdue().await.unwrap();
                        let now = f.now();
                        for issue in f.store.issues().await {
                            if issue.status == librams_server::models::IssueStatus::Issued {
                                assert!(issue.due_date >= now, "issue {} missed by sweep", issue.id);
                            }
                        }
                    }
                    Op::Resize { book, total } => {
                        let result = f.services.issues.set_total_copies(books[book].id, total).await;
                        assert!(
                            matches!(result, Ok(_) | Err(AppError::Validation(_))),
                            "unexpected resize result: {:?}",
                            result
                        );
                    }
                }

                assert_inventory_consistent(&f.store).await;
            }
        });
    }
}
