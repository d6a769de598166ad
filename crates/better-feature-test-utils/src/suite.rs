// Conformance suite runner: named async cases over one adapter, with stats.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};

use better_feature_core::db::adapter::{Adapter, FindManyQuery, SortBy, WhereClause};
use better_feature_core::error::FeatureError;

use crate::fixtures::{tester_record, TESTER_MODEL};

pub type CaseFuture = Pin<Box<dyn Future<Output = Result<(), String>> + Send>>;
pub type CaseFn = Box<dyn Fn(Arc<dyn Adapter>) -> CaseFuture + Send + Sync>;

pub struct TestCase {
    pub name: String,
    pub run: CaseFn,
}

impl std::fmt::Debug for TestCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestCase").field("name", &self.name).finish()
    }
}

#[derive(Debug, Clone)]
pub struct CaseResult {
    pub name: String,
    pub error: Option<String>,
    pub duration_ms: f64,
}

#[derive(Debug, Clone, Default)]
pub struct SuiteReport {
    pub suite_name: String,
    pub results: Vec<CaseResult>,
    pub duration_ms: f64,
}

impl SuiteReport {
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.error.is_none()).count()
    }

    pub fn failures(&self) -> Vec<&CaseResult> {
        self.results.iter().filter(|r| r.error.is_some()).collect()
    }

    /// Panics with every failing case listed. Meant for `#[tokio::test]`s.
    pub fn assert_all_passed(&self) {
        let failures = self.failures();
        if !failures.is_empty() {
            let lines: Vec<String> = failures
                .iter()
                .map(|r| format!("  {}: {}", r.name, r.error.as_deref().unwrap_or_default()))
                .collect();
            panic!(
                "{}: {}/{} cases failed\n{}",
                self.suite_name,
                failures.len(),
                self.results.len(),
                lines.join("\n")
            );
        }
    }
}

#[derive(Debug, Default)]
pub struct AdapterTestSuite {
    name: String,
    cases: Vec<TestCase>,
}

macro_rules! ensure {
    ($cond:expr, $($msg:tt)+) => {
        if !$cond {
            return Err(format!($($msg)+));
        }
    };
}

fn err(e: FeatureError) -> String {
    e.to_string()
}

async fn seed(adapter: &Arc<dyn Adapter>) -> Result<(), String> {
    for (i, (name, age)) in [("alpha", 30), ("bravo", 20), ("charlie", 40), ("delta", 10)]
        .into_iter()
        .enumerate()
    {
        let id = format!("t-{}", i + 1);
        adapter
            .create(TESTER_MODEL, tester_record(&id, name, age), None)
            .await
            .map_err(err)?;
    }
    Ok(())
}

fn names(rows: &[Value]) -> Vec<String> {
    rows.iter()
        .map(|r| r["name"].as_str().unwrap_or_default().to_string())
        .collect()
}

impl AdapterTestSuite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cases: Vec::new(),
        }
    }

    pub fn case<F, Fut>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(Arc<dyn Adapter>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        self.cases.push(TestCase {
            name: name.to_string(),
            run: Box::new(move |adapter| Box::pin(f(adapter))),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Run every case. The `tester` model is emptied before each one.
    pub async fn run(&self, adapter: Arc<dyn Adapter>) -> SuiteReport {
        let started = Instant::now();
        let adapter_name = adapter.metadata().adapter_name;
        let mut results = Vec::with_capacity(self.cases.len());

        for case in &self.cases {
            let case_started = Instant::now();
            let error = match adapter.delete_many(TESTER_MODEL, &[]).await {
                Err(e) => Some(format!("cleanup failed: {e}")),
                Ok(_) => (case.run)(adapter.clone()).await.err(),
            };
            match &error {
                None => tracing::info!("[{}] ✓ {}", adapter_name, case.name),
                Some(e) => tracing::error!("[{}] ✗ {}: {}", adapter_name, case.name, e),
            }
            results.push(CaseResult {
                name: case.name.clone(),
                error,
                duration_ms: case_started.elapsed().as_secs_f64() * 1000.0,
            });
        }

        SuiteReport {
            suite_name: format!("{} > {}", adapter_name, self.name),
            results,
            duration_ms: started.elapsed().as_secs_f64() * 1000.0,
        }
    }

    /// CRUD and Where semantics every adapter must share.
    pub fn conformance() -> Self {
        Self::new("conformance")
            .case("create assigns an id when missing", |adapter| async move {
                let created = adapter
                    .create(TESTER_MODEL, json!({ "name": "no-id" }), None)
                    .await
                    .map_err(err)?;
                ensure!(!created["id"].is_null(), "no id in {created}");
                Ok(())
            })
            .case("create then find_one round-trips", |adapter| async move {
                let created = adapter
                    .create(TESTER_MODEL, tester_record("t-1", "alpha", 30), None)
                    .await
                    .map_err(err)?;
                let found = adapter
                    .find_one(TESTER_MODEL, &[WhereClause::eq("id", created["id"].clone())], None)
                    .await
                    .map_err(err)?
                    .ok_or("record not found")?;
                ensure!(found["name"] == "alpha", "name mismatch: {found}");
                ensure!(found["displayName"] == "ALPHA", "displayName mismatch: {found}");
                ensure!(found["age"].as_i64() == Some(30), "age mismatch: {found}");
                Ok(())
            })
            .case("find_one returns None when absent", |adapter| async move {
                let found = adapter
                    .find_one(TESTER_MODEL, &[WhereClause::eq("name", "ghost")], None)
                    .await
                    .map_err(err)?;
                ensure!(found.is_none(), "expected None, got {found:?}");
                Ok(())
            })
            .case("find_many sorts, limits and offsets", |adapter| async move {
                seed(&adapter).await?;
                let rows = adapter
                    .find_many(
                        TESTER_MODEL,
                        FindManyQuery::new().sort_by(SortBy::desc("age")).limit(2).offset(1),
                    )
                    .await
                    .map_err(err)?;
                ensure!(names(&rows) == ["alpha", "bravo"], "got {:?}", names(&rows));
                Ok(())
            })
            .case("count honours where", |adapter| async move {
                seed(&adapter).await?;
                let all = adapter.count(TESTER_MODEL, &[]).await.map_err(err)?;
                let older = adapter
                    .count(TESTER_MODEL, &[WhereClause::gt("age", 20)])
                    .await
                    .map_err(err)?;
                ensure!(all == 4 && older == 2, "all={all} older={older}");
                Ok(())
            })
            .case("or-only clauses match any", |adapter| async move {
                seed(&adapter).await?;
                let rows = adapter
                    .find_many(
                        TESTER_MODEL,
                        FindManyQuery::new()
                            .filter(vec![
                                WhereClause::eq("name", "alpha").or(),
                                WhereClause::eq("name", "delta").or(),
                            ])
                            .sort_by(SortBy::asc("name")),
                    )
                    .await
                    .map_err(err)?;
                ensure!(names(&rows) == ["alpha", "delta"], "got {:?}", names(&rows));
                Ok(())
            })
            .case("and bucket and or bucket must both hold", |adapter| async move {
                seed(&adapter).await?;
                let n = adapter
                    .count(
                        TESTER_MODEL,
                        &[
                            WhereClause::gte("age", 20),
                            WhereClause::eq("name", "charlie").or(),
                            WhereClause::eq("name", "delta").or(),
                        ],
                    )
                    .await
                    .map_err(err)?;
                ensure!(n == 1, "expected 1 got {n}");
                Ok(())
            })
            .case("in and not_in operators", |adapter| async move {
                seed(&adapter).await?;
                let inside = adapter
                    .count(TESTER_MODEL, &[WhereClause::in_list("name", json!(["alpha", "bravo"]))])
                    .await
                    .map_err(err)?;
                let outside = adapter
                    .count(TESTER_MODEL, &[WhereClause::not_in("name", json!(["alpha"]))])
                    .await
                    .map_err(err)?;
                ensure!(inside == 2 && outside == 3, "in={inside} not_in={outside}");
                Ok(())
            })
            .case("in with a scalar is a validation error", |adapter| async move {
                let result = adapter
                    .count(TESTER_MODEL, &[WhereClause::in_list("name", "alpha")])
                    .await;
                ensure!(
                    matches!(result, Err(FeatureError::Validation(_))),
                    "expected validation error, got {result:?}"
                );
                Ok(())
            })
            .case("pattern operators", |adapter| async move {
                seed(&adapter).await?;
                let contains = adapter
                    .count(TESTER_MODEL, &[WhereClause::contains("name", "ar")])
                    .await
                    .map_err(err)?;
                let starts = adapter
                    .count(TESTER_MODEL, &[WhereClause::starts_with("name", "al")])
                    .await
                    .map_err(err)?;
                let ends = adapter
                    .count(TESTER_MODEL, &[WhereClause::ends_with("name", "ta")])
                    .await
                    .map_err(err)?;
                ensure!(
                    contains == 1 && starts == 1 && ends == 1,
                    "contains={contains} starts={starts} ends={ends}"
                );
                Ok(())
            })
            .case("update returns the updated record", |adapter| async move {
                seed(&adapter).await?;
                let updated = adapter
                    .update(
                        TESTER_MODEL,
                        &[WhereClause::eq("name", "bravo")],
                        json!({ "age": 21 }),
                    )
                    .await
                    .map_err(err)?
                    .ok_or("update returned None")?;
                ensure!(updated["age"].as_i64() == Some(21), "got {updated}");
                let missing = adapter
                    .update(TESTER_MODEL, &[WhereClause::eq("name", "ghost")], json!({ "age": 1 }))
                    .await
                    .map_err(err)?;
                ensure!(missing.is_none(), "expected None for missing record");
                Ok(())
            })
            .case("update_many returns affected rows", |adapter| async move {
                seed(&adapter).await?;
                let n = adapter
                    .update_many(TESTER_MODEL, &[WhereClause::lt("age", 25)], json!({ "age": 99 }))
                    .await
                    .map_err(err)?;
                let check = adapter
                    .count(TESTER_MODEL, &[WhereClause::eq("age", 99)])
                    .await
                    .map_err(err)?;
                ensure!(n == 2 && check == 2, "updated={n} check={check}");
                Ok(())
            })
            .case("delete is idempotent", |adapter| async move {
                seed(&adapter).await?;
                let target = [WhereClause::eq("name", "alpha")];
                adapter.delete(TESTER_MODEL, &target).await.map_err(err)?;
                adapter.delete(TESTER_MODEL, &target).await.map_err(err)?;
                let n = adapter.count(TESTER_MODEL, &[]).await.map_err(err)?;
                ensure!(n == 3, "expected 3 got {n}");
                Ok(())
            })
            .case("delete_many returns affected rows", |adapter| async move {
                seed(&adapter).await?;
                let n = adapter
                    .delete_many(TESTER_MODEL, &[WhereClause::gte("age", 30)])
                    .await
                    .map_err(err)?;
                let none = adapter
                    .delete_many(TESTER_MODEL, &[WhereClause::eq("name", "ghost")])
                    .await
                    .map_err(err)?;
                ensure!(n == 2 && none == 0, "deleted={n} none={none}");
                Ok(())
            })
    }
}
