//! Integration tests for memory optimization.

use reasoning_bank::prelude::*;
use reasoning_bank::processes::{OptimizerConfig, ProcessRunner};

fn unit(dim: usize, axis: usize) -> Embedding {
    let mut v = vec![0.0; dim];
    v[axis] = 1.0;
    Embedding::new(v)
}

fn pattern(id: &str, domain: &str, embedding: Embedding) -> PatternRecord {
    PatternRecord::new(domain, PatternBody::Concrete(json!({"id": id})), embedding).with_id(id)
}

async fn bank(dim: usize) -> ReasoningBank {
    ReasoningBank::open(BankConfig::in_memory().dimension(dim))
        .await
        .unwrap()
}

/// Low-confidence, heavily used patterns are pruned; the rest survive
#[tokio::test]
async fn test_prune_scenario() {
    let bank = bank(5).await;
    for i in 0..3 {
        bank.insert_pattern(
            pattern(&format!("weak{}", i), "d", unit(5, i))
                .with_confidence(0.2)
                .with_usage(20, 1),
        )
        .await
        .unwrap();
    }
    for i in 3..5 {
        bank.insert_pattern(
            pattern(&format!("strong{}", i), "d", unit(5, i))
                .with_confidence(0.9)
                .with_usage(5, 5),
        )
        .await
        .unwrap();
    }

    let before = bank.store().len().await.unwrap();
    let summary = bank.optimize(None).await.unwrap();

    assert_eq!(summary.pruned, 3);
    assert_eq!(summary.consolidated, 0);
    assert!((summary.improved_quality - 0.6).abs() < 1e-6);
    assert_eq!(bank.store().len().await.unwrap(), before - 3);

    let survivors: Vec<String> = bank
        .store()
        .scan(None, 0.0)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(survivors, vec!["strong3", "strong4"]);
}

/// A second pass over an unchanged store finds nothing
#[tokio::test]
async fn test_optimize_is_idempotent() {
    let bank = bank(256).await;
    let texts = [
        "optimize the api gateway",
        "optimize the api gateways",
        "optimise the api gateway",
        "rewrite the billing job",
        "cache user sessions",
        "cache user session",
    ];
    for text in texts {
        let e = bank.embed(text).await.unwrap();
        bank.insert_pattern(pattern(text, "d", e)).await.unwrap();
    }
    bank.insert_pattern(
        pattern("noise", "d", unit(256, 7))
            .with_confidence(0.1)
            .with_usage(30, 0),
    )
    .await
    .unwrap();

    let first = bank.optimize(None).await.unwrap();
    assert!(first.consolidated + first.pruned > 0);

    let second = bank.optimize(None).await.unwrap();
    assert_eq!(second.consolidated, 0);
    assert_eq!(second.pruned, 0);
    assert_eq!(second.improved_quality, 0.0);
}

/// Consolidation keeps the earliest pattern of a duplicate pair
#[tokio::test]
async fn test_consolidation_keeps_earlier() {
    let bank = bank(2).await;
    bank.insert_pattern(pattern("original", "d", Embedding::new(vec![1.0, 0.0])))
        .await
        .unwrap();
    bank.insert_pattern(pattern("copy", "d", Embedding::new(vec![1.0, 0.02])))
        .await
        .unwrap();

    let summary = bank.optimize(Some("d")).await.unwrap();
    assert_eq!(summary.consolidated, 1);

    let ids: Vec<String> = bank
        .store()
        .scan(None, 0.0)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec!["original"]);
}

/// A domain-scoped pass leaves other domains alone
#[tokio::test]
async fn test_domain_scope() {
    let bank = bank(2).await;
    for domain in ["a", "b"] {
        for n in 0..2 {
            bank.insert_pattern(pattern(
                &format!("{}{}", domain, n),
                domain,
                Embedding::new(vec![1.0, 0.0]),
            ))
            .await
            .unwrap();
        }
    }

    let summary = bank.optimize(Some("a")).await.unwrap();
    assert_eq!(summary.consolidated, 1);
    assert_eq!(bank.store().scan(Some("a"), 0.0).await.unwrap().len(), 1);
    assert_eq!(bank.store().scan(Some("b"), 0.0).await.unwrap().len(), 2);
}

/// An empty store reports zero quality improvement
#[tokio::test]
async fn test_empty_store() {
    let bank = bank(4).await;
    let summary = bank.optimize(None).await.unwrap();
    assert_eq!(summary, OptimizationSummary::default());
}

/// A stricter threshold keeps near-duplicates
#[tokio::test]
async fn test_custom_threshold() {
    let bank = bank(2).await.with_processes(ProcessRunner::with_config(
        OptimizerConfig {
            consolidation_threshold: 0.9999,
            ..Default::default()
        },
        Default::default(),
        Default::default(),
    ));
    bank.insert_pattern(pattern("x", "d", Embedding::new(vec![1.0, 0.0])))
        .await
        .unwrap();
    bank.insert_pattern(pattern("y", "d", Embedding::new(vec![1.0, 0.1])))
        .await
        .unwrap();

    let summary = bank.optimize(None).await.unwrap();
    assert_eq!(summary.consolidated, 0);
    assert_eq!(bank.processes().optimizer().stats().passes, 1);
}

/// Concurrent inserts and optimization passes leave a consistent store
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_insert_and_optimize() {
    let bank = bank(64).await;
    let mut handles = Vec::new();

    for t in 0..4 {
        let bank = bank.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..10 {
                let mut v = vec![0.0; 64];
                v[(t * 10 + i) % 64] = 1.0;
                bank.insert_pattern(pattern(&format!("p{}-{}", t, i), "d", Embedding::new(v)))
                    .await
                    .unwrap();
            }
        }));
    }
    for _ in 0..3 {
        let bank = bank.clone();
        handles.push(tokio::spawn(async move {
            bank.optimize(None).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // Every vector is orthogonal to the others, so nothing is removed
    assert_eq!(bank.store().len().await.unwrap(), 40);
}
