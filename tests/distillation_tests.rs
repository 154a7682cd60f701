//! Integration tests for distillation.

use reasoning_bank::prelude::*;

fn trajectory(task: &str, outcome: Outcome) -> Trajectory {
    Trajectory::new(task, outcome)
        .with_step("profile", "hot loop in serializer")
        .with_step("switch to streaming", "memory halved")
}

async fn bank() -> ReasoningBank {
    ReasoningBank::open(BankConfig::in_memory()).await.unwrap()
}

async fn seed(bank: &ReasoningBank, domain: &str, n: usize) {
    for i in 0..n {
        let query = format!("streaming serializer experiment number {}", i);
        let embedding = bank.embed(&query).await.unwrap();
        let body = ExperienceBody::new(query, Outcome::Success).with_approach("streaming");
        bank.insert_pattern(
            PatternRecord::new(domain, PatternBody::Experience(body), embedding)
                .with_confidence(0.9)
                .with_usage(2, 2),
        )
        .await
        .unwrap();
    }
}

async fn types_in(bank: &ReasoningBank, domain: &str) -> Vec<PatternType> {
    bank.store()
        .scan(Some(domain), 0.0)
        .await
        .unwrap()
        .iter()
        .map(|r| r.pattern_type())
        .collect()
}

/// A domain with enough history gains a distilled pattern
#[tokio::test]
async fn test_distill_with_history() {
    let bank = bank().await;
    seed(&bank, "perf", 6).await;

    let t = trajectory("perf", Outcome::Success);
    let memories = bank
        .distill_memories(&t, Verdict::Success, None)
        .await
        .unwrap();

    assert!(memories.len() >= 5);
    assert!(types_in(&bank, "perf").await.contains(&PatternType::DistilledPattern));

    let distilled = bank
        .store()
        .scan(Some("perf"), 0.0)
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.pattern_type() == PatternType::DistilledPattern)
        .unwrap();
    assert_eq!(distilled.confidence, 0.9);
    assert_eq!(distilled.usage_count, 0);
    match distilled.body {
        PatternBody::DistilledPattern(body) => {
            assert_eq!(body.domain, "perf");
            assert_eq!(body.sample_size, memories.len());
            assert!(body.pattern.starts_with("Based on"));
            assert!(body.success_rate > 0.9);
        }
        other => panic!("unexpected body {:?}", other),
    }
}

/// Too little history stores only the trajectory
#[tokio::test]
async fn test_distill_without_history() {
    let bank = bank().await;
    seed(&bank, "perf", 2).await;

    let t = trajectory("perf", Outcome::Partial);
    let memories = bank
        .distill_memories(&t, Verdict::NeedsReview, None)
        .await
        .unwrap();

    assert_eq!(memories.len(), 3);
    let types = types_in(&bank, "perf").await;
    assert!(types.contains(&PatternType::Trajectory));
    assert!(!types.contains(&PatternType::DistilledPattern));
}

/// The stored trajectory carries a verdict-derived confidence
#[tokio::test]
async fn test_trajectory_record() {
    let cases = [
        (Verdict::Success, 0.95, 1),
        (Verdict::LikelySuccess, 0.8, 1),
        (Verdict::Failure, 0.5, 0),
        (Verdict::NeedsReview, 0.5, 0),
    ];

    for (verdict, confidence, successes) in cases {
        let bank = bank().await;
        let t = trajectory("task", Outcome::Success);
        bank.distill_memories(&t, verdict, None).await.unwrap();

        let records = bank.store().scan(Some("task"), 0.0).await.unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.confidence, confidence);
        assert_eq!(record.usage_count, 1);
        assert_eq!(record.success_count, successes);
        assert_eq!(record.body, PatternBody::Trajectory(t));
    }
}

/// An explicit domain overrides the task
#[tokio::test]
async fn test_domain_override() {
    let bank = bank().await;
    let t = trajectory("task-17", Outcome::Success);
    bank.distill_memories(&t, Verdict::Success, Some("serialization"))
        .await
        .unwrap();

    assert!(types_in(&bank, "task-17").await.is_empty());
    assert_eq!(types_in(&bank, "serialization").await, vec![PatternType::Trajectory]);
}

/// Without reasoning the distilled pattern falls back to a fixed summary
#[tokio::test]
async fn test_fallback_summary_without_reasoning() {
    let bank = ReasoningBank::open(BankConfig::in_memory().enable_reasoning(false))
        .await
        .unwrap();
    seed(&bank, "perf", 5).await;

    let t = trajectory("perf", Outcome::Success);
    bank.distill_memories(&t, Verdict::Success, None).await.unwrap();

    let distilled = bank
        .store()
        .scan(Some("perf"), 0.0)
        .await
        .unwrap()
        .into_iter()
        .find_map(|r| match r.body {
            PatternBody::DistilledPattern(body) => Some(body),
            _ => None,
        })
        .unwrap();
    assert_eq!(distilled.pattern, "Pattern distilled from multiple experiences");
}

/// Judge then distill, the way a task runner would
#[tokio::test]
async fn test_judge_then_distill() {
    let bank = bank().await;
    let t = trajectory("perf", Outcome::Success);

    let verdict = bank.judge_trajectory(&t).await.unwrap();
    assert_eq!(verdict, Verdict::LikelySuccess);

    bank.distill_memories(&t, verdict, None).await.unwrap();
    let stats = bank.processes().distillation().stats();
    assert_eq!(stats.trajectories_stored, 1);
    assert_eq!(stats.patterns_distilled, 0);
}
