use anyhow::{Context, Result, ensure};
use rand::prelude::*;
use rand::rngs::StdRng;
use std::fs;
use std::path::Path;

use crate::study::{self, VideoKey};

/// Enumeration of the study: which subjects, sentences, and baseline
/// methods are compared, how many crowdworkers see each pairing, and how
/// many comparisons one HIT holds.
#[derive(Debug, Clone)]
pub struct StudyPlan {
    pub subjects: Vec<String>,
    pub sentences: Vec<String>,
    pub baselines: Vec<String>,
    /// Responders per pairing; must be even so sides balance exactly
    pub responders: usize,
    /// Comparisons per bucket (one bucket = one HIT)
    pub bucket_size: usize,
}

impl StudyPlan {
    /// Total comparisons the plan generates across all responders.
    pub fn pool_len(&self) -> usize {
        self.subjects.len() * self.sentences.len() * self.baselines.len() * self.responders
    }
}

/// One ours-vs-baseline comparison shown to a responder, with the side our
/// method appears on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    pub key: VideoKey,
    pub baseline: String,
    pub ours_left: bool,
}

impl Comparison {
    pub fn pair_name(&self) -> String {
        study::pair_name(&self.key, &self.baseline, self.ours_left)
    }

    fn same_pairing(&self, other: &Comparison) -> bool {
        self.key == other.key && self.baseline == other.baseline
    }
}

pub type Bucket = Vec<Comparison>;

/// Deterministically assigns the plan's comparison pool into buckets.
///
/// Every `(subject, sentence, baseline)` pairing appears `responders` times
/// overall, half with `ours_left` and half without; within a bucket each
/// pairing appears at most once (a responder never rates the same pair
/// twice in one HIT). Sampling is without replacement from a single
/// `StdRng` seeded with `seed`: the same seed and plan always produce the
/// identical assignment.
///
/// Bucket filling rejects in-bucket duplicates by resampling. When the
/// remaining pool holds no pairing the current bucket still accepts, the
/// draw cannot complete and the function returns an error naming the seed —
/// callers retry with a different one rather than looping forever.
pub fn assign(seed: u64, plan: &StudyPlan) -> Result<Vec<Bucket>> {
    ensure!(
        plan.responders % 2 == 0,
        "responders must be even to balance which side ours appears on"
    );
    ensure!(plan.bucket_size > 0, "bucket size must be positive");
    ensure!(
        plan.pool_len() % plan.bucket_size == 0,
        "plan yields {} comparisons, not divisible into buckets of {}",
        plan.pool_len(),
        plan.bucket_size
    );

    let mut pool = build_pool(plan);
    let num_buckets = pool.len() / plan.bucket_size;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut buckets = Vec::with_capacity(num_buckets);

    for bucket_index in 0..num_buckets {
        let mut bucket: Bucket = Vec::with_capacity(plan.bucket_size);
        for _ in 0..plan.bucket_size {
            ensure!(
                pool.iter()
                    .any(|c| !bucket.iter().any(|picked| picked.same_pairing(c))),
                "seed {seed} leaves no unique pairing for bucket {}; retry with another seed",
                bucket_index + 1
            );

            let mut index = rng.random_range(0..pool.len());
            while bucket.iter().any(|picked| picked.same_pairing(&pool[index])) {
                index = rng.random_range(0..pool.len());
            }
            bucket.push(pool.remove(index));
        }
        buckets.push(bucket);
    }

    Ok(buckets)
}

/// Side-balanced comparison pool: each pairing duplicated `responders`
/// times, alternating which side ours appears on.
fn build_pool(plan: &StudyPlan) -> Vec<Comparison> {
    let mut pool = Vec::with_capacity(plan.pool_len());
    for _ in 0..plan.responders / 2 {
        for subject in &plan.subjects {
            for sentence in &plan.sentences {
                for baseline in &plan.baselines {
                    for ours_left in [true, false] {
                        pool.push(Comparison {
                            key: VideoKey::new(sentence.clone(), subject.clone()),
                            baseline: baseline.clone(),
                            ours_left,
                        });
                    }
                }
            }
        }
    }
    pool
}

/// Writes the HIT CSVs: the full assignment plus the staged-release splits
/// (first 10% / rest, and 10% / 40% / 50%).
pub fn write_hit_csvs(out_dir: &Path, buckets: &[Bucket]) -> Result<()> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let rows: Vec<String> = buckets
        .iter()
        .map(|bucket| {
            bucket
                .iter()
                .map(Comparison::pair_name)
                .collect::<Vec<_>>()
                .join("#")
        })
        .collect();

    let ten = rows.len() / 10;
    let forty = rows.len() * 40 / 100;

    write_csv(&out_dir.join("turk_hits.csv"), &rows)?;
    write_csv(&out_dir.join("turk_hits_10.csv"), &rows[..ten])?;
    write_csv(&out_dir.join("turk_hits_90.csv"), &rows[ten..])?;
    write_csv(&out_dir.join("turk3split_hits_10.csv"), &rows[..ten])?;
    write_csv(&out_dir.join("turk3split_hits_40.csv"), &rows[ten..ten + forty])?;
    write_csv(&out_dir.join("turk3split_hits_50.csv"), &rows[ten + forty..])?;
    Ok(())
}

fn write_csv(path: &Path, rows: &[String]) -> Result<()> {
    let mut text = String::from("q_strings\n");
    for row in rows {
        text.push_str(row);
        text.push('\n');
    }
    fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn small_plan() -> StudyPlan {
        StudyPlan {
            subjects: vec!["074".into(), "104".into()],
            sentences: vec!["A".into()],
            baselines: vec!["ga".into()],
            responders: 2,
            bucket_size: 2,
        }
    }

    #[test]
    fn test_assignment_is_deterministic() {
        let plan = small_plan();
        let first = assign(45, &plan).unwrap();
        let second = assign(45, &plan).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_bucket_shape_and_uniqueness() {
        let plan = small_plan();
        for seed in [0, 1, 7, 45, 1234] {
            let buckets = assign(seed, &plan).unwrap();
            assert_eq!(buckets.len(), plan.pool_len() / plan.bucket_size);
            for bucket in &buckets {
                assert_eq!(bucket.len(), plan.bucket_size);
                for (i, a) in bucket.iter().enumerate() {
                    for b in &bucket[i + 1..] {
                        assert!(!a.same_pairing(b), "duplicate pairing within a bucket");
                    }
                }
            }
        }
    }

    #[test]
    fn test_every_pairing_appears_side_balanced() {
        let plan = small_plan();
        let buckets = assign(45, &plan).unwrap();

        let mut counts: HashMap<(String, String, String, bool), usize> = HashMap::new();
        for c in buckets.iter().flatten() {
            *counts
                .entry((
                    c.key.subject.clone(),
                    c.key.sentence.clone(),
                    c.baseline.clone(),
                    c.ours_left,
                ))
                .or_default() += 1;
        }

        // Each pairing appears responders/2 times per side
        assert_eq!(counts.len(), 4);
        assert!(counts.values().all(|&n| n == plan.responders / 2));
    }

    #[test]
    fn test_odd_responders_rejected() {
        let mut plan = small_plan();
        plan.responders = 3;
        assert!(assign(45, &plan).is_err());
    }

    #[test]
    fn test_indivisible_plan_rejected() {
        let mut plan = small_plan();
        plan.bucket_size = 3;
        assert!(assign(45, &plan).is_err());
    }

    #[test]
    fn test_infeasible_bucket_reports_seed() {
        // A single pairing cannot fill a two-slot bucket uniquely
        let plan = StudyPlan {
            subjects: vec!["074".into()],
            sentences: vec!["A".into()],
            baselines: vec!["ga".into()],
            responders: 2,
            bucket_size: 2,
        };
        let err = assign(45, &plan).unwrap_err();
        assert!(err.to_string().contains("seed 45"));
    }

    #[test]
    fn test_write_hit_csvs() {
        let plan = small_plan();
        let buckets = assign(45, &plan).unwrap();
        let dir = tempfile::tempdir().unwrap();
        write_hit_csvs(dir.path(), &buckets).unwrap();

        let full = fs::read_to_string(dir.path().join("turk_hits.csv")).unwrap();
        let lines: Vec<&str> = full.lines().collect();
        assert_eq!(lines[0], "q_strings");
        assert_eq!(lines.len(), buckets.len() + 1);
        // Each row holds '#'-joined pair names
        assert_eq!(lines[1].split('#').count(), plan.bucket_size);
        assert!(lines[1].starts_with("pair_"));

        // Splits partition the full file
        let ninety = fs::read_to_string(dir.path().join("turk_hits_90.csv")).unwrap();
        let ten = fs::read_to_string(dir.path().join("turk_hits_10.csv")).unwrap();
        assert_eq!(
            ten.lines().count() + ninety.lines().count(),
            lines.len() + 1 // both carry a header
        );
    }

    #[test]
    fn test_pair_name_encodes_side() {
        let c = Comparison {
            key: VideoKey::new("B", "302"),
            baseline: "hr".into(),
            ours_left: false,
        };
        assert_eq!(c.pair_name(), "pair_302_B_hr_vs_ours");
    }
}
