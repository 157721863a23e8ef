//! Selector tests: stability, monotonic inclusion and category filtering.

use std::sync::Arc;

use async_trait::async_trait;
use mtb_core::benchmark::{BenchContext, Benchmark, BenchmarkError, Descriptor, Verdict};
use mtb_core::catalog::builtin_registry;
use mtb_core::registry::Registry;
use mtb_core::selector::{select, SelectionCriteria};

struct Noop;

#[async_trait]
impl Benchmark for Noop {
    async fn run(&self, _ctx: &BenchContext) -> Result<Verdict, BenchmarkError> {
        Ok(Verdict::Pass)
    }
}

fn registry(entries: &[(&str, u8, &str)]) -> Registry {
    let mut registry = Registry::new();
    for (id, level, category) in entries {
        let descriptor = Descriptor::builder(*id, format!("Benchmark {}", id))
            .category(*category, format!("{} checks", category))
            .profile_level(*level)
            .build(Noop);
        registry.register(descriptor).unwrap();
    }
    registry
}

fn ids(selection: &[Arc<Descriptor>]) -> Vec<&str> {
    selection.iter().map(|d| d.id.as_str()).collect()
}

fn five() -> Registry {
    registry(&[
        ("B-1", 1, "Network"),
        ("B-2", 1, "RBAC"),
        ("B-3", 2, "Network"),
        ("B-4", 2, "Host"),
        ("B-5", 3, "Network"),
    ])
}

// =============================================================================
// Concrete Scenarios
// =============================================================================

#[test]
fn level_two_returns_first_four_in_order() {
    let registry = five();
    let criteria = SelectionCriteria::new(2, None).unwrap();
    assert_eq!(ids(&select(registry.all(), &criteria)), ["B-1", "B-2", "B-3", "B-4"]);
}

#[test]
fn level_two_rbac_returns_only_rbac() {
    let registry = five();
    let criteria = SelectionCriteria::new(2, Some("RBAC")).unwrap();
    assert_eq!(ids(&select(registry.all(), &criteria)), ["B-2"]);
}

#[test]
fn category_match_ignores_case_and_whitespace() {
    let registry = five();
    let criteria = SelectionCriteria::new(3, Some("  network ")).unwrap();
    assert_eq!(ids(&select(registry.all(), &criteria)), ["B-1", "B-3", "B-5"]);
}

#[test]
fn category_name_also_matches() {
    let registry = five();
    let criteria = SelectionCriteria::new(3, Some("host checks")).unwrap();
    assert_eq!(ids(&select(registry.all(), &criteria)), ["B-4"]);
}

#[test]
fn unknown_category_is_empty_not_error() {
    let registry = five();
    let criteria = SelectionCriteria::new(3, Some("Storage")).unwrap();
    assert!(select(registry.all(), &criteria).is_empty());
}

// =============================================================================
// Properties
// =============================================================================

fn is_ordered_subsequence(selection: &[Arc<Descriptor>], registry: &Registry) -> bool {
    let mut rest = registry.all().iter();
    selection
        .iter()
        .all(|picked| rest.any(|candidate| Arc::ptr_eq(candidate, picked)))
}

#[test]
fn selection_is_stable_subset_for_all_criteria() {
    let registry = builtin_registry().unwrap();
    let mut categories: Vec<Option<&str>> = registry.categories().into_iter().map(Some).collect();
    categories.push(None);
    categories.push(Some("nonexistent"));

    for level in 1..=4u8 {
        for category in &categories {
            let criteria = SelectionCriteria::new(level, *category).unwrap();
            let selection = select(registry.all(), &criteria);
            assert!(
                is_ordered_subsequence(&selection, &registry),
                "level {} category {:?} reordered the catalog",
                level,
                category
            );
            assert!(selection.iter().all(|d| d.profile_level.get() <= level));
        }
    }
}

#[test]
fn selection_is_monotonic_in_level() {
    let registry = builtin_registry().unwrap();
    let mut categories: Vec<Option<&str>> = registry.categories().into_iter().map(Some).collect();
    categories.push(None);

    for category in categories {
        for level in 2..=3u8 {
            let lower = SelectionCriteria::new(level - 1, category).unwrap();
            let upper = SelectionCriteria::new(level, category).unwrap();
            let lower = ids(&select(registry.all(), &lower))
                .into_iter()
                .map(str::to_string)
                .collect::<Vec<_>>();
            let upper_sel = select(registry.all(), &upper);
            let upper = ids(&upper_sel);
            assert!(
                lower.iter().all(|id| upper.contains(&id.as_str())),
                "level {} dropped benchmarks from level {} ({:?})",
                level,
                level - 1,
                category
            );
        }
    }
}

#[test]
fn full_catalog_at_level_three() {
    let registry = builtin_registry().unwrap();
    let selection = select(registry.all(), &SelectionCriteria::all());
    assert_eq!(selection.len(), registry.len());
}

#[test]
fn zero_level_is_configuration_error() {
    assert!(SelectionCriteria::new(0, None).is_err());
}
