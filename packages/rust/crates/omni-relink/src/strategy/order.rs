use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::error::PlanError;

use super::OrderStrategy;

/// Order join sources; returns indices into `paths`.
///
/// * `timestamps` - per-source creation time for chronological order
/// * `depends_on` - `(a, b)` pairs meaning source `a` links to source `b`,
///   so `b` is placed first under dependency order
///
/// # Errors
/// `PlanError::DependencyCycle` when dependency order meets a cycle.
pub fn order_sources(
    strategy: OrderStrategy,
    paths: &[PathBuf],
    timestamps: &[Option<i64>],
    depends_on: &BTreeSet<(usize, usize)>,
) -> Result<Vec<usize>, PlanError> {
    let mut order: Vec<usize> = (0..paths.len()).collect();
    match strategy {
        OrderStrategy::Manual => {}
        OrderStrategy::Alphabetical => {
            order.sort_by(|a, b| {
                let left = paths[*a].to_string_lossy().to_lowercase();
                let right = paths[*b].to_string_lossy().to_lowercase();
                left.cmp(&right).then_with(|| paths[*a].cmp(&paths[*b]))
            });
        }
        OrderStrategy::Chronological => {
            // Stable: equal or missing timestamps keep input order, missing last.
            order.sort_by_key(|idx| {
                timestamps
                    .get(*idx)
                    .copied()
                    .flatten()
                    .map_or((1, 0), |ts| (0, ts))
            });
        }
        OrderStrategy::Dependency => order = topological(paths, depends_on)?,
    }
    Ok(order)
}

/// Kahn's algorithm; ready nodes are taken in input order.
fn topological(
    paths: &[PathBuf],
    depends_on: &BTreeSet<(usize, usize)>,
) -> Result<Vec<usize>, PlanError> {
    let count = paths.len();
    let mut pending = vec![0usize; count];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];
    for &(from, to) in depends_on {
        if from == to || from >= count || to >= count {
            continue;
        }
        pending[from] += 1;
        dependents[to].push(from);
    }

    let mut ready: BTreeSet<usize> = (0..count).filter(|idx| pending[*idx] == 0).collect();
    let mut order = Vec::with_capacity(count);
    while let Some(next) = ready.pop_first() {
        order.push(next);
        for &dependent in &dependents[next] {
            pending[dependent] -= 1;
            if pending[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() < count {
        let files: Vec<PathBuf> = (0..count)
            .filter(|idx| pending[*idx] > 0)
            .map(|idx| paths[idx].clone())
            .collect();
        tracing::warn!(files = files.len(), "dependency cycle among join sources");
        return Err(PlanError::DependencyCycle { files });
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_dependency_places_targets_first() -> Result<(), PlanError> {
        let files = paths(&["a.md", "b.md", "c.md"]);
        // a -> b, b -> c
        let edges = BTreeSet::from([(0, 1), (1, 2)]);
        let order = order_sources(OrderStrategy::Dependency, &files, &[], &edges)?;
        assert_eq!(order, vec![2, 1, 0]);
        Ok(())
    }

    #[test]
    fn test_dependency_cycle_is_error() {
        let files = paths(&["a.md", "b.md", "c.md"]);
        let edges = BTreeSet::from([(0, 1), (1, 0)]);
        let result = order_sources(OrderStrategy::Dependency, &files, &[], &edges);
        match result {
            Err(PlanError::DependencyCycle { files }) => {
                assert_eq!(files, paths(&["a.md", "b.md"]));
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_chronological_missing_last() -> Result<(), PlanError> {
        let files = paths(&["a.md", "b.md", "c.md"]);
        let order = order_sources(
            OrderStrategy::Chronological,
            &files,
            &[None, Some(20), Some(10)],
            &BTreeSet::new(),
        )?;
        assert_eq!(order, vec![2, 1, 0]);
        Ok(())
    }

    #[test]
    fn test_alphabetical_is_case_insensitive() -> Result<(), PlanError> {
        let files = paths(&["b.md", "A.md", "c.md"]);
        let order = order_sources(OrderStrategy::Alphabetical, &files, &[], &BTreeSet::new())?;
        assert_eq!(order, vec![1, 0, 2]);
        Ok(())
    }
}
