use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::types::{EntityError, SkipReason, XriResult};

/// Result of processing one entity
#[derive(Debug, Clone, PartialEq)]
pub enum EntityOutcome<T> {
    Success(T),
    Skipped(SkipReason),
    /// Unexpected failure, with its message
    Failed(String),
}

impl<T> EntityOutcome<T> {
    /// Fold a pipeline result into an outcome
    pub fn from_result(result: Result<T, EntityError>) -> Self {
        match result {
            Ok(value) => EntityOutcome::Success(value),
            Err(EntityError::Skip(reason)) => EntityOutcome::Skipped(reason),
            Err(EntityError::Failed(e)) => EntityOutcome::Failed(e.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, EntityOutcome::Success(_))
    }
}

impl<T> From<Result<T, EntityError>> for EntityOutcome<T> {
    fn from(result: Result<T, EntityError>) -> Self {
        Self::from_result(result)
    }
}

/// Separate named skips from failures: `Ok(Err(reason))` for a skip,
/// `Err` only for a genuine error
pub fn split_skip<T>(result: Result<T, EntityError>) -> XriResult<Result<T, SkipReason>> {
    match result {
        Ok(value) => Ok(Ok(value)),
        Err(EntityError::Skip(reason)) => Ok(Err(reason)),
        Err(EntityError::Failed(e)) => Err(e),
    }
}

/// Per-entity outcomes in input order
#[derive(Debug, Clone)]
pub struct BatchReport<T> {
    pub outcomes: Vec<(String, EntityOutcome<T>)>,
}

impl<T> BatchReport<T> {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn succeeded(&self) -> impl Iterator<Item = (&str, &T)> {
        self.outcomes.iter().filter_map(|(id, o)| match o {
            EntityOutcome::Success(v) => Some((id.as_str(), v)),
            _ => None,
        })
    }

    pub fn skipped(&self) -> impl Iterator<Item = (&str, SkipReason)> {
        self.outcomes.iter().filter_map(|(id, o)| match o {
            EntityOutcome::Skipped(r) => Some((id.as_str(), *r)),
            _ => None,
        })
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &str)> {
        self.outcomes.iter().filter_map(|(id, o)| match o {
            EntityOutcome::Failed(msg) => Some((id.as_str(), msg.as_str())),
            _ => None,
        })
    }

    /// Number of skips per reason
    pub fn skip_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for (_, reason) in self.skipped() {
            *counts.entry(reason.code().to_string()).or_insert(0) += 1;
        }
        counts
    }
}

fn run_one<I, T, F>(id: &str, input: &I, process: &F) -> EntityOutcome<T>
where
    F: Fn(&I) -> anyhow::Result<EntityOutcome<T>>,
{
    let outcome = match catch_unwind(AssertUnwindSafe(|| process(input))) {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => EntityOutcome::Failed(format!("{:#}", e)),
        Err(panic) => {
            let msg = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            EntityOutcome::Failed(format!("panicked: {}", msg))
        }
    };

    match &outcome {
        EntityOutcome::Success(_) => log::debug!("Entity {} processed", id),
        EntityOutcome::Skipped(reason) => log::info!("Entity {} skipped: {}", id, reason),
        EntityOutcome::Failed(msg) => log::warn!("Entity {} failed: {}", id, msg),
    }
    outcome
}

/// Process independent entities, collecting every outcome.
///
/// A failure or panic in one entity never stops the others.
#[cfg(feature = "parallel")]
pub fn run_batch<I, T, F>(entities: &[(String, I)], process: F) -> BatchReport<T>
where
    I: Sync,
    T: Send,
    F: Fn(&I) -> anyhow::Result<EntityOutcome<T>> + Sync,
{
    use rayon::prelude::*;

    log::info!("Processing {} entities in parallel", entities.len());
    let outcomes = entities
        .par_iter()
        .map(|(id, input)| (id.clone(), run_one(id, input, &process)))
        .collect();
    finish(outcomes)
}

/// Process independent entities, collecting every outcome.
///
/// A failure or panic in one entity never stops the others.
#[cfg(not(feature = "parallel"))]
pub fn run_batch<I, T, F>(entities: &[(String, I)], process: F) -> BatchReport<T>
where
    F: Fn(&I) -> anyhow::Result<EntityOutcome<T>>,
{
    log::info!("Processing {} entities", entities.len());
    let outcomes = entities
        .iter()
        .map(|(id, input)| (id.clone(), run_one(id, input, &process)))
        .collect();
    finish(outcomes)
}

fn finish<T>(outcomes: Vec<(String, EntityOutcome<T>)>) -> BatchReport<T> {
    let report = BatchReport { outcomes };
    log::info!(
        "Batch complete: {} succeeded, {} skipped, {} failed",
        report.succeeded().count(),
        report.skipped().count(),
        report.failed().count()
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::XriError;

    #[test]
    fn test_outcomes_keep_input_order() {
        let entities: Vec<(String, i32)> = (0..20).map(|i| (format!("e{}", i), i)).collect();
        let report = run_batch(&entities, |&i| {
            if i % 5 == 0 {
                Ok(EntityOutcome::Skipped(SkipReason::EmptyInput))
            } else if i == 7 {
                anyhow::bail!("corrupt input")
            } else {
                Ok(EntityOutcome::Success(i * 2))
            }
        });

        assert_eq!(report.len(), 20);
        assert_eq!(report.outcomes[3], ("e3".to_string(), EntityOutcome::Success(6)));
        assert_eq!(report.skipped().count(), 4);
        assert_eq!(report.skip_counts()["EMPTY_INPUT"], 4);
        let failed: Vec<_> = report.failed().collect();
        assert_eq!(failed, vec![("e7", "corrupt input")]);
        assert_eq!(report.succeeded().count(), 15);
    }

    #[test]
    fn test_panic_is_contained() {
        let entities = vec![("a".to_string(), 0), ("b".to_string(), 1)];
        let report = run_batch(&entities, |&i| {
            if i == 0 {
                panic!("bad entity");
            }
            Ok(EntityOutcome::Success(i))
        });
        assert!(matches!(&report.outcomes[0].1, EntityOutcome::Failed(m) if m.contains("bad entity")));
        assert!(report.outcomes[1].1.is_success());
    }

    #[test]
    fn test_split_skip_keeps_reason() {
        let skipped: Result<u8, EntityError> = Err(SkipReason::InvalidGridDimensions.into());
        assert_eq!(split_skip(skipped).unwrap(), Err(SkipReason::InvalidGridDimensions));
        let skipped: Result<u8, EntityError> = Err(SkipReason::NoVariance.into());
        assert_eq!(split_skip(skipped).unwrap().unwrap_err().code(), "NO_VARIANCE");
        assert_eq!(split_skip::<u8>(Ok(3)).unwrap(), Ok(3));
        let failed: Result<u8, EntityError> = Err(XriError::InvalidInput("bad".into()).into());
        assert!(matches!(split_skip(failed), Err(XriError::InvalidInput(_))));
    }

    #[test]
    fn test_from_pipeline_result() {
        let skip: EntityOutcome<()> = Err(EntityError::Skip(SkipReason::NoVariance)).into();
        assert_eq!(skip, EntityOutcome::Skipped(SkipReason::NoVariance));
        let failed: EntityOutcome<()> =
            EntityOutcome::from_result(Err(XriError::Processing("boom".into()).into()));
        assert!(matches!(failed, EntityOutcome::Failed(m) if m.contains("boom")));
    }
}
