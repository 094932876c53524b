//! Per-step status bookkeeping for one run

use envbake_errors::StepError;
use envbake_types::{Pipeline, StepStatus};

/// Status of every step in a pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepTracker {
    steps: Vec<(String, StepStatus)>,
}

impl StepTracker {
    /// Every step of `pipeline` starts out pending
    #[must_use]
    pub fn new(pipeline: &Pipeline) -> Self {
        Self {
            steps: pipeline
                .iter()
                .map(|s| (s.name.clone(), StepStatus::Pending))
                .collect(),
        }
    }

    /// Move step `index` to `next`
    ///
    /// # Errors
    ///
    /// Returns `StepError::InvalidTransition` if the move is not allowed
    /// from the step's current status.
    pub fn transition(&mut self, index: usize, next: StepStatus) -> Result<(), StepError> {
        let Some((name, status)) = self.steps.get_mut(index) else {
            return Err(StepError::InvalidTransition {
                step: format!("#{index}"),
                from: "<absent>".to_string(),
                to: next.to_string(),
            });
        };
        if !status.can_transition_to(next) {
            return Err(StepError::InvalidTransition {
                step: name.clone(),
                from: status.to_string(),
                to: next.to_string(),
            });
        }
        *status = next;
        Ok(())
    }

    #[must_use]
    pub fn status(&self, index: usize) -> Option<StepStatus> {
        self.steps.get(index).map(|(_, status)| *status)
    }

    /// Steps still pending, with their indices
    pub fn pending(&self) -> impl Iterator<Item = (usize, &str)> {
        self.steps
            .iter()
            .enumerate()
            .filter(|(_, (_, status))| *status == StepStatus::Pending)
            .map(|(i, (name, _))| (i, name.as_str()))
    }

    /// Number of steps that reached `Succeeded`
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.steps
            .iter()
            .filter(|(_, status)| *status == StepStatus::Succeeded)
            .count()
    }

    #[must_use]
    pub fn statuses(&self) -> &[(String, StepStatus)] {
        &self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use envbake_types::Step;

    #[test]
    fn test_failed_is_terminal() {
        let pipeline = Pipeline::new("p")
            .then(Step::clear_cache("a"))
            .then(Step::clear_cache("b"));
        let mut tracker = StepTracker::new(&pipeline);

        tracker.transition(0, StepStatus::Running).unwrap();
        tracker.transition(0, StepStatus::Failed).unwrap();
        assert!(tracker.transition(0, StepStatus::Running).is_err());
        assert!(tracker.transition(1, StepStatus::Succeeded).is_err());
        assert_eq!(tracker.pending().map(|(i, _)| i).collect::<Vec<_>>(), [1]);
        assert!(tracker.transition(5, StepStatus::Running).is_err());
    }
}
