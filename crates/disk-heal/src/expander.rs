//! Volume capacity increase.

use std::fmt;
use std::sync::Arc;

use cloud::{ComputeService, ModificationState};
use serde::Serialize;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use crate::config::PollPolicy;
use crate::error::{RemediationError, Result};

/// Progress of a resize as seen by this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeState {
    Requested,
    Modifying,
    Optimizing,
    Completed,
}

impl fmt::Display for ResizeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Requested => "requested",
            Self::Modifying => "modifying",
            Self::Optimizing => "optimizing",
            Self::Completed => "completed",
        };
        f.write_str(label)
    }
}

/// Record of one capacity change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeResizeOperation {
    pub volume_id: String,
    pub previous_size_gib: i32,
    pub target_size_gib: i32,
    pub state: ResizeState,
}

/// `current + increase`, or `None` if it does not fit.
#[must_use]
pub fn target_size(current_gib: i32, increase_gib: u32) -> Option<i32> {
    i32::try_from(increase_gib)
        .ok()
        .and_then(|increase| current_gib.checked_add(increase))
}

/// Requests a larger volume and waits until the change is applied.
pub struct VolumeExpander {
    compute: Arc<dyn ComputeService>,
    increase_gib: u32,
    policy: PollPolicy,
}

impl VolumeExpander {
    pub fn new(compute: Arc<dyn ComputeService>, increase_gib: u32, policy: PollPolicy) -> Self {
        Self {
            compute,
            increase_gib,
            policy,
        }
    }

    pub async fn expand(&self, volume_id: &str) -> Result<VolumeResizeOperation> {
        let volume = self.compute.get_volume(volume_id).await?;
        let rejected = |reason: String| RemediationError::ResizeRejected {
            volume_id: volume_id.to_string(),
            current_size_gib: volume.size_gib,
            increase_gib: self.increase_gib,
            reason,
        };
        let target_size_gib = target_size(volume.size_gib, self.increase_gib)
            .ok_or_else(|| rejected("target exceeds the maximum volume size".to_string()))?;

        let mut operation = VolumeResizeOperation {
            volume_id: volume_id.to_string(),
            previous_size_gib: volume.size_gib,
            target_size_gib,
            state: ResizeState::Requested,
        };

        self.compute
            .modify_volume_size(volume_id, target_size_gib)
            .await
            .map_err(|e| rejected(e.to_string()))?;

        info!(
            volume_id = %volume_id,
            from_gib = volume.size_gib,
            to_gib = target_size_gib,
            "Requested volume modification"
        );

        operation.state = self.wait_until_applied(&operation).await?;
        Ok(operation)
    }

    async fn wait_until_applied(&self, operation: &VolumeResizeOperation) -> Result<ResizeState> {
        let volume_id = operation.volume_id.as_str();
        let started = Instant::now();
        sleep(self.policy.initial_delay).await;

        loop {
            let modifications = self
                .compute
                .volume_modifications(volume_id, operation.target_size_gib)
                .await?;

            // Not listed yet means the change has not started applying.
            let state = match modifications.as_slice() {
                [] => ModificationState::Modifying,
                [modification] => modification.state,
                many => {
                    return Err(RemediationError::AmbiguousMatch {
                        kind: "volume modifications",
                        key: volume_id.to_string(),
                        count: many.len(),
                    })
                }
            };

            match state {
                ModificationState::Optimizing => return Ok(ResizeState::Optimizing),
                ModificationState::Completed => return Ok(ResizeState::Completed),
                ModificationState::Failed => {
                    return Err(RemediationError::ResizeRejected {
                        volume_id: volume_id.to_string(),
                        current_size_gib: operation.previous_size_gib,
                        increase_gib: self.increase_gib,
                        reason: "volume modification failed".to_string(),
                    })
                }
                ModificationState::Modifying | ModificationState::Unknown => {}
            }

            if started.elapsed() + self.policy.interval > self.policy.timeout {
                return Err(RemediationError::ResizeTimeout {
                    volume_id: volume_id.to_string(),
                    state,
                    waited: started.elapsed(),
                });
            }

            debug!(volume_id = %volume_id, state = %state, "Waiting for volume modification");
            sleep(self.policy.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloud::{CloudProviderError, MockComputeService, Volume, VolumeModification};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    fn modification(state: ModificationState) -> VolumeModification {
        VolumeModification {
            volume_id: "vol-data".to_string(),
            state,
            target_size_gib: Some(150),
        }
    }

    fn compute(polls: Vec<Vec<VolumeModification>>) -> MockComputeService {
        let polls = Mutex::new(VecDeque::from(polls));
        let mut compute = MockComputeService::new();
        compute.expect_get_volume().returning(|id| {
            Ok(Volume {
                id: id.to_string(),
                size_gib: 100,
            })
        });
        compute
            .expect_modify_volume_size()
            .withf(|id, size| id == "vol-data" && *size == 150)
            .times(1)
            .returning(|_, _| Ok(()));
        compute
            .expect_volume_modifications()
            .withf(|id, size| id == "vol-data" && *size == 150)
            .returning(move |_, _| {
                let mut polls = polls.lock().unwrap();
                Ok(if polls.len() > 1 {
                    polls.pop_front().unwrap()
                } else {
                    polls.front().cloned().unwrap_or_default()
                })
            });
        compute
    }

    fn expander(compute: MockComputeService) -> VolumeExpander {
        VolumeExpander::new(
            Arc::new(compute),
            50,
            PollPolicy::resize(Duration::from_secs(60)),
        )
    }

    #[test]
    fn test_target_size() {
        assert_eq!(target_size(100, 50), Some(150));
        assert_eq!(target_size(i32::MAX, 1), None);
        assert_eq!(target_size(1, u32::MAX), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expand_waits_for_modifying_to_end() {
        let started = Instant::now();
        let operation = expander(compute(vec![
            vec![],
            vec![modification(ModificationState::Modifying)],
            vec![modification(ModificationState::Optimizing)],
        ]))
        .expand("vol-data")
        .await
        .unwrap();

        assert_eq!(
            operation,
            VolumeResizeOperation {
                volume_id: "vol-data".to_string(),
                previous_size_gib: 100,
                target_size_gib: 150,
                state: ResizeState::Optimizing,
            }
        );
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_modification_is_rejected() {
        let err = expander(compute(vec![vec![modification(ModificationState::Failed)]]))
            .expand("vol-data")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RemediationError::ResizeRejected {
                current_size_gib: 100,
                increase_gib: 50,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_is_bounded() {
        let err = expander(compute(vec![vec![modification(ModificationState::Modifying)]]))
            .expand("vol-data")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RemediationError::ResizeTimeout {
                state: ModificationState::Modifying,
                ref waited,
                ..
            } if *waited <= Duration::from_secs(60)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_multiple_modifications_are_ambiguous() {
        let err = expander(compute(vec![vec![
            modification(ModificationState::Modifying),
            modification(ModificationState::Completed),
        ]]))
        .expand("vol-data")
        .await
        .unwrap_err();
        assert!(matches!(err, RemediationError::AmbiguousMatch { count: 2, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_target_reports_current_size() {
        let mut compute = MockComputeService::new();
        compute.expect_get_volume().returning(|id| {
            Ok(Volume {
                id: id.to_string(),
                size_gib: i32::MAX - 10,
            })
        });
        compute.expect_modify_volume_size().never();
        compute.expect_volume_modifications().never();

        let err = expander(compute).expand("vol-data").await.unwrap_err();
        assert!(matches!(
            err,
            RemediationError::ResizeRejected {
                current_size_gib,
                increase_gib: 50,
                ..
            } if current_size_gib == i32::MAX - 10
        ));
        assert!(!err.to_string().contains(&i32::MAX.to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_request() {
        let mut compute = MockComputeService::new();
        compute.expect_get_volume().returning(|id| {
            Ok(Volume {
                id: id.to_string(),
                size_gib: 100,
            })
        });
        compute.expect_modify_volume_size().returning(|_, _| {
            Err(CloudProviderError::Api {
                operation: "ModifyVolume",
                code: "IncorrectModificationState".to_string(),
                message: "already being modified".to_string(),
            })
        });
        compute.expect_volume_modifications().never();

        let err = expander(compute).expand("vol-data").await.unwrap_err();
        assert!(matches!(
            err,
            RemediationError::ResizeRejected { ref reason, .. }
                if reason.contains("IncorrectModificationState")
        ));
    }
}
