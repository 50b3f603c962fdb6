use duty_service::{ApiError, DutySnapshot, DutyStream, ValidatorInfo, ValidatorInfoStream};
use std::time::Duration;
use tokio::time::timeout;
use types::test_utils::{active_validator, deposited_validator};
use types::{ChainSpec, Epoch, Validator};

pub const TIMEOUT: Duration = Duration::from_secs(5);

pub const ACTIVE: std::ops::Range<usize> = 0..48;
pub const PENDING: std::ops::Range<usize> = 48..56;
pub const DEPOSITED: std::ops::Range<usize> = 56..60;
pub const EXITING: std::ops::Range<usize> = 60..64;
pub const EXIT_EPOCH: u64 = 10;

/// 64 validators: active, pending activation, deposited and exiting, in that order.
pub fn mixed_registry(spec: &ChainSpec) -> Vec<Validator> {
    (0..64)
        .map(|i| {
            if PENDING.contains(&i) {
                Validator {
                    activation_eligibility_epoch: Epoch::new(0),
                    ..deposited_validator(i, spec)
                }
            } else if DEPOSITED.contains(&i) {
                deposited_validator(i, spec)
            } else if EXITING.contains(&i) {
                Validator {
                    exit_epoch: Epoch::new(EXIT_EPOCH),
                    withdrawable_epoch: Epoch::new(EXIT_EPOCH),
                    ..active_validator(i, spec)
                }
            } else {
                active_validator(i, spec)
            }
        })
        .collect()
}

pub async fn next_snapshot(stream: &mut DutyStream) -> DutySnapshot {
    timeout(TIMEOUT, stream.next())
        .await
        .expect("should receive a snapshot before the timeout")
        .expect("stream should still be open")
}

pub async fn next_record(stream: &mut ValidatorInfoStream) -> ValidatorInfo {
    timeout(TIMEOUT, stream.next())
        .await
        .expect("should receive a record before the timeout")
        .expect("stream should still be open")
}

pub async fn duty_outcome(stream: &mut DutyStream) -> ApiError {
    timeout(TIMEOUT, stream.outcome())
        .await
        .expect("stream should end before the timeout")
}

pub async fn info_outcome(stream: &mut ValidatorInfoStream) -> ApiError {
    timeout(TIMEOUT, stream.outcome())
        .await
        .expect("stream should end before the timeout")
}
