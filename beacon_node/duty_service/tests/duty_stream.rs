use crate::common::*;
use duty_service::test_utils::{DutyServiceHarness, HARNESS_GENESIS_TIME};
use duty_service::{connection_context, ApiError, CancelReason, Config};
use std::collections::HashSet;
use types::test_utils::active_validator;
use types::{Epoch, Validator};

fn epochs(range: std::ops::RangeInclusive<u64>) -> Vec<Epoch> {
    range.map(Epoch::new).collect()
}

#[tokio::test]
async fn backfills_then_follows_the_head_without_gaps() {
    let harness = DutyServiceHarness::builder().build();
    let slots_per_epoch = harness.slots_per_epoch();
    harness.advance_to_epoch(Epoch::new(6));
    harness.finalize(Epoch::new(5));

    let (_canceller, ctx) = connection_context();
    let mut stream = harness
        .service
        .stream_duty_info(Some(Epoch::new(2)), ctx)
        .unwrap();

    let mut delivered = vec![];
    for _ in 2..=5 {
        let snapshot = next_snapshot(&mut stream).await;
        assert_eq!(snapshot.reorg, None);
        assert_eq!(
            snapshot.proposer_pubkeys_by_slot.len() as u64,
            slots_per_epoch
        );
        assert!(snapshot
            .proposer_pubkeys_by_slot
            .keys()
            .all(|slot| slot.epoch(slots_per_epoch) == snapshot.epoch));
        assert_eq!(
            snapshot.epoch_start_timestamp,
            HARNESS_GENESIS_TIME
                + snapshot.epoch.as_u64() * slots_per_epoch * harness.spec.seconds_per_slot
        );
        assert_eq!(
            snapshot,
            harness.service.duty_snapshot(snapshot.epoch, None).unwrap()
        );
        delivered.push(snapshot.epoch);
    }

    // The boundary of epoch 6 delivers 6 and the lookahead epoch 7. A repeat of it is ignored.
    harness.epoch_boundary(Epoch::new(6));
    harness.epoch_boundary(Epoch::new(6));
    harness.epoch_boundary(Epoch::new(7));
    for _ in 6..=8 {
        delivered.push(next_snapshot(&mut stream).await.epoch);
    }

    assert_eq!(delivered, epochs(2..=8));
    assert!(stream.try_next().is_none());
}

#[tokio::test]
async fn start_defaults_to_the_finalized_epoch() {
    let harness = DutyServiceHarness::builder().build();
    harness.advance_to_epoch(Epoch::new(4));
    harness.finalize(Epoch::new(3));

    let (_canceller, ctx) = connection_context();
    let mut stream = harness.service.stream_duty_info(None, ctx).unwrap();

    assert_eq!(next_snapshot(&mut stream).await.epoch, Epoch::new(3));
}

#[tokio::test]
async fn future_start_epoch_is_rejected() {
    let harness = DutyServiceHarness::builder().build();
    harness.advance_to_epoch(Epoch::new(2));

    let (_canceller, ctx) = connection_context();
    let result = harness.service.stream_duty_info(Some(Epoch::new(3)), ctx);

    assert!(matches!(result, Err(ApiError::InvalidRequest(_))));
}

#[tokio::test]
async fn epochs_without_state_are_skipped() {
    let harness = DutyServiceHarness::builder().build();
    harness.advance_to_epoch(Epoch::new(6));
    harness.finalize(Epoch::new(5));
    harness
        .state_provider
        .make_unavailable(Epoch::new(3).start_slot(harness.slots_per_epoch()));

    let (_canceller, ctx) = connection_context();
    let mut stream = harness
        .service
        .stream_duty_info(Some(Epoch::new(2)), ctx)
        .unwrap();

    let mut delivered = vec![];
    for _ in 0..3 {
        delivered.push(next_snapshot(&mut stream).await.epoch);
    }
    assert_eq!(
        delivered,
        vec![Epoch::new(2), Epoch::new(4), Epoch::new(5)]
    );

    // The stream stays open after a skipped epoch.
    harness.epoch_boundary(Epoch::new(6));
    assert_eq!(next_snapshot(&mut stream).await.epoch, Epoch::new(6));
}

#[tokio::test]
async fn malformed_state_tears_the_stream_down() {
    let harness = DutyServiceHarness::builder().build();
    harness.advance_to_epoch(Epoch::new(6));
    harness.finalize(Epoch::new(5));
    harness
        .state_provider
        .make_active_set_malformed(Epoch::new(4));

    let (_canceller, ctx) = connection_context();
    let mut stream = harness
        .service
        .stream_duty_info(Some(Epoch::new(2)), ctx)
        .unwrap();

    assert_eq!(next_snapshot(&mut stream).await.epoch, Epoch::new(2));
    assert_eq!(next_snapshot(&mut stream).await.epoch, Epoch::new(3));
    assert_eq!(
        duty_outcome(&mut stream).await,
        ApiError::Canceled(CancelReason::UntrustedState)
    );
    // Nothing is delivered for the malformed epoch or after it.
    assert!(stream.try_next().is_none());
}

#[tokio::test]
async fn reorg_of_a_delivered_epoch_is_pushed_again() {
    let harness = DutyServiceHarness::builder().build();
    harness.advance_to_epoch(Epoch::new(5));
    harness.finalize(Epoch::new(5));

    let (_canceller, ctx) = connection_context();
    let mut stream = harness
        .service
        .stream_duty_info(Some(Epoch::new(5)), ctx)
        .unwrap();
    assert_eq!(next_snapshot(&mut stream).await.epoch, Epoch::new(5));

    harness.epoch_boundary(Epoch::new(6));
    assert_eq!(next_snapshot(&mut stream).await.epoch, Epoch::new(6));
    assert_eq!(next_snapshot(&mut stream).await.epoch, Epoch::new(7));

    // On the new branch only the first half of the registry is still active.
    let survivors = 32;
    let validators = (0..64)
        .map(|i| {
            if i < survivors {
                active_validator(i, &harness.spec)
            } else {
                Validator {
                    exit_epoch: Epoch::new(1),
                    withdrawable_epoch: Epoch::new(2),
                    ..active_validator(i, &harness.spec)
                }
            }
        })
        .collect::<Vec<_>>();
    let surviving_keys = validators[..survivors]
        .iter()
        .map(|v| v.pubkey)
        .collect::<HashSet<_>>();

    harness.replace_validators_from(Epoch::new(6), validators);
    let info = harness.reorg(Epoch::new(6), 2);

    let snapshot = next_snapshot(&mut stream).await;
    assert_eq!(snapshot.epoch, Epoch::new(6));
    assert_eq!(snapshot.reorg, Some(info));
    assert!(snapshot
        .proposer_pubkeys_by_slot
        .values()
        .all(|pubkey| surviving_keys.contains(pubkey)));

    // Live tailing resumes after the last delivered epoch.
    harness.epoch_boundary(Epoch::new(7));
    let snapshot = next_snapshot(&mut stream).await;
    assert_eq!(snapshot.epoch, Epoch::new(8));
    assert_eq!(snapshot.reorg, None);
}

#[tokio::test]
async fn reorg_ahead_of_the_stream_fills_the_gap() {
    let harness = DutyServiceHarness::builder().build();
    harness.advance_to_epoch(Epoch::new(4));
    harness.finalize(Epoch::new(3));

    let (_canceller, ctx) = connection_context();
    let mut stream = harness
        .service
        .stream_duty_info(Some(Epoch::new(3)), ctx)
        .unwrap();
    assert_eq!(next_snapshot(&mut stream).await.epoch, Epoch::new(3));

    let info = harness.reorg(Epoch::new(5), 1);

    let gap = next_snapshot(&mut stream).await;
    assert_eq!(gap.epoch, Epoch::new(4));
    assert_eq!(gap.reorg, None);

    let reorged = next_snapshot(&mut stream).await;
    assert_eq!(reorged.epoch, Epoch::new(5));
    assert_eq!(reorged.reorg, Some(info));
}

#[tokio::test]
async fn lagging_subscriber_still_delivers_every_epoch() {
    let config = Config {
        event_channel_capacity: 1,
        ..Config::default()
    };
    let harness = DutyServiceHarness::builder().config(config).build();

    let (_canceller, ctx) = connection_context();
    let mut stream = harness.service.stream_duty_info(None, ctx).unwrap();

    // Registered before the stream gets to run, so the first two overflow the feed.
    for epoch in 1..=3 {
        harness.epoch_boundary(Epoch::new(epoch));
    }

    let mut delivered = vec![];
    for _ in 0..=4 {
        delivered.push(next_snapshot(&mut stream).await.epoch);
    }
    assert_eq!(delivered, epochs(0..=4));
}

#[tokio::test]
async fn connection_cancel_ends_the_stream() {
    let harness = DutyServiceHarness::builder().build();

    let (canceller, ctx) = connection_context();
    let mut stream = harness.service.stream_duty_info(None, ctx).unwrap();
    next_snapshot(&mut stream).await;

    canceller.cancel();

    assert_eq!(
        duty_outcome(&mut stream).await,
        ApiError::Canceled(CancelReason::Connection)
    );
}

#[tokio::test]
async fn service_shutdown_ends_the_stream() {
    let harness = DutyServiceHarness::builder().build();

    let (_canceller, ctx) = connection_context();
    let mut stream = harness.service.stream_duty_info(None, ctx).unwrap();
    next_snapshot(&mut stream).await;

    harness.runtime.fire_exit();

    assert_eq!(
        duty_outcome(&mut stream).await,
        ApiError::Canceled(CancelReason::Service)
    );
}

#[tokio::test]
async fn dropped_receiver_ends_the_stream() {
    let harness = DutyServiceHarness::builder().build();

    let (_canceller, ctx) = connection_context();
    let mut stream = harness.service.stream_duty_info(None, ctx).unwrap();
    next_snapshot(&mut stream).await;

    let (snapshots, outcome) = stream.into_parts();
    drop(snapshots);

    let reason = tokio::time::timeout(TIMEOUT, outcome)
        .await
        .expect("stream should end before the timeout")
        .expect("outcome should be reported");
    assert_eq!(reason, ApiError::Canceled(CancelReason::Transport));
}

#[tokio::test]
async fn closed_event_feed_aborts_the_stream() {
    let harness = DutyServiceHarness::builder().build();

    let (_canceller, ctx) = connection_context();
    let mut stream = harness.service.stream_duty_info(None, ctx).unwrap();
    next_snapshot(&mut stream).await;

    harness.event_feed.close();

    assert!(matches!(
        duty_outcome(&mut stream).await,
        ApiError::Aborted(_)
    ));
}
