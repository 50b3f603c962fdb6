use crate::common::*;
use duty_service::test_utils::DutyServiceHarness;
use duty_service::{
    ApiError, AssignmentFilter, EpochQuery, ValidatorId, ValidatorStatus,
};
use std::collections::BTreeSet;
use types::test_utils::deterministic_pubkey;
use types::{Epoch, Slot};
use validator_duties::churn_strategy;

#[test]
fn assignments_cover_every_active_validator() {
    let harness = DutyServiceHarness::builder().build();
    let slots_per_epoch = harness.slots_per_epoch();
    harness.advance_to_epoch(Epoch::new(2));

    let assignments = harness
        .service
        .list_assignments(EpochQuery::Current, &AssignmentFilter::default())
        .unwrap();
    assert_eq!(assignments.len(), 64);

    for assignment in &assignments {
        let committee = assignment
            .committee
            .as_ref()
            .expect("active validators attest");
        assert_eq!(committee.epoch, Epoch::new(2));
        assert!(committee.members.contains(&assignment.validator_index));
        assert_eq!(
            assignment.public_key,
            deterministic_pubkey(assignment.validator_index)
        );
    }

    // Every slot of the epoch has exactly one proposer, and it agrees with the duty snapshot.
    let snapshot = harness.service.duty_snapshot(Epoch::new(2), None).unwrap();
    let mut proposal_slots = vec![];
    for assignment in &assignments {
        for slot in assignment.proposer_slots() {
            assert_eq!(
                snapshot.proposer_pubkeys_by_slot.get(&slot),
                Some(&assignment.public_key)
            );
            proposal_slots.push(slot);
        }
    }
    proposal_slots.sort();
    assert_eq!(
        proposal_slots,
        Epoch::new(2).slot_iter(slots_per_epoch).collect::<Vec<_>>()
    );
}

#[test]
fn assignment_filter_selects_keys_first_without_duplicates() {
    let harness = DutyServiceHarness::builder().build();
    harness.advance_to_epoch(Epoch::new(1));

    let filter = AssignmentFilter {
        indices: vec![3, 5],
        public_keys: vec![deterministic_pubkey(5), deterministic_pubkey(7)],
    };
    let indices = harness
        .service
        .list_assignments(EpochQuery::Current, &filter)
        .unwrap()
        .into_iter()
        .map(|a| a.validator_index)
        .collect::<Vec<_>>();

    assert_eq!(indices, vec![5, 7, 3]);
}

#[test]
fn assignment_filter_rejects_unknown_validators() {
    let harness = DutyServiceHarness::builder().build();

    let unknown_key = AssignmentFilter {
        public_keys: vec![deterministic_pubkey(1_000)],
        ..AssignmentFilter::default()
    };
    assert!(matches!(
        harness
            .service
            .list_assignments(EpochQuery::Current, &unknown_key),
        Err(ApiError::NotFound(_))
    ));

    let out_of_range = AssignmentFilter {
        indices: vec![64],
        ..AssignmentFilter::default()
    };
    assert!(matches!(
        harness
            .service
            .list_assignments(EpochQuery::Current, &out_of_range),
        Err(ApiError::InvalidRequest(_))
    ));
}

#[test]
fn inactive_validators_have_no_committee() {
    let harness = DutyServiceHarness::builder()
        .validators(mixed_registry(&types::ChainSpec::minimal()))
        .build();
    harness.advance_to_epoch(Epoch::new(1));

    let filter = AssignmentFilter {
        indices: vec![PENDING.start, ACTIVE.start],
        ..AssignmentFilter::default()
    };
    let assignments = harness
        .service
        .list_assignments(EpochQuery::Current, &filter)
        .unwrap();

    assert!(assignments[0].committee.is_none());
    assert!(assignments[0].proposals.is_empty());
    assert!(assignments[1].committee.is_some());
}

#[test]
fn future_epochs_are_rejected() {
    let harness = DutyServiceHarness::builder().build();
    harness.advance_to_epoch(Epoch::new(2));

    assert!(matches!(
        harness.service.list_committees(EpochQuery::Epoch(Epoch::new(3))),
        Err(ApiError::InvalidRequest(_))
    ));
    assert!(matches!(
        harness.service.list_assignments(
            EpochQuery::Slot(Epoch::new(3).start_slot(harness.slots_per_epoch())),
            &AssignmentFilter::default()
        ),
        Err(ApiError::InvalidRequest(_))
    ));

    // The last slot of the current epoch is not in the future.
    let last_slot = Epoch::new(3).start_slot(harness.slots_per_epoch()) - 1;
    assert_eq!(
        harness
            .service
            .list_committees(EpochQuery::Slot(last_slot))
            .unwrap()
            .epoch,
        Epoch::new(2)
    );
}

#[test]
fn committees_partition_the_active_set() {
    let harness = DutyServiceHarness::builder().build();
    let slots_per_epoch = harness.slots_per_epoch();
    harness.advance_to_epoch(Epoch::new(3));

    let committees = harness
        .service
        .list_committees(EpochQuery::Epoch(Epoch::new(1)))
        .unwrap();
    assert_eq!(committees.epoch, Epoch::new(1));
    assert_eq!(committees.active_validator_count, 64);
    assert_eq!(
        committees.committees.keys().copied().collect::<Vec<Slot>>(),
        Epoch::new(1).slot_iter(slots_per_epoch).collect::<Vec<_>>()
    );

    let flattened = committees.flattened();
    let members = flattened
        .iter()
        .flat_map(|c| c.members.iter().copied())
        .collect::<Vec<_>>();
    assert_eq!(members.len(), 64);
    assert_eq!(
        members.into_iter().collect::<BTreeSet<_>>(),
        (0..64).collect::<BTreeSet<_>>()
    );
    assert!(flattened
        .windows(2)
        .all(|w| (w[0].slot, w[0].committee_index) < (w[1].slot, w[1].committee_index)));
}

#[test]
fn genesis_query_resolves_to_the_genesis_epoch() {
    let harness = DutyServiceHarness::builder().build();
    harness.advance_to_epoch(Epoch::new(4));

    let committees = harness.service.list_committees(EpochQuery::Genesis).unwrap();
    assert_eq!(committees.epoch, Epoch::new(0));
}

#[test]
fn validator_queue_of_the_head() {
    let spec = types::ChainSpec::minimal();
    let harness = DutyServiceHarness::builder()
        .validators(mixed_registry(&spec))
        .build();
    harness.advance_to_epoch(Epoch::new(2));

    let queue = harness.service.get_validator_queue().unwrap();

    let active_count = (ACTIVE.len() + EXITING.len()) as u64;
    let fork = spec.fork_name_at_epoch(Epoch::new(2));
    assert_eq!(
        queue.churn_limit,
        churn_strategy(fork).activation_churn_limit(active_count, &spec)
    );
    assert_eq!(
        queue.activation_validator_indices,
        PENDING.collect::<Vec<_>>()
    );
    assert_eq!(
        queue.activation_public_keys,
        PENDING.map(deterministic_pubkey).collect::<Vec<_>>()
    );
    assert_eq!(queue.exit_validator_indices, EXITING.collect::<Vec<_>>());
    assert_eq!(
        queue.exit_public_keys,
        EXITING.map(deterministic_pubkey).collect::<Vec<_>>()
    );
}

#[test]
fn validator_status_by_key_and_index() {
    let spec = types::ChainSpec::minimal();
    let harness = DutyServiceHarness::builder()
        .validators(mixed_registry(&spec))
        .build();
    harness.advance_to_epoch(Epoch::new(2));

    let unknown = deterministic_pubkey(1_000);
    let ids = [
        ValidatorId::PublicKey(deterministic_pubkey(0)),
        ValidatorId::Index(PENDING.start + 2),
        ValidatorId::Index(DEPOSITED.start),
        ValidatorId::Index(EXITING.start),
        ValidatorId::PublicKey(unknown),
        // The same validator as the first id.
        ValidatorId::Index(0),
    ];
    let statuses = harness.service.validator_status(&ids).unwrap();
    assert_eq!(statuses.len(), 5);

    assert_eq!(statuses[0].status, ValidatorStatus::Active);
    assert_eq!(statuses[0].index, Some(0));
    assert_eq!(statuses[0].activation_epoch, Epoch::new(0));
    assert!(statuses[0].position_in_activation_queue.is_none());

    assert_eq!(statuses[1].status, ValidatorStatus::Pending);
    assert_eq!(
        statuses[1].position_in_activation_queue.map(|p| p.value),
        Some(3)
    );

    // Not yet eligible, so not in the activation queue.
    assert_eq!(statuses[2].status, ValidatorStatus::Deposited);
    assert!(statuses[2].position_in_activation_queue.is_none());

    assert_eq!(statuses[3].status, ValidatorStatus::Exiting);

    assert_eq!(statuses[4].public_key, unknown);
    assert_eq!(statuses[4].status, ValidatorStatus::Unknown);
    assert_eq!(statuses[4].index, None);
    assert_eq!(statuses[4].activation_epoch, spec.far_future_epoch);
}

#[test]
fn validator_status_rejects_bad_requests() {
    let harness = DutyServiceHarness::builder().build();

    assert!(matches!(
        harness.service.validator_status(&[]),
        Err(ApiError::InvalidRequest(_))
    ));
    assert!(matches!(
        harness.service.validator_status(&[ValidatorId::Index(64)]),
        Err(ApiError::InvalidRequest(_))
    ));
}
