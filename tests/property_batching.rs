// tests/property_batching.rs
//
// Property tests over arbitrary task streams: every unit the scheduler
// emits is homogeneous, batches respect the capacity bound, non-batchable
// kinds run alone, and every admitted task executes exactly once.

mod common;

use std::collections::{HashMap, VecDeque};

use proptest::prelude::*;

use batchdag::batch::ExecutionUnit;
use batchdag::config::SchedulerConfig;
use batchdag::resources::ResourceMap;
use batchdag::sched::SchedulerCore;
use batchdag::types::UnitOutcome;
use batchdag_test_utils::builders::TaskSpecBuilder;

const CAPACITY: u64 = 40;

fn kind_name(tag: u8) -> &'static str {
    match tag % 3 {
        0 => "data_processing",
        1 => "model_inference",
        _ => "attention",
    }
}

/// Run the core to idle, completing every unit, and collect all units in
/// dispatch order.
fn drive_to_idle(core: &mut SchedulerCore) -> Vec<ExecutionUnit> {
    let mut pending: VecDeque<ExecutionUnit> = core.pump().into();
    let mut all_units = Vec::new();
    while let Some(unit) = pending.pop_front() {
        all_units.push(unit.clone());
        let step = core.handle_unit_outcome(unit.id, UnitOutcome::Completed);
        pending.extend(step.dispatched);
    }
    all_units
}

proptest! {
    #[test]
    fn emitted_units_respect_batching_invariants(
        tasks in proptest::collection::vec((any::<u8>(), 1..=50u64), 1..40)
    ) {
        let cfg = SchedulerConfig {
            max_workers: 64,
            max_batch_capacity: CAPACITY,
            ..SchedulerConfig::default()
        };
        let mut core = SchedulerCore::new(cfg, &ResourceMap::new());

        let mut by_id: HashMap<String, (&'static str, u64)> = HashMap::new();
        for (i, (tag, cost)) in tasks.iter().enumerate() {
            let id = format!("t{i}");
            let kind = kind_name(*tag);
            by_id.insert(id.clone(), (kind, *cost));
            core.submit(
                TaskSpecBuilder::new(&id).kind(kind).cost(*cost).build(),
            ).unwrap();
        }

        let units = drive_to_idle(&mut core);
        prop_assert!(core.is_idle());

        let mut executed: Vec<String> = Vec::new();
        for unit in &units {
            let mut member_cost = 0u64;
            for member in &unit.members {
                let (kind, cost) = by_id[member];
                // Homogeneity: every member matches the unit kind.
                prop_assert_eq!(kind, unit.kind.as_str());
                member_cost += cost;
                executed.push(member.clone());
            }
            prop_assert_eq!(member_cost, unit.total_cost);

            if unit.batched {
                prop_assert!(unit.total_cost <= CAPACITY);
            } else {
                // Singleton by construction: non-batchable kind or oversize.
                prop_assert!(unit.is_singleton());
                let (kind, cost) = by_id[&unit.members[0]];
                prop_assert!(kind == "attention" || cost > CAPACITY);
            }
            if unit.kind == "attention" {
                prop_assert!(unit.is_singleton());
                prop_assert!(!unit.batched);
            }
        }

        // Every admitted task ran exactly once.
        executed.sort();
        let mut expected: Vec<String> = by_id.keys().cloned().collect();
        expected.sort();
        prop_assert_eq!(executed, expected);
    }

    #[test]
    fn priority_never_changes_grouping_only_order(
        priorities in proptest::collection::vec(-5..5i32, 2..20)
    ) {
        // Same kind and cost throughout: whatever the priorities, grouping
        // is driven by capacity alone.
        let cfg = SchedulerConfig {
            max_workers: 64,
            max_batch_capacity: CAPACITY,
            ..SchedulerConfig::default()
        };
        let mut core = SchedulerCore::new(cfg, &ResourceMap::new());
        for (i, priority) in priorities.iter().enumerate() {
            core.submit(
                TaskSpecBuilder::new(&format!("t{i}"))
                    .kind("model_inference")
                    .cost(10)
                    .priority(*priority)
                    .build(),
            ).unwrap();
        }

        let units = drive_to_idle(&mut core);
        prop_assert!(core.is_idle());

        for unit in &units {
            prop_assert!(unit.batched);
            prop_assert!(unit.members.len() <= (CAPACITY / 10) as usize);
        }
        let total: usize = units.iter().map(|u| u.members.len()).sum();
        prop_assert_eq!(total, priorities.len());
    }
}
