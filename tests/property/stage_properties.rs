// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Stage Resolution and Composition
//!
//! This module uses proptest to verify properties that must hold for every
//! resolvable environment, not just the four named stage profiles.

use cim_infrastructure_synth::domain::{Ipv4Cidr, RemovalPolicy, ResourceKind};
use cim_infrastructure_synth::{
    EnvironmentConfigResolver, EnvironmentDescriptor, ExternalInputs, Stage, StackComposer,
};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::net::Ipv4Addr;

// ============================================================================
// Property Test Strategies
// ============================================================================

/// Generate any deployment stage
fn stage() -> impl Strategy<Value = Stage> {
    prop::sample::select(Stage::ALL.to_vec())
}

/// Generate a change id the way pull requests are numbered
fn change_id() -> impl Strategy<Value = String> {
    "pr-[0-9]{1,6}"
}

/// Generate an optional removal policy override in any accepted spelling
fn removal_override() -> impl Strategy<Value = Option<(String, RemovalPolicy)>> {
    prop_oneof![
        Just(None),
        Just(Some(("destroy".to_string(), RemovalPolicy::Destroy))),
        Just(Some(("DELETE".to_string(), RemovalPolicy::Destroy))),
        Just(Some(("retain".to_string(), RemovalPolicy::Retain))),
        Just(Some((" Retain ".to_string(), RemovalPolicy::Retain))),
    ]
}

/// Generate a canonical 10.x block between /16 and /22
fn network_cidr() -> impl Strategy<Value = Ipv4Cidr> {
    (0u8..=255, 0u8..=255, 16u8..=22).prop_map(|(second, third, prefix)| {
        let raw = u32::from(Ipv4Addr::new(10, second, third, 0));
        let mask = u32::MAX << (32 - u32::from(prefix));
        Ipv4Cidr::from_parts(Ipv4Addr::from(raw & mask), prefix)
            .expect("masked address is canonical")
    })
}

/// Inputs that make every stage resolvable
fn inputs_for(change_id: &str) -> ExternalInputs {
    ExternalInputs::default()
        .with_change_id(change_id)
        .with_target("222222222222", "eu-west-1")
}

fn resolve(stage: Stage, inputs: ExternalInputs) -> EnvironmentDescriptor {
    EnvironmentConfigResolver::new(inputs)
        .resolve(stage)
        .expect("complete inputs resolve")
}

fn physical_names(env: &EnvironmentDescriptor) -> BTreeSet<String> {
    StackComposer::new(env)
        .compose()
        .expect("environment composes")
        .physical_names()
        .iter()
        .cloned()
        .collect()
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Property: Resolution and composition are deterministic
    ///
    /// The same stage and inputs always produce byte-identical templates.
    #[test]
    fn prop_composition_is_deterministic(stage in stage(), id in change_id()) {
        let first = resolve(stage, inputs_for(&id));
        let second = resolve(stage, inputs_for(&id));
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(
            serde_json::to_vec(&first).expect("descriptor serializes"),
            serde_json::to_vec(&second).expect("descriptor serializes")
        );

        let left = StackComposer::new(&first).compose().expect("composes");
        let right = StackComposer::new(&second).compose().expect("composes");
        prop_assert_eq!(
            left.template().to_json_pretty().expect("renders"),
            right.template().to_json_pretty().expect("renders")
        );
    }

    /// Property: The database removal policy follows the stage unless overridden
    #[test]
    fn prop_removal_policy_mapping(stage in stage(), id in change_id(), policy in removal_override()) {
        let mut inputs = inputs_for(&id);
        inputs.database_removal_policy = policy.as_ref().map(|(raw, _)| raw.clone());
        let env = resolve(stage, inputs);

        let expected = match policy {
            Some((_, explicit)) => explicit,
            None if stage == Stage::Prod => RemovalPolicy::Retain,
            None => RemovalPolicy::Destroy,
        };
        prop_assert_eq!(env.database.removal_policy, expected);

        let stack = StackComposer::new(&env).compose().expect("composes");
        let instance = stack
            .template()
            .resources_of(ResourceKind::DbInstance)
            .next()
            .expect("database declared");
        prop_assert_eq!(instance.removal_policy, Some(expected));
    }

    /// Property: Feature environments for different changes never share a physical name
    #[test]
    fn prop_feature_environments_disjoint(left in change_id(), right in change_id()) {
        prop_assume!(left != right);

        let left_env = resolve(Stage::FeatureDev, inputs_for(&left));
        let right_env = resolve(Stage::FeatureDev, inputs_for(&right));
        let left_names = physical_names(&left_env);
        let right_names = physical_names(&right_env);

        prop_assert!(left_names.iter().all(|name| left_env.prefix.owns(name)));
        prop_assert!(
            left_names.is_disjoint(&right_names),
            "{} and {} share {:?}",
            left,
            right,
            left_names.intersection(&right_names).collect::<Vec<_>>()
        );
    }

    /// Property: Only the load balancer listener admits any address
    #[test]
    fn prop_only_listener_is_open(stage in stage(), id in change_id()) {
        let env = resolve(stage, inputs_for(&id));
        let stack = StackComposer::new(&env).compose().expect("composes");

        for rule in stack.allow_graph().iter().filter(|rule| rule.source.is_any()) {
            prop_assert_eq!(rule.target.as_str(), "ComputeLoadBalancerSecurityGroup");
            prop_assert!(rule.ports.contains(env.container.listener_port));
            prop_assert!(rule.ports.is_single());
        }
    }

    /// Property: Every subnet is carved from the configured address space
    #[test]
    fn prop_subnets_within_network(cidr in network_cidr()) {
        let mut inputs = ExternalInputs::default();
        inputs.network_cidr = Some(cidr.to_string());
        let env = resolve(Stage::Dev, inputs);
        prop_assert_eq!(env.network_cidr, cidr);

        let stack = StackComposer::new(&env).compose().expect("composes");
        let blocks: Vec<Ipv4Cidr> = stack
            .template()
            .resources_of(ResourceKind::Subnet)
            .map(|subnet| {
                Ipv4Cidr::new(subnet.properties["CidrBlock"].as_str().expect("block"))
                    .expect("valid block")
            })
            .collect();

        prop_assert_eq!(blocks.len(), 4);
        for (i, block) in blocks.iter().enumerate() {
            prop_assert!(cidr.contains_cidr(block), "{} outside {}", block, cidr);
            for other in &blocks[i + 1..] {
                prop_assert!(!block.overlaps(other), "{} overlaps {}", block, other);
            }
        }
    }
}
