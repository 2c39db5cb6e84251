// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Structural guarantees of device determination over arbitrary trees.

mod support;

use dotplan_core::plan::{BinaryOperator, JoinType, PlanNode};
use dotplan_core::{DataType, Planner, PlannerConfig};
use proptest::prelude::*;
use std::sync::Arc;
use support::*;

const KINDS: [&str; 9] =
    ["TableSpecifier", "Restrict", "Project", "Join", "Union", "Literal", "ColumnReference", "BinaryOp", "FunctionCall"];

/// Checks monotonicity and that only the topmost supported node of each
/// pushed-down subtree carries an assignment.
fn check(node: &PlanNode, under_device: bool) -> Result<(), String> {
    if node.device().is_some() && !node.device_supported() {
        return Err(format!("{} is assigned but not supported", node.kind().name()));
    }
    if node.device_supported() && node.children().iter().any(|c| !c.device_supported()) {
        return Err(format!("{} is supported over an unsupported child", node.kind().name()));
    }
    if under_device && node.device().is_some() {
        return Err(format!("{} is assigned inside a pushed-down subtree", node.kind().name()));
    }
    if node.device_supported() && !under_device && node.device().is_none() {
        return Err(format!("{} is the top of a supported subtree without an assignment", node.kind().name()));
    }
    let under = under_device || node.device().is_some();
    node.children().iter().try_for_each(|child| check(child, under))
}

fn planner(kinds: Vec<&'static str>) -> Planner {
    Planner::new(catalog(), registry(vec![("store", Arc::new(AcceptKinds(kinds)))]), PlannerConfig::default())
}

#[test]
fn test_first_registered_device_wins_and_parent_absorbs_children() {
    init_tracing();
    let devices = registry(vec![("scan", Arc::new(AcceptKinds(vec!["TableSpecifier"]))), ("engine", Arc::new(AcceptAll))]);
    let planner = Planner::new(catalog(), devices, PlannerConfig::default());
    let mut plan = employees(name_is("Joe"));

    planner.determine_devices(&mut plan).unwrap();

    assert_eq!(plan.device().map(|d| d.device.as_str()), Some("engine"));
    assert!(plan.iter().skip(1).all(|n| n.device().is_none()));

    let mut table = PlanNode::table("Employee");
    planner.determine_devices(&mut table).unwrap();
    assert_eq!(table.device().map(|d| d.device.as_str()), Some("scan"));
}

#[test]
fn test_unsupported_predicate_keeps_restrict_in_process() {
    let planner = planner(vec!["TableSpecifier", "ColumnReference", "Literal", "BinaryOp", "Project"]);
    let mut plan = PlanNode::project(employees(upper_name_is("JOE")), ["Name"]);

    planner.determine_devices(&mut plan).unwrap();

    assert!(!plan.device_supported(), "a project over an in-process restrict stays in process");
    let restrict = plan.child(0).unwrap();
    assert!(!restrict.device_supported());
    assert_eq!(restrict.source().and_then(PlanNode::device).map(|d| d.device.as_str()), Some("store"));
    check(&plan, false).unwrap();
}

#[test]
fn test_rerun_after_tree_change_reassigns() {
    let planner = planner(KINDS.to_vec());
    let mut plan = employees(name_is("Joe"));
    planner.determine_devices(&mut plan).unwrap();
    assert!(plan.device().is_some());

    plan.replace_predicate(upper_name_is("JOE")).unwrap();
    let planner = planner_without_functions();
    planner.determine_devices(&mut plan).unwrap();

    assert!(plan.device().is_none());
    assert!(plan.source().and_then(PlanNode::device).is_some());
    check(&plan, false).unwrap();
}

fn planner_without_functions() -> Planner {
    planner(KINDS.iter().copied().filter(|k| *k != "FunctionCall").collect())
}

fn relational_tree() -> impl Strategy<Value = PlanNode> {
    let leaf = prop_oneof![Just(PlanNode::table("Employee")), Just(PlanNode::table("Department"))];
    leaf.prop_recursive(4, 16, 2, |inner| {
        prop_oneof![
            (inner.clone(), 0i64..4).prop_map(|(source, v)| PlanNode::restrict(source, id_cmp(BinaryOperator::Less, v))),
            inner.clone().prop_map(|source| PlanNode::restrict(source, upper_name_is("JOE"))),
            inner.clone().prop_map(|source| PlanNode::project(source, ["ID"])),
            (inner.clone(), inner.clone(), any::<bool>()).prop_map(|(l, r, distinct)| PlanNode::union(distinct, vec![l, r])),
            (inner.clone(), inner).prop_map(|(l, r)| {
                let condition = PlanNode::eq(id(), PlanNode::column("DeptID", DataType::Integer));
                PlanNode::join(JoinType::Inner, l, r, condition)
            }),
        ]
    })
}

proptest! {
    #[test]
    fn prop_device_annotations_are_monotone_and_collapsed(
        tree in relational_tree(),
        kinds in proptest::sample::subsequence(KINDS.to_vec(), 0..=KINDS.len()),
    ) {
        let mut tree = tree;
        planner(kinds).determine_devices(&mut tree).unwrap();
        prop_assert!(check(&tree, false).is_ok(), "{:?}", check(&tree, false));
    }

    #[test]
    fn prop_device_determination_is_idempotent(
        tree in relational_tree(),
        kinds in proptest::sample::subsequence(KINDS.to_vec(), 0..=KINDS.len()),
    ) {
        let planner = planner(kinds);
        let mut once = tree;
        planner.determine_devices(&mut once).unwrap();
        let mut twice = once.clone();
        planner.determine_devices(&mut twice).unwrap();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_full_support_assigns_only_the_root(tree in relational_tree()) {
        let mut tree = tree;
        planner(KINDS.to_vec()).determine_devices(&mut tree).unwrap();
        prop_assert!(tree.device().is_some());
        prop_assert!(tree.iter().skip(1).all(|n| n.device().is_none() && n.device_supported()));
    }
}
