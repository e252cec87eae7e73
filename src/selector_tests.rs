// SPDX-License-Identifier: Apache-2.0

use super::*;
use crate::crd::LabelSelector;
use std::collections::BTreeMap;

fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
}

#[test]
fn empty_selector_matches_everything() {
    let selector = LabelSelector::default();
    assert!(matches_selector(&selector, &labels(&[("any", "thing")])));
    assert!(matches_selector(&selector, &BTreeMap::new()));
}

#[test]
fn match_labels_requires_exact_value() {
    let selector = LabelSelector {
        match_labels: Some(labels(&[("app", "worker")])),
        match_expressions: None,
    };
    assert!(matches_selector(&selector, &labels(&[("app", "worker"), ("extra", "x")])));
    assert!(!matches_selector(&selector, &labels(&[("app", "other")])));
    assert!(!matches_selector(&selector, &labels(&[("different", "key")])));
}

#[test]
fn match_expressions_in_and_not_in() {
    let selector = LabelSelector {
        match_labels: None,
        match_expressions: Some(vec![LabelSelectorRequirement {
            key: "tier".to_string(),
            operator: "In".to_string(),
            values: Some(vec!["prod".to_string(), "staging".to_string()]),
        }]),
    };
    assert!(matches_selector(&selector, &labels(&[("tier", "prod")])));
    assert!(!matches_selector(&selector, &labels(&[("tier", "dev")])));
}

#[test]
fn match_expressions_exists_does_not_exist() {
    let exists = LabelSelector {
        match_labels: None,
        match_expressions: Some(vec![LabelSelectorRequirement {
            key: "gpu".to_string(),
            operator: "Exists".to_string(),
            values: None,
        }]),
    };
    assert!(matches_selector(&exists, &labels(&[("gpu", "true")])));
    assert!(!matches_selector(&exists, &labels(&[("cpu", "true")])));

    let absent = LabelSelector {
        match_labels: None,
        match_expressions: Some(vec![LabelSelectorRequirement {
            key: "gpu".to_string(),
            operator: "DoesNotExist".to_string(),
            values: None,
        }]),
    };
    assert!(matches_selector(&absent, &labels(&[("cpu", "true")])));
    assert!(!matches_selector(&absent, &labels(&[("gpu", "true")])));
}

#[test]
fn superset_check() {
    let full = labels(&[("a", "1"), ("b", "2")]);
    let required = labels(&[("a", "1")]);
    assert!(is_superset(&full, &required));
    assert!(!is_superset(&required, &full));
}

#[test]
fn merge_overlay_wins() {
    let base = labels(&[("a", "1"), ("b", "2")]);
    let overlay = labels(&[("b", "3"), ("c", "4")]);
    let merged = merge_labels(&base, &overlay);
    assert_eq!(merged.get("a").map(String::as_str), Some("1"));
    assert_eq!(merged.get("b").map(String::as_str), Some("3"));
    assert_eq!(merged.get("c").map(String::as_str), Some("4"));
}
