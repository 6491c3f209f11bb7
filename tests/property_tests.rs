#![allow(missing_docs)]

use std::collections::BTreeSet;

use dqlc::query::{FuncKind, Function, Query};
use dqlc::DqlError;
use proptest::prelude::*;

fn arb_hostile_string() -> impl Strategy<Value = String> {
    "[A-Z\"(){}<>*]{5,16}".prop_map(|s| format!("Z{s}"))
}

proptest! {
    #[test]
    fn prop_scalars_are_always_parameterized(
        values in prop::collection::vec(arb_hostile_string(), 1..8),
        age in 1000i64..1_000_000,
    ) {
        let stmt = Query::new()
            .func(Function::eq("name", values[0].as_str()).values(values[1..].iter().map(String::as_str)))
            .filter(Function::build(FuncKind::Gt).predicate_value("age", age))
            .field("name")
            .compile()
            .unwrap();

        let distinct: BTreeSet<&String> = values.iter().collect();
        prop_assert_eq!(stmt.vars.len(), distinct.len() + 1);
        prop_assert_eq!(stmt.text.matches(": string").count(), distinct.len());
        prop_assert_eq!(stmt.text.matches(": int").count(), 1);
        for value in &values {
            prop_assert!(!stmt.text.contains(value.as_str()));
            prop_assert!(stmt.vars.values().any(|v| v == value));
        }
        prop_assert!(stmt.vars.values().any(|v| *v == age.to_string()));
    }

    #[test]
    fn prop_single_predicate_kinds_reject_extra_arguments(
        preds in prop::collection::vec("[a-z]{1,8}", 2..6),
    ) {
        let mut has = Function::build(FuncKind::Has);
        for pred in &preds {
            has = has.predicate(pred.as_str());
        }
        let is_arity_mismatch = matches!(has.check(), Err(DqlError::ArityMismatch { .. }));
        prop_assert!(is_arity_mismatch);

        let mut ty = Function::build(FuncKind::Type);
        for pred in &preds {
            ty = ty.predicate(pred.as_str());
        }
        let is_arity_mismatch = matches!(ty.check(), Err(DqlError::ArityMismatch { .. }));
        prop_assert!(is_arity_mismatch);
    }

    #[test]
    fn prop_function_names_must_be_identifiers(
        head in "[a-z_]{1,6}",
        bad in "[(){}<>\" ,$~/#:.]",
        tail in "[a-z]{0,6}",
    ) {
        let name = format!("{head}{bad}{tail}");
        let err = Query::new()
            .func(Function::named(&name).predicate("x"))
            .field("name")
            .compile()
            .unwrap_err();
        let is_invalid = matches!(err, DqlError::InvalidArgument(_));
        prop_assert!(is_invalid);

        let ok = Function::named(&format!("x_{head}{tail}")).predicate("x");
        prop_assert!(ok.check().is_ok());
    }

    #[test]
    fn prop_long_uids_are_rejected(tail in "[0-9a-f]{17,40}") {
        let uid = format!("0x{tail}");
        let err = Query::new()
            .func(Function::uid([uid]))
            .field("name")
            .compile()
            .unwrap_err();
        let is_invalid = matches!(err, DqlError::InvalidIdentifier(_));
        prop_assert!(is_invalid);
    }

    #[test]
    fn prop_short_uids_render_quoted(tail in "[0-9a-f]{1,16}") {
        let uid = format!("0x{tail}");
        let stmt = Query::new()
            .func(Function::uid([uid.clone()]))
            .field("name")
            .compile()
            .unwrap();
        let quoted = format!("uid(\"{uid}\")");
        prop_assert!(stmt.text.contains(&quoted));
        prop_assert!(stmt.vars.is_empty());
    }
}

#[test]
fn has_without_arguments_reports_missing_variables() {
    assert!(matches!(
        Function::build(FuncKind::Has).check(),
        Err(DqlError::MissingVariables { .. })
    ));
}
