//! Property tests for escaping and canonical string round trips.

use kiln_target::quote::{interpret, join_string, split_string, uninterpret};
use kiln_target::{ConfigMap, Target, Value};
use proptest::prelude::*;

const EDGE: &str = "[a-zA-Z0-9+=,'\\\\_.-]";
const INNER: &str = "[ a-zA-Z0-9+=,'\\\\_.-]";

/// Non-empty text without leading or trailing spaces, heavy on the
/// characters the quoting rules care about.
fn attr_text() -> impl Strategy<Value = String> {
    proptest::string::string_regex(&format!("{EDGE}({INNER}{{0,10}}{EDGE})?"))
        .expect("valid regex")
}

prop_compose! {
    fn llvm_config()(
        mcpu in attr_text(),
        mattr in prop::collection::vec(attr_text(), 1..4),
        num_cores in any::<i64>(),
        fast_math in any::<bool>(),
    ) -> ConfigMap {
        let mut config = ConfigMap::new();
        config.insert("kind".into(), Value::from("llvm"));
        config.insert("mcpu".into(), Value::from(mcpu));
        config.insert("mattr".into(), Value::from(mattr));
        config.insert("num-cores".into(), Value::Int(num_cores));
        config.insert("fast-math".into(), Value::Bool(fast_math));
        config
    }
}

proptest! {
    #[test]
    fn interpret_inverts_uninterpret(s in any::<String>()) {
        prop_assert_eq!(interpret(&uninterpret(&s)).unwrap(), s);
    }

    #[test]
    fn split_inverts_join_of_escaped_tokens(tokens in prop::collection::vec(attr_text(), 1..6)) {
        let escaped: Vec<String> = tokens
            .iter()
            .map(|t| {
                let u = uninterpret(t);
                if u.contains(',') { format!("'{u}'") } else { u }
            })
            .collect();
        let parts = split_string(&join_string(&escaped, ','), ',');
        let decoded: Vec<String> = parts.iter().map(|p| interpret(p).unwrap()).collect();
        prop_assert_eq!(decoded, tokens);
    }

    #[test]
    fn canonical_string_round_trips(config in llvm_config()) {
        let target = Target::from_config(config).unwrap();
        let reparsed = Target::parse(target.str()).unwrap();
        prop_assert_eq!(reparsed.str(), target.str());
        prop_assert_eq!(reparsed, target);
    }

    #[test]
    fn export_round_trips(config in llvm_config()) {
        let target = Target::from_config(config).unwrap();
        let host = Target::parse("c -mcpu=host").unwrap();
        let target = target.with_host(host);
        let rebuilt = Target::from_config(target.export()).unwrap();
        prop_assert_eq!(rebuilt, target);
    }
}
