//! Unit tests for HostValue

use host_types::{HostRealm, HostValue};
use num_bigint::BigInt;

#[cfg(test)]
mod value_kind_tests {
    use super::*;

    #[test]
    fn test_nullish() {
        assert!(HostValue::Undefined.is_nullish());
        assert!(HostValue::Null.is_nullish());
        assert!(!HostValue::Boolean(false).is_nullish());
        assert!(!HostValue::Number(0.0).is_nullish());
    }

    #[test]
    fn test_kind_names() {
        let realm = HostRealm::new();
        assert_eq!(HostValue::Null.kind_name(), "null");
        assert_eq!(HostValue::BigInt(BigInt::from(1)).kind_name(), "bigint");
        assert_eq!(
            HostValue::Object(realm.new_date(0.0)).kind_name(),
            "Date"
        );
        assert_eq!(
            HostValue::Object(realm.new_array(vec![])).kind_name(),
            "Array"
        );
    }

    #[test]
    fn test_identity_only_for_objects() {
        let realm = HostRealm::new();
        let obj = realm.new_object(vec![]);
        assert_eq!(HostValue::Object(obj.clone()).identity(), Some(obj.identity()));
        assert_eq!(HostValue::from(1).identity(), None);
    }
}

#[cfg(test)]
mod display_tests {
    use super::*;

    #[test]
    fn test_display_objects() {
        let realm = HostRealm::new();
        assert_eq!(
            HostValue::Object(realm.new_object(vec![])).to_string(),
            "[object Object]"
        );
        assert_eq!(
            HostValue::Object(realm.new_placeholder_function("f")).to_string(),
            "function f() { [native code] }"
        );
    }

    #[test]
    fn test_display_symbol() {
        assert_eq!(
            HostValue::Symbol(Some("tag".into())).to_string(),
            "Symbol(tag)"
        );
        assert_eq!(HostValue::Symbol(None).to_string(), "Symbol()");
    }
}
