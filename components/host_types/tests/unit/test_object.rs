//! Unit tests for host objects: property semantics, calls and finalization

use host_types::{HostErrorKind, HostRealm, HostValue};
use std::cell::RefCell;
use std::rc::Rc;

#[cfg(test)]
mod property_tests {
    use super::*;

    #[test]
    fn test_plain_object_keeps_insertion_order() {
        let realm = HostRealm::new();
        let obj = realm.new_object(vec![]);
        obj.set_property("z", HostValue::from(1)).unwrap();
        obj.set_property("a", HostValue::from(2)).unwrap();
        obj.set_property("z", HostValue::from(3)).unwrap();
        assert_eq!(obj.own_keys(), vec!["z".to_string(), "a".to_string()]);
        assert_eq!(obj.get_property("z"), HostValue::from(3));
    }

    #[test]
    fn test_array_length_and_holes() {
        let realm = HostRealm::new();
        let arr = realm.new_sparse_array(vec![Some(HostValue::from(1)), None]);
        assert_eq!(arr.get_property("length"), HostValue::from(2));
        assert_eq!(arr.get_property("1"), HostValue::Undefined);
        assert_eq!(arr.own_keys(), vec!["0".to_string()]);

        arr.set_property("4", HostValue::from(9)).unwrap();
        assert_eq!(arr.get_property("length"), HostValue::from(5));
    }

    #[test]
    fn test_array_rejects_named_keys() {
        let realm = HostRealm::new();
        let arr = realm.new_array(vec![]);
        let err = arr.set_property("name", HostValue::from(1)).unwrap_err();
        assert_eq!(err.kind, HostErrorKind::TypeError);
    }

    #[test]
    fn test_collection_sizes() {
        let realm = HostRealm::new();
        let map = realm.new_map(vec![(HostValue::from("k"), HostValue::from(1))]);
        let set = realm.new_set(vec![HostValue::from(1), HostValue::from(2)]);
        assert_eq!(map.get_property("size"), HostValue::from(1));
        assert_eq!(set.get_property("size"), HostValue::from(2));
    }

    #[test]
    fn test_date_rejects_writes() {
        let realm = HostRealm::new();
        let date = realm.new_date(1.0);
        assert!(date.set_property("x", HostValue::Null).is_err());
    }
}

#[cfg(test)]
mod call_tests {
    use super::*;

    #[test]
    fn test_native_call() {
        let realm = HostRealm::new();
        let add = realm.new_function("add", |_, args| match args {
            [HostValue::Number(a), HostValue::Number(b)] => Ok(HostValue::Number(a + b)),
            _ => Ok(HostValue::Undefined),
        });
        let result = add
            .call(&HostValue::Undefined, &[HostValue::from(2), HostValue::from(3)])
            .unwrap();
        assert_eq!(result, HostValue::from(5));
    }

    #[test]
    fn test_placeholder_is_not_host_callable() {
        let realm = HostRealm::new();
        let f = realm.new_placeholder_function("bridged");
        let err = f.call(&HostValue::Undefined, &[]).unwrap_err();
        assert_eq!(err.kind, HostErrorKind::TypeError);
    }

    #[test]
    fn test_non_function_call_fails() {
        let realm = HostRealm::new();
        let obj = realm.new_object(vec![]);
        assert!(obj.call(&HostValue::Undefined, &[]).is_err());
    }
}

#[cfg(test)]
mod finalization_tests {
    use super::*;

    #[test]
    fn test_hooks_receive_identity() {
        let realm = HostRealm::new();
        let finalized = Rc::new(RefCell::new(Vec::new()));
        let obj = realm.new_object(vec![]);
        let id = obj.identity();
        let log = Rc::clone(&finalized);
        obj.on_finalize(move |identity| log.borrow_mut().push(identity));
        assert_eq!(obj.finalizer_count(), 1);

        drop(obj);
        assert_eq!(*finalized.borrow(), vec![id]);
    }

    #[test]
    fn test_children_finalize_with_parent() {
        let realm = HostRealm::new();
        let finalized = Rc::new(RefCell::new(Vec::new()));
        let child = realm.new_object(vec![]);
        let child_id = child.identity();
        let log = Rc::clone(&finalized);
        child.on_finalize(move |identity| log.borrow_mut().push(identity));

        let parent = realm.new_object(vec![("child".into(), HostValue::Object(child))]);
        assert!(finalized.borrow().is_empty());
        drop(parent);
        assert_eq!(*finalized.borrow(), vec![child_id]);
    }
}
