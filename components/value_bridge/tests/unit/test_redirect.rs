//! Redirected property access and calls.

use host_types::HostValue;
use persistent_types::{CellClass, MethodError, PersistentValue};
use value_bridge::{
    BridgeConfig, BridgeError, ContextId, ExecutionContext, RedirectError,
};

fn context() -> ExecutionContext {
    ExecutionContext::new(ContextId::from_raw(1), BridgeConfig::default())
}

mod get_property_tests {
    use super::*;

    #[test]
    fn test_unbridged_uses_host_semantics() {
        let cx = context();
        let object = cx
            .realm()
            .new_object(vec![("a".to_string(), HostValue::Number(1.0))]);
        assert_eq!(cx.get_property(&object, "a").unwrap(), HostValue::Number(1.0));
        assert_eq!(cx.get_property(&object, "zz").unwrap(), HostValue::Undefined);
    }

    #[test]
    fn test_bridged_reads_persistent_attribute() {
        let cx = context();
        let object = cx.realm().new_object(vec![]);
        let handle = PersistentValue::cell(
            CellClass::Object,
            [("a", PersistentValue::string("persistent"))],
            true,
        );
        cx.attach(&object, handle).unwrap();
        assert_eq!(
            cx.get_property(&object, "a").unwrap(),
            HostValue::from("persistent")
        );
    }

    #[test]
    fn test_missing_attribute_falls_back_to_host() {
        let cx = context();
        let object = cx
            .realm()
            .new_object(vec![("host_only".to_string(), HostValue::Boolean(true))]);
        let handle = PersistentValue::cell(CellClass::Object, [("a", PersistentValue::Unit)], true);
        cx.attach(&object, handle).unwrap();
        assert_eq!(
            cx.get_property(&object, "host_only").unwrap(),
            HostValue::Boolean(true)
        );
    }

    #[test]
    fn test_composite_result_preserves_identity() {
        let cx = context();
        let child = cx.realm().new_object(vec![]);
        let parent = cx
            .realm()
            .new_object(vec![("child".to_string(), HostValue::Object(child.clone()))]);
        cx.bridge_object(&child).unwrap();
        cx.bridge_object(&parent).unwrap();

        let got = cx.get_property(&parent, "child").unwrap();
        assert_eq!(got, HostValue::Object(child));
    }

    #[test]
    fn test_composite_result_is_bridged_and_stable() {
        let cx = context();
        let object = cx.realm().new_object(vec![]);
        let nested = PersistentValue::cell(CellClass::Object, [("n", PersistentValue::Integer(7))], true);
        let handle = PersistentValue::cell(CellClass::Object, [("nested", nested.clone())], true);
        cx.attach(&object, handle).unwrap();

        let first = cx.get_property(&object, "nested").unwrap();
        let second = cx.get_property(&object, "nested").unwrap();
        assert_eq!(first, second);
        let nested_obj = first.as_object().unwrap();
        assert_eq!(
            cx.table().lookup_by_persistent(&nested).unwrap(),
            Some(nested_obj.identity())
        );
        assert_eq!(
            cx.get_property(nested_obj, "n").unwrap(),
            HostValue::Number(7.0)
        );
    }

    #[test]
    fn test_list_length_and_index() {
        let cx = context();
        let array = cx
            .realm()
            .new_array(vec![HostValue::from("a"), HostValue::from("b")]);
        cx.bridge_object(&array).unwrap();
        assert_eq!(cx.get_property(&array, "length").unwrap(), HostValue::Number(2.0));
        assert_eq!(cx.get_property(&array, "1").unwrap(), HostValue::from("b"));
    }
}

mod set_property_tests {
    use super::*;

    #[test]
    fn test_concrete_scenario() {
        let cx = context();
        let o1 = cx.realm().new_object(vec![]);
        let p1 = PersistentValue::cell(CellClass::Object, [("a", PersistentValue::Integer(1))], true);
        cx.attach(&o1, p1.clone()).unwrap();

        cx.set_property(&o1, "b", &HostValue::Number(2.0)).unwrap();

        let p2 = cx.table().lookup_by_host(o1.identity()).unwrap().unwrap();
        let expected = PersistentValue::cell(
            CellClass::Object,
            [
                ("a", PersistentValue::Integer(1)),
                ("b", PersistentValue::Integer(2)),
            ],
            true,
        );
        assert_eq!(
            p2.as_cell().unwrap().attributes(),
            expected.as_cell().unwrap().attributes()
        );
        assert_eq!(p1.as_cell().unwrap().attributes().len(), 1);
        assert_eq!(p1.get_attribute("a"), Some(PersistentValue::Integer(1)));
    }

    #[test]
    fn test_immutable_cell_rejects_writes() {
        let cx = context();
        let object = cx.realm().new_object(vec![]);
        let frozen = PersistentValue::cell(CellClass::Object, [("a", PersistentValue::Unit)], false);
        cx.attach(&object, frozen.clone()).unwrap();
        let err = cx
            .set_property(&object, "a", &HostValue::Number(1.0))
            .unwrap_err();
        assert!(matches!(
            err,
            RedirectError::Bridge(BridgeError::ImmutableTarget { identity }) if identity == object.identity()
        ));
        let current = cx.table().lookup_by_host(object.identity()).unwrap().unwrap();
        assert!(current.same_handle(&frozen));
    }

    #[test]
    fn test_list_handle_rejects_writes() {
        let cx = context();
        let array = cx.realm().new_array(vec![HostValue::Null]);
        cx.bridge_object(&array).unwrap();
        assert!(matches!(
            cx.set_property(&array, "0", &HostValue::Null),
            Err(RedirectError::Bridge(BridgeError::ImmutableTarget { .. }))
        ));
    }

    #[test]
    fn test_bridged_value_is_stored_by_handle() {
        let cx = context();
        let target = cx.realm().new_object(vec![]);
        let shared = cx.realm().new_object(vec![]);
        cx.bridge_object(&target).unwrap();
        let shared_handle = cx.bridge_object(&shared).unwrap();

        cx.set_property(&target, "shared", &HostValue::Object(shared.clone()))
            .unwrap();

        let stored = cx
            .table()
            .lookup_by_host(target.identity())
            .unwrap()
            .unwrap()
            .get_attribute("shared")
            .unwrap();
        assert!(stored.same_handle(&shared_handle));
        assert_eq!(
            cx.get_property(&target, "shared").unwrap(),
            HostValue::Object(shared)
        );
    }

    #[test]
    fn test_unbridged_write_uses_host_semantics() {
        let cx = context();
        let object = cx.realm().new_object(vec![]);
        cx.set_property(&object, "k", &HostValue::Boolean(true))
            .unwrap();
        assert_eq!(object.get_property("k"), HostValue::Boolean(true));
        assert_eq!(cx.stats().unwrap().count, 0);
    }

    #[test]
    fn test_unbridged_array_out_of_range_is_host_error() {
        let cx = context();
        let array = cx.realm().new_array(vec![HostValue::Number(1.0)]);
        let err = cx
            .set_property(&array, "length", &HostValue::Number(1e300))
            .unwrap_err();
        assert!(matches!(
            err,
            RedirectError::Host(ref e) if e.kind == host_types::HostErrorKind::RangeError
        ));
        assert!(matches!(
            cx.set_property(&array, "4294967295", &HostValue::Null),
            Err(RedirectError::Host(_))
        ));
        assert_eq!(array.get_property("length"), HostValue::Number(1.0));
    }
}

mod call_tests {
    use super::*;

    fn add() -> PersistentValue {
        PersistentValue::method("add", |_, args| match args {
            [PersistentValue::Integer(a), PersistentValue::Integer(b)] => {
                Ok(PersistentValue::Integer(a + b))
            }
            _ => Err(MethodError::Arity {
                method: "add".to_string(),
                expected: 2,
                got: args.len(),
            }),
        })
    }

    #[test]
    fn test_method_is_invoked_on_persistent_side() {
        let cx = context();
        let object = cx.realm().new_object(vec![]);
        let handle = PersistentValue::cell(CellClass::Object, [("add", add())], true);
        cx.attach(&object, handle).unwrap();

        let function = cx.get_property(&object, "add").unwrap();
        let function = function.as_object().unwrap();
        assert!(function.is_callable());
        let result = cx
            .call(
                function,
                &HostValue::Object(object.clone()),
                &[HostValue::Number(2.0), HostValue::Number(3.0)],
            )
            .unwrap();
        assert_eq!(result, HostValue::Number(5.0));
    }

    #[test]
    fn test_method_errors_propagate() {
        let cx = context();
        let object = cx.realm().new_object(vec![]);
        cx.attach(
            &object,
            PersistentValue::cell(CellClass::Object, [("add", add())], true),
        )
        .unwrap();
        let function = cx.get_property(&object, "add").unwrap();
        let err = cx
            .call(function.as_object().unwrap(), &HostValue::Undefined, &[])
            .unwrap_err();
        assert!(matches!(err, RedirectError::Method(MethodError::Arity { got: 0, .. })));
    }

    #[test]
    fn test_bridged_host_function_falls_back_to_host() {
        let cx = context();
        let function = cx.realm().new_function("double", |_, args| match args.first() {
            Some(HostValue::Number(n)) => Ok(HostValue::Number(n * 2.0)),
            _ => Ok(HostValue::Undefined),
        });
        cx.bridge_object(&function).unwrap();
        assert_eq!(
            cx.call(&function, &HostValue::Undefined, &[HostValue::Number(4.0)])
                .unwrap(),
            HostValue::Number(8.0)
        );
    }

    #[test]
    fn test_unbridged_placeholder_call_fails() {
        let cx = context();
        let placeholder = cx.realm().new_placeholder_function("ghost");
        assert!(matches!(
            cx.call(&placeholder, &HostValue::Undefined, &[]),
            Err(RedirectError::Host(_))
        ));
    }
}
