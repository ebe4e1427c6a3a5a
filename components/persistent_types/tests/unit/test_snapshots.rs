//! Snapshot semantics of the persistent algebra: older handles never observe
//! later updates.

use persistent_types::{CellClass, PersistentValue, ValueKind};

#[cfg(test)]
mod cell_snapshot_tests {
    use super::*;

    #[test]
    fn test_old_handle_keeps_pre_mutation_attributes() {
        let p1 = PersistentValue::cell(CellClass::Object, [("a", PersistentValue::Integer(1))], true);
        let p2 = p1.set_attribute("b", PersistentValue::Integer(2)).unwrap();
        let p3 = p2.set_attribute("a", PersistentValue::Integer(10)).unwrap();

        assert_eq!(p1.get_attribute("a"), Some(PersistentValue::Integer(1)));
        assert_eq!(p1.get_attribute("b"), None);
        assert_eq!(p2.get_attribute("a"), Some(PersistentValue::Integer(1)));
        assert_eq!(p3.get_attribute("a"), Some(PersistentValue::Integer(10)));
        assert_eq!(p3.get_attribute("b"), Some(PersistentValue::Integer(2)));
    }

    #[test]
    fn test_set_attribute_keeps_class_and_mutability() {
        let date = PersistentValue::cell(CellClass::Date, [("time", PersistentValue::Double(0.0))], false);
        let moved = date.set_attribute("time", PersistentValue::Double(5.0)).unwrap();
        let cell = moved.as_cell().unwrap();
        assert_eq!(cell.class(), CellClass::Date);
        assert!(!cell.is_mutable());
    }

    #[test]
    fn test_set_attribute_on_non_cell() {
        let err = PersistentValue::list([])
            .set_attribute("x", PersistentValue::Unit)
            .unwrap_err();
        assert_eq!(err.expected, ValueKind::Cell);
        assert_eq!(err.found, ValueKind::List);
    }

    #[test]
    fn test_cells_compare_by_handle() {
        let a = PersistentValue::cell(CellClass::Object, [("k", PersistentValue::Unit)], true);
        let b = PersistentValue::cell(CellClass::Object, [("k", PersistentValue::Unit)], true);
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }
}

#[cfg(test)]
mod collection_tests {
    use super::*;

    #[test]
    fn test_set_members_are_distinct() {
        let set = PersistentValue::set([
            PersistentValue::Integer(1),
            PersistentValue::Integer(1),
            PersistentValue::Integer(2),
        ]);
        assert_eq!(set.len(), Some(2));
        let grown = set.add_member(PersistentValue::Integer(3)).unwrap();
        assert_eq!(set.len(), Some(2));
        assert_eq!(grown.len(), Some(3));
    }

    #[test]
    fn test_multiset_add_member() {
        let ms = PersistentValue::multiset([PersistentValue::from("x")]);
        let more = ms.add_member(PersistentValue::from("x")).unwrap();
        assert_eq!(
            more.as_multiset().unwrap().get(&PersistentValue::from("x")),
            Some(&2)
        );
        assert_eq!(ms.len(), Some(1));
    }

    #[test]
    fn test_string_length_counts_code_points() {
        assert_eq!(PersistentValue::string("héllo").len(), Some(5));
    }

    #[test]
    fn test_byte_buffer() {
        let buf = PersistentValue::bytes(vec![1u8, 2, 3]);
        assert_eq!(buf.as_bytes(), Some(&[1u8, 2, 3][..]));
        assert_eq!(buf.kind(), ValueKind::ByteBuffer);
    }

    #[test]
    fn test_tuple_is_not_list() {
        let tuple = PersistentValue::tuple([PersistentValue::Unit]);
        assert!(tuple.as_list().is_none());
        assert_eq!(tuple.as_tuple().map(|t| t.len()), Some(1));
    }
}
