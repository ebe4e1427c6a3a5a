//! Native resources crossing the bridge.

use host_types::{ExternalResource, HostValue, ObjectKind};
use persistent_types::CellClass;
use std::sync::Arc;
use value_bridge::{
    BridgeConfig, ContextId, ConversionError, ExecutionContext, RedirectError,
};

struct FileDescriptor(i32);

#[test]
fn test_external_survives_round_trip() {
    let cx = ExecutionContext::new(ContextId::from_raw(1), BridgeConfig::default());
    let resource: ExternalResource = Arc::new(FileDescriptor(3));
    let external = cx.realm().new_external(resource);
    let handle = cx.bridge_object(&external).unwrap();
    assert_eq!(handle.as_cell().unwrap().class(), CellClass::External);

    let back = cx.converter().to_host(&handle).unwrap();
    match &*back.as_object().unwrap().kind() {
        ObjectKind::External(res) => {
            assert_eq!(res.downcast_ref::<FileDescriptor>().map(|fd| fd.0), Some(3));
        }
        other => panic!("expected external, got {:?}", other),
    };
}

#[test]
fn test_release_then_export_is_stale() {
    let cx = ExecutionContext::new(ContextId::from_raw(1), BridgeConfig::default());
    let external = cx.realm().new_external(Arc::new(FileDescriptor(4)));
    let holder = cx
        .realm()
        .new_object(vec![("fd".to_string(), HostValue::Object(external))]);
    let handle = cx.bridge_object(&holder).unwrap();
    let fd = handle.get_attribute("fd").unwrap();

    assert!(cx.release_resource(&fd));
    assert!(!cx.release_resource(&fd));
    assert!(cx.resources().is_empty());

    // The holder's own external object was never bridged, so the read goes
    // through the persistent attribute and its stale handle.
    let err = cx.get_property(&holder, "fd").unwrap_err();
    assert!(matches!(
        err,
        RedirectError::Conversion(ConversionError::StaleResource { .. })
    ));
}

#[test]
fn test_teardown_releases_resources() {
    let cx = ExecutionContext::new(ContextId::from_raw(1), BridgeConfig::default());
    let external = cx.realm().new_external(Arc::new(FileDescriptor(5)));
    cx.bridge_object(&external).unwrap();
    assert_eq!(cx.resources().len(), 1);
    cx.teardown().unwrap();
    assert!(cx.resources().is_empty());
}

#[test]
fn test_finalized_external_frees_resource() {
    let cx = ExecutionContext::new(ContextId::from_raw(1), BridgeConfig::default());
    let resource: ExternalResource = Arc::new(FileDescriptor(6));
    let external = cx.realm().new_external(resource.clone());
    cx.bridge_object(&external).unwrap();
    assert_eq!(cx.resources().len(), 1);
    assert_eq!(Arc::strong_count(&resource), 3);

    drop(external);
    assert!(cx.resources().is_empty());
    assert_eq!(cx.stats().unwrap().count, 0);
    assert_eq!(Arc::strong_count(&resource), 1);
}

#[test]
fn test_unbridged_conversion_does_not_pin_resource() {
    let cx = ExecutionContext::new(ContextId::from_raw(1), BridgeConfig::default());
    for fd in 0..16 {
        let external = cx.realm().new_external(Arc::new(FileDescriptor(fd)));
        cx.converter()
            .from_host(&HostValue::Object(external))
            .unwrap();
    }
    assert!(cx.resources().is_empty());
}

#[test]
fn test_materialized_external_keeps_resource() {
    let cx = ExecutionContext::new(ContextId::from_raw(1), BridgeConfig::default());
    let external = cx.realm().new_external(Arc::new(FileDescriptor(7)));
    let handle = cx.bridge_object(&external).unwrap();
    let back = cx.converter().to_host(&handle).unwrap();

    drop(external);
    assert_eq!(cx.resources().len(), 1);
    let again = cx.converter().to_host(&handle).unwrap();
    assert!(matches!(
        &*again.as_object().unwrap().kind(),
        ObjectKind::External(res) if res.downcast_ref::<FileDescriptor>().map(|fd| fd.0) == Some(7)
    ));

    drop(again);
    drop(back);
    assert!(cx.resources().is_empty());
    assert!(matches!(
        cx.converter().to_host(&handle),
        Err(ConversionError::StaleResource { .. })
    ));
}
