//! Contract tests verifying the host_types API surface the bridge consumes.

use host_types::{
    ExternalResource, HostIdentity, HostObjectRef, HostRealm, HostResult, HostValue, ObjectKind,
};
use std::sync::Arc;

/// Test HostRealm contract: alloc(kind) -> HostObjectRef with a fresh identity
#[test]
fn contract_realm_alloc() {
    let realm = HostRealm::new();
    let obj: HostObjectRef = realm.alloc(ObjectKind::Date(0.0));
    let _: HostIdentity = obj.identity();
}

/// Test HostRealm contract: resolve(identity) -> Option<HostObjectRef>
#[test]
fn contract_realm_resolve() {
    let realm = HostRealm::new();
    let obj = realm.new_object(vec![]);
    let resolved = realm.resolve(obj.identity()).unwrap();
    assert_eq!(HostValue::Object(resolved), HostValue::Object(obj));
}

/// Test external resources contract: shareable across threads
#[test]
fn contract_external_resource_is_send_sync() {
    fn assert_send_sync<T: Send + Sync + ?Sized>(_: &T) {}
    let resource: ExternalResource = Arc::new(42u32);
    assert_send_sync(&resource);
    let realm = HostRealm::new();
    let ext = realm.new_external(resource);
    assert_eq!(ext.class_name(), "External");
}

/// Test HostObject contract: call(this, args) -> HostResult<HostValue>
#[test]
fn contract_object_call() {
    let realm = HostRealm::new();
    let f = realm.new_function("id", |_, args| Ok(args.first().cloned().unwrap_or(HostValue::Undefined)));
    let result: HostResult<HostValue> = f.call(&HostValue::Undefined, &[HostValue::from("x")]);
    assert_eq!(result.unwrap(), HostValue::from("x"));
}
