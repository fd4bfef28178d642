use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use courier::prelude::*;

#[path = "support/fake_transport.rs"]
mod support;

use support::FakeTransport;

fn build(registry: &ClientRegistry) -> ClientFactory {
    registry.build(
        Arc::new(ServiceRegistry::new()),
        Arc::new(FakeTransport::ok("{}")),
    )
}

#[test]
fn one_client_per_entry_with_its_base_address() {
    let mut mapping = HashMap::new();
    mapping.insert("billing", "https://billing.example.test/api/");
    mapping.insert("search", "http://search.internal:9200/");
    mapping.insert("auth", "https://auth.example.test/");

    let mut registry = ClientRegistry::new();
    registry.register_clients(&mapping).unwrap();
    assert_eq!(registry.len(), 3);

    let factory = build(&registry);
    assert_eq!(factory.names(), vec!["auth", "billing", "search"]);
    for (name, address) in &mapping {
        let client = factory.client(name).unwrap();
        assert_eq!(client.name(), *name);
        assert_eq!(client.base_url().unwrap().as_str(), *address);
    }
}

#[test]
fn empty_mapping_is_a_no_op() {
    let mut registry = ClientRegistry::new();
    registry.register("existing").unwrap();
    registry
        .register_clients(Vec::<(String, String)>::new())
        .unwrap();
    assert_eq!(registry.names(), vec!["existing"]);
}

#[test]
fn config_without_clients_table_is_rejected() {
    let mut registry = ClientRegistry::new();
    let err = registry
        .register_from_config(&CourierConfig::default())
        .unwrap_err();
    assert!(matches!(err, CourierError::InvalidArgument(_)));
    assert_eq!(err.category(), ErrorCategory::Setup);
    assert!(registry.is_empty());
}

#[test]
fn config_with_empty_clients_table_registers_nothing() {
    let config = CourierConfig {
        clients: Some(BTreeMap::new()),
        ..Default::default()
    };
    let mut registry = ClientRegistry::new();
    registry.register_from_config(&config).unwrap();
    assert!(registry.is_empty());
}

#[test]
fn config_clients_are_registered() {
    let mut clients = BTreeMap::new();
    clients.insert("billing".to_string(), "https://billing.example.test/".to_string());
    let config = CourierConfig {
        clients: Some(clients),
        ..Default::default()
    };
    let mut registry = ClientRegistry::new();
    registry.register_from_config(&config).unwrap();
    assert!(registry.contains("billing"));
}

#[test]
fn malformed_base_address_fails_at_registration() {
    let mut registry = ClientRegistry::new();
    for bad in ["", "billing.example.test", "https://", "file:///etc/hosts"] {
        let err = registry.register_clients([("billing", bad)]).unwrap_err();
        assert!(
            matches!(err, CourierError::InvalidArgument(_)),
            "{bad:?} gave {err:?}"
        );
    }
    assert!(registry.is_empty());
}

#[test]
fn duplicate_names_are_rejected() {
    let mut registry = ClientRegistry::new();
    registry
        .register_clients([("billing", "https://a.example.test/")])
        .unwrap();
    let err = registry
        .register_clients([("billing", "https://b.example.test/")])
        .unwrap_err();
    assert!(matches!(err, CourierError::InvalidArgument(_)));

    let err = ClientRegistry::new()
        .register_clients([("x", "https://a.test/"), ("x", "https://b.test/")])
        .unwrap_err();
    assert!(matches!(err, CourierError::InvalidArgument(_)));
}

#[test]
fn unknown_client_is_invalid_argument() {
    let factory = build(&ClientRegistry::new());
    let err = factory.client("missing").unwrap_err();
    assert!(matches!(err, CourierError::InvalidArgument(_)));
}

#[test]
fn on_registered_configures_each_client() {
    let mut registry = ClientRegistry::new();
    registry
        .register_clients_with(
            [("a", "https://a.example.test/"), ("b", "https://b.example.test/")],
            |name, _address, builder| {
                if name == "a" {
                    builder.for_each_request(|_req, _cancel| Ok(()));
                }
                Ok(())
            },
        )
        .unwrap();

    let factory = build(&registry);
    assert_eq!(factory.client("a").unwrap().interceptor_names(), vec!["a.before_send[0]"]);
    assert!(factory.client("b").unwrap().interceptor_names().is_empty());
}

#[test]
fn interceptor_factories_run_once_per_build() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    let built = Arc::new(AtomicUsize::new(0));
    let counter = built.clone();
    let mut registry = ClientRegistry::new();
    registry.register("a").unwrap().add_interceptor(move |_services| {
        counter.fetch_add(1, Ordering::SeqCst);
        Arc::new(LoggingInterceptor)
    });

    let factory = build(&registry);
    let _first = factory.client("a").unwrap();
    let _second = factory.client("a").unwrap();
    assert_eq!(built.load(Ordering::SeqCst), 1);
}
