use ferrous_web::{DiError, Resolver, ServiceCollection};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

struct RequestState {
    id: u32,
}

fn counting_collection() -> ServiceCollection {
    let counter = Arc::new(AtomicU32::new(0));
    let mut sc = ServiceCollection::new();
    sc.add_scoped_factory::<RequestState, _>(move |_| {
        Ok(RequestState {
            id: counter.fetch_add(1, Ordering::SeqCst),
        })
    });
    sc
}

#[test]
fn test_scoped_same_within_scope() {
    let sp = counting_collection().build();
    let scope = sp.create_scope();

    let a = scope.get::<RequestState>().unwrap();
    let b = scope.get::<RequestState>().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn test_scoped_distinct_across_scopes() {
    let sp = counting_collection().build();
    let s1 = sp.create_scope();
    let s2 = sp.create_scope();

    let a = s1.get::<RequestState>().unwrap();
    let b = s2.get::<RequestState>().unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    assert_ne!(a.id, b.id);
}

#[test]
fn test_scoped_shared_by_transients_in_scope() {
    struct Handler {
        state: Arc<RequestState>,
    }

    let mut sc = counting_collection();
    sc.add_transient_factory::<Handler, _>(|r| {
        Ok(Handler {
            state: r.get::<RequestState>()?,
        })
    });
    let sp = sc.build();
    let scope = sp.create_scope();

    let h1 = scope.get::<Handler>().unwrap();
    let h2 = scope.get::<Handler>().unwrap();
    assert!(Arc::ptr_eq(&h1.state, &h2.state));
}

#[test]
fn test_singleton_shared_across_scopes() {
    struct Catalog;

    let mut sc = ServiceCollection::new();
    sc.add_singleton_factory::<Catalog, _>(|_| Ok(Catalog));
    let sp = sc.build();

    let a = sp.create_scope().get::<Catalog>().unwrap();
    let b = sp.create_scope().get::<Catalog>().unwrap();
    let c = sp.get::<Catalog>().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&a, &c));
}

#[test]
fn test_scoped_from_root_is_rejected() {
    let sp = counting_collection().build();
    match sp.get::<RequestState>() {
        Err(DiError::WrongLifetime { name, reason }) => {
            assert!(name.ends_with("RequestState"));
            assert!(reason.contains("root provider"));
        }
        _ => panic!("expected WrongLifetime"),
    }
}

#[test]
fn test_singleton_capturing_scoped_is_rejected() {
    struct Cache {
        _state: Arc<RequestState>,
    }

    let mut sc = counting_collection();
    sc.add_singleton_factory::<Cache, _>(|r| {
        Ok(Cache {
            _state: r.get::<RequestState>()?,
        })
    });
    let sp = sc.build();
    let scope = sp.create_scope();

    match scope.get::<Cache>() {
        Err(DiError::WrongLifetime { reason, .. }) => {
            assert!(reason.contains("building a singleton"));
        }
        _ => panic!("expected WrongLifetime"),
    }
}

#[test]
fn test_transient_from_root_needing_scoped_blames_the_root() {
    struct Report {
        _state: Arc<RequestState>,
    }
    struct Audit {
        _report: Arc<Report>,
    }
    struct Ledger {
        _audit: Arc<Audit>,
    }

    let mut sc = counting_collection();
    sc.add_transient_factory::<Report, _>(|r| {
        Ok(Report {
            _state: r.get::<RequestState>()?,
        })
    });
    sc.add_transient_factory::<Audit, _>(|r| {
        Ok(Audit {
            _report: r.get::<Report>()?,
        })
    });
    sc.add_singleton_factory::<Ledger, _>(|r| {
        Ok(Ledger {
            _audit: r.get::<Audit>()?,
        })
    });
    let sp = sc.build();

    match sp.get::<Audit>() {
        Err(DiError::WrongLifetime { reason, .. }) => {
            assert!(reason.contains("root provider"), "{reason}");
        }
        _ => panic!("expected WrongLifetime"),
    }

    // A singleton further out still counts, however deep the transients go.
    match sp.create_scope().get::<Ledger>() {
        Err(DiError::WrongLifetime { reason, .. }) => {
            assert!(reason.contains("building a singleton"), "{reason}");
        }
        _ => panic!("expected WrongLifetime"),
    }
}

#[test]
fn test_seeded_trait_instance_is_scope_local() {
    trait Tenant: Send + Sync {
        fn id(&self) -> &str;
    }
    struct Acme;
    impl Tenant for Acme {
        fn id(&self) -> &str {
            "acme"
        }
    }

    let sp = ServiceCollection::new().build();
    let scope = sp.create_scope();
    scope.insert_trait_instance::<dyn Tenant>(Arc::new(Acme));

    assert_eq!(scope.get_trait::<dyn Tenant>().unwrap().id(), "acme");
    assert!(sp.create_scope().get_trait::<dyn Tenant>().is_err());
}

#[test]
fn test_try_get_local_ignores_registry() {
    let mut sc = ServiceCollection::new();
    sc.add_singleton(5u64);
    let sp = sc.build();
    let scope = sp.create_scope();

    assert!(scope.try_get_local::<u64>().is_none());
    scope.insert_instance(9u64);
    assert_eq!(*scope.try_get_local::<u64>().unwrap(), 9);
}
