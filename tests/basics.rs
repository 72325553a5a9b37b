use ferrous_web::{DiError, Lifetime, Resolver, ServiceCollection};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn test_concrete_singleton() {
    let mut sc = ServiceCollection::new();
    sc.add_singleton(42usize);
    sc.add_singleton("hello".to_string());

    let sp = sc.build();

    let num1 = sp.get::<usize>().unwrap();
    let num2 = sp.get::<usize>().unwrap();
    let str1 = sp.get::<String>().unwrap();

    assert_eq!(*num1, 42);
    assert_eq!(*str1, "hello");
    assert!(Arc::ptr_eq(&num1, &num2));
}

#[test]
fn test_factory_with_dependencies() {
    struct Config {
        port: u16,
    }

    struct Server {
        config: Arc<Config>,
        name: String,
    }

    let mut sc = ServiceCollection::new();
    sc.add_singleton(Config { port: 8080 });
    sc.add_singleton_factory::<Server, _>(|r| {
        Ok(Server {
            config: r.get::<Config>()?,
            name: "api".to_string(),
        })
    });

    let sp = sc.build();
    let server = sp.get::<Server>().unwrap();
    assert_eq!(server.config.port, 8080);
    assert_eq!(server.name, "api");
}

#[test]
fn test_transient_builds_every_time() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let mut sc = ServiceCollection::new();
    sc.add_transient_factory::<usize, _>(move |_| Ok(counter.fetch_add(1, Ordering::SeqCst)));

    let sp = sc.build();
    let a = sp.get::<usize>().unwrap();
    let b = sp.get::<usize>().unwrap();
    assert_ne!(*a, *b);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_reregistration_last_write_wins() {
    struct Mailer(&'static str);

    let mut sc = ServiceCollection::new();
    sc.add_singleton(Mailer("smtp"));
    sc.add_singleton_factory::<Mailer, _>(|_| Ok(Mailer("fake")));
    assert_eq!(sc.len(), 1);

    let sp = sc.build();
    assert_eq!(sp.get::<Mailer>().unwrap().0, "fake");
}

#[test]
fn test_try_add_keeps_existing() {
    let mut sc = ServiceCollection::new();
    assert!(sc.try_add_singleton(1u8));
    assert!(!sc.try_add_singleton(2u8));
    assert!(!sc.try_add_transient_factory::<u8, _>(|_| Ok(3)));

    let sp = sc.build();
    assert_eq!(*sp.get::<u8>().unwrap(), 1);
}

#[test]
fn test_unregistered_reports_name_and_chain() {
    struct Repo;
    struct Db;

    let mut sc = ServiceCollection::new();
    sc.add_transient_factory::<Repo, _>(|r| {
        r.get::<Db>()?;
        Ok(Repo)
    });
    let sp = sc.build();

    match sp.get::<Repo>() {
        Err(DiError::NotFound { name, chain }) => {
            assert!(name.ends_with("::Db"));
            assert_eq!(chain.len(), 2);
            assert!(chain[0].ends_with("::Repo"));
            assert!(chain[1].ends_with("::Db"));
        }
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("Repo should not resolve"),
    }
}

#[test]
fn test_try_get_distinguishes_missing_from_broken() {
    struct Optional;
    struct Broken;
    struct Missing;

    let mut sc = ServiceCollection::new();
    sc.add_transient_factory::<Broken, _>(|r| {
        r.get::<Missing>()?;
        Ok(Broken)
    });
    let sp = sc.build();

    assert!(sp.try_get::<Optional>().unwrap().is_none());
    assert!(sp.try_get::<Broken>().is_err());
}

#[test]
fn test_factory_failure_is_propagated() {
    struct Pool;

    let mut sc = ServiceCollection::new();
    sc.add_singleton_factory::<Pool, _>(|_| Err(DiError::factory::<Pool>("connection refused")));
    let sp = sc.build();

    let err = sp.get::<Pool>().err().unwrap();
    assert!(matches!(err, DiError::Factory { .. }));
    assert!(err.to_string().contains("connection refused"));
}

#[test]
fn test_trait_registrations() {
    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }
    struct English;
    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".into()
        }
    }
    struct French;
    impl Greeter for French {
        fn greet(&self) -> String {
            "bonjour".into()
        }
    }

    let mut sc = ServiceCollection::new();
    sc.add_singleton_trait::<dyn Greeter>(Arc::new(English));
    assert!(sc.contains_trait::<dyn Greeter>());
    let sp = sc.build();
    assert_eq!(sp.get_trait::<dyn Greeter>().unwrap().greet(), "hello");

    let mut sc = ServiceCollection::new();
    sc.add_scoped_trait_factory::<dyn Greeter, _>(|_| Ok(Arc::new(French) as Arc<dyn Greeter>));
    let sp = sc.build();
    let scope = sp.create_scope();
    let a = scope.get_trait::<dyn Greeter>().unwrap();
    let b = scope.get_trait::<dyn Greeter>().unwrap();
    assert_eq!(a.greet(), "bonjour");
    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn test_descriptors_list_registrations() {
    trait Clock: Send + Sync {}
    struct Utc;
    impl Clock for Utc {}

    let mut sc = ServiceCollection::new();
    sc.add_singleton(1u32);
    sc.add_scoped_factory::<String, _>(|_| Ok(String::new()));
    sc.add_singleton_trait::<dyn Clock>(Arc::new(Utc));

    let descriptors = sc.descriptors();
    assert_eq!(descriptors.len(), 3);
    assert_eq!(descriptors[0].type_name(), "u32");
    assert_eq!(descriptors[0].lifetime, Lifetime::Singleton);
    assert_eq!(descriptors[1].lifetime, Lifetime::Scoped);
    assert!(descriptors[2].is_trait());
}
