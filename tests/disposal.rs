use async_trait::async_trait;
use ferrous_web::{AsyncDispose, Dispose, Resolver, ServiceCollection};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Log = Arc<Mutex<Vec<String>>>;

struct Tracked {
    name: &'static str,
    log: Log,
}

impl Dispose for Tracked {
    fn dispose(&self) {
        self.log.lock().unwrap().push(format!("sync:{}", self.name));
    }
}

struct AsyncTracked {
    name: &'static str,
    log: Log,
}

#[async_trait]
impl AsyncDispose for AsyncTracked {
    async fn dispose(&self) {
        tokio::task::yield_now().await;
        self.log.lock().unwrap().push(format!("async:{}", self.name));
    }
}

struct First;
struct Second;

#[tokio::test]
async fn test_scoped_release_is_lifo_async_first() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));

    let mut sc = ServiceCollection::new();
    let l = log.clone();
    sc.add_scoped_factory::<First, _>(move |r| {
        r.register_disposer(Arc::new(Tracked { name: "first", log: l.clone() }));
        Ok(First)
    });
    let l = log.clone();
    sc.add_scoped_factory::<Second, _>(move |r| {
        r.register_disposer(Arc::new(Tracked { name: "second", log: l.clone() }));
        r.register_async_disposer(Arc::new(AsyncTracked { name: "second", log: l.clone() }));
        Ok(Second)
    });

    let sp = sc.build();
    let scope = sp.create_scope();
    scope.get::<First>().unwrap();
    scope.get::<Second>().unwrap();
    scope.release().await;

    assert_eq!(
        *log.lock().unwrap(),
        vec!["async:second", "sync:second", "sync:first"]
    );
}

#[tokio::test]
async fn test_disposable_registrations_release_with_owner() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));

    let mut sc = ServiceCollection::new();
    let l = log.clone();
    sc.add_scoped_disposable::<Tracked, _>(move |_| Ok(Tracked { name: "uow", log: l.clone() }));
    let l = log.clone();
    sc.add_singleton_async_disposable::<AsyncTracked, _>(move |_| {
        Ok(AsyncTracked { name: "pool", log: l.clone() })
    });

    let sp = sc.build();
    {
        let scope = sp.create_scope();
        scope.get::<Tracked>().unwrap();
        scope.get::<AsyncTracked>().unwrap();
        scope.release().await;
    }
    assert_eq!(*log.lock().unwrap(), vec!["sync:uow"]);

    sp.dispose_all().await;
    assert_eq!(*log.lock().unwrap(), vec!["sync:uow", "async:pool"]);
}

#[tokio::test]
async fn test_transients_are_released_with_their_scope() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));

    let mut sc = ServiceCollection::new();
    let l = log.clone();
    sc.add_transient_factory::<First, _>(move |r| {
        r.register_disposer(Arc::new(Tracked { name: "t", log: l.clone() }));
        Ok(First)
    });

    let sp = sc.build();
    let scope = sp.create_scope();
    for _ in 0..3 {
        scope.get::<First>().unwrap();
    }
    scope.release().await;
    assert_eq!(log.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_dropped_scope_releases_on_runtime() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));

    let mut sc = ServiceCollection::new();
    let l = log.clone();
    sc.add_scoped_async_disposable::<AsyncTracked, _>(move |_| {
        Ok(AsyncTracked { name: "conn", log: l.clone() })
    });

    let sp = sc.build();
    {
        let scope = sp.create_scope();
        scope.get::<AsyncTracked>().unwrap();
    }

    for _ in 0..50 {
        if !log.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(*log.lock().unwrap(), vec!["async:conn"]);
}

#[tokio::test]
async fn test_release_is_idempotent() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));

    let mut sc = ServiceCollection::new();
    let l = log.clone();
    sc.add_scoped_disposable::<Tracked, _>(move |_| Ok(Tracked { name: "once", log: l.clone() }));

    let sp = sc.build();
    let scope = sp.create_scope();
    scope.get::<Tracked>().unwrap();
    scope.release().await;
    scope.release().await;
    assert!(scope.is_released());
    drop(scope);

    assert_eq!(*log.lock().unwrap(), vec!["sync:once"]);
}
