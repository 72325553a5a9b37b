#![no_main]

use ferrous_web::routing::RouteTable;
use http::Method;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(path) = std::str::from_utf8(data) else {
        return;
    };

    let mut table = RouteTable::new();
    for (i, pattern) in [
        "/",
        "/users/{id}",
        "/users/admin",
        "/users/{id}/posts/{post}",
        "/files/{*path}",
        "/{a}/{b}/{c}",
    ]
    .iter()
    .enumerate()
    {
        let _ = table.register(Method::GET, pattern, i);
    }
    let _ = table.register(Method::POST, "/users/{id}", 99);

    for method in [Method::GET, Method::POST, Method::DELETE] {
        if let Ok(found) = table.match_route(&method, path) {
            assert_eq!(found.route.method(), &method);
            for (name, _) in found.params.iter() {
                assert!(found.route.pattern().has_param(name));
            }
        }
    }
});
