//! Route table: registration and request matching.
//!
//! Matching is deterministic. Among patterns that match a path, the one
//! whose segment kinds compare lowest left to right wins (literal, then
//! parameter, then wildcard); registration order breaks remaining ties.

mod pattern;

use std::cmp::Ordering;

use http::Method;

use crate::error::{RegistrationError, RouteError};

pub use pattern::{PathParams, PathPattern, Segment, SegmentKind};
pub(crate) use pattern::split_path;

/// A registered route carrying a payload `T` (a handler descriptor in the
/// dispatcher).
#[derive(Debug)]
pub struct Route<T> {
    method: Method,
    pattern: PathPattern,
    value: T,
}

impl<T> Route<T> {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn value(&self) -> &T {
        &self.value
    }
}

/// Outcome of a successful match.
#[derive(Debug)]
pub struct RouteMatch<'a, T> {
    pub route: &'a Route<T>,
    pub params: PathParams,
}

/// Route table, read-only once the dispatcher is sealed.
///
/// # Examples
///
/// ```
/// use ferrous_web::routing::RouteTable;
/// use ferrous_web::RouteError;
/// use http::Method;
///
/// let mut table = RouteTable::new();
/// table.register(Method::GET, "/users/{id}", "by id").unwrap();
/// table.register(Method::GET, "/users/admin", "admin").unwrap();
///
/// let m = table.match_route(&Method::GET, "/users/admin").unwrap();
/// assert_eq!(*m.route.value(), "admin");
///
/// let m = table.match_route(&Method::GET, "/users/7").unwrap();
/// assert_eq!(m.params.get("id"), Some("7"));
///
/// assert!(matches!(
///     table.match_route(&Method::DELETE, "/users/7"),
///     Err(RouteError::MethodNotAllowed { .. })
/// ));
/// ```
#[derive(Debug)]
pub struct RouteTable<T> {
    routes: Vec<Route<T>>,
}

impl<T> Default for RouteTable<T> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

impl<T> RouteTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a route. Fails if the pattern is invalid or the same
    /// (method, pattern shape) is already registered; the table is then
    /// unchanged.
    pub fn register(
        &mut self,
        method: Method,
        pattern: &str,
        value: T,
    ) -> Result<&Route<T>, RegistrationError> {
        let pattern = PathPattern::parse(pattern)?;
        self.insert(method, pattern, value)
    }

    pub(crate) fn insert(
        &mut self,
        method: Method,
        pattern: PathPattern,
        value: T,
    ) -> Result<&Route<T>, RegistrationError> {
        if self
            .routes
            .iter()
            .any(|r| r.method == method && r.pattern.same_shape(&pattern))
        {
            return Err(RegistrationError::DuplicateRoute {
                method,
                pattern: pattern.as_str().to_string(),
            });
        }

        tracing::debug!(%method, pattern = pattern.as_str(), "route registered");
        let idx = self.routes.len();
        self.routes.push(Route {
            method,
            pattern,
            value,
        });
        Ok(&self.routes[idx])
    }

    /// Finds the best route for `method` and a raw request path.
    pub fn match_route(&self, method: &Method, path: &str) -> Result<RouteMatch<'_, T>, RouteError> {
        let Some(segments) = split_path(path) else {
            tracing::debug!(path, "request path is not valid UTF-8 once decoded");
            return Err(RouteError::NoMatch {
                path: path.to_string(),
            });
        };
        let segments: Vec<&str> = segments.iter().map(|s| s.as_ref()).collect();

        let mut best: Option<RouteMatch<'_, T>> = None;
        let mut allowed: Vec<Method> = Vec::new();

        for route in &self.routes {
            let Some(params) = route.pattern.matches(&segments) else {
                continue;
            };
            if route.method != *method {
                if !allowed.contains(&route.method) {
                    allowed.push(route.method.clone());
                }
                continue;
            }
            // Strictly better only: earlier registration wins ties.
            let better = match &best {
                None => true,
                Some(current) => {
                    route.pattern.precedence(&current.route.pattern) == Ordering::Less
                }
            };
            if better {
                best = Some(RouteMatch { route, params });
            }
        }

        match best {
            Some(found) => Ok(found),
            None if !allowed.is_empty() => Err(RouteError::MethodNotAllowed {
                method: method.clone(),
                path: path.to_string(),
                allowed,
            }),
            None => Err(RouteError::NoMatch {
                path: path.to_string(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Routes in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Route<T>> {
        self.routes.iter()
    }

    #[cfg(feature = "diagnostics")]
    pub fn to_debug_string(&self) -> String {
        let mut s = String::from("=== Route Table ===\n");
        for r in &self.routes {
            s.push_str(&format!("  {:<7} {}\n", r.method.as_str(), r.pattern));
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_leaves_table_unchanged() {
        let mut table = RouteTable::new();
        table.register(Method::GET, "/users/{id}", 1).unwrap();
        let err = table.register(Method::GET, "/users/{uid}", 2).unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateRoute { .. }));
        assert_eq!(table.len(), 1);
        assert_eq!(
            *table.match_route(&Method::GET, "/users/3").unwrap().route.value(),
            1
        );

        // Same pattern under another method is fine.
        table.register(Method::PUT, "/users/{id}", 3).unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn literal_beats_parameter_regardless_of_order() {
        let mut table = RouteTable::new();
        table.register(Method::GET, "/users/{id}", "param").unwrap();
        table.register(Method::GET, "/users/admin", "literal").unwrap();
        table.register(Method::GET, "/users/{*rest}", "wild").unwrap();

        let get = |p| *table.match_route(&Method::GET, p).unwrap().route.value();
        assert_eq!(get("/users/admin"), "literal");
        assert_eq!(get("/users/bob"), "param");
        assert_eq!(get("/users/bob/posts"), "wild");
    }

    #[test]
    fn longer_static_prefix_wins() {
        let mut table = RouteTable::new();
        table.register(Method::GET, "/a/{x}/c", "late-literal").unwrap();
        table.register(Method::GET, "/a/b/{y}", "early-literal").unwrap();
        let m = table.match_route(&Method::GET, "/a/b/c").unwrap();
        assert_eq!(*m.route.value(), "early-literal");
        assert_eq!(m.params.get("y"), Some("c"));
    }

    #[test]
    fn not_found_vs_method_not_allowed() {
        let mut table = RouteTable::new();
        table.register(Method::GET, "/items", ()).unwrap();
        table.register(Method::POST, "/items", ()).unwrap();

        match table.match_route(&Method::DELETE, "/items") {
            Err(RouteError::MethodNotAllowed { allowed, .. }) => {
                assert_eq!(allowed, vec![Method::GET, Method::POST]);
            }
            other => panic!("expected 405, got {:?}", other.map(|_| ())),
        }
        assert!(matches!(
            table.match_route(&Method::GET, "/nothing"),
            Err(RouteError::NoMatch { .. })
        ));
    }

    #[test]
    fn trailing_slash_and_encoding() {
        let mut table = RouteTable::new();
        table.register(Method::GET, "/tags/{name}", ()).unwrap();
        let m = table.match_route(&Method::GET, "/tags/rust%20lang/").unwrap();
        assert_eq!(m.params.get("name"), Some("rust lang"));
    }
}
