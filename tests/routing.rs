//! Route compilation and matching through the public API.

use koapp::pipeline::success;
use koapp::routing::RouteTree;
use koapp::Router;

fn users() -> Router {
    Router::new("/users")
        .get("/{:id}", |_ctx| Box::pin(async { Ok(success("user")) }))
        .post("", |_ctx| Box::pin(async { Ok(success("created")) }))
}

#[test]
fn test_module_mounted_twice() {
    let api = Router::new("/api").nest("/v1", users()).nest("/v2", users());
    let tree = RouteTree::from_router(&api).unwrap();

    let v1 = tree.match_route("/api/v1/users/7", "GET").unwrap();
    assert_eq!(v1.path(), "/api/v1/users/{:id}");
    assert_eq!(v1.params["id"], "7");

    let v2 = tree.match_route("/api/v2/users", "POST").unwrap();
    assert_eq!(v2.path(), "/api/v2/users");
    assert!(tree.match_route("/api/v3/users", "POST").is_none());
}

#[test]
fn test_routes_are_listed_sorted() {
    let tree = RouteTree::compile([&users(), &Router::new("/health").method("GET")]).unwrap();
    let routes = tree.routes();
    let paths: Vec<_> = routes.iter().map(|(path, _)| path.as_str()).collect();
    let mut sorted = paths.clone();
    sorted.sort();
    assert_eq!(paths, sorted);
    for expected in ["/health", "/users", "/users/{:id}"] {
        assert!(paths.contains(&expected), "missing {expected}");
    }
}

#[test]
fn test_catch_all_from_separate_declarations() {
    let fallback = Router::new("/***").method("ANY");
    let tree = RouteTree::compile([&users(), &fallback]).unwrap();

    assert_eq!(tree.match_route("/users/1", "GET").unwrap().path(), "/users/{:id}");
    assert_eq!(tree.match_route("/users/1/posts", "GET").unwrap().path(), "/***");
    assert!(tree.match_route("/users/1", "DELETE").is_none());
}
