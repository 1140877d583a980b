//! Router matching tests against a built and sorted table.


use http::Method;
use restmount::registry::{
    ArgSource, ArgSpec, ArgType, Registry, RouteDef, SharedClass, SharedMethod, Verb,
};
use restmount::router::{RouteBuilder, Router};
use tracing_util::TestTracing;

fn noop(_ctx: &restmount::InvocationContext, done: restmount::Completion) {
    done.succeed(Vec::new());
}

fn notes_router() -> Router {
    let mut registry = Registry::new();
    registry.define(
        SharedClass::new("notes")
            .ctor(
                SharedMethod::new("findById", noop)
                    .http(RouteDef::new(Verb::Get, "/:id"))
                    .accepts(ArgSpec::new("id", ArgType::String).from(ArgSource::Path)),
            )
            .method(SharedMethod::new("findOne", noop).http(RouteDef::new(Verb::Get, "/findOne")))
            .method(
                SharedMethod::new("docs", noop)
                    .instance()
                    .http(RouteDef::new(Verb::Get, "/docs")),
            )
            .method(SharedMethod::new("create", noop).http(RouteDef::new(Verb::Post, "/"))),
    );
    Router::new(RouteBuilder::build(&registry).expect("route table"))
}

#[test]
fn test_static_route_wins_over_param() {
    let _tracing = TestTracing::init();
    let router = notes_router();
    let matched = router.route(&Method::GET, "/notes/findOne").expect("match");
    assert_eq!(matched.method.full_name, "notes.findOne");
    assert!(matched.path_params.is_empty());
}

#[test]
fn test_param_route_extracts_capture() {
    let router = notes_router();
    let matched = router.route(&Method::GET, "/notes/42").expect("match");
    assert_eq!(matched.method.full_name, "notes.sharedCtor");
    assert_eq!(matched.get_path_param("id"), Some("42"));
}

#[test]
fn test_instance_route_carries_ctor_param() {
    let router = notes_router();
    let matched = router.route(&Method::GET, "/notes/42/docs").expect("match");
    assert_eq!(matched.method.full_name, "notes.prototype.docs");
    assert_eq!(matched.get_path_param("id"), Some("42"));
}

#[test]
fn test_verb_must_match() {
    let router = notes_router();
    assert!(router.route(&Method::POST, "/notes/findOne").is_none());
    assert!(router.route(&Method::POST, "/notes").is_some());
}

#[test]
fn test_head_matches_get_route() {
    let router = notes_router();
    let matched = router.route(&Method::HEAD, "/notes/42").expect("match");
    assert_eq!(matched.method.full_name, "notes.sharedCtor");
}

#[test]
fn test_wildcard_verb_matches_everything() {
    let mut registry = Registry::new();
    registry.define(SharedClass::new("anything").method(SharedMethod::new("do", noop)));
    let router = Router::new(RouteBuilder::build(&registry).expect("route table"));
    for method in [Method::GET, Method::POST, Method::PUT, Method::DELETE] {
        assert!(router.route(&method, "/anything/do").is_some());
    }
}

#[test]
fn test_trailing_slash_is_normalized() {
    let router = notes_router();
    assert!(router.route(&Method::GET, "/notes/findOne/").is_some());
}

#[test]
fn test_no_match_returns_none() {
    let router = notes_router();
    assert!(router.route(&Method::GET, "/other/findOne").is_none());
    assert!(router.route(&Method::GET, "/notes/42/docs/extra").is_none());
}

#[test]
fn test_sorted_patterns_are_observable() {
    let router = notes_router();
    let patterns = router.path_patterns();
    let find_one = patterns
        .iter()
        .position(|p| p.contains("/notes/findOne"))
        .expect("findOne");
    let by_id = patterns
        .iter()
        .position(|p| p == "get /notes/:id")
        .expect(":id");
    assert!(find_one < by_id);
}
