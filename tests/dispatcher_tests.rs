//! Dispatcher tests: the full resolve → hooks → invoke → reply pipeline,
//! deferred completion, and cooperative cancellation.

mod common;

use restmount::dispatcher::{CancelToken, Dispatcher, RequestContext};
use restmount::registry::{ArgType, Registry, ReturnSpec, SharedClass, SharedMethod};
use restmount::RemoteError;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_util::TestTracing;

fn dispatcher_for(registry: Registry) -> Dispatcher {
    Dispatcher::new(Arc::new(registry))
}

fn get_request(path: &str, query: &[(&str, &str)]) -> RequestContext {
    let mut request = RequestContext::new(http::Method::GET, path);
    for (k, v) in query {
        request
            .query
            .insert((*k).to_string(), json!(v));
    }
    request
}

#[test]
fn test_echo_dispatch_succeeds() {
    let _tracing = TestTracing::init();
    let registry = common::fixture_registry();
    let method = common::descriptor(&registry, "testClass.testMethod");
    let dispatcher = dispatcher_for(registry);

    let request = get_request("/testClass/testMethod", &[("person", "hello")]);
    let reply = dispatcher
        .dispatch(method, request, &CancelToken::new())
        .expect("reply");
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, Some(json!({ "msg": "hello" })));
}

#[test]
fn test_numeric_multi_return() {
    let registry = common::fixture_registry();
    let method = common::descriptor(&registry, "testClass.pair");
    let dispatcher = dispatcher_for(registry);

    let request = get_request("/testClass/pair", &[("a", "1"), ("b", "2")]);
    let reply = dispatcher
        .dispatch(method, request, &CancelToken::new())
        .expect("reply");
    assert_eq!(reply.body, Some(json!({ "a": 1, "b": 2 })));
}

#[test]
fn test_missing_required_argument_is_400() {
    let registry = common::fixture_registry();
    let method = common::descriptor(&registry, "testClass.testMethod");
    let dispatcher = dispatcher_for(registry);

    let request = get_request("/testClass/testMethod", &[]);
    let reply = dispatcher
        .dispatch(method, request, &CancelToken::new())
        .expect("reply");
    assert_eq!(reply.status, 400);
    let body = reply.body.expect("envelope");
    assert_eq!(body["error"]["name"], json!("ValidationError"));
}

#[test]
fn test_before_hook_failure_short_circuits() {
    let invoked = Arc::new(AtomicUsize::new(0));
    let mut registry = Registry::new();
    {
        let invoked = Arc::clone(&invoked);
        registry.define(SharedClass::new("guarded").method(SharedMethod::new(
            "action",
            move |_ctx, done| {
                invoked.fetch_add(1, Ordering::SeqCst);
                done.succeed(Vec::new());
            },
        )));
    }
    registry.before("guarded.*", |_ctx| {
        Err(RemoteError::hook("denied").with_status(403))
    });
    let method = common::descriptor(&registry, "guarded.action");
    let dispatcher = dispatcher_for(registry);

    let reply = dispatcher
        .dispatch(
            method,
            RequestContext::new(http::Method::POST, "/guarded/action"),
            &CancelToken::new(),
        )
        .expect("reply");
    assert_eq!(reply.status, 403);
    assert_eq!(invoked.load(Ordering::SeqCst), 0);
}

#[test]
fn test_after_hook_failure_fails_a_settled_method() {
    let mut registry = common::fixture_registry();
    registry.after("testClass.testMethod", |_ctx| {
        Err(RemoteError::hook("post-processing broke"))
    });
    let method = common::descriptor(&registry, "testClass.testMethod");
    let dispatcher = dispatcher_for(registry);

    let request = get_request("/testClass/testMethod", &[("person", "hello")]);
    let reply = dispatcher
        .dispatch(method, request, &CancelToken::new())
        .expect("reply");
    assert_eq!(reply.status, 500);
    let body = reply.body.expect("envelope");
    assert_eq!(body["error"]["name"], json!("HookError"));
}

#[test]
fn test_after_hook_can_rewrite_results() {
    let mut registry = common::fixture_registry();
    registry.after("testClass.testMethod", |ctx| {
        ctx.results[0] = json!("rewritten");
        Ok(())
    });
    let method = common::descriptor(&registry, "testClass.testMethod");
    let dispatcher = dispatcher_for(registry);

    let request = get_request("/testClass/testMethod", &[("person", "hello")]);
    let reply = dispatcher
        .dispatch(method, request, &CancelToken::new())
        .expect("reply");
    assert_eq!(reply.body, Some(json!({ "msg": "rewritten" })));
}

#[test]
fn test_method_error_with_status_and_extras() {
    let mut registry = Registry::new();
    registry.define(SharedClass::new("failing").method(
        SharedMethod::new("boom", |_ctx, done| {
            done.fail(
                RemoteError::method("boom")
                    .with_status(422)
                    .with_extra("code", json!("E_BOOM")),
            );
        }),
    ));
    let method = common::descriptor(&registry, "failing.boom");
    let dispatcher = dispatcher_for(registry);

    let reply = dispatcher
        .dispatch(
            method,
            RequestContext::new(http::Method::POST, "/failing/boom"),
            &CancelToken::new(),
        )
        .expect("reply");
    assert_eq!(reply.status, 422);
    let body = reply.body.expect("envelope");
    assert_eq!(body["error"]["code"], json!("E_BOOM"));
    assert_eq!(body["error"]["status"], json!(422));
}

#[test]
fn test_string_failure_normalizes_to_method_error() {
    let mut registry = Registry::new();
    registry.define(SharedClass::new("failing").method(SharedMethod::new(
        "stringThrow",
        |_ctx, done| {
            done.fail("something broke");
        },
    )));
    let method = common::descriptor(&registry, "failing.stringThrow");
    let dispatcher = dispatcher_for(registry);

    let reply = dispatcher
        .dispatch(
            method,
            RequestContext::new(http::Method::POST, "/failing/stringThrow"),
            &CancelToken::new(),
        )
        .expect("reply");
    assert_eq!(reply.status, 500);
    let body = reply.body.expect("envelope");
    assert_eq!(body["error"]["message"], json!("something broke"));
}

#[test]
fn test_deferred_completion_settles_later() {
    let mut registry = Registry::new();
    registry.define(SharedClass::new("slow").method(
        SharedMethod::new("eventually", |_ctx, done| {
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                done.succeed(vec![json!("late")]);
            });
        })
        .returns(ReturnSpec::root(ArgType::Any)),
    ));
    let method = common::descriptor(&registry, "slow.eventually");
    let dispatcher = dispatcher_for(registry);

    let reply = dispatcher
        .dispatch(
            method,
            RequestContext::new(http::Method::POST, "/slow/eventually"),
            &CancelToken::new(),
        )
        .expect("reply");
    assert_eq!(reply.body, Some(json!("late")));
}

#[test]
fn test_cancellation_mid_flight_produces_no_reply() {
    let _tracing = TestTracing::init();
    let cancel_runs = Arc::new(AtomicUsize::new(0));
    let late_settle_accepted = Arc::new(AtomicUsize::new(0));

    let mut registry = Registry::new();
    {
        let cancel_runs = Arc::clone(&cancel_runs);
        let late_settle_accepted = Arc::clone(&late_settle_accepted);
        registry.define(SharedClass::new("slow").method(
            SharedMethod::new("forever", move |_ctx, done| {
                let cancel_runs = Arc::clone(&cancel_runs);
                done.on_cancel(move || {
                    cancel_runs.fetch_add(1, Ordering::SeqCst);
                });
                let late_settle_accepted = Arc::clone(&late_settle_accepted);
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(100));
                    if done.succeed(vec![json!("too late")]) {
                        late_settle_accepted.fetch_add(1, Ordering::SeqCst);
                    }
                });
            })
            .returns(ReturnSpec::root(ArgType::Any)),
        ));
    }
    let method = common::descriptor(&registry, "slow.forever");
    let dispatcher = dispatcher_for(registry);

    let token = CancelToken::new();
    {
        let token = token.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            token.cancel();
        });
    }

    let reply = dispatcher.dispatch(
        method,
        RequestContext::new(http::Method::POST, "/slow/forever"),
        &token,
    );
    assert!(reply.is_none());
    assert_eq!(cancel_runs.load(Ordering::SeqCst), 1);

    // The deferred settle after cancellation is suppressed.
    thread::sleep(Duration::from_millis(120));
    assert_eq!(late_settle_accepted.load(Ordering::SeqCst), 0);
    // Cancelling again is a no-op.
    token.cancel();
    assert_eq!(cancel_runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_cancel_before_invoking_cancels_at_arm_time() {
    let invoked = Arc::new(AtomicUsize::new(0));
    let mut registry = Registry::new();
    {
        let invoked = Arc::clone(&invoked);
        registry.define(SharedClass::new("slow").method(SharedMethod::new(
            "forever",
            move |_ctx, done| {
                invoked.fetch_add(1, Ordering::SeqCst);
                // Keep the handle alive; never settle.
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(50));
                    drop(done);
                });
            },
        )));
    }
    let method = common::descriptor(&registry, "slow.forever");
    let dispatcher = dispatcher_for(registry);

    let token = CancelToken::new();
    token.cancel();
    let reply = dispatcher.dispatch(
        method,
        RequestContext::new(http::Method::POST, "/slow/forever"),
        &token,
    );
    assert!(reply.is_none());
    // The method body never ran.
    assert_eq!(invoked.load(Ordering::SeqCst), 0);
}

#[test]
fn test_cancel_after_completion_is_a_noop() {
    let cancel_runs = Arc::new(AtomicUsize::new(0));
    let mut registry = Registry::new();
    {
        let cancel_runs = Arc::clone(&cancel_runs);
        registry.define(SharedClass::new("quick").method(
            SharedMethod::new("now", move |_ctx, done| {
                let cancel_runs = Arc::clone(&cancel_runs);
                done.on_cancel(move || {
                    cancel_runs.fetch_add(1, Ordering::SeqCst);
                });
                done.succeed(vec![json!("done")]);
            })
            .returns(ReturnSpec::root(ArgType::Any)),
        ));
    }
    let method = common::descriptor(&registry, "quick.now");
    let dispatcher = dispatcher_for(registry);

    let token = CancelToken::new();
    let reply = dispatcher.dispatch(
        method,
        RequestContext::new(http::Method::POST, "/quick/now"),
        &token,
    );
    assert_eq!(reply.expect("reply").body, Some(json!("done")));

    token.cancel();
    assert_eq!(cancel_runs.load(Ordering::SeqCst), 0);
}

#[test]
fn test_double_settle_reports_false() {
    let second_accepted = Arc::new(AtomicUsize::new(0));
    let mut registry = Registry::new();
    {
        let second_accepted = Arc::clone(&second_accepted);
        registry.define(SharedClass::new("quick").method(
            SharedMethod::new("twice", move |_ctx, done| {
                assert!(done.succeed(vec![json!(1)]));
                if done.succeed(vec![json!(2)]) {
                    second_accepted.fetch_add(1, Ordering::SeqCst);
                }
                assert!(!done.fail("also late"));
            })
            .returns(ReturnSpec::root(ArgType::Any)),
        ));
    }
    let method = common::descriptor(&registry, "quick.twice");
    let dispatcher = dispatcher_for(registry);

    let reply = dispatcher
        .dispatch(
            method,
            RequestContext::new(http::Method::POST, "/quick/twice"),
            &CancelToken::new(),
        )
        .expect("reply");
    assert_eq!(reply.body, Some(json!(1)));
    assert_eq!(second_accepted.load(Ordering::SeqCst), 0);
}

#[test]
fn test_dropped_completion_is_a_method_error() {
    let mut registry = Registry::new();
    registry.define(SharedClass::new("broken").method(SharedMethod::new(
        "forgets",
        |_ctx, _done| {
            // Handler returns without settling; the handle drops here.
        },
    )));
    let method = common::descriptor(&registry, "broken.forgets");
    let dispatcher = dispatcher_for(registry);

    let reply = dispatcher
        .dispatch(
            method,
            RequestContext::new(http::Method::POST, "/broken/forgets"),
            &CancelToken::new(),
        )
        .expect("reply");
    assert_eq!(reply.status, 500);
}

#[test]
fn test_no_returns_is_204() {
    let registry = common::fixture_registry();
    let method = common::descriptor(&registry, "testClass.ping");
    let dispatcher = dispatcher_for(registry);

    let reply = dispatcher
        .dispatch(
            method,
            get_request("/testClass/ping", &[]),
            &CancelToken::new(),
        )
        .expect("reply");
    assert_eq!(reply.status, 204);
    assert!(reply.body.is_none());
}
