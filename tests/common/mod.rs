//! Shared fixtures for the integration tests: a fixture registry mirroring a
//! typical mounted class, plus a raw-TcpStream HTTP harness.

#![allow(dead_code)]

use restmount::registry::{
    ArgSpec, ArgType, Registry, ReturnSpec, RouteDef, SharedClass, SharedMethod, Verb,
};
use restmount::router::{MethodDescriptor, RouteBuilder};
use restmount::server::{HttpServer, RestService, ServerHandle, ServiceConfig};
use serde_json::json;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Duration;

/// Registry with one class exercising the common method shapes: named
/// returns, multi-returns, no returns, root objects, and path- and
/// body-sourced arguments.
pub fn fixture_registry() -> Registry {
    let mut registry = Registry::new();
    registry.define(
        SharedClass::new("testClass")
            .method(
                SharedMethod::new("testMethod", |ctx, done| {
                    done.succeed(vec![ctx.args[0].clone()]);
                })
                .http(RouteDef::new(Verb::Get, "/testMethod"))
                .accepts(ArgSpec::new("person", ArgType::String).required())
                .returns(ReturnSpec::new("msg", ArgType::String)),
            )
            .method(
                SharedMethod::new("pair", |ctx, done| {
                    done.succeed(vec![ctx.args[0].clone(), ctx.args[1].clone()]);
                })
                .http(RouteDef::new(Verb::Get, "/pair"))
                .accepts(ArgSpec::new("a", ArgType::Number))
                .accepts(ArgSpec::new("b", ArgType::Number))
                .returns(ReturnSpec::new("a", ArgType::Number))
                .returns(ReturnSpec::new("b", ArgType::Number)),
            )
            .method(
                SharedMethod::new("ping", |_ctx, done| {
                    done.succeed(Vec::new());
                })
                .http(RouteDef::new(Verb::Get, "/ping")),
            )
            .method(
                SharedMethod::new("search", |ctx, done| {
                    done.succeed(vec![json!({ "filter": ctx.args[0] })]);
                })
                .http(RouteDef::new(Verb::Get, "/search"))
                .accepts(ArgSpec::new("filter", ArgType::Object))
                .returns(ReturnSpec::root(ArgType::Object)),
            )
            .method(
                SharedMethod::new("sum", |ctx, done| {
                    let n = ctx.args[0].as_i64().unwrap_or(0) + ctx.args[1].as_i64().unwrap_or(0);
                    done.succeed(vec![json!(n)]);
                })
                .http(RouteDef::new(Verb::Get, "/sum/:a"))
                .accepts(
                    ArgSpec::new("a", ArgType::Number)
                        .from(restmount::ArgSource::Path)
                        .required(),
                )
                .accepts(ArgSpec::new("b", ArgType::Number))
                .returns(ReturnSpec::new("n", ArgType::Number)),
            )
            .method(
                SharedMethod::new("save", |ctx, done| {
                    done.succeed(vec![ctx.args[0].clone()]);
                })
                .http(RouteDef::new(Verb::Post, "/save"))
                .accepts(ArgSpec::new("note", ArgType::Object).from(restmount::ArgSource::Body))
                .returns(ReturnSpec::root(ArgType::Object)),
            ),
    );
    registry
}

/// Built descriptor lookup by full name.
pub fn descriptor(registry: &Registry, full_name: &str) -> Arc<MethodDescriptor> {
    let routes = RouteBuilder::build(registry).expect("route table");
    routes
        .iter()
        .map(|r| Arc::clone(&r.method))
        .find(|m| m.full_name == full_name)
        .unwrap_or_else(|| panic!("no method named {full_name}"))
}

pub fn start_service(registry: Registry) -> (ServerHandle, SocketAddr) {
    start_service_with_config(registry, ServiceConfig::default())
}

pub fn start_service_with_config(
    registry: Registry,
    config: ServiceConfig,
) -> (ServerHandle, SocketAddr) {
    let service = RestService::with_config(Arc::new(registry), config).expect("route table");
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let handle = HttpServer(service).start(addr).unwrap();
    handle.wait_ready().unwrap();
    (handle, addr)
}

pub fn send_request(addr: &SocketAddr, req: &str) -> String {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.write_all(req.as_bytes()).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_millis(200)))
        .unwrap();
    let mut buf = Vec::new();
    loop {
        let mut tmp = [0u8; 1024];
        match stream.read(&mut tmp) {
            Ok(0) => break,
            Ok(n) => buf.extend_from_slice(&tmp[..n]),
            Err(ref e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                break
            }
            Err(e) => panic!("read error: {:?}", e),
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}

/// Split a raw HTTP/1.1 response into (status, content-type, body).
pub fn parse_parts(resp: &str) -> (u16, String, String) {
    let mut parts = resp.splitn(2, "\r\n\r\n");
    let headers = parts.next().unwrap_or("");
    let body = parts.next().unwrap_or("").to_string();
    let mut status = 0;
    let mut content_type = String::new();
    for line in headers.lines() {
        if line.starts_with("HTTP/1.1") {
            status = line
                .split_whitespace()
                .nth(1)
                .unwrap_or("0")
                .parse()
                .unwrap();
        } else if let Some((name, val)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("content-type") {
                content_type = val.trim().to_string();
            }
        }
    }
    (status, content_type, body)
}
