//! # Response Module
//!
//! Shapes produced results (or a failure) into the status + JSON body pair
//! the hosting layer writes out.
//!
//! Three success shapes, decided by the method's declared returns:
//! no returns means 204 with no body; a sole root return means the produced
//! value *is* the body; anything else zips the declared names against the
//! produced values positionally into a JSON object.

use crate::error::RemoteError;
use crate::router::MethodDescriptor;
use serde_json::{Map, Value};

/// One outbound response: status plus optional JSON body. `None` body writes
/// no payload at all (204).
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub body: Option<Value>,
}

/// Shape a settled invocation's results.
///
/// Positional zip: the i-th return spec names the i-th result. Positions the
/// method did not produce are omitted from the body; an explicit `null`
/// result is kept.
#[must_use]
pub fn method_reply(method: &MethodDescriptor, results: &[Value]) -> Reply {
    if method.returns.is_empty() {
        return Reply {
            status: 204,
            body: None,
        };
    }

    if let [only] = method.returns.as_slice() {
        if only.root {
            return Reply {
                status: 200,
                body: Some(results.first().cloned().unwrap_or(Value::Null)),
            };
        }
    }

    let mut body = Map::new();
    for (i, spec) in method.returns.iter().enumerate() {
        if let Some(value) = results.get(i) {
            body.insert(spec.name.clone(), value.clone());
        }
    }
    Reply {
        status: 200,
        body: Some(Value::Object(body)),
    }
}

/// Shape a translated failure: the error's status and its standard envelope.
#[must_use]
pub fn error_reply(err: &RemoteError) -> Reply {
    Reply {
        status: err.status_code(),
        body: Some(err.body()),
    }
}
