//! Per-argument source extraction.

use super::coerce::coerce;
use crate::dispatcher::InvocationContext;
use crate::error::RemoteError;
use crate::registry::{ArgSource, ArgSpec};
use serde_json::Value;
use tracing::debug;

/// Resolve the full argument vector for one invocation, in `accepts`
/// declaration order.
///
/// Each spec is extracted from its declared source and coerced to its
/// declared type. A missing required argument is the caller's fault
/// (validation, 400); a supplied value that will not coerce is a metadata or
/// transport mismatch (coercion, 500). A missing optional argument resolves
/// to `Null`, the absence marker handlers test against.
pub fn resolve_arguments(ctx: &InvocationContext) -> Result<Vec<Value>, RemoteError> {
    let mut args = Vec::with_capacity(ctx.method.accepts.len());
    for spec in &ctx.method.accepts {
        let raw = extract(ctx, spec);
        let resolved = match raw {
            None => {
                if spec.required {
                    return Err(RemoteError::validation(format!(
                        "argument `{}` is required",
                        spec.name
                    )));
                }
                Value::Null
            }
            Some(value) => coerce(value, spec.ty, is_stringly(&spec.source)).map_err(|msg| {
                RemoteError::coercion(format!("argument `{}`: {}", spec.name, msg))
            })?,
        };
        debug!(
            request_id = %ctx.request_id,
            method = %ctx.method.full_name,
            arg = %spec.name,
            source = ?spec.source,
            value = %resolved,
            "Argument resolved"
        );
        args.push(resolved);
    }
    Ok(args)
}

/// Pull the raw value from the argument's declared source. `None` means "not supplied";
/// a custom function signals the same by returning `Null`.
fn extract(ctx: &InvocationContext, spec: &ArgSpec) -> Option<Value> {
    match &spec.source {
        ArgSource::Path => ctx
            .request
            .get_path_param(&spec.name)
            .map(|v| Value::String(v.to_string())),
        ArgSource::Query => ctx.request.query.get(&spec.name).cloned(),
        ArgSource::Body => ctx.request.body.clone(),
        ArgSource::Header => ctx
            .request
            .get_header(&spec.name)
            .map(|v| Value::String(v.to_string())),
        ArgSource::Request => Some(ctx.request.snapshot()),
        ArgSource::Context => Some(ctx.snapshot()),
        ArgSource::Custom(f) => match f(ctx) {
            Value::Null => None,
            value => Some(value),
        },
    }
}

/// Sources whose values arrive URL-encoded and therefore stringly typed.
fn is_stringly(source: &ArgSource) -> bool {
    matches!(
        source,
        ArgSource::Path | ArgSource::Query | ArgSource::Header
    )
}
