//! Reply serialization onto the raw HTTP response.

use crate::error::RemoteError;
use crate::response::{error_reply, Reply};
use may_minihttp::Response;

fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        _ => "OK",
    }
}

/// Write one reply. A `None` body writes status only (204); everything else
/// is JSON regardless of what the client's `Accept` header asked for.
pub fn write_reply(res: &mut Response, reply: &Reply) {
    res.status_code(reply.status as usize, status_reason(reply.status));
    if let Some(body) = &reply.body {
        res.header("Content-Type: application/json");
        res.body_vec(body.to_string().into_bytes());
    }
}

/// Write a translated failure with the standard envelope.
pub fn write_error(res: &mut Response, err: &RemoteError) {
    write_reply(res, &error_reply(err));
}
