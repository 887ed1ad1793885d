use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;

type Handler = fn(&mut AppState, &Request) -> Option<serde_json::Value>;

const HANDLERS: &[Handler] = &[
    handlers::core::try_handle,
    handlers::setup::try_handle,
    handlers::sheets::try_handle,
    handlers::storage::try_handle,
    handlers::lessons::try_handle,
    handlers::roster::try_handle,
    handlers::backup::try_handle,
];

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    let span = tracing::debug_span!("request", id = %req.id, method = %req.method);
    let _entered = span.enter();

    for handler in HANDLERS {
        if let Some(resp) = handler(state, &req) {
            if resp.get("ok").and_then(|v| v.as_bool()) == Some(false) {
                tracing::debug!(error = %resp["error"], "request failed");
            }
            return resp;
        }
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
