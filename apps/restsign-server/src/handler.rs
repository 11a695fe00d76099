//! Demo handler echoing the verified request as JSON.

use restsign_auth::IncomingRequest;
use restsign_http::{HandlerFuture, RestError, RestHandler, RestResponseBody};
use serde_json::{Value, json};

/// Answers every verified request with a JSON description of what was received.
#[derive(Debug, Clone, Default)]
pub struct EchoHandler;

impl RestHandler for EchoHandler {
    fn handle(&self, _parts: http::request::Parts, request: IncomingRequest) -> HandlerFuture {
        Box::pin(async move {
            let body = serde_json::to_vec(&describe(&request))
                .map_err(|e| RestError::internal(format!("failed to encode response: {e}")))?;
            http::Response::builder()
                .status(http::StatusCode::OK)
                .header(http::header::CONTENT_TYPE, "application/json")
                .body(RestResponseBody::from_bytes(body))
                .map_err(|e| RestError::internal(e.to_string()))
        })
    }
}

fn describe(request: &IncomingRequest) -> Value {
    let params: serde_json::Map<String, Value> = request
        .params
        .iter()
        .map(|(name, values)| (name.clone(), json!(values)))
        .collect();
    let files: Vec<Value> = request
        .files
        .iter()
        .flat_map(|(field, files)| {
            files.iter().map(move |file| {
                json!({
                    "field": field,
                    "fileName": file.file_name,
                    "size": file.data.len(),
                })
            })
        })
        .collect();

    json!({
        "method": request.method,
        "url": request.url,
        "params": params,
        "files": files,
    })
}
