//! Session change feed over server-sent events.
//!
//! Every SSE `data` payload carries one JSON [`ChangeEvent`]. Blank payloads
//! are keep-alives and are skipped.

use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::Response;

use crate::error::{BackendError, Result};
use crate::feed::{ChangeEvent, ChangeStream};

/// Decode one SSE payload. Keep-alive comments and blank data are skipped.
pub(crate) fn parse_change_data(data: &str) -> Result<Option<ChangeEvent>> {
    let data = data.trim();
    if data.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(data)?))
}

/// Turn the body of a change feed response into a [`ChangeStream`].
///
/// Transport and decoding failures are yielded as [`BackendError::Stream`].
pub(crate) fn change_stream_from_sse(response: Response) -> ChangeStream {
    let stream = response
        .bytes_stream()
        .eventsource()
        .filter_map(|event| async move {
            let decoded = match event {
                Ok(event) => parse_change_data(&event.data),
                Err(e) => return Some(Err(BackendError::Stream(e.to_string()))),
            };
            decoded
                .map_err(|e| BackendError::Stream(e.to_string()))
                .transpose()
        });

    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::ChangeKind;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn sse_response(body: &'static str) -> (MockServer, Response) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sse"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(&server)
            .await;

        let response = reqwest::Client::new()
            .get(format!("{}/sse", server.uri()))
            .send()
            .await
            .expect("response");
        (server, response)
    }

    #[test]
    fn test_parse_change_data_skips_blank() {
        assert!(parse_change_data("  ").unwrap().is_none());
        let change = parse_change_data(r#"{"type":"added","doc":{"id":"s1"}}"#)
            .unwrap()
            .unwrap();
        assert_eq!(change.kind, ChangeKind::Added);
    }

    #[tokio::test]
    async fn test_stream_decodes_changes_and_reports_bad_payloads() {
        let (_server, response) = sse_response(concat!(
            "data: {\"type\":\"modified\",\"doc\":{\"id\":\"s1\",\"messages\":[]}}\n",
            "\n",
            ": keep-alive\n",
            "\n",
            "data: not-json\n",
            "\n",
        ))
        .await;

        let mut stream = change_stream_from_sse(response);

        let first = stream.next().await.expect("first item").expect("change");
        assert_eq!(first.kind, ChangeKind::Modified);
        assert_eq!(first.doc.id, "s1");

        match stream.next().await {
            Some(Err(BackendError::Stream(msg))) => assert!(msg.contains("JSON error")),
            other => panic!("expected stream error, got {other:?}"),
        }
        assert!(stream.next().await.is_none());
    }
}
