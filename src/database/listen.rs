use super::DatabaseError;
use bytes::{Bytes, BytesMut};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::pin::Pin;
use std::task::{Context, Poll};

/// One server-sent event from the streaming REST endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEvent {
    pub name: String,
    pub data: String,
}

/// A stream of `ServerEvent` messages parsed from the chunked response body.
pub struct EventStream {
    inner: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>,
    buffer: BytesMut,
}

impl EventStream {
    pub fn new(inner: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>) -> Self {
        Self {
            inner,
            buffer: BytesMut::new(),
        }
    }
}

impl Stream for EventStream {
    type Item = Result<ServerEvent, DatabaseError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            // 1. Try to cut a complete event block (terminated by a blank
            //    line) out of the buffer.
            if let Some(len) = find_event_boundary(&self.buffer) {
                let block = self.buffer.split_to(len);
                match parse_event(&block) {
                    Some(event) => return Poll::Ready(Some(Ok(event))),
                    // Comment-only or empty block between events.
                    None => continue,
                }
            }

            // 2. If no complete block, poll the underlying stream for more bytes.
            match self.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    self.buffer.extend_from_slice(&chunk);
                    // Loop back to try parsing again
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(DatabaseError::RequestError(e))));
                }
                Poll::Ready(None) => {
                    // End of stream. A trailing block without the final blank
                    // line is still delivered.
                    if !self.buffer.is_empty() {
                        let block = self.buffer.split();
                        if let Some(event) = parse_event(&block) {
                            return Poll::Ready(Some(Ok(event)));
                        }
                    }
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Finds the length of the first complete event block (up to and including
/// its terminating blank line) in the buffer.
fn find_event_boundary(buf: &[u8]) -> Option<usize> {
    let mut i = 0;
    while i + 1 < buf.len() {
        if buf[i] == b'\n' {
            // "\n\n" or "\n\r\n"
            if buf[i + 1] == b'\n' {
                return Some(i + 2);
            }
            if buf[i + 1] == b'\r' && i + 2 < buf.len() && buf[i + 2] == b'\n' {
                return Some(i + 3);
            }
        }
        i += 1;
    }
    None
}

/// Parses one event block into a `ServerEvent`.
///
/// Returns `None` for blocks carrying neither an event name nor data
/// (comments, stray blank lines).
fn parse_event(block: &[u8]) -> Option<ServerEvent> {
    let text = String::from_utf8_lossy(block);
    let mut name = None;
    let mut data_lines = Vec::new();

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(rest) = line.strip_prefix("event:") {
            name = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }

    let name = name?;
    Some(ServerEvent {
        name,
        data: data_lines.join("\n"),
    })
}

#[derive(Debug, Deserialize)]
struct ChangeBody {
    path: String,
    data: Value,
}

pub(crate) enum Applied {
    Changed,
    Ignored,
}

/// Applies one server event to the local tree.
///
/// `put` replaces the value at the event path, `patch` merges children into
/// it. `keep-alive` is a no-op; `cancel` and `auth_revoked` terminate the
/// listen with an error.
pub(crate) fn apply_event(tree: &mut Value, event: &ServerEvent) -> Result<Applied, DatabaseError> {
    match event.name.as_str() {
        "put" => {
            let body: ChangeBody = serde_json::from_str(&event.data)?;
            apply_put(tree, &body.path, body.data);
            Ok(Applied::Changed)
        }
        "patch" => {
            let body: ChangeBody = serde_json::from_str(&event.data)?;
            apply_patch(tree, &body.path, body.data);
            Ok(Applied::Changed)
        }
        "keep-alive" => Ok(Applied::Ignored),
        "cancel" => Err(DatabaseError::ApiError(
            "listen cancelled by server".to_string(),
        )),
        "auth_revoked" => Err(DatabaseError::ApiError(
            "listen credential is no longer valid".to_string(),
        )),
        other => {
            tracing::debug!(event = %other, "ignoring unknown server event");
            Ok(Applied::Ignored)
        }
    }
}

fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Replaces the value at `path`; a `null` value removes the location.
pub(crate) fn apply_put(tree: &mut Value, path: &str, data: Value) {
    let segments = split_path(path);
    if segments.is_empty() {
        *tree = data;
        return;
    }
    if data.is_null() {
        remove_at(tree, &segments);
    } else {
        *node_at(tree, &segments) = data;
    }
}

/// Merges each child of `data` into the object at `path`; `null` children
/// remove their key.
pub(crate) fn apply_patch(tree: &mut Value, path: &str, data: Value) {
    let Value::Object(fields) = data else {
        return;
    };
    let segments = split_path(path);
    let node = node_at(tree, &segments);
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        for (key, child) in fields {
            if child.is_null() {
                map.remove(&key);
            } else {
                map.insert(key, child);
            }
        }
    }
}

/// Descends to `segments`, creating intermediate objects as needed.
fn node_at<'a>(tree: &'a mut Value, segments: &[&str]) -> &'a mut Value {
    let mut current = tree;
    for segment in segments {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        match current {
            Value::Object(map) => {
                current = map.entry((*segment).to_string()).or_insert(Value::Null);
            }
            _ => unreachable!("parent was just coerced to an object"),
        }
    }
    current
}

fn remove_at(tree: &mut Value, segments: &[&str]) {
    let Some((last, parents)) = segments.split_last() else {
        *tree = Value::Null;
        return;
    };
    let mut current = tree;
    for segment in parents {
        match current.get_mut(*segment) {
            Some(next) => current = next,
            None => return,
        }
    }
    if let Value::Object(map) = current {
        map.remove(*last);
    }
}

/// Folds an event stream into a stream of full materialized snapshots.
///
/// Every applied change emits a clone of the whole tree, so downstream
/// consumers never see a partially applied state.
pub fn snapshots(events: EventStream) -> impl Stream<Item = Result<Value, DatabaseError>> + Send {
    stream::unfold(
        (events, Value::Null, false),
        |(mut events, mut tree, failed)| async move {
            if failed {
                return None;
            }
            loop {
                match events.next().await {
                    Some(Ok(event)) => match apply_event(&mut tree, &event) {
                        Ok(Applied::Changed) => {
                            let snapshot = tree.clone();
                            return Some((Ok(snapshot), (events, tree, false)));
                        }
                        Ok(Applied::Ignored) => continue,
                        Err(e) => return Some((Err(e), (events, tree, true))),
                    },
                    Some(Err(e)) => return Some((Err(e), (events, tree, true))),
                    None => return None,
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_find_event_boundary() {
        // Complete block
        let buf = b"event: put\ndata: {}\n\n";
        assert_eq!(find_event_boundary(buf), Some(21));

        // Incomplete block
        let buf = b"event: put\ndata: {}";
        assert_eq!(find_event_boundary(buf), None);

        // CRLF separators
        let buf = b"event: put\r\ndata: {}\r\n\r\n";
        assert_eq!(find_event_boundary(buf), Some(24));

        // Finds the first of several blocks
        let buf = b"event: a\ndata: 1\n\nevent: b\ndata: 2\n\n";
        assert_eq!(find_event_boundary(buf), Some(18));
    }

    #[test]
    fn test_parse_event() {
        let event = parse_event(b"event: put\ndata: {\"path\":\"/\",\"data\":null}\n\n");
        assert_eq!(
            event,
            Some(ServerEvent {
                name: "put".to_string(),
                data: "{\"path\":\"/\",\"data\":null}".to_string(),
            })
        );

        // Multi-line data joins with newlines
        let event = parse_event(b"event: put\ndata: {\ndata: }\n\n");
        assert_eq!(event.map(|e| e.data), Some("{\n}".to_string()));

        // No event name
        assert_eq!(parse_event(b": comment\n\n"), None);
    }

    #[test]
    fn test_apply_put_and_patch() {
        let mut tree = Value::Null;

        apply_put(&mut tree, "/", json!({"a": {"id": "a"}}));
        assert_eq!(tree, json!({"a": {"id": "a"}}));

        // Put at a nested path creates intermediate objects
        apply_put(&mut tree, "/b/id", json!("b"));
        assert_eq!(tree, json!({"a": {"id": "a"}, "b": {"id": "b"}}));

        // Patch merges without clobbering siblings
        apply_patch(&mut tree, "/a", json!({"title": "Rust"}));
        assert_eq!(tree["a"], json!({"id": "a", "title": "Rust"}));

        // Null put removes the location
        apply_put(&mut tree, "/b", Value::Null);
        assert_eq!(tree, json!({"a": {"id": "a", "title": "Rust"}}));

        // Null patch child removes that key only
        apply_patch(&mut tree, "/a", json!({"title": null}));
        assert_eq!(tree, json!({"a": {"id": "a"}}));
    }

    #[test]
    fn test_apply_event_terminal_events() {
        let mut tree = Value::Null;
        let cancel = ServerEvent {
            name: "cancel".to_string(),
            data: "null".to_string(),
        };
        assert!(apply_event(&mut tree, &cancel).is_err());

        let keep_alive = ServerEvent {
            name: "keep-alive".to_string(),
            data: "null".to_string(),
        };
        assert!(matches!(
            apply_event(&mut tree, &keep_alive),
            Ok(Applied::Ignored)
        ));
    }
}
