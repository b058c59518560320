//! Streaming relay: upstream text fragments in, SSE frames out.
//!
//! The upstream call is opened inside the returned stream, after the SSE
//! headers have been committed, so every upstream failure is reported
//! in-band as a single `{"error": ...}` frame followed by end of stream.

use axum::response::sse::Event;
use futures::{Stream, StreamExt};
use serde::Serialize;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::coach::{quote_message, Coach};

/// Payload of one `data:` line
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RelayFrame {
    Text { text: String },
    Error { error: String },
}

/// Relay `text` through `coach`. Empty fragments are skipped; the stream
/// ends after the last fragment or after the first error frame.
pub fn relay(coach: Coach, text: String) -> impl Stream<Item = RelayFrame> + Send {
    let request_id = Uuid::new_v4();
    let mode = coach.mode;

    async_stream::stream! {
        info!(%request_id, coach = %mode, model = coach.model(), "Opening upstream chat");

        let session = coach.open_session();
        debug!(%request_id, history = session.history().len(), "Chat session opened");
        let mut fragments = match session.send_message_stream(&quote_message(&text)).await {
            Ok(fragments) => fragments,
            Err(e) => {
                error!(%request_id, coach = %mode, kind = e.kind(), "Upstream chat failed: {}", e);
                yield RelayFrame::Error { error: e.to_string() };
                return;
            }
        };

        let mut relayed = 0usize;
        while let Some(item) = fragments.next().await {
            match item {
                Ok(fragment) if fragment.is_empty() => continue,
                Ok(fragment) => {
                    relayed += 1;
                    debug!(%request_id, len = fragment.len(), "Relaying fragment");
                    yield RelayFrame::Text { text: fragment };
                }
                Err(e) => {
                    error!(
                        %request_id, coach = %mode, kind = e.kind(), relayed,
                        "Upstream stream failed: {}", e
                    );
                    yield RelayFrame::Error { error: e.to_string() };
                    return;
                }
            }
        }

        info!(%request_id, coach = %mode, relayed, "Upstream stream completed");
    }
}

/// Render frames as SSE events carrying a JSON `data` line.
pub fn into_sse_events<S>(frames: S) -> impl Stream<Item = Result<Event, axum::Error>> + Send
where
    S: Stream<Item = RelayFrame> + Send,
{
    frames.map(|frame| Event::default().json_data(frame))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::stateless_llm::scripted_llm::{Script, ScriptedLLM};
    use crate::agent::stateless_llm::{ChatTurn, StatelessLLMInterface};
    use crate::coach::CoachMode;
    use crate::config_manager::GenerationConfig;
    use std::sync::Arc;

    fn coach(llm: Arc<dyn StatelessLLMInterface>) -> Coach {
        Coach::new(CoachMode::Spanish, "prompt", llm, GenerationConfig::default(), true)
    }

    fn text(t: &str) -> RelayFrame {
        RelayFrame::Text { text: t.to_string() }
    }

    #[tokio::test]
    async fn relays_fragments_in_order_skipping_empty_ones() {
        let llm = Arc::new(ScriptedLLM::fragments(&["Hola", "", " mundo"]));
        let frames: Vec<RelayFrame> = relay(coach(llm.clone()), "hello".into()).collect().await;

        assert_eq!(frames, vec![text("Hola"), text(" mundo")]);

        let requests = llm.requests();
        let request = &requests[0];
        assert_eq!(
            request.contents,
            vec![ChatTurn::user("prompt"), ChatTurn::user("\"hello\"")]
        );
        assert_eq!(request.generation, GenerationConfig::default());
    }

    #[tokio::test]
    async fn open_failure_yields_single_error_frame() {
        let llm = Arc::new(ScriptedLLM::new(Script::FailToOpen("connection refused".into())));
        let frames: Vec<RelayFrame> = relay(coach(llm), "hello".into()).collect().await;

        assert_eq!(frames.len(), 1);
        match &frames[0] {
            RelayFrame::Error { error } => assert!(error.contains("connection refused")),
            other => panic!("expected error frame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn nothing_follows_a_mid_stream_error() {
        let llm = Arc::new(ScriptedLLM::new(Script::Items(vec![
            Ok("Hola".into()),
            Err("reset by peer".into()),
            Ok("never sent".into()),
        ])));
        let frames: Vec<RelayFrame> = relay(coach(llm), "hello".into()).collect().await;

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], text("Hola"));
        assert!(matches!(frames[1], RelayFrame::Error { .. }));
    }

    #[test]
    fn frames_serialize_to_single_key_objects() {
        assert_eq!(serde_json::to_string(&text("Hola")).unwrap(), r#"{"text":"Hola"}"#);
        let error = RelayFrame::Error { error: "boom".into() };
        assert_eq!(serde_json::to_string(&error).unwrap(), r#"{"error":"boom"}"#);
    }
}
