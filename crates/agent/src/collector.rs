//! The stream state machine.
//!
//! A `StreamCollector` consumes the provider's ordered event sequence and
//! incrementally assembles response text, reasoning text, and tool-call
//! argument buffers. Consumption is single-threaded and cooperative: one
//! event is fully processed before the next.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::mem;
use tokio::time::{Duration, Instant};
use tracing::{trace, warn};
use vireo_core::provider::{BlockKind, ProviderEvent, Usage};
use vireo_core::tool::ToolCall;

/// How long text immediately following the first token is held back, so
/// the UI gets one coherent opening chunk instead of a jittery burst of
/// one-character updates. After the first flush every text delta is
/// emitted immediately.
const OPENING_FLUSH_DELAY: Duration = Duration::from_millis(200);

/// A visible delta surfaced to the progress channel while streaming.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamDelta {
    Text(String),
    Thinking(String),
}

/// The in-progress accumulation of one tool call's name/id/arguments.
#[derive(Debug, Clone)]
struct ToolCallFragment {
    id: String,
    name: String,
    partial_json: String,
}

/// Snapshot of the turn so far, for live progress display.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialStep {
    pub text: String,
    pub thinking: String,
    pub pending_tools: Vec<String>,
}

/// The finalized content of one provider turn.
#[derive(Debug, Clone)]
pub struct CollectedTurn {
    pub text: String,
    pub thinking: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Usage,
}

impl CollectedTurn {
    /// Whether this turn requested tool calls (an intermediate turn) or is
    /// a final answer.
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Incremental assembler for one in-flight turn.
pub struct StreamCollector {
    text: String,
    thinking: String,
    open: BTreeMap<usize, ToolCallFragment>,
    finalized: Vec<ToolCall>,
    pending_text: String,
    first_text_at: Option<Instant>,
    opening_flushed: bool,
}

impl StreamCollector {
    pub fn new() -> Self {
        Self {
            text: String::new(),
            thinking: String::new(),
            open: BTreeMap::new(),
            finalized: Vec::new(),
            pending_text: String::new(),
            first_text_at: None,
            opening_flushed: false,
        }
    }

    /// Consume one event, returning the visible deltas to surface.
    ///
    /// Usually zero or one delta; a non-text event that flushes the opening
    /// buffer can produce two.
    pub fn handle(&mut self, event: ProviderEvent) -> Vec<StreamDelta> {
        match event {
            ProviderEvent::TextDelta { text } => self.on_text(text),
            ProviderEvent::ThinkingDelta { text } => {
                let mut deltas = self.flush_opening();
                self.thinking.push_str(&text);
                deltas.push(StreamDelta::Thinking(text));
                deltas
            }
            ProviderEvent::BlockStart { index, kind } => {
                let deltas = self.flush_opening();
                if let BlockKind::ToolUse { id, name } = kind {
                    self.open.insert(
                        index,
                        ToolCallFragment {
                            id,
                            name,
                            partial_json: String::new(),
                        },
                    );
                }
                deltas
            }
            ProviderEvent::ToolArgsDelta {
                index,
                partial_json,
            } => {
                let deltas = self.flush_opening();
                match self.open.get_mut(&index) {
                    Some(fragment) => fragment.partial_json.push_str(&partial_json),
                    None => trace!(index, "Ignoring argument delta with no open tool block"),
                }
                deltas
            }
            ProviderEvent::BlockStop { index } => {
                let deltas = self.flush_opening();
                if let Some(fragment) = self.open.remove(&index) {
                    self.finalized.push(finalize_fragment(fragment));
                }
                deltas
            }
            // Unknown event kinds must not fail the turn.
            ProviderEvent::Other => self.flush_opening(),
        }
    }

    fn on_text(&mut self, text: String) -> Vec<StreamDelta> {
        self.text.push_str(&text);
        if self.opening_flushed {
            return vec![StreamDelta::Text(text)];
        }
        match self.first_text_at {
            None => {
                self.first_text_at = Some(Instant::now());
                self.pending_text.push_str(&text);
                Vec::new()
            }
            Some(first) if first.elapsed() < OPENING_FLUSH_DELAY => {
                self.pending_text.push_str(&text);
                Vec::new()
            }
            Some(_) => {
                self.opening_flushed = true;
                self.pending_text.push_str(&text);
                vec![StreamDelta::Text(mem::take(&mut self.pending_text))]
            }
        }
    }

    fn flush_opening(&mut self) -> Vec<StreamDelta> {
        if !self.opening_flushed && !self.pending_text.is_empty() {
            self.opening_flushed = true;
            vec![StreamDelta::Text(mem::take(&mut self.pending_text))]
        } else {
            Vec::new()
        }
    }

    /// Whether the turn contains tool calls, re-evaluated from finalized
    /// and still-open fragments at the moment of the call. A turn may
    /// start text-only and flip to intermediate when a tool block opens.
    pub fn has_tool_calls(&self) -> bool {
        !self.finalized.is_empty() || !self.open.is_empty()
    }

    /// Snapshot of the turn so far.
    pub fn partial(&self) -> PartialStep {
        let mut pending_tools: Vec<String> =
            self.finalized.iter().map(|c| c.name.clone()).collect();
        pending_tools.extend(self.open.values().map(|f| f.name.clone()));
        PartialStep {
            text: self.text.clone(),
            thinking: self.thinking.clone(),
            pending_tools,
        }
    }

    /// Finalize the turn once the event sequence has ended, attaching the
    /// usage totals that arrive out-of-band. Any still-open fragments are
    /// finalized with whatever arguments accumulated so far.
    pub fn finish(mut self, usage: Usage) -> CollectedTurn {
        for (_, fragment) in mem::take(&mut self.open) {
            self.finalized.push(finalize_fragment(fragment));
        }
        CollectedTurn {
            text: self.text,
            thinking: self.thinking,
            tool_calls: self.finalized,
            usage,
        }
    }
}

impl Default for StreamCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a fragment's accumulated JSON into the call's argument object.
/// Malformed arguments are a tool-execution-time concern, not a stream
/// failure: the call proceeds with an empty argument map.
fn finalize_fragment(fragment: ToolCallFragment) -> ToolCall {
    let raw = fragment.partial_json.trim();
    let arguments: Map<String, Value> = if raw.is_empty() {
        Map::new()
    } else {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                warn!(
                    tool = %fragment.name,
                    call_id = %fragment.id,
                    "Tool arguments are not a JSON object, using empty arguments"
                );
                Map::new()
            }
            Err(error) => {
                warn!(
                    tool = %fragment.name,
                    call_id = %fragment.id,
                    error = %error,
                    "Malformed tool-argument JSON, using empty arguments"
                );
                Map::new()
            }
        }
    };
    ToolCall {
        id: fragment.id,
        name: fragment.name,
        arguments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool_start(index: usize, id: &str, name: &str) -> ProviderEvent {
        ProviderEvent::BlockStart {
            index,
            kind: BlockKind::ToolUse {
                id: id.into(),
                name: name.into(),
            },
        }
    }

    fn args_delta(index: usize, json: &str) -> ProviderEvent {
        ProviderEvent::ToolArgsDelta {
            index,
            partial_json: json.into(),
        }
    }

    fn drain(collector: &mut StreamCollector, events: Vec<ProviderEvent>) -> Vec<StreamDelta> {
        events
            .into_iter()
            .flat_map(|e| collector.handle(e))
            .collect()
    }

    #[tokio::test]
    async fn text_only_stream_is_a_final_answer() {
        let mut collector = StreamCollector::new();
        drain(
            &mut collector,
            vec![
                ProviderEvent::BlockStart {
                    index: 0,
                    kind: BlockKind::Text,
                },
                ProviderEvent::TextDelta {
                    text: "Hello ".into(),
                },
                ProviderEvent::TextDelta {
                    text: "world".into(),
                },
                ProviderEvent::BlockStop { index: 0 },
            ],
        );
        assert!(!collector.has_tool_calls());

        let turn = collector.finish(Usage {
            input_tokens: 7,
            output_tokens: 2,
        });
        assert!(!turn.has_tool_calls());
        assert_eq!(turn.text, "Hello world");
        assert_eq!(turn.usage.output_tokens, 2);
    }

    #[tokio::test]
    async fn tool_arguments_assemble_across_deltas() {
        let mut collector = StreamCollector::new();
        drain(
            &mut collector,
            vec![
                tool_start(0, "toolu_01", "web_search"),
                args_delta(0, r#"{"que"#),
                args_delta(0, r#"ry": "rust"}"#),
                ProviderEvent::BlockStop { index: 0 },
            ],
        );

        let turn = collector.finish(Usage::default());
        assert_eq!(turn.tool_calls.len(), 1);
        let call = &turn.tool_calls[0];
        assert_eq!(call.id, "toolu_01");
        assert_eq!(call.name, "web_search");
        assert_eq!(call.arguments.get("query"), Some(&Value::String("rust".into())));
    }

    #[tokio::test]
    async fn malformed_arguments_default_to_empty_and_turn_proceeds() {
        let mut collector = StreamCollector::new();
        drain(
            &mut collector,
            vec![
                tool_start(0, "toolu_02", "web_search"),
                args_delta(0, r#"{"query": "rus"#),
                ProviderEvent::BlockStop { index: 0 },
            ],
        );

        assert!(collector.has_tool_calls());
        let turn = collector.finish(Usage::default());
        assert_eq!(turn.tool_calls.len(), 1);
        assert!(turn.tool_calls[0].arguments.is_empty());
        assert!(turn.has_tool_calls());
    }

    #[tokio::test]
    async fn classification_flips_when_a_tool_block_opens() {
        let mut collector = StreamCollector::new();
        collector.handle(ProviderEvent::TextDelta {
            text: "Let me check.".into(),
        });
        assert!(!collector.has_tool_calls());

        collector.handle(tool_start(1, "toolu_03", "calculator"));
        assert!(collector.has_tool_calls());
    }

    #[tokio::test]
    async fn unknown_events_are_ignored() {
        let mut collector = StreamCollector::new();
        collector.handle(ProviderEvent::Other);
        collector.handle(ProviderEvent::BlockStart {
            index: 0,
            kind: BlockKind::Other,
        });
        collector.handle(ProviderEvent::BlockStop { index: 0 });
        collector.handle(ProviderEvent::TextDelta { text: "ok".into() });

        let turn = collector.finish(Usage::default());
        assert_eq!(turn.text, "ok");
        assert!(turn.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn interleaved_tool_blocks_finalize_independently() {
        let mut collector = StreamCollector::new();
        drain(
            &mut collector,
            vec![
                tool_start(0, "toolu_a", "alpha"),
                tool_start(1, "toolu_b", "beta"),
                args_delta(1, r#"{"n": 2}"#),
                args_delta(0, r#"{"n": 1}"#),
                ProviderEvent::BlockStop { index: 0 },
                ProviderEvent::BlockStop { index: 1 },
            ],
        );

        let turn = collector.finish(Usage::default());
        assert_eq!(turn.tool_calls.len(), 2);
        assert_eq!(turn.tool_calls[0].id, "toolu_a");
        assert_eq!(turn.tool_calls[0].arguments.get("n"), Some(&Value::from(1)));
        assert_eq!(turn.tool_calls[1].id, "toolu_b");
        assert_eq!(turn.tool_calls[1].arguments.get("n"), Some(&Value::from(2)));
    }

    #[tokio::test]
    async fn finish_finalizes_still_open_fragments() {
        let mut collector = StreamCollector::new();
        drain(
            &mut collector,
            vec![
                tool_start(0, "toolu_04", "web_search"),
                args_delta(0, r#"{"query": "rust"}"#),
                // Stream ends without a block stop.
            ],
        );

        let turn = collector.finish(Usage::default());
        assert_eq!(turn.tool_calls.len(), 1);
        assert_eq!(
            turn.tool_calls[0].arguments.get("query"),
            Some(&Value::String("rust".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn opening_text_is_buffered_then_flushed_as_one_unit() {
        let mut collector = StreamCollector::new();

        assert!(
            collector
                .handle(ProviderEvent::TextDelta { text: "He".into() })
                .is_empty()
        );
        assert!(
            collector
                .handle(ProviderEvent::TextDelta { text: "llo".into() })
                .is_empty()
        );

        tokio::time::advance(Duration::from_millis(250)).await;

        let deltas = collector.handle(ProviderEvent::TextDelta { text: "!".into() });
        assert_eq!(deltas, vec![StreamDelta::Text("Hello!".into())]);

        // After the initial flush, deltas pass through immediately.
        let deltas = collector.handle(ProviderEvent::TextDelta { text: " hi".into() });
        assert_eq!(deltas, vec![StreamDelta::Text(" hi".into())]);
    }

    #[tokio::test]
    async fn first_non_text_event_flushes_the_opening_buffer() {
        let mut collector = StreamCollector::new();
        assert!(
            collector
                .handle(ProviderEvent::TextDelta { text: "Sure".into() })
                .is_empty()
        );

        let deltas = collector.handle(tool_start(1, "toolu_05", "calculator"));
        assert_eq!(deltas, vec![StreamDelta::Text("Sure".into())]);
    }

    #[tokio::test]
    async fn partial_snapshot_reflects_progress() {
        let mut collector = StreamCollector::new();
        drain(
            &mut collector,
            vec![
                ProviderEvent::ThinkingDelta {
                    text: "hmm".into(),
                },
                ProviderEvent::TextDelta {
                    text: "Working on it".into(),
                },
                tool_start(1, "toolu_06", "web_search"),
            ],
        );

        let partial = collector.partial();
        assert_eq!(partial.text, "Working on it");
        assert_eq!(partial.thinking, "hmm");
        assert_eq!(partial.pending_tools, vec!["web_search".to_string()]);
    }

    #[tokio::test]
    async fn thinking_deltas_are_surfaced_separately() {
        let mut collector = StreamCollector::new();
        let deltas = collector.handle(ProviderEvent::ThinkingDelta {
            text: "reason".into(),
        });
        assert_eq!(deltas, vec![StreamDelta::Thinking("reason".into())]);

        let turn = collector.finish(Usage::default());
        assert_eq!(turn.thinking, "reason");
        assert!(turn.text.is_empty());
    }
}
