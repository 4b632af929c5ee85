//! Folding streamed deltas into one assistant message.
//!
//! Text fragments concatenate in arrival order. Tool call fragments are grouped
//! by their index and their `id`, `name` and `arguments` pieces concatenate.
//! The fold is associative, so merging any contiguous partition of a stream and
//! then merging the partial results gives the same delta as merging it in one go.

use lectern_core::delta::{Delta, ToolCallChunk};
use lectern_core::message::{InvalidToolCall, Message, ToolCall};
use tracing::warn;

/// Merge two deltas. `a` is earlier in the stream than `b`.
pub fn merge_deltas(a: Delta, b: Delta) -> Delta {
    let mut merged = Delta::default();
    absorb(&mut merged, a);
    absorb(&mut merged, b);
    merged
}

fn absorb(acc: &mut Delta, delta: Delta) {
    acc.content.push_str(&delta.content);
    for chunk in delta.tool_call_chunks {
        match acc
            .tool_call_chunks
            .iter_mut()
            .find(|c| c.index == chunk.index)
        {
            Some(existing) => {
                concat(&mut existing.id, chunk.id);
                concat(&mut existing.name, chunk.name);
                concat(&mut existing.arguments, chunk.arguments);
            }
            None => acc.tool_call_chunks.push(chunk),
        }
    }
}

fn concat(slot: &mut Option<String>, piece: Option<String>) {
    match (slot.as_mut(), piece) {
        (Some(existing), Some(piece)) => existing.push_str(&piece),
        (None, Some(piece)) => *slot = Some(piece),
        (_, None) => {}
    }
}

/// Accumulates the deltas of one model turn.
#[derive(Debug, Default)]
pub struct ChunkMerger {
    acc: Delta,
}

impl ChunkMerger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, delta: Delta) {
        absorb(&mut self.acc, delta);
    }

    /// The merged delta so far.
    pub fn merged(&self) -> &Delta {
        &self.acc
    }

    /// Finalize into an assistant message with the given id.
    ///
    /// Tool calls come out ordered by index. A group without a name, or whose
    /// arguments are not a JSON object, ends up in `invalid_tool_calls`.
    pub fn finish(self, message_id: impl Into<String>) -> Message {
        let mut chunks = self.acc.tool_call_chunks;
        chunks.sort_by_key(|c| c.index);

        let mut tool_calls = Vec::new();
        let mut invalid_tool_calls = Vec::new();
        for chunk in chunks {
            match finalize_call(chunk) {
                Ok(call) => tool_calls.push(call),
                Err(invalid) => {
                    warn!(
                        tool_call_id = %invalid.id,
                        tool = invalid.name.as_deref().unwrap_or(""),
                        error = %invalid.error,
                        "Dropping malformed tool call"
                    );
                    invalid_tool_calls.push(invalid);
                }
            }
        }

        let mut message = Message::assistant(self.acc.content).with_tool_calls(tool_calls);
        message.id = message_id.into();
        message.invalid_tool_calls = invalid_tool_calls;
        message
    }
}

fn finalize_call(chunk: ToolCallChunk) -> Result<ToolCall, InvalidToolCall> {
    let id = chunk
        .id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));
    let raw = chunk.arguments.unwrap_or_default();
    let name = chunk.name.filter(|n| !n.trim().is_empty());

    let invalid = |name: Option<String>, error: String| InvalidToolCall {
        id: id.clone(),
        name,
        arguments: raw.clone(),
        error,
    };

    let Some(name) = name else {
        return Err(invalid(None, "tool call has no name".into()));
    };

    let arguments = if raw.trim().is_empty() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(value @ serde_json::Value::Object(_)) => value,
            Ok(_) => return Err(invalid(Some(name), "arguments are not a JSON object".into())),
            Err(e) => return Err(invalid(Some(name), format!("unparseable arguments: {e}"))),
        }
    };

    Ok(ToolCall::new(id, name, arguments))
}

/// Merge a whole sequence of deltas into a message.
pub fn merge_all(deltas: impl IntoIterator<Item = Delta>, message_id: impl Into<String>) -> Message {
    let mut merger = ChunkMerger::new();
    for delta in deltas {
        merger.push(delta);
    }
    merger.finish(message_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_core::message::Role;

    fn stream() -> Vec<Delta> {
        vec![
            Delta::text("我来"),
            Delta::text(""),
            Delta::text("查一下。"),
            Delta::tool_chunk(ToolCallChunk::new(0).id("call_a").name("list_articles")),
            Delta::tool_chunk(ToolCallChunk::new(0).arguments("{\"tag\":")),
            Delta::tool_chunk(ToolCallChunk::new(1).id("call_b").name("read_article")),
            Delta::tool_chunk(ToolCallChunk::new(0).arguments("\"动态规划\"}")),
            Delta::tool_chunk(ToolCallChunk::new(1).arguments("{\"artifact_id\":\"x\"}")),
        ]
    }

    fn fold(deltas: &[Delta]) -> Delta {
        deltas
            .iter()
            .cloned()
            .fold(Delta::default(), merge_deltas)
    }

    #[test]
    fn merge_is_associative_over_every_split() {
        let deltas = stream();
        let whole = fold(&deltas);
        for i in 0..=deltas.len() {
            for j in i..=deltas.len() {
                let (a, b, c) = (fold(&deltas[..i]), fold(&deltas[i..j]), fold(&deltas[j..]));
                let left = merge_deltas(merge_deltas(a.clone(), b.clone()), c.clone());
                let right = merge_deltas(a, merge_deltas(b, c));
                assert_eq!(left, right, "split at {i}/{j}");
                assert_eq!(left, whole, "split at {i}/{j}");
            }
        }
    }

    #[test]
    fn content_is_ordered_concatenation() {
        let message = merge_all(stream(), "m1");
        assert_eq!(message.content, "我来查一下。");
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.id, "m1");
    }

    #[test]
    fn all_empty_content_gives_empty_message() {
        let message = merge_all(vec![Delta::text(""), Delta::text("")], "m1");
        assert_eq!(message.content, "");
        assert!(!message.has_tool_calls());

        let message = merge_all(Vec::new(), "m2");
        assert_eq!(message.content, "");
        assert!(message.tool_calls.is_empty());
        assert!(message.invalid_tool_calls.is_empty());
    }

    #[test]
    fn tool_fragments_merge_by_index() {
        let message = merge_all(stream(), "m1");
        assert_eq!(message.tool_calls.len(), 2);
        assert_eq!(message.tool_calls[0].id, "call_a");
        assert_eq!(message.tool_calls[0].name, "list_articles");
        assert_eq!(message.tool_calls[0].arguments["tag"], "动态规划");
        assert_eq!(message.tool_calls[1].arguments["artifact_id"], "x");
    }

    #[test]
    fn calls_are_ordered_by_index_not_arrival() {
        let message = merge_all(
            vec![
                Delta::tool_chunk(ToolCallChunk::new(3).id("late").name("b")),
                Delta::tool_chunk(ToolCallChunk::new(1).id("early").name("a")),
            ],
            "m1",
        );
        let ids: Vec<_> = message.tool_calls.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late"]);
    }

    #[test]
    fn empty_arguments_count_as_empty_object() {
        let message = merge_all(
            vec![Delta::tool_chunk(ToolCallChunk::new(0).id("c").name("list_articles"))],
            "m1",
        );
        assert_eq!(message.tool_calls[0].arguments, serde_json::json!({}));
    }

    #[test]
    fn missing_id_is_generated() {
        let message = merge_all(
            vec![Delta::tool_chunk(
                ToolCallChunk::new(0).name("list_articles").arguments("{}"),
            )],
            "m1",
        );
        assert!(message.tool_calls[0].id.starts_with("call_"));
        assert!(message.tool_calls[0].id.len() > "call_".len());
    }

    #[test]
    fn malformed_groups_become_invalid_calls() {
        let message = merge_all(
            vec![
                Delta::tool_chunk(ToolCallChunk::new(0).id("a").name("read_article").arguments("{\"artifact_id\":")),
                Delta::tool_chunk(ToolCallChunk::new(1).id("b").arguments("{}")),
                Delta::tool_chunk(ToolCallChunk::new(2).id("c").name("x").arguments("[1,2]")),
                Delta::tool_chunk(ToolCallChunk::new(3).id("d").name("ok").arguments("{}")),
            ],
            "m1",
        );
        assert_eq!(message.tool_calls.len(), 1);
        assert_eq!(message.tool_calls[0].name, "ok");

        let invalid: Vec<_> = message.invalid_tool_calls.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(invalid, vec!["a", "b", "c"]);
        assert_eq!(message.invalid_tool_calls[0].arguments, "{\"artifact_id\":");
        assert!(message.invalid_tool_calls[1].name.is_none());
    }
}
