//! The per-turn conversation record and the partial updates nodes emit.

use secretary_core::error::Error;
use secretary_core::history::Thread;
use secretary_core::ids::UserId;
use secretary_core::message::{Message, MessageToolCall, Role};
use secretary_core::transport::TriggerEvent;

/// Everything one pass of the graph reads and writes.
///
/// `messages` holds the persisted history followed by this turn's entries;
/// only the latter (`new_entries`) are appended to the thread afterwards.
#[derive(Debug, Clone)]
pub struct ConversationState {
    user_id: UserId,
    messages: Vec<Message>,
    persisted_len: usize,
    triggered_event: Option<TriggerEvent>,
    /// Set by post-tool update, consumed by fact-check on the next turn
    pub fact_added_in_last_run: bool,
    /// Injected context for the model; never persisted
    pub system_context: Option<Message>,
    pub model_calls: u32,
    pub tool_calls: u32,
    pub tool_rounds: u32,
    pub facts_saved: u32,
}

impl ConversationState {
    /// A state with no persisted history.
    ///
    /// Fails with `Error::Validation` when there is neither a message nor a
    /// triggering event to respond to.
    pub fn new(
        user_id: UserId,
        messages: Vec<Message>,
        triggered_event: Option<TriggerEvent>,
    ) -> Result<Self, Error> {
        if messages.is_empty() && triggered_event.is_none() {
            return Err(Error::Validation(
                "conversation state needs a message or a triggered event".into(),
            ));
        }
        Ok(Self {
            user_id,
            messages,
            persisted_len: 0,
            triggered_event,
            fact_added_in_last_run: false,
            system_context: None,
            model_calls: 0,
            tool_calls: 0,
            tool_rounds: 0,
            facts_saved: 0,
        })
    }

    /// Continue a persisted thread with one inbound entry.
    pub fn from_thread(
        user_id: UserId,
        thread: Thread,
        inbound: Message,
        triggered_event: Option<TriggerEvent>,
    ) -> Result<Self, Error> {
        let persisted_len = thread.messages.len();
        let mut messages = thread.messages;
        messages.push(inbound);

        let mut state = Self::new(user_id, messages, triggered_event)?;
        state.persisted_len = persisted_len;
        state.fact_added_in_last_run = thread.fact_added_in_last_run;
        Ok(state)
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn triggered_event(&self) -> Option<&TriggerEvent> {
        self.triggered_event.as_ref()
    }

    pub fn persisted_len(&self) -> usize {
        self.persisted_len
    }

    /// Entries produced during this turn, inbound entry first.
    pub fn new_entries(&self) -> &[Message] {
        &self.messages[self.persisted_len.min(self.messages.len())..]
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Tool calls on the last entry, if it is an unanswered tool-call request.
    pub fn pending_tool_calls(&self) -> &[MessageToolCall] {
        match self.messages.last() {
            Some(m) if m.is_tool_call_request() => &m.tool_calls,
            _ => &[],
        }
    }

    /// The run of tool results at the end of the history.
    pub fn trailing_tool_results(&self) -> &[Message] {
        let start = self
            .messages
            .iter()
            .rposition(|m| !m.is_tool_result())
            .map_or(0, |i| i + 1);
        &self.messages[start..]
    }

    /// The model's text reply, once the last entry is one.
    pub fn final_reply(&self) -> Option<&str> {
        self.messages
            .last()
            .filter(|m| m.role == Role::Assistant && !m.is_tool_call_request())
            .map(|m| m.content.as_str())
    }

    /// Value persisted with the thread for the next turn's fact-check.
    ///
    /// A fact saved in an earlier tool round of this turn still counts when a
    /// later round cleared the flag.
    pub fn fact_flag_for_next_turn(&self) -> bool {
        self.fact_added_in_last_run || self.facts_saved > 0
    }

    pub fn apply(&mut self, update: StateUpdate) {
        self.messages.extend(update.append);
        if let Some(flag) = update.fact_added_in_last_run {
            self.fact_added_in_last_run = flag;
            if flag {
                self.facts_saved += 1;
            }
        }
        if let Some(context) = update.system_context {
            self.system_context = Some(context);
        }
        self.model_calls += update.model_calls;
        self.tool_calls += update.tool_calls;
        self.tool_rounds += update.tool_rounds;
    }
}

/// A partial state change returned by a node. Unset fields leave the state
/// untouched; `append` is added after the existing entries.
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    pub append: Vec<Message>,
    pub fact_added_in_last_run: Option<bool>,
    pub system_context: Option<Message>,
    pub model_calls: u32,
    pub tool_calls: u32,
    pub tool_rounds: u32,
}

impl StateUpdate {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn fact_flag(value: bool) -> Self {
        Self {
            fact_added_in_last_run: Some(value),
            ..Self::default()
        }
    }

    pub fn context(system_context: Message) -> Self {
        Self {
            system_context: Some(system_context),
            ..Self::default()
        }
    }
}

/// History entry recording a trigger, so later turns know it happened.
pub fn trigger_entry(event: &TriggerEvent) -> Message {
    let content = if event.payload.is_null() {
        format!("Triggered event `{}`", event.trigger_type)
    } else {
        format!("Triggered event `{}`: {}", event.trigger_type, event.payload)
    };
    Message::system(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(id: &str, name: &str) -> MessageToolCall {
        MessageToolCall {
            id: id.into(),
            name: name.into(),
            arguments: "{}".into(),
        }
    }

    #[test]
    fn empty_state_without_trigger_is_rejected() {
        let err = ConversationState::new(UserId::new("u1"), vec![], None).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn trigger_alone_is_enough() {
        let trigger = TriggerEvent {
            trigger_type: "reminder".into(),
            payload: serde_json::json!({"text": "Позвонить маме"}),
        };
        let state = ConversationState::new(UserId::new("u1"), vec![], Some(trigger)).unwrap();
        assert!(state.triggered_event().is_some());
        assert!(state.final_reply().is_none());
    }

    #[test]
    fn from_thread_separates_new_entries() {
        let thread = Thread {
            messages: vec![Message::user("раньше"), Message::assistant("ответ")],
            fact_added_in_last_run: true,
        };
        let state =
            ConversationState::from_thread(UserId::new("u1"), thread, Message::user("сейчас"), None).unwrap();
        assert_eq!(state.persisted_len(), 2);
        assert_eq!(state.new_entries().len(), 1);
        assert_eq!(state.new_entries()[0].content, "сейчас");
        assert!(state.fact_added_in_last_run);
    }

    #[test]
    fn pending_calls_only_on_trailing_request() {
        let mut state = ConversationState::new(UserId::new("u1"), vec![Message::user("hi")], None).unwrap();
        assert!(state.pending_tool_calls().is_empty());

        state.apply(StateUpdate {
            append: vec![Message::assistant_tool_calls("", vec![call("c1", "get_current_time")])],
            model_calls: 1,
            ..StateUpdate::none()
        });
        assert_eq!(state.pending_tool_calls().len(), 1);

        state.apply(StateUpdate {
            append: vec![Message::tool_result("c1", "get_current_time", "12:00")],
            tool_calls: 1,
            tool_rounds: 1,
            ..StateUpdate::none()
        });
        assert!(state.pending_tool_calls().is_empty());
        assert_eq!(state.trailing_tool_results().len(), 1);
        assert_eq!((state.model_calls, state.tool_calls, state.tool_rounds), (1, 1, 1));
    }

    #[test]
    fn trailing_results_empty_after_text() {
        let state = ConversationState::new(
            UserId::new("u1"),
            vec![Message::tool_result("c0", "x", "old"), Message::assistant("done")],
            None,
        )
        .unwrap();
        assert!(state.trailing_tool_results().is_empty());
        assert_eq!(state.final_reply(), Some("done"));
    }

    #[test]
    fn saved_fact_survives_later_round() {
        let mut state = ConversationState::new(UserId::new("u1"), vec![Message::user("hi")], None).unwrap();
        state.apply(StateUpdate::fact_flag(true));
        state.apply(StateUpdate::fact_flag(false));
        assert!(!state.fact_added_in_last_run);
        assert!(state.fact_flag_for_next_turn());
    }

    #[test]
    fn trigger_entry_mentions_type_and_payload() {
        let entry = trigger_entry(&TriggerEvent {
            trigger_type: "reminder".into(),
            payload: serde_json::json!({"text": "Позвонить маме"}),
        });
        assert_eq!(entry.role, Role::System);
        assert!(entry.content.contains("`reminder`"));
        assert!(entry.content.contains("Позвонить маме"));
    }
}
