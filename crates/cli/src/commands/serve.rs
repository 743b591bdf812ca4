//! `secretary serve` — JSON lines in, JSON lines out.
//!
//! Each stdin line is an `InboundEvent`; each is handled on its own task
//! and answered with one stdout line. Turns for the same assistant and
//! user are serialized by the runtime.

use secretary_agent::Orchestrator;
use secretary_core::ids::UserId;
use secretary_core::transport::{InboundEvent, ResponseSink, TurnFailure};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};
use super::wiring;

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum Outbound {
    Reply { user_id: UserId, text: String },
    Failed { user_id: UserId, failure: TurnFailure },
    Invalid { error: String },
}

pub async fn run(config_path: Option<&Path>, deliver: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = wiring::load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let wired = wiring::build(&config).await?;

    let sink: Option<Arc<dyn ResponseSink>> = if deliver {
        Some(wired.notifications.clone())
    } else {
        None
    };

    info!(deliver, "Reading events from stdin");
    serve_lines(
        wired.orchestrator,
        sink,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await?;
    info!("stdin closed, shutting down");
    Ok(())
}

/// Handle every line of `input` and write one outcome line per event to `output`.
///
/// Returns once input is exhausted and every in-flight turn has answered.
pub async fn serve_lines<R, W>(
    orchestrator: Arc<Orchestrator>,
    sink: Option<Arc<dyn ResponseSink>>,
    input: R,
    mut output: W,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();

    let writer = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            let mut line = match serde_json::to_string(&outbound) {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "Failed to encode outbound line");
                    continue;
                }
            };
            line.push('\n');
            output.write_all(line.as_bytes()).await?;
            output.flush().await?;
        }
        Ok::<_, std::io::Error>(())
    });

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let event: InboundEvent = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Skipping malformed event");
                let _ = tx.send(Outbound::Invalid { error: e.to_string() });
                continue;
            }
        };

        let orchestrator = orchestrator.clone();
        let sink = sink.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let user_id = event.user_id().clone();
            let result = orchestrator.handle(event).await;

            if let Some(sink) = sink {
                let text = match &result {
                    Ok(reply) => reply.as_str(),
                    Err(failure) => failure.message.as_str(),
                };
                if let Err(e) = sink.deliver(&user_id, text).await {
                    warn!(user_id = %user_id, error = %e, "Reply delivery failed");
                }
            }

            let _ = tx.send(match result {
                Ok(text) => Outbound::Reply { user_id, text },
                Err(failure) => Outbound::Failed { user_id, failure },
            });
        });
    }

    drop(tx);
    match writer.await {
        Ok(result) => result,
        Err(e) => Err(std::io::Error::other(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use secretary_agent::{AssistantCache, AssistantRuntime, RuntimeBuilder};
    use secretary_core::assistant::{AssistantConfig, AssistantStore};
    use secretary_core::error::{ConfigurationError, ServiceError};
    use secretary_core::event::EventBus;
    use secretary_core::ids::AssistantId;
    use std::sync::Mutex;

    struct NoAssistants;

    #[async_trait]
    impl AssistantStore for NoAssistants {
        async fn get_assistant(&self, id: &AssistantId) -> Result<AssistantConfig, ConfigurationError> {
            Err(ConfigurationError::NotFound(id.to_string()))
        }

        async fn get_user_secretary(&self, user_id: &UserId) -> Result<AssistantId, ConfigurationError> {
            Err(ConfigurationError::NotFound(format!("secretary for {user_id}")))
        }
    }

    struct NeverBuilds;

    #[async_trait]
    impl RuntimeBuilder for NeverBuilds {
        async fn build(
            &self,
            config: &AssistantConfig,
            _user_id: &UserId,
        ) -> Result<AssistantRuntime, ConfigurationError> {
            Err(ConfigurationError::NotFound(config.id.to_string()))
        }
    }

    #[derive(Default)]
    struct Recorder {
        delivered: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ResponseSink for Recorder {
        async fn deliver(&self, user_id: &UserId, _text: &str) -> Result<(), ServiceError> {
            self.delivered.lock().unwrap().push(user_id.to_string());
            Ok(())
        }
    }

    fn orchestrator() -> Arc<Orchestrator> {
        let bus = Arc::new(EventBus::default());
        let store = Arc::new(NoAssistants);
        let cache = AssistantCache::new(store.clone(), Arc::new(NeverBuilds), bus.clone());
        Arc::new(Orchestrator::new(store, Arc::new(cache), bus))
    }

    async fn serve(input: &str, sink: Option<Arc<dyn ResponseSink>>) -> Vec<serde_json::Value> {
        let (client, server) = tokio::io::duplex(64 * 1024);
        serve_lines(orchestrator(), sink, input.as_bytes(), server).await.unwrap();

        let mut lines = BufReader::new(client).lines();
        let mut out = Vec::new();
        while let Ok(Some(line)) = lines.next_line().await {
            out.push(serde_json::from_str(&line).unwrap());
        }
        out
    }

    #[tokio::test]
    async fn failed_turn_is_reported_per_line() {
        let input = r#"{"kind":"user_message","user_id":"tg-1","content":"hi"}"#;
        let out = serve(&format!("{input}\n\n"), None).await;

        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["status"], "failed");
        assert_eq!(out[0]["user_id"], "tg-1");
        assert_eq!(out[0]["failure"]["code"], "configuration_error");
    }

    #[tokio::test]
    async fn malformed_line_does_not_stop_serving() {
        let input = concat!(
            "not json\n",
            r#"{"kind":"trigger","user_id":"tg-2","trigger_type":"reminder","payload":{}}"#,
            "\n"
        );
        let out = serve(input, None).await;

        assert_eq!(out.len(), 2);
        assert!(out.iter().any(|o| o["status"] == "invalid"));
        assert!(out.iter().any(|o| o["status"] == "failed" && o["user_id"] == "tg-2"));
    }

    #[tokio::test]
    async fn failures_are_delivered_to_sink() {
        let recorder = Arc::new(Recorder::default());
        let input = r#"{"kind":"user_message","user_id":"tg-3","content":"hi"}"#;
        serve(input, Some(recorder.clone())).await;

        assert_eq!(*recorder.delivered.lock().unwrap(), vec!["tg-3".to_string()]);
    }
}
