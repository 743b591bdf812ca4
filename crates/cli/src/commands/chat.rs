//! `secretary chat` — one message, one reply.

use secretary_core::ids::UserId;
use secretary_core::transport::InboundEvent;
use std::path::Path;
use super::wiring;

pub async fn run(config_path: Option<&Path>, user: &str, message: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = wiring::load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let wired = wiring::build(&config).await?;

    let event = InboundEvent::UserMessage {
        user_id: UserId::new(user),
        content: message.to_string(),
        metadata: serde_json::Map::new(),
    };

    eprint!("  Thinking...");
    let outcome = wired.orchestrator.handle(event).await;
    eprint!("\r              \r");

    match outcome {
        Ok(reply) => {
            println!("{reply}");
            Ok(())
        }
        Err(failure) => {
            eprintln!("  [{}] {}", failure.code, failure.message);
            if !failure.detail.is_null() {
                eprintln!("  {}", failure.detail);
            }
            Err(format!("turn failed: {}", failure.code).into())
        }
    }
}
