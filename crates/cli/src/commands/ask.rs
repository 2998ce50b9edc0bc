//! `rolerag ask`: run a single question through the chat pipeline.

use rolerag_agent::ChatRequest;
use rolerag_core::{Conversation, Message};
use rolerag_gateway::GatewayState;
use std::path::Path;

pub async fn run(
    config_path: Option<&Path>,
    message: String,
    roles: Option<String>,
    base_url: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config =
        super::load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let roles = super::roles_or_default(roles.as_deref(), &config)?;

    let state = GatewayState::load(config).await?;

    let mut request = ChatRequest::new(Conversation::from_messages(vec![Message::user(&message)]), roles);
    if let Some(base_url) = base_url {
        request = request.with_base_url(base_url);
    }

    let reply = state.pipeline.run(request).await?;
    tracing::debug!(
        request_id = %reply.request_id,
        policies = ?reply.policy_sources,
        faq_used = reply.faq_used,
        estimated_tokens = reply.prompt.estimated_tokens,
        "Answered"
    );

    println!("{}", reply.text);
    Ok(())
}
