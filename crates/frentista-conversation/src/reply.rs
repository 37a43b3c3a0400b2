//! Reply generation seam.
//!
//! The real generator is an external model behind the `ReplyGenerator`
//! trait. This built-in deterministic replier keeps the dialogue usable
//! when none is wired; either way, a generator failure never reaches the
//! contact — the engine substitutes the configured fallback text.

use async_trait::async_trait;
use frentista_core::error::Result;
use frentista_core::traits::ReplyGenerator;
use frentista_core::types::{ConversationTurn, FlowState};

pub struct TemplateReplier;

#[async_trait]
impl ReplyGenerator for TemplateReplier {
    async fn reply(
        &self,
        contact_name: Option<&str>,
        state: FlowState,
        _inbound: &str,
        _history: &[ConversationTurn],
    ) -> Result<String> {
        Ok(match state {
            FlowState::AwaitingName => match contact_name {
                Some(name) => {
                    format!("Perfeito, {name}! Cadastro feito. Pode mandar sua mensagem.")
                }
                None => {
                    "Não consegui entender seu nome. Pode mandar só o nome, por favor?".into()
                }
            },
            FlowState::Completed => {
                "recebemos sua mensagem e já vamos te responder.".into()
            }
            FlowState::New | FlowState::WelcomeFailed => {
                "Olá! Em que podemos ajudar?".into()
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_confirmation_uses_name() {
        let text = TemplateReplier
            .reply(Some("Maria Souza"), FlowState::AwaitingName, "Maria Souza", &[])
            .await
            .unwrap();
        assert!(text.contains("Maria Souza"));
    }

    #[tokio::test]
    async fn test_reprompt_without_name() {
        let text = TemplateReplier
            .reply(None, FlowState::AwaitingName, "123", &[])
            .await
            .unwrap();
        assert!(text.contains("nome"));
    }
}
