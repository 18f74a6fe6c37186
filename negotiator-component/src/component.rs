use async_trait::async_trait;
use std::sync::Arc;

use crate::context::RoundContext;
use crate::message::GeneratedMessage;

/// Produces next message on behalf of one side of negotiations.
///
/// Generators are external collaborators: usually language models driven
/// through some API, in tests and simulations deterministic strategies.
/// Generator decides about structured actions (propose, counter, accept, reject)
/// and negotiations only interpret them. Returning error is not fatal, negotiation
/// substitutes templated message and goes on.
///
/// Implementations shouldn't block indefinitely. Negotiation applies timeout
/// to every call anyway.
#[async_trait]
pub trait MessageGenerator: Send + Sync {
    async fn generate(&self, context: &RoundContext) -> anyhow::Result<GeneratedMessage>;
}

#[async_trait]
impl<G: MessageGenerator + ?Sized> MessageGenerator for Arc<G> {
    async fn generate(&self, context: &RoundContext) -> anyhow::Result<GeneratedMessage> {
        (**self).generate(context).await
    }
}
