use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::{GeneratedMessage, MessageGenerator, RoundContext};

/// Adapter implementing `MessageGenerator` for `MessageGeneratorMut`.
pub struct GeneratorMutWrapper<G: MessageGeneratorMut + Sized> {
    inner: Arc<Mutex<G>>,
}

/// Mutable version of message generator. It simplifies implementation in case
/// someone doesn't need asynchronous execution, but wants to keep state between
/// rounds (for example strategy remembering its concessions).
/// Synchronization is handled by the wrapper.
///
/// Remember that generators are run in asynchronous environment, so you are not
/// allowed to do any heavy computational work here, that could block executor.
pub trait MessageGeneratorMut: Send {
    /// Check documentation for `MessageGenerator::generate`.
    fn generate(&mut self, context: &RoundContext) -> anyhow::Result<GeneratedMessage>;
}

#[async_trait]
impl<G> MessageGenerator for GeneratorMutWrapper<G>
where
    G: MessageGeneratorMut + Sized,
{
    async fn generate(&self, context: &RoundContext) -> anyhow::Result<GeneratedMessage> {
        self.inner.lock().await.generate(context)
    }
}

impl<G> GeneratorMutWrapper<G>
where
    G: MessageGeneratorMut + Sized,
{
    pub fn new(generator: G) -> Self {
        GeneratorMutWrapper {
            inner: Arc::new(Mutex::new(generator)),
        }
    }
}
