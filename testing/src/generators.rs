use anyhow::bail;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};

use rfq_negotiator_component::{
    GeneratedMessage, GeneratorMutWrapper, MessageGenerator, MessageGeneratorMut, RoundContext,
};

/// Contexts observed by generator, shared with test.
#[derive(Clone, Debug, Default)]
pub struct ContextLog(Arc<Mutex<Vec<RoundContext>>>);

impl ContextLog {
    pub fn push(&self, context: RoundContext) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(context);
    }

    pub fn contexts(&self) -> Vec<RoundContext> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Replays predefined messages. After script ends, last message is repeated.
pub struct ScriptedGenerator {
    script: Vec<GeneratedMessage>,
    next: usize,
    log: ContextLog,
}

impl ScriptedGenerator {
    pub fn new(script: Vec<GeneratedMessage>) -> ScriptedGenerator {
        ScriptedGenerator {
            script,
            next: 0,
            log: ContextLog::default(),
        }
    }

    pub fn with_log(mut self, log: ContextLog) -> ScriptedGenerator {
        self.log = log;
        self
    }

    pub fn into_generator(self) -> Arc<dyn MessageGenerator> {
        Arc::new(GeneratorMutWrapper::new(self))
    }
}

impl MessageGeneratorMut for ScriptedGenerator {
    fn generate(&mut self, context: &RoundContext) -> anyhow::Result<GeneratedMessage> {
        self.log.push(context.clone());

        let idx = self.next.min(self.script.len().saturating_sub(1));
        self.next += 1;
        match self.script.get(idx) {
            Some(message) => Ok(message.clone()),
            None => bail!("Empty script for {} in round {}", context.party, context.round),
        }
    }
}

/// Generator, that always fails, so negotiation has to use templated messages.
pub struct EmitErrors;

#[async_trait]
impl MessageGenerator for EmitErrors {
    async fn generate(&self, context: &RoundContext) -> anyhow::Result<GeneratedMessage> {
        bail!(
            "Generator unavailable for supplier [{}] round {}",
            context.supplier_id,
            context.round
        )
    }
}

/// Crashes the task running negotiation.
pub struct Panicking;

#[async_trait]
impl MessageGenerator for Panicking {
    async fn generate(&self, context: &RoundContext) -> anyhow::Result<GeneratedMessage> {
        panic!("Generator crashed in negotiation [{}]", context.negotiation_id)
    }
}
