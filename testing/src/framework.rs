use anyhow::anyhow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use rfq_negotiators::{
    BuiltinGenerators, Catalog, CollaboratorConfig, GeneratorConfig, Generators,
    GeneratorsFactory, NegotiationConfig, NegotiationRequest, NegotiationSession, SessionOutcome,
    SupplierProfile,
};

use crate::error::FailurePoint;
use crate::negotiation_record::{NegotiationRecord, NegotiationRecordSync};

#[derive(thiserror::Error)]
#[error("{error}\nNegotiation traceback:\n\n{negotiation_traceback}")]
pub struct FrameworkError {
    pub error: anyhow::Error,
    pub negotiation_traceback: NegotiationRecord,
}

/// Runs negotiation sessions against in-memory persistence, so tests can
/// inspect everything that negotiations stored.
pub struct Framework {
    pub catalog: Arc<Catalog>,
    pub suppliers: Vec<SupplierProfile>,
    pub config: NegotiationConfig,
    pub test_timeout: Duration,
    pub record: NegotiationRecordSync,
    failing_supplier: Option<String>,
}

/// Marks negotiation with failing supplier in record, as soon as session
/// assigns it an id.
struct SelectFailing {
    generators: Arc<dyn GeneratorsFactory>,
    supplier_id: String,
    record: NegotiationRecordSync,
}

impl GeneratorsFactory for SelectFailing {
    fn create(&self, collaborator: &CollaboratorConfig) -> anyhow::Result<Generators> {
        if collaborator.supplier.id == self.supplier_id {
            self.record.select_failing(&collaborator.negotiation_id);
        }
        self.generators.create(collaborator)
    }
}

impl Framework {
    pub fn new(catalog: Catalog) -> Framework {
        let _ = env_logger::builder().is_test(true).try_init();

        Framework {
            catalog: Arc::new(catalog),
            suppliers: vec![],
            config: NegotiationConfig::default(),
            test_timeout: Duration::from_secs(10),
            record: NegotiationRecordSync::new(),
            failing_supplier: None,
        }
    }

    pub fn test_timeout(mut self, timeout: Duration) -> Self {
        self.test_timeout = timeout;
        self
    }

    pub fn config(mut self, config: NegotiationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn add_supplier(mut self, supplier: SupplierProfile) -> Self {
        self.suppliers.push(supplier);
        self
    }

    pub fn add_suppliers(mut self, suppliers: impl IntoIterator<Item = SupplierProfile>) -> Self {
        self.suppliers.extend(suppliers);
        self
    }

    pub fn fail_on(mut self, point: FailurePoint) -> Self {
        self.record = self.record.fail_on(point);
        self
    }

    /// Injects failure only into negotiation with given supplier.
    pub fn fail_on_supplier(mut self, point: FailurePoint, supplier_id: &str) -> Self {
        self.record = self.record.fail_on_selected(point);
        self.failing_supplier = Some(supplier_id.to_string());
        self
    }

    pub async fn run(
        &self,
        request: NegotiationRequest,
        generators: Arc<dyn GeneratorsFactory>,
    ) -> Result<SessionOutcome, FrameworkError> {
        let generators: Arc<dyn GeneratorsFactory> = match &self.failing_supplier {
            Some(supplier_id) => Arc::new(SelectFailing {
                generators,
                supplier_id: supplier_id.clone(),
                record: self.record.clone(),
            }),
            None => generators,
        };
        let session = NegotiationSession::new(
            self.config.clone(),
            self.catalog.clone(),
            Arc::new(self.record.clone()),
            generators,
        )
        .map_err(|e| FrameworkError::from(e, &self.record))?;

        timeout(self.test_timeout, session.run(request, &self.suppliers))
            .await
            .map_err(|_| {
                FrameworkError::from(
                    anyhow!("Session didn't finish in {:?}", self.test_timeout),
                    &self.record,
                )
            })?
            .map_err(|e| FrameworkError::from(e, &self.record))
    }

    /// Runs session with the same builtin generators for all suppliers.
    pub async fn run_builtin(
        &self,
        request: NegotiationRequest,
        requestor: GeneratorConfig,
        supplier: GeneratorConfig,
    ) -> Result<SessionOutcome, FrameworkError> {
        self.run(request, Arc::new(BuiltinGenerators { requestor, supplier }))
            .await
    }
}

impl FrameworkError {
    pub fn from(error: impl Into<anyhow::Error>, record: &NegotiationRecordSync) -> FrameworkError {
        let error = error.into();
        log::error!("Negotiation session failed: {}", error);

        FrameworkError {
            error,
            negotiation_traceback: record.snapshot(),
        }
    }
}

impl fmt::Debug for FrameworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}
