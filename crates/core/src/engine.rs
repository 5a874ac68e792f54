//! Wiring of the orchestration components over one set of backends.

use std::sync::Arc;

use crate::dispatch::{DispatchGateway, JobQueue};
use crate::ledger::{RunLedger, RunStore};
use crate::orchestration::RunOrchestrator;
use crate::registry::{ModuleRegistry, ModuleStore};
use crate::resolution::VersionResolver;
use crate::runs::RunListLimits;
use crate::scope::{EntityDirectory, ScopeValidator};

/// One instance of every storage and queue port.
#[derive(Clone)]
pub struct Backends {
    pub modules: Arc<dyn ModuleStore>,
    pub runs: Arc<dyn RunStore>,
    pub directory: Arc<dyn EntityDirectory>,
    pub queue: Arc<dyn JobQueue>,
}

/// The orchestration core, built once per process and shared by handle.
///
/// Every component holds the same registry store, so a registry mutation is
/// visible to the next resolution without any ambient global.
#[derive(Clone)]
pub struct Engine {
    pub registry: ModuleRegistry,
    pub resolver: VersionResolver,
    pub ledger: RunLedger,
    pub gateway: DispatchGateway,
    pub orchestrator: RunOrchestrator,
}

impl Engine {
    pub fn new(backends: Backends, limits: RunListLimits) -> Self {
        let registry = ModuleRegistry::new(backends.modules);
        let resolver = VersionResolver::new(&registry);
        let validator = ScopeValidator::new(backends.directory);
        let ledger = RunLedger::new(backends.runs, resolver.clone(), validator, limits);
        let gateway = DispatchGateway::new(backends.queue);
        let orchestrator = RunOrchestrator::new(ledger.clone(), gateway.clone());

        Self {
            registry,
            resolver,
            ledger,
            gateway,
            orchestrator,
        }
    }
}
