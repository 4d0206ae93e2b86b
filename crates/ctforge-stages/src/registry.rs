//! Service Registry
//!
//! Lookup table of stage name -> handler. The orchestrator assembles a
//! pipeline by looking up names in this registry against an ordered list of
//! `PipelineEntry` values built once at Coordinator init (pipeline as data,
//! not control flow, per SPEC_FULL.md's REDESIGN FLAGS).

use crate::stage::StageService;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct ServiceRegistry {
    services: HashMap<&'static str, Arc<dyn StageService>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, service: Arc<dyn StageService>) {
        self.services.insert(service.name(), service);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn StageService>> {
        self.services.get(name).cloned()
    }
}
