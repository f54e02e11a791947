//! Shared state for one entity's routes.

use crate::service::{CrudService, ValidationRules};
use std::sync::Arc;

#[derive(Clone)]
pub struct EntityState {
    pub service: Arc<CrudService>,
    /// Body rules: full on create, partial on update.
    pub rules: Arc<ValidationRules>,
}

impl EntityState {
    pub fn new(service: CrudService) -> Self {
        EntityState {
            service: Arc::new(service),
            rules: Arc::new(ValidationRules::new()),
        }
    }

    pub fn with_rules(mut self, rules: ValidationRules) -> Self {
        self.rules = Arc::new(rules);
        self
    }
}
