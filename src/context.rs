//! Explicit run-scoped context.
//!
//! Everything the builder, resolver and import engine share: the active
//! name resolver, the migration configuration and the statistics sink. A
//! value of this type is created per run and passed by reference; there is
//! no ambient global state. Statistics sit behind a `RefCell` because the
//! whole pipeline is single-threaded by design.

use std::cell::{Ref, RefCell, RefMut};

use crate::config::MigrationConfig;
use crate::datasource::{DefaultNameResolver, NameResolver};
use crate::statistics::Statistics;

pub struct MigrationContext {
    pub name_resolver: Box<dyn NameResolver>,
    pub config: MigrationConfig,
    statistics: RefCell<Statistics>,
}

impl MigrationContext {
    pub fn new(name_resolver: Box<dyn NameResolver>, config: MigrationConfig) -> Self {
        MigrationContext {
            name_resolver,
            config,
            statistics: RefCell::new(Statistics::default()),
        }
    }

    /// Default name convention and an empty configuration.
    pub fn with_defaults() -> Self {
        Self::new(Box::new(DefaultNameResolver), MigrationConfig::default())
    }

    pub fn with_config(config: MigrationConfig) -> Self {
        Self::new(Box::new(DefaultNameResolver), config)
    }

    pub fn statistics(&self) -> Ref<'_, Statistics> {
        self.statistics.borrow()
    }

    pub fn statistics_mut(&self) -> RefMut<'_, Statistics> {
        self.statistics.borrow_mut()
    }

    pub fn statistics_snapshot(&self) -> Statistics {
        self.statistics.borrow().clone()
    }
}

impl std::fmt::Debug for MigrationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationContext")
            .field("config", &self.config)
            .field("statistics", &self.statistics)
            .finish_non_exhaustive()
    }
}
