//! Fluent builder for [`RuntimeScheduler`].

use std::sync::Arc;

use crate::errors::SchedulerError;
use crate::runtime::ResolvedProject;
use crate::settings::MemorySettingsStore;
use crate::traits::{BehaviorMap, ComponentBehavior, SettingsStore};
use crate::types::Project;

use super::config::SchedulerConfig;
use super::RuntimeScheduler;

/// Builder for assembling a [`RuntimeScheduler`].
///
/// Behaviors registered here win over the built-in of the same type id.
/// Unset fields fall back to defaults during
/// [`build()`](SchedulerBuilder::build).
pub struct SchedulerBuilder {
    project: Option<Project>,
    behaviors: BehaviorMap,
    settings_store: Option<Arc<dyn SettingsStore>>,
    config: SchedulerConfig,
}

impl SchedulerBuilder {
    pub(super) fn new() -> Self {
        Self {
            project: None,
            behaviors: BehaviorMap::new(),
            settings_store: None,
            config: SchedulerConfig::default(),
        }
    }

    /// Set the project to run. Required.
    pub fn project(mut self, project: Project) -> Self {
        self.project = Some(project);
        self
    }

    /// Register a component behavior. Keyed by `behavior.meta().type_id`.
    pub fn behavior(mut self, behavior: impl ComponentBehavior + 'static) -> Self {
        let meta = behavior.meta();
        self.behaviors.insert(meta.type_id, Arc::new(behavior));
        self
    }

    /// Set the settings store. Default: [`MemorySettingsStore`].
    pub fn settings_store(mut self, store: impl SettingsStore + 'static) -> Self {
        self.settings_store = Some(Arc::new(store));
        self
    }

    /// Set the scheduler configuration.
    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Resolve the project against the behavior registry and assemble the
    /// scheduler. Built-ins fill every type id not registered explicitly.
    /// The scheduler starts idle; nothing runs until
    /// [`start()`](RuntimeScheduler::start).
    pub fn build(mut self) -> Result<RuntimeScheduler, SchedulerError> {
        for builtin in crate::components::builtins() {
            let meta = builtin.meta();
            self.behaviors
                .entry(meta.type_id)
                .or_insert_with(|| Arc::from(builtin));
        }

        let project = self.project.ok_or_else(|| SchedulerError::Build {
            message: "no project set".into(),
        })?;
        let resolved = ResolvedProject::resolve(&project, &self.behaviors)?;

        let settings_store: Arc<dyn SettingsStore> = self
            .settings_store
            .unwrap_or_else(|| Arc::new(MemorySettingsStore::new()));

        Ok(RuntimeScheduler::new(
            Arc::new(resolved),
            self.config,
            settings_store,
        ))
    }
}
