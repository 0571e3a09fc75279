use std::sync::Arc;

use crate::{
    domain::{Entity, EntityStatus},
    form::{ConfigError, FieldOverrides, FormController, FormHooks},
    schema::SchemaRegistry,
};

use super::{
    options::SessionOptions,
    saver::EntitySaver,
    session::{SessionHandle, spawn_session},
};

/// Builder for one entity edit session.
#[derive(Debug)]
pub struct EntityForm {
    registry: Arc<SchemaRegistry>,
    schema: String,
    collection_path: String,
    status: EntityStatus,
    entity: Option<Entity>,
    overrides: FieldOverrides,
    hooks: FormHooks,
    options: SessionOptions,
}

impl EntityForm {
    pub fn new(
        registry: Arc<SchemaRegistry>,
        schema: impl Into<String>,
        collection_path: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            schema: schema.into(),
            collection_path: collection_path.into(),
            status: EntityStatus::New,
            entity: None,
            overrides: FieldOverrides::default(),
            hooks: FormHooks::default(),
            options: SessionOptions::default(),
        }
    }

    /// Edits `entity`; its status decides between defaults and stored values.
    pub fn with_entity(mut self, entity: Entity) -> Self {
        self.status = entity.status;
        self.entity = Some(entity);
        self
    }

    pub fn with_status(mut self, status: EntityStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_overrides(mut self, overrides: FieldOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_hooks(mut self, hooks: FormHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Builds the controller without an event loop.
    pub fn open(self) -> Result<FormController, ConfigError> {
        self.split().map(|(form, _)| form)
    }

    /// Opens the form and drives it from a background task on the current tokio runtime.
    pub fn spawn(self, saver: impl EntitySaver + 'static) -> Result<SessionHandle, ConfigError> {
        let (form, options) = self.split()?;
        Ok(spawn_session(form, Arc::new(saver), options))
    }

    fn split(self) -> Result<(FormController, SessionOptions), ConfigError> {
        let EntityForm {
            registry,
            schema,
            collection_path,
            status,
            entity,
            overrides,
            hooks,
            options,
        } = self;

        let form = FormController::open(registry, &schema, collection_path, status, entity)?
            .with_overrides(overrides)
            .with_hooks(hooks)
            .with_auto_validate(options.auto_validate);
        Ok((form, options))
    }
}
