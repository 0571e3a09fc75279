use std::sync::Arc;

use indexmap::IndexSet;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    domain::{Entity, EntitySchema, EntitySnapshot, EntityStatus, EntityValues, FieldPath},
    schema::{SchemaId, SchemaRegistry, init_entity_values},
    validation::{FieldError, Ruleset},
};

use super::{
    custom_id::CustomIdAssigner,
    descriptor::FieldDescriptor,
    error::{ConfigError, FormError, SaveError, SubmitRejected},
    hooks::{FormHooks, SaveContext},
    overrides::FieldOverrides,
    reconcile::{reconcile, values_equal},
    resolver::{ResolveContext, resolve_fields},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FormPhase {
    Editing,
    Submitting,
    SaveFailed,
    Discarded,
}

/// Identifies one submission so a late result can be told apart from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SubmitTicket(u64);

/// Everything the save collaborator needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    pub ticket: SubmitTicket,
    pub schema: String,
    pub collection_path: String,
    pub id: Option<String>,
    pub status: EntityStatus,
    pub values: EntityValues,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOutcome {
    Applied,
    /// Held until the in-flight save returns; a newer snapshot replaces it.
    Deferred,
    Ignored,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Saved,
    Failed(SaveError),
    /// The result belongs to a submission this form no longer waits for.
    Stale,
}

#[derive(Debug)]
struct InFlight {
    ticket: SubmitTicket,
    values: EntityValues,
}

/// Edit-session state machine for one entity.
#[derive(Debug)]
pub struct FormController {
    registry: Arc<SchemaRegistry>,
    schema_id: SchemaId,
    schema: EntitySchema,
    ruleset: Ruleset,
    collection_path: String,
    status: EntityStatus,
    entity_id: Option<String>,
    baseline: EntityValues,
    local: EntityValues,
    live: Option<EntityValues>,
    /// Values as loaded or last saved; upstream changes are measured against them.
    saved: EntityValues,
    touched: IndexSet<String>,
    dirty: bool,
    phase: FormPhase,
    custom_id: CustomIdAssigner,
    field_errors: Vec<FieldError>,
    save_error: Option<SaveError>,
    pending_snapshot: Option<EntitySnapshot>,
    in_flight: Option<InFlight>,
    next_ticket: u64,
    overrides: FieldOverrides,
    hooks: FormHooks,
    auto_validate: bool,
}

impl FormController {
    /// Opens a session. `new` entities start from schema defaults (overlaid with
    /// any values passed in); `existing` ones from the entity's values.
    pub fn open(
        registry: Arc<SchemaRegistry>,
        schema: &str,
        collection_path: impl Into<String>,
        status: EntityStatus,
        entity: Option<Entity>,
    ) -> Result<Self, ConfigError> {
        let collection_path = collection_path.into();
        let schema_id = registry
            .id_of(schema)
            .ok_or_else(|| ConfigError::UnknownSchema(schema.to_string()))?;
        let ruleset = Ruleset::compile(Arc::clone(&registry), schema_id)?;
        let definition = registry
            .get(schema_id)
            .ok_or_else(|| ConfigError::UnknownSchema(schema.to_string()))?;

        let (entity_id, values) = match status {
            EntityStatus::Existing => {
                let entity = entity.ok_or(ConfigError::MissingEntity)?;
                if !entity.has_id() {
                    return Err(ConfigError::MissingEntityId { collection_path });
                }
                (entity.id, entity.values)
            }
            EntityStatus::New => {
                let mut values = init_entity_values(definition);
                if let Some(entity) = entity {
                    values.extend(entity.values);
                }
                (None, values)
            }
        };
        let custom_id = CustomIdAssigner::new(&definition.custom_id, status);

        info!(
            schema = definition.name.as_str(),
            collection = collection_path.as_str(),
            %status,
            id = entity_id.as_deref(),
            "opened entity form"
        );

        let schema = definition.clone();
        Ok(Self {
            registry,
            schema_id,
            schema,
            ruleset,
            collection_path,
            status,
            entity_id,
            baseline: values.clone(),
            saved: values.clone(),
            local: values,
            live: None,
            touched: IndexSet::new(),
            dirty: false,
            phase: FormPhase::Editing,
            custom_id,
            field_errors: Vec::new(),
            save_error: None,
            pending_snapshot: None,
            in_flight: None,
            next_ticket: 0,
            overrides: FieldOverrides::default(),
            hooks: FormHooks::default(),
            auto_validate: false,
        })
    }

    pub fn with_overrides(mut self, overrides: FieldOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_hooks(mut self, hooks: FormHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Re-run validation after every edit instead of only on submit.
    pub fn with_auto_validate(mut self, enabled: bool) -> Self {
        self.auto_validate = enabled;
        self
    }

    /// Writes a value anywhere inside a declared field and marks that field touched.
    pub fn set_value(&mut self, path: &FieldPath, value: Value) -> Result<(), FormError> {
        self.ensure_editable()?;
        let key = self.declared_key(path)?;
        path.assign(&mut self.local, value)
            .map_err(|reason| FormError::InvalidPath {
                pointer: path.pointer(),
                reason,
            })?;
        debug!(field = path.pointer().as_str(), "field edited");
        self.resume_editing();
        self.mark_touched(key);
        if self.auto_validate {
            self.validate();
        }
        Ok(())
    }

    pub fn set_field(&mut self, key: &str, value: Value) -> Result<(), FormError> {
        self.set_value(&FieldPath::field(key), value)
    }

    /// Marks a field touched without changing it, shielding it from live updates.
    pub fn touch(&mut self, key: &str) -> Result<(), FormError> {
        self.ensure_editable()?;
        let key = self.declared_key(&FieldPath::field(key))?;
        self.resume_editing();
        self.mark_touched(key);
        Ok(())
    }

    pub fn set_custom_id(&mut self, id: &str) -> Result<(), FormError> {
        self.ensure_editable()?;
        self.custom_id.assign(id)?;
        self.resume_editing();
        Ok(())
    }

    /// Feeds a live snapshot of this entity into the session.
    pub fn apply_snapshot(&mut self, snapshot: EntitySnapshot) -> SnapshotOutcome {
        if self.phase == FormPhase::Discarded {
            return SnapshotOutcome::Ignored;
        }
        if self.entity_id.is_none() || snapshot.id != self.entity_id {
            debug!(
                expected = self.entity_id.as_deref(),
                received = snapshot.id.as_deref(),
                "ignoring snapshot for another entity"
            );
            return SnapshotOutcome::Ignored;
        }
        if self.phase == FormPhase::Submitting {
            debug!("deferring snapshot until the save returns");
            self.pending_snapshot = Some(snapshot);
            return SnapshotOutcome::Deferred;
        }

        let merged = reconcile(
            self.schema(),
            &self.baseline,
            &snapshot.values,
            &self.local,
            &self.touched,
        );
        if !merged.conflicts.is_empty() {
            debug!(fields = ?merged.conflicts, "kept local edits over upstream changes");
        }
        self.local = merged.values;
        self.baseline = snapshot.values.clone();
        self.live = Some(snapshot.values);
        self.refresh_dirty();
        SnapshotOutcome::Applied
    }

    /// Runs the submit guards and, when they pass, moves to `Submitting`.
    /// The caller hands the request to the save collaborator and reports back
    /// through [`FormController::complete_submit`].
    pub fn begin_submit(&mut self) -> Result<SaveRequest, SubmitRejected> {
        match self.phase {
            FormPhase::Discarded => return Err(SubmitRejected::Discarded),
            FormPhase::Submitting => return Err(SubmitRejected::AlreadySubmitting),
            FormPhase::Editing | FormPhase::SaveFailed => {}
        }

        self.validate();
        if !self.custom_id.is_ready() {
            self.custom_id.flag_missing();
        }
        if !self.field_errors.is_empty() {
            info!(errors = self.field_errors.len(), "submit blocked by validation");
            return Err(SubmitRejected::Invalid(self.field_errors.clone()));
        }
        if !self.custom_id.is_ready() {
            info!("submit blocked: custom id not set");
            return Err(SubmitRejected::MissingCustomId);
        }

        let id = self.save_id();
        let values = {
            let cx = self.save_context(id.as_deref());
            self.hooks.run_pre_save(&cx, self.local.clone())
        };
        let values = match values {
            Ok(values) => values,
            Err(err) => {
                let message = format!("{err:#}");
                warn!("pre-save hook failed: {message}");
                self.phase = FormPhase::SaveFailed;
                self.save_error = Some(SaveError::PreSave(message.clone()));
                return Err(SubmitRejected::PreSave(message));
            }
        };

        let ticket = SubmitTicket(self.next_ticket);
        self.next_ticket += 1;
        self.in_flight = Some(InFlight {
            ticket,
            values: values.clone(),
        });
        self.phase = FormPhase::Submitting;
        self.save_error = None;
        info!(ticket = ticket.0, id = id.as_deref(), "submitting entity");

        Ok(SaveRequest {
            ticket,
            schema: self.schema().name.clone(),
            collection_path: self.collection_path.clone(),
            id,
            status: self.status,
            values,
        })
    }

    /// Applies the save collaborator's answer for `ticket`.
    pub fn complete_submit(
        &mut self,
        ticket: SubmitTicket,
        result: Result<(), SaveError>,
    ) -> SubmitOutcome {
        let in_flight = match self.in_flight.take() {
            Some(in_flight) if in_flight.ticket == ticket => in_flight,
            other => {
                self.in_flight = other;
                debug!(ticket = ticket.0, "ignoring stale save result");
                return SubmitOutcome::Stale;
            }
        };

        let outcome = match result {
            Ok(()) => {
                self.finish_save(in_flight.values);
                SubmitOutcome::Saved
            }
            Err(err) => {
                warn!(ticket = ticket.0, "save failed: {err}");
                self.phase = FormPhase::SaveFailed;
                self.save_error = Some(err.clone());
                SubmitOutcome::Failed(err)
            }
        };

        if let Some(snapshot) = self.pending_snapshot.take() {
            self.apply_snapshot(snapshot);
        }
        outcome
    }

    /// Abandons the session. Later snapshots and save results are ignored.
    pub fn discard(&mut self) {
        if self.phase == FormPhase::Discarded {
            return;
        }
        info!(
            collection = self.collection_path.as_str(),
            id = self.entity_id.as_deref(),
            dirty = self.dirty,
            "discarding entity form"
        );
        self.phase = FormPhase::Discarded;
        self.pending_snapshot = None;
        self.in_flight = None;
    }

    /// Validates the local values and keeps the errors for display.
    pub fn validate(&mut self) -> &[FieldError] {
        self.field_errors = self.ruleset.validate_with(&self.local, &self.overrides);
        &self.field_errors
    }

    pub fn fields(&self) -> Vec<FieldDescriptor> {
        let cx = ResolveContext::new(&self.registry, self.schema_id, &self.overrides, &self.touched)
            .with_live(self.live.as_ref())
            .with_saved(Some(&self.saved));
        resolve_fields(&self.local, &cx)
    }

    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    pub fn ruleset(&self) -> &Ruleset {
        &self.ruleset
    }

    pub fn collection_path(&self) -> &str {
        &self.collection_path
    }

    pub fn phase(&self) -> FormPhase {
        self.phase
    }

    pub fn status(&self) -> EntityStatus {
        self.status
    }

    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    pub fn values(&self) -> &EntityValues {
        &self.local
    }

    pub fn value(&self, path: &FieldPath) -> Option<&Value> {
        path.lookup(&self.local)
    }

    pub fn baseline(&self) -> &EntityValues {
        &self.baseline
    }

    pub fn live(&self) -> Option<&EntityValues> {
        self.live.as_ref()
    }

    pub fn touched(&self) -> &IndexSet<String> {
        &self.touched
    }

    pub fn is_touched(&self, key: &str) -> bool {
        self.touched.contains(key)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn field_errors(&self) -> &[FieldError] {
        &self.field_errors
    }

    pub fn save_error(&self) -> Option<&SaveError> {
        self.save_error.as_ref()
    }

    pub fn custom_id(&self) -> &CustomIdAssigner {
        &self.custom_id
    }

    pub fn has_pending_snapshot(&self) -> bool {
        self.pending_snapshot.is_some()
    }

    pub fn is_submitting(&self) -> bool {
        self.phase == FormPhase::Submitting
    }

    fn ensure_editable(&self) -> Result<(), FormError> {
        match self.phase {
            FormPhase::Discarded => Err(FormError::Discarded),
            FormPhase::Submitting => Err(FormError::Submitting),
            FormPhase::Editing | FormPhase::SaveFailed => Ok(()),
        }
    }

    /// An accepted edit after a failed save returns the form to `Editing`.
    fn resume_editing(&mut self) {
        if self.phase == FormPhase::SaveFailed {
            self.phase = FormPhase::Editing;
        }
    }

    fn declared_key(&self, path: &FieldPath) -> Result<String, FormError> {
        match path.top_level() {
            Some(key) if self.schema().properties.contains_key(key) => Ok(key.to_string()),
            _ => Err(FormError::UnknownField(path.pointer())),
        }
    }

    fn mark_touched(&mut self, key: String) {
        self.touched.insert(key);
        self.refresh_dirty();
    }

    fn refresh_dirty(&mut self) {
        let dirty = self.schema().properties.keys().any(|key| {
            let local = self.local.get(key).unwrap_or(&Value::Null);
            let baseline = self.baseline.get(key).unwrap_or(&Value::Null);
            !values_equal(local, baseline)
        });
        if dirty != self.dirty {
            self.dirty = dirty;
            debug!(dirty, "dirty state changed");
            self.hooks.notify_dirty(dirty);
        }
    }

    fn finish_save(&mut self, values: EntityValues) {
        if self.status == EntityStatus::New {
            if let Some(id) = self.custom_id.id() {
                self.entity_id = Some(id.to_string());
                self.status = EntityStatus::Existing;
            }
            self.custom_id.settle();
        }
        self.baseline = values.clone();
        self.saved = values.clone();
        self.live = Some(values.clone());
        self.local = values;
        self.touched.clear();
        self.field_errors.clear();
        self.save_error = None;
        self.phase = FormPhase::Editing;
        self.refresh_dirty();
        info!(
            collection = self.collection_path.as_str(),
            id = self.entity_id.as_deref(),
            "entity saved"
        );

        let cx = self.save_context(self.entity_id.as_deref());
        self.hooks.run_save_success(&cx, &self.local);
    }

    fn save_id(&self) -> Option<String> {
        match self.status {
            EntityStatus::Existing => self.entity_id.clone(),
            EntityStatus::New => self.custom_id.id().map(str::to_string),
        }
    }

    fn save_context<'a>(&'a self, entity_id: Option<&'a str>) -> SaveContext<'a> {
        SaveContext {
            schema: self.schema(),
            collection_path: &self.collection_path,
            entity_id,
            status: self.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;
    use crate::domain::{CustomIdPolicy, Property};

    fn registry(schema: EntitySchema) -> Arc<SchemaRegistry> {
        Arc::new(SchemaRegistry::from_schemas([schema]).expect("registry builds"))
    }

    fn product() -> EntitySchema {
        EntitySchema::new("Product")
            .with_property("name", Property::string().required())
            .with_property("price", Property::number())
    }

    fn existing(values: Value) -> Option<Entity> {
        Some(Entity::existing("p1", values.as_object().cloned().unwrap()))
    }

    #[test]
    fn existing_status_requires_an_entity_with_an_id() {
        let err = FormController::open(
            registry(product()),
            "Product",
            "products",
            EntityStatus::Existing,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingEntity));

        let nameless = Entity {
            id: Some("  ".into()),
            values: EntityValues::new(),
            status: EntityStatus::Existing,
        };
        let err = FormController::open(
            registry(product()),
            "Product",
            "products",
            EntityStatus::Existing,
            Some(nameless),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingEntityId { .. }));

        let err =
            FormController::open(registry(product()), "Order", "orders", EntityStatus::New, None)
                .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownSchema(name) if name == "Order"));
    }

    #[test]
    fn dirty_listener_fires_on_each_flip() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut form = FormController::open(
            registry(product()),
            "Product",
            "products",
            EntityStatus::Existing,
            existing(json!({"name": "Lamp", "price": 10})),
        )
        .unwrap()
        .with_hooks(FormHooks::new().with_dirty_listener(move |dirty| {
            sink.lock().unwrap().push(dirty);
        }));

        form.set_field("price", json!(11)).unwrap();
        form.set_field("price", json!(12)).unwrap();
        form.set_field("price", json!(10.0)).unwrap();
        assert!(!form.is_dirty());
        assert!(form.is_touched("price"));
        assert_eq!(*seen.lock().unwrap(), vec![true, false]);
    }

    #[test]
    fn edits_are_rejected_while_submitting_and_after_discard() {
        let mut form = FormController::open(
            registry(product()),
            "Product",
            "products",
            EntityStatus::Existing,
            existing(json!({"name": "Lamp", "price": 10})),
        )
        .unwrap();
        let request = form.begin_submit().expect("valid form submits");
        assert_eq!(form.set_field("price", json!(1)), Err(FormError::Submitting));
        assert_eq!(form.begin_submit(), Err(SubmitRejected::AlreadySubmitting));

        form.discard();
        assert_eq!(form.complete_submit(request.ticket, Ok(())), SubmitOutcome::Stale);
        assert_eq!(form.set_field("price", json!(1)), Err(FormError::Discarded));
        assert_eq!(
            form.apply_snapshot(Entity::existing("p1", EntityValues::new())),
            SnapshotOutcome::Ignored
        );
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let mut form = FormController::open(
            registry(product()),
            "Product",
            "products",
            EntityStatus::New,
            None,
        )
        .unwrap();
        assert_eq!(
            form.set_field("colour", json!("red")),
            Err(FormError::UnknownField("/colour".into()))
        );
    }

    #[test]
    fn pre_save_hook_derives_values_or_fails_the_save() {
        let schema = product().with_property("slug", Property::string().with_disabled(true));
        let mut form = FormController::open(
            registry(schema.clone()),
            "Product",
            "products",
            EntityStatus::New,
            None,
        )
        .unwrap()
        .with_hooks(FormHooks::new().with_pre_save(|_, mut values| {
            let name = values
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_lowercase();
            values.insert("slug".into(), json!(name));
            Ok(values)
        }));
        form.set_field("name", json!("Lamp")).unwrap();
        let request = form.begin_submit().unwrap();
        assert_eq!(request.values["slug"], json!("lamp"));
        assert_eq!(request.id, None);

        let mut failing =
            FormController::open(registry(schema), "Product", "products", EntityStatus::New, None)
                .unwrap()
                .with_hooks(
                    FormHooks::new().with_pre_save(|_, _| anyhow::bail!("slug service down")),
                );
        failing.set_field("name", json!("Lamp")).unwrap();
        assert!(matches!(failing.begin_submit(), Err(SubmitRejected::PreSave(_))));
        assert_eq!(failing.phase(), FormPhase::SaveFailed);
        assert!(matches!(failing.save_error(), Some(SaveError::PreSave(_))));
    }

    #[test]
    fn saving_a_custom_id_entity_makes_it_existing() {
        let schema = product().with_custom_id(CustomIdPolicy::Flag(true));
        let mut form =
            FormController::open(registry(schema), "Product", "products", EntityStatus::New, None)
                .unwrap();
        form.set_field("name", json!("Lamp")).unwrap();
        form.set_custom_id("lamp").unwrap();
        let request = form.begin_submit().unwrap();
        assert_eq!(request.id.as_deref(), Some("lamp"));

        assert_eq!(form.complete_submit(request.ticket, Ok(())), SubmitOutcome::Saved);
        assert_eq!(form.status(), EntityStatus::Existing);
        assert_eq!(form.entity_id(), Some("lamp"));

        let snapshot = Entity::existing(
            "lamp",
            json!({"name": "Lamp", "price": 3}).as_object().cloned().unwrap(),
        );
        assert_eq!(form.apply_snapshot(snapshot), SnapshotOutcome::Applied);
        assert_eq!(form.values()["price"], json!(3));
    }

    fn price_changed_upstream(form: &FormController) -> bool {
        form.fields()
            .iter()
            .find(|field| field.name == "price")
            .is_some_and(|field| field.underlying_value_changed)
    }

    #[test]
    fn edits_after_a_save_compare_against_the_saved_values() {
        let mut form = FormController::open(
            registry(product()),
            "Product",
            "products",
            EntityStatus::Existing,
            existing(json!({"name": "Lamp", "price": 10})),
        )
        .unwrap();
        let snapshot = Entity::existing(
            "p1",
            json!({"name": "Lamp", "price": 12}).as_object().cloned().unwrap(),
        );
        assert_eq!(form.apply_snapshot(snapshot), SnapshotOutcome::Applied);

        form.set_field("price", json!(15)).unwrap();
        assert!(price_changed_upstream(&form));
        let request = form.begin_submit().unwrap();
        assert_eq!(form.complete_submit(request.ticket, Ok(())), SubmitOutcome::Saved);
        assert_eq!(form.live().map(|live| &live["price"]), Some(&json!(15)));

        form.set_field("price", json!(16)).unwrap();
        assert!(!price_changed_upstream(&form));
    }
}
