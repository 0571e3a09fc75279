use std::fmt;

use tracing::warn;

use crate::domain::{EntitySchema, EntityStatus, EntityValues};

/// What a hook knows about the entity being saved.
#[derive(Debug, Clone, Copy)]
pub struct SaveContext<'a> {
    pub schema: &'a EntitySchema,
    pub collection_path: &'a str,
    pub entity_id: Option<&'a str>,
    pub status: EntityStatus,
}

type DirtyListener = Box<dyn FnMut(bool) + Send>;
type PreSaveHook =
    Box<dyn Fn(&SaveContext<'_>, EntityValues) -> anyhow::Result<EntityValues> + Send + Sync>;
type SaveSuccessHook =
    Box<dyn Fn(&SaveContext<'_>, &EntityValues) -> anyhow::Result<()> + Send + Sync>;

/// Callbacks around the edit lifecycle.
#[derive(Default)]
pub struct FormHooks {
    on_dirty_change: Option<DirtyListener>,
    pre_save: Option<PreSaveHook>,
    on_save_success: Option<SaveSuccessHook>,
}

impl FormHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with the new flag each time the dirty state flips.
    pub fn with_dirty_listener(mut self, listener: impl FnMut(bool) + Send + 'static) -> Self {
        self.on_dirty_change = Some(Box::new(listener));
        self
    }

    /// Derives the values that are actually saved; an error aborts the save.
    pub fn with_pre_save(
        mut self,
        hook: impl Fn(&SaveContext<'_>, EntityValues) -> anyhow::Result<EntityValues>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.pre_save = Some(Box::new(hook));
        self
    }

    pub fn with_save_success(
        mut self,
        hook: impl Fn(&SaveContext<'_>, &EntityValues) -> anyhow::Result<()>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.on_save_success = Some(Box::new(hook));
        self
    }

    pub(crate) fn notify_dirty(&mut self, dirty: bool) {
        if let Some(listener) = self.on_dirty_change.as_mut() {
            listener(dirty);
        }
    }

    pub(crate) fn run_pre_save(
        &self,
        cx: &SaveContext<'_>,
        values: EntityValues,
    ) -> anyhow::Result<EntityValues> {
        match &self.pre_save {
            Some(hook) => hook(cx, values),
            None => Ok(values),
        }
    }

    /// Failures are logged; the save already happened.
    pub(crate) fn run_save_success(&self, cx: &SaveContext<'_>, values: &EntityValues) {
        if let Some(hook) = &self.on_save_success
            && let Err(err) = hook(cx, values)
        {
            warn!(
                collection = cx.collection_path,
                id = cx.entity_id,
                "save success hook failed: {err:#}"
            );
        }
    }
}

impl fmt::Debug for FormHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormHooks")
            .field("on_dirty_change", &self.on_dirty_change.is_some())
            .field("pre_save", &self.pre_save.is_some())
            .field("on_save_success", &self.on_save_success.is_some())
            .finish()
    }
}
