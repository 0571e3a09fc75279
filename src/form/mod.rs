//! Per-entity edit session: field resolution, reconciliation with live data
//! and the submit/discard lifecycle.

mod controller;
mod custom_id;
mod descriptor;
mod error;
mod hooks;
mod overrides;
mod reconcile;
mod resolver;

pub use controller::{
    FormController, FormPhase, SaveRequest, SnapshotOutcome, SubmitOutcome, SubmitTicket,
};
pub use custom_id::{CustomIdAssigner, CustomIdError, CustomIdState};
pub use descriptor::{FieldDescriptor, Widget};
pub use error::{ConfigError, FormError, SaveError, SubmitRejected};
pub use hooks::{FormHooks, SaveContext};
pub use overrides::{FieldOverrides, FieldPreview, FieldRenderer};
pub use reconcile::{Reconciliation, reconcile, slots_equal, values_equal};
pub use resolver::{ResolveContext, resolve, resolve_fields};
