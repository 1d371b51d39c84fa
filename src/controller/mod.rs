pub mod context;
pub mod defaults;
pub mod error;
pub mod events;
pub mod reconciler;
pub mod status;
pub mod sync;

pub use context::{Context, RetryTracker};
pub use defaults::apply_defaults;
pub use error::{BackoffConfig, Error, Result};
pub use events::{EventSeverity, EventSink, KubeEventSink};
pub use reconciler::{RESYNC_INTERVAL, error_policy, reconcile};
pub use status::{ConditionBuilder, Observation, StatusManager};
pub use sync::{
    RegistrationWarning, ResourceSyncer, SyncError, SyncOutcome, SyncReport, Synchronizer,
};
