//! The reconciliation engine: cycles and the scheduler that drives them.

mod clock;
mod reconciler;
mod scheduler;

pub use clock::CheckClock;
pub use reconciler::{ReconcileOutcome, Reconciler, SERVICE_ALERT_HEADER, service_alert};
pub use scheduler::{Scheduler, SchedulerState};
