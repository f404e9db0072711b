pub mod reconciler;
pub mod store;
pub mod tick_buffer;

pub use reconciler::{
    plan_fetch, reconcile, CandidateSessions, DateRange, Reconciliation, ReconciliationCase,
};
pub use store::SessionStore;
pub use tick_buffer::LiveTickBuffer;
