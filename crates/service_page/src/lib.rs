//! Service details page: navigation context tracking, cancel-then-refetch
//! orchestration and page state reconciliation.

pub mod context;
pub mod controller;
pub mod driver;
pub mod state;

pub use context::{ContextChange, NavigationContext, ServiceDetailsProps, Tab};
pub use controller::{PageFetch, PageIntent, ServiceDetailsController};
pub use driver::{run_page, PageInput};
pub use state::{PagePhase, PageState, WizardState};

#[cfg(test)]
#[path = "tests/scripted_api.rs"]
mod scripted_api;
