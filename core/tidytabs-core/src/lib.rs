//! # tidytabs-core
//!
//! Keeps the number of open editor tabs under control. The library tracks when
//! each document window was last relevant and closes windows that have gone
//! stale or that push the tab count over a cap.
//!
//! ## Design Principles
//!
//! - **Host-agnostic**: the IDE is reached only through [`DocumentHost`].
//! - **One pass at a time**: eviction passes and batch ledger updates share a
//!   single purge lock; triggers queue on one background worker.
//! - **Contained failures**: a host call that fails costs one window in one
//!   pass, never the event-delivery thread.
//! - **Never close what matters**: the active window, unsaved documents and
//!   pinned tabs are always left alone.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tidytabs_core::{SystemClock, TabEvent, TidyService};
//!
//! let service = TidyService::start(host, Arc::new(SystemClock))?;
//! service.handle_event(TabEvent::BuildBegin);
//! let report = service.tidy_now();
//! ```

pub mod clock;
pub mod config;
pub mod dispatcher;
pub mod eligibility;
pub mod error;
pub mod host;
pub mod idle;
pub mod ledger;
pub mod memory;
pub mod planner;
mod worker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::*;
pub use dispatcher::{PurgeTrigger, TabEvent, TidyReport, TidyService, TidyStats};
pub use eligibility::{attempt_close, check_closable, CloseOutcome, Ineligible, Verdict};
pub use error::{Result, TidyError};
pub use host::{DocumentHost, DocumentState, WindowHandle, WindowId, WindowKind, WindowState};
pub use idle::IdleCompensator;
pub use ledger::ActivityLedger;
pub use memory::{InMemoryHost, WindowSpec};
pub use planner::{EvictionPlanner, PassKind, PassReport};
