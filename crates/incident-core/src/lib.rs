pub mod config;
pub mod desk;
pub mod error;
pub mod hooks;
pub mod incident;
pub mod io;
pub mod paths;
pub mod runbook;
pub mod session;
pub mod severity;
pub mod store;
pub mod timeline;
pub mod types;

pub use desk::IncidentDesk;
pub use error::{IncidentError, Result};
pub use incident::Incident;
pub use session::{IncidentSession, Services};
pub use types::{Severity, SlaStatus, Status};
