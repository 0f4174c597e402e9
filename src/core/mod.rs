pub mod port_allocator;
pub mod registry;
pub mod session;
pub mod supervisor;

pub use registry::{BackendFactory, HealthReport, SessionRegistry};
pub use session::{PortRange, SessionRecord, SessionView};
pub use supervisor::{Backend, BackendSupervisor};
