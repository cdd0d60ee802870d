//! h1probe-runner: raw TCP transport and the concurrent case runner

pub mod exchange;
pub mod generate;
pub mod runner;
pub mod suites;
pub mod transport;

pub use exchange::{Exchange, Settings};
pub use runner::{RunError, Runner, StopHandle};
pub use suites::cases_from_config;
pub use transport::{Connection, Recv, TransportError};
