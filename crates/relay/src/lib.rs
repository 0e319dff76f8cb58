//! Queue relays between the Request API and the rendering pipeline.
//!
//! Two long-lived single-purpose consumers, one per queue role:
//!
//! - the **ingress relay** forwards submissions from the inbound queue to
//!   the rendering pipeline's work queue, unchanged, acking only after the
//!   broker confirms the outbound publish;
//! - the **completion relay** consumes finished-artifact notifications,
//!   copies the artifact into durable storage, flips the persisted request
//!   to its terminal status, and acks only once both succeeded.
//!
//! Both consume exclusively (broker-enforced single consumer per role) and
//! treat loss of the broker connection as fatal, so a supervisor restart
//! plus broker redelivery covers in-flight messages.

pub mod artifacts;
pub mod broker;
pub mod completion;
pub mod error;
pub mod ingress;
pub mod store;

pub use artifacts::ArtifactStore;
pub use broker::Broker;
pub use completion::{CompletionHandler, CompletionRelay, Disposition};
pub use error::RelayError;
pub use ingress::{IngressHandler, IngressRelay, WorkPublisher};
pub use store::{PgRequestStore, RequestStore, TerminalUpdate};
