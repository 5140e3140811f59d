//! Authorization gate for Warden.
//!
//! [`GateRegistrar`] turns every stored permission into an ability on a
//! [`Gate`]. Plain permissions become a check against the actor's
//! permission slugs; `Controller@method` permissions are registered under
//! their name and delegate to an action handler.
//!
//! ```ignore
//! let gate = Arc::new(GateRegistry::new());
//! let registrar = GateRegistrar::new(gate.clone(), store, cache);
//! registrar.register().await;
//! assert!(gate.allows("delete-users", &admin));
//! ```

pub mod registrar;
pub mod registry;
pub mod rule;

pub use registrar::{GateRegistrar, RegistrationReport};
pub use registry::{Gate, GateRegistry};
pub use rule::{Check, Rule};
