//! Declarative resources: the descriptor store, the directory loader and
//! the exporter back into descriptor form.

pub mod descriptor;
pub mod exporter;
pub mod loader;
pub mod store;

pub use exporter::{RoleExporter, UserExporter};
pub use loader::{LoaderError, RoleResourceLoader, UserResourceLoader};
pub use store::{DeclarativeRoleStore, DeclarativeUser, DeclarativeUserStore};
