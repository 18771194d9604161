//! # rust_cld
//!
//! Configuration-driven component builder with a data log lifecycle.
//!
//! A declarative document lists named objects (controllers, logs, channels,
//! calibrations). The builder turns it into an [`ObjectRegistry`]; log components in
//! the registry then move through `open → run → stop → rotate` while a background
//! acquisition thread feeds them records.
//!
//! ## Crate Structure
//!
//! - **`document`**: loads the TOML object document into a tree of declarations.
//! - **`builder`**: resolves type tags through a factory table and fills the registry.
//! - **`registry`**: name-keyed, ordered, read-only-after-build object store.
//! - **`object`**: the runtime object variants.
//! - **`core`**: `Named`/`Lifecycle` traits, `LifecycleState`, `DataRecord`.
//! - **`log_file`**: the CSV-backed log component.
//! - **`acquisition`** / **`ticker`**: the background sampling loop and its cancellable tick.
//! - **`toggle`** / **`context`**: the on/off handler and the startup-built context.
//! - **`config`**, **`error`**, **`tracing_init`**: settings, error taxonomy, logging setup.
//!
//! ```no_run
//! use rust_cld::{config::Settings, context::Context, toggle::LogTarget};
//!
//! let context = Context::new(Settings::load()?)?;
//! context.set_logging(true, &LogTarget::All)?;
//! // ...
//! context.set_logging(false, &LogTarget::All)?;
//! # Ok::<(), rust_cld::error::CldError>(())
//! ```

pub mod acquisition;
pub mod builder;
pub mod config;
pub mod context;
pub mod core;
pub mod document;
pub mod error;
pub mod log_file;
pub mod object;
pub mod registry;
pub mod ticker;
pub mod toggle;
pub mod tracing_init;

pub use builder::build;
pub use core::{DataRecord, Lifecycle, LifecycleState, Named};
pub use error::{CldError, CldResult};
pub use log_file::LogComponent;
pub use registry::ObjectRegistry;
