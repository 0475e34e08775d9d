//! Synchronises the four asset tables (products, repairs, maintenance and
//! specs) from a spreadsheet backend into a joined, queryable in-memory
//! snapshot, with a persisted copy for offline use.
//!
//! Raw tables come in through [`io`], are normalised by [`mapping`] and
//! [`snapshot`], and are committed by the [`sync::SyncCoordinator`], which
//! also keeps the [`cache`] current. Repair statistics live in [`summary`].

pub mod cache;
pub mod config;
pub mod error;
pub mod io;
pub mod logging;
pub mod mapping;
pub mod model;
pub mod query;
pub mod snapshot;
pub mod summary;
pub mod sync;

pub use config::{SyncConfig, Table};
pub use error::{ErrorKind, Result, SyncError};
pub use mapping::FieldDictionary;
pub use model::{FieldValue, Product, RawTable, Record, RelationIndex, RepairSummary, SyncSnapshot};
pub use sync::{SyncCoordinator, SyncOutcome, SyncState};
