//! Archived object data model: SWHIDs and the sum type of objects that can
//! be fetched from, or deleted from, the software heritage archive.

/// Identifier errors.
pub mod error;
/// The `ArchivedObject` sum type.
pub mod object;
/// SWHID types.
pub mod swhid;

pub use error::Error;
pub use object::ArchivedObject;
pub use swhid::{ExtendedObjectType, ExtendedSwhid, ObjectId, ObjectType, Swhid};
