//! Storage implementations for Lectern: sessions, artifacts and the course catalog.

pub mod artifacts;
pub mod courses;
pub mod sessions;

pub use artifacts::InMemoryArtifactStore;
pub use courses::{FileCourseCatalog, builtin_courses};
pub use sessions::InMemorySessionStore;
