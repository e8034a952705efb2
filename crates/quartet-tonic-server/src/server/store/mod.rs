//! Persistence contract for blog records.
//!
//! The RPC layer only ever talks to [`BlogStore`]; the backing collection is
//! constructed at process start and injected into the blog service, never
//! reached through ambient global state. Implementations provide
//! single-record atomicity; callers do not layer their own locking on top of
//! individual operations.

mod memory;

pub use memory::MemoryBlogStore;

use async_trait::async_trait;
use quartet_tonic_core::{Result, types::RecordId};

/// A persisted blog record. The identifier is always present once a record
/// has been stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlogRecord {
    pub id: RecordId,
    pub author_id: String,
    pub title: String,
    pub content: String,
}

/// Field content for a record, without identity. Input to insert and replace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlogDraft {
    pub author_id: String,
    pub title: String,
    pub content: String,
}

/// Collection-oriented store keyed by an opaque identifier.
#[async_trait]
pub trait BlogStore: Send + Sync + 'static {
    /// Inserts a new record and returns it with a freshly assigned id.
    async fn insert(&self, draft: BlogDraft) -> Result<BlogRecord>;

    /// Looks up one record by id.
    async fn find_by_id(&self, id: &RecordId) -> Result<Option<BlogRecord>>;

    /// Returns every record, ordered by `author_id` ascending. Ties keep a
    /// stable order within one process run.
    async fn find_all(&self) -> Result<Vec<BlogRecord>>;

    /// Replaces the record with `id` in full. Returns `None` when no such
    /// record exists; never inserts.
    async fn replace(&self, id: &RecordId, draft: BlogDraft) -> Result<Option<BlogRecord>>;

    /// Removes the record with `id`, returning the removed snapshot. `None`
    /// means nothing was deleted.
    async fn delete(&self, id: &RecordId) -> Result<Option<BlogRecord>>;
}
