//! In-memory reference implementation of the persistence contract.

use std::collections::BTreeMap;

use async_trait::async_trait;
use quartet_tonic_core::{Result, types::RecordId};
use tokio::sync::RwLock;

use super::{BlogDraft, BlogRecord, BlogStore};

/// A collection held in process memory behind an async `RwLock`.
///
/// Identifiers are freshly generated for every insert, so deleting a record
/// can never free its id for reuse. The write lock gives each operation
/// single-record atomicity; last writer wins.
#[derive(Debug, Default)]
pub struct MemoryBlogStore {
    inner: RwLock<Collection>,
}

#[derive(Debug, Default)]
struct Collection {
    rows: BTreeMap<RecordId, Row>,
    next_seq: u64,
}

/// Stored row: field content plus an insertion sequence number that keeps
/// `find_all` ties stable.
#[derive(Debug, Clone)]
struct Row {
    seq: u64,
    draft: BlogDraft,
}

impl MemoryBlogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlogStore for MemoryBlogStore {
    async fn insert(&self, draft: BlogDraft) -> Result<BlogRecord> {
        let mut coll = self.inner.write().await;
        let id = RecordId::generate();
        let seq = coll.next_seq;
        coll.next_seq += 1;
        coll.rows.insert(
            id,
            Row {
                seq,
                draft: draft.clone(),
            },
        );
        Ok(record(id, draft))
    }

    async fn find_by_id(&self, id: &RecordId) -> Result<Option<BlogRecord>> {
        let coll = self.inner.read().await;
        Ok(coll.rows.get(id).map(|row| record(*id, row.draft.clone())))
    }

    async fn find_all(&self) -> Result<Vec<BlogRecord>> {
        let coll = self.inner.read().await;
        let mut rows: Vec<_> = coll
            .rows
            .iter()
            .map(|(id, row)| (row.seq, record(*id, row.draft.clone())))
            .collect();
        rows.sort_by(|(seq_a, a), (seq_b, b)| {
            a.author_id.cmp(&b.author_id).then(seq_a.cmp(seq_b))
        });
        Ok(rows.into_iter().map(|(_, rec)| rec).collect())
    }

    async fn replace(&self, id: &RecordId, draft: BlogDraft) -> Result<Option<BlogRecord>> {
        let mut coll = self.inner.write().await;
        match coll.rows.get_mut(id) {
            Some(row) => {
                row.draft = draft.clone();
                Ok(Some(record(*id, draft)))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, id: &RecordId) -> Result<Option<BlogRecord>> {
        let mut coll = self.inner.write().await;
        Ok(coll.rows.remove(id).map(|row| record(*id, row.draft)))
    }
}

fn record(id: RecordId, draft: BlogDraft) -> BlogRecord {
    BlogRecord {
        id,
        author_id: draft.author_id,
        title: draft.title,
        content: draft.content,
    }
}
