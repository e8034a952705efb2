//! The blog service: CRUD over one record type, bound to an injected
//! persistence adapter.
//!
//! The handlers validate identifiers, delegate to the [`BlogStore`], and map
//! adapter outcomes onto the error taxonomy. All real persistence behavior
//! lives behind the store trait.

use core::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use quartet_tonic_core::Error;
use quartet_tonic_core::proto::blog::blog_service_server::BlogService;
use quartet_tonic_core::proto::blog::{
    Blog, CreateBlogRequest, CreateBlogResponse, DeleteBlogRequest, DeleteBlogResponse,
    ListBlogsRequest, ListBlogsResponse, ReadBlogRequest, ReadBlogResponse, UpdateBlogRequest,
    UpdateBlogResponse,
};
use quartet_tonic_core::types::RecordId;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};

use crate::server::config::ServerConfig;
use crate::server::shutdown::Shutdown;
use crate::server::store::{BlogDraft, BlogRecord, BlogStore};

/// Implements the blog contract over an injected [`BlogStore`].
#[derive(Clone)]
pub struct BlogServer {
    config: ServerConfig,
    store: Arc<dyn BlogStore>,
    shutdown: Shutdown,
}

impl BlogServer {
    pub fn new(config: ServerConfig, store: Arc<dyn BlogStore>, shutdown: Shutdown) -> Self {
        Self {
            config,
            store,
            shutdown,
        }
    }

    /// Malformed text never reaches the adapter.
    fn parse_id(raw: &str) -> Result<RecordId, Error> {
        raw.parse::<RecordId>().map_err(Error::from)
    }

    fn to_proto(record: BlogRecord) -> Blog {
        Blog {
            id: record.id.to_string(),
            author_id: record.author_id,
            title: record.title,
            content: record.content,
        }
    }

    fn draft_from(blog: Blog) -> BlogDraft {
        BlogDraft {
            author_id: blog.author_id,
            title: blog.title,
            content: blog.content,
        }
    }

    fn not_found(id: &RecordId) -> Error {
        Error::NotFound {
            reason: format!("Cannot find blog with id {id}"),
        }
    }
}

#[tonic::async_trait]
impl BlogService for BlogServer {
    /// Inserts the record; the store assigns the identifier.
    #[tracing::instrument(skip_all)]
    async fn create_blog(
        &self,
        req: Request<CreateBlogRequest>,
    ) -> Result<Response<CreateBlogResponse>, Status> {
        let blog = req.into_inner().blog.unwrap_or_default();
        let record = self.store.insert(Self::draft_from(blog)).await?;

        Ok(Response::new(CreateBlogResponse {
            blog: Some(Self::to_proto(record)),
        }))
    }

    #[tracing::instrument(skip_all)]
    async fn read_blog(
        &self,
        req: Request<ReadBlogRequest>,
    ) -> Result<Response<ReadBlogResponse>, Status> {
        let id = Self::parse_id(&req.into_inner().blog_id)?;
        let record = self
            .store
            .find_by_id(&id)
            .await?
            .ok_or_else(|| Self::not_found(&id))?;

        Ok(Response::new(ReadBlogResponse {
            blog: Some(Self::to_proto(record)),
        }))
    }

    /// Full replace of an existing record; never an upsert.
    #[tracing::instrument(skip_all)]
    async fn update_blog(
        &self,
        req: Request<UpdateBlogRequest>,
    ) -> Result<Response<UpdateBlogResponse>, Status> {
        let blog = req.into_inner().blog.unwrap_or_default();
        let id = Self::parse_id(&blog.id)?;
        let record = self
            .store
            .replace(&id, Self::draft_from(blog))
            .await?
            .ok_or_else(|| Self::not_found(&id))?;

        Ok(Response::new(UpdateBlogResponse {
            blog: Some(Self::to_proto(record)),
        }))
    }

    /// Removes the record and returns the pre-deletion snapshot. Deleting an
    /// unknown id fails not-found, matching Read and Update.
    #[tracing::instrument(skip_all)]
    async fn delete_blog(
        &self,
        req: Request<DeleteBlogRequest>,
    ) -> Result<Response<DeleteBlogResponse>, Status> {
        let id = Self::parse_id(&req.into_inner().blog_id)?;
        let record = self
            .store
            .delete(&id)
            .await?
            .ok_or_else(|| Self::not_found(&id))?;

        Ok(Response::new(DeleteBlogResponse {
            blog: Some(Self::to_proto(record)),
        }))
    }

    type ListBlogsStream = Pin<Box<dyn Stream<Item = Result<ListBlogsResponse, Status>> + Send>>;

    /// Streams every record, ordered by author.
    #[tracing::instrument(skip_all)]
    async fn list_blogs(
        &self,
        _req: Request<ListBlogsRequest>,
    ) -> Result<Response<Self::ListBlogsStream>, Status> {
        if self.shutdown.is_shutting_down() {
            return Err(Error::ServiceShutdown.into());
        }

        let records = self.store.find_all().await?;
        let shutdown = self.shutdown.clone();
        let (resp_tx, resp_rx) = mpsc::channel(self.config.stream_buffer_size);

        tokio::spawn(async move {
            let _guard = shutdown.register_stream();
            for record in records {
                let msg = ListBlogsResponse {
                    blog: Some(Self::to_proto(record)),
                };
                tokio::select! {
                    sent = resp_tx.send(Ok(msg)) => {
                        if sent.is_err() {
                            tracing::debug!("ListBlogs stream abandoned by client");
                            return;
                        }
                    }
                    () = shutdown.cancelled() => {
                        let _ = resp_tx.send(Err(Error::ServiceShutdown.into())).await;
                        return;
                    }
                }
            }
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(resp_rx))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::store::MemoryBlogStore;
    use futures::StreamExt;
    use tonic::Code;

    fn blog_server() -> BlogServer {
        BlogServer::new(
            ServerConfig::for_tests(),
            Arc::new(MemoryBlogStore::new()),
            Shutdown::new(),
        )
    }

    fn draft_proto(author: &str, title: &str) -> Blog {
        Blog {
            id: String::new(),
            author_id: author.to_string(),
            title: title.to_string(),
            content: format!("content of {title}"),
        }
    }

    async fn create(server: &BlogServer, author: &str, title: &str) -> Blog {
        server
            .create_blog(Request::new(CreateBlogRequest {
                blog: Some(draft_proto(author, title)),
            }))
            .await
            .unwrap()
            .into_inner()
            .blog
            .unwrap()
    }

    #[tokio::test]
    async fn create_then_read_round_trips_with_an_assigned_id() {
        let server = blog_server();
        let created = create(&server, "ada", "first").await;

        assert!(!created.id.is_empty());
        assert_eq!(created.author_id, "ada");
        assert_eq!(created.title, "first");

        let read = server
            .read_blog(Request::new(ReadBlogRequest {
                blog_id: created.id.clone(),
            }))
            .await
            .unwrap()
            .into_inner()
            .blog
            .unwrap();
        assert_eq!(read, created);
    }

    #[tokio::test]
    async fn read_with_a_malformed_id_is_invalid_argument() {
        let status = blog_server()
            .read_blog(Request::new(ReadBlogRequest {
                blog_id: "not-a-valid-id".to_string(),
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn read_with_an_unassigned_id_is_not_found() {
        let status = blog_server()
            .read_blog(Request::new(ReadBlogRequest {
                blog_id: RecordId::generate().to_string(),
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::NotFound);
    }

    #[tokio::test]
    async fn update_replaces_every_field() {
        let server = blog_server();
        let created = create(&server, "ada", "old").await;

        let updated = server
            .update_blog(Request::new(UpdateBlogRequest {
                blog: Some(Blog {
                    id: created.id.clone(),
                    author_id: "ada".to_string(),
                    title: "new".to_string(),
                    content: "rewritten".to_string(),
                }),
            }))
            .await
            .unwrap()
            .into_inner()
            .blog
            .unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.title, "new");
        assert_eq!(updated.content, "rewritten");
    }

    #[tokio::test]
    async fn update_of_an_unknown_id_is_not_found_and_creates_nothing() {
        let server = blog_server();
        let ghost = RecordId::generate().to_string();

        let status = server
            .update_blog(Request::new(UpdateBlogRequest {
                blog: Some(Blog {
                    id: ghost.clone(),
                    ..draft_proto("ada", "ghost")
                }),
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::NotFound);

        let status = server
            .read_blog(Request::new(ReadBlogRequest { blog_id: ghost }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::NotFound);
    }

    #[tokio::test]
    async fn delete_returns_the_snapshot_then_not_found() {
        let server = blog_server();
        let created = create(&server, "ada", "gone").await;

        let deleted = server
            .delete_blog(Request::new(DeleteBlogRequest {
                blog_id: created.id.clone(),
            }))
            .await
            .unwrap()
            .into_inner()
            .blog
            .unwrap();
        assert_eq!(deleted, created);

        let status = server
            .delete_blog(Request::new(DeleteBlogRequest {
                blog_id: created.id.clone(),
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::NotFound);

        let status = server
            .read_blog(Request::new(ReadBlogRequest {
                blog_id: created.id,
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::NotFound);
    }

    #[tokio::test]
    async fn list_streams_records_ordered_by_author() {
        let server = blog_server();
        create(&server, "carol", "c1").await;
        create(&server, "ada", "a1").await;
        create(&server, "ada", "a2").await;
        create(&server, "bob", "b1").await;

        let resp = server
            .list_blogs(Request::new(ListBlogsRequest {}))
            .await
            .unwrap();

        let mut stream = resp.into_inner();
        let mut titles = Vec::new();
        while let Some(item) = stream.next().await {
            titles.push(item.unwrap().blog.unwrap().title);
        }
        assert_eq!(titles, ["a1", "a2", "b1", "c1"]);
    }

    #[tokio::test]
    async fn list_of_an_empty_store_closes_immediately() {
        let resp = blog_server()
            .list_blogs(Request::new(ListBlogsRequest {}))
            .await
            .unwrap();

        let mut stream = resp.into_inner();
        assert!(stream.next().await.is_none());
    }
}
