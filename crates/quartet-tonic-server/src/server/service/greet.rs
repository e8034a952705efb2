//! The greet service: one handler per call shape.
//!
//! `Greet` is plain unary, `GreetManyTimes` streams ten paced responses,
//! `LongGreet` aggregates a client stream, `GreetEveryone` answers every
//! inbound greeting on a concurrently open response stream, and
//! `GreetWithDeadline` runs simulated work under the per-call supervisor.

use core::pin::Pin;

use futures::{Stream, StreamExt};
use quartet_tonic_core::Error;
use quartet_tonic_core::proto::greet::greet_service_server::GreetService;
use quartet_tonic_core::proto::greet::{
    GreetEveryoneRequest, GreetEveryoneResponse, GreetManyTimesRequest, GreetManyTimesResponse,
    GreetRequest, GreetResponse, GreetWithDeadlineRequest, GreetWithDeadlineResponse, Greeting,
    LongGreetRequest, LongGreetResponse,
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status, Streaming};

use crate::server::config::ServerConfig;
use crate::server::context::CallContext;
use crate::server::shutdown::Shutdown;

/// Implements every call shape of the greet contract.
#[derive(Clone)]
pub struct GreetServer {
    config: ServerConfig,
    shutdown: Shutdown,
}

impl GreetServer {
    pub fn new(config: ServerConfig, shutdown: Shutdown) -> Self {
        Self { config, shutdown }
    }

    fn hello(greeting: &Greeting) -> String {
        format!("Hello {} {}", greeting.first_name, greeting.last_name)
    }

    /// Aggregation half of `LongGreet`, generic over the inbound stream so it
    /// can be driven without a transport.
    ///
    /// Waiting for the next inbound greeting is a suspension point, so the
    /// wait races against the call supervisor.
    async fn long_greet_inner<S>(mut requests: S, ctx: &CallContext) -> Result<String, Status>
    where
        S: Stream<Item = Result<LongGreetRequest, Status>> + Unpin,
    {
        let mut result = String::new();
        loop {
            let next = tokio::select! {
                next = requests.next() => next,
                () = ctx.expired() => return Err(Error::DeadlineExceeded.into()),
            };

            match next {
                Some(req) => {
                    let greeting = req?.greeting.unwrap_or_default();
                    result.push_str(&format!("Hello {} ! ", greeting.first_name));
                }
                None => return Ok(result),
            }
        }
    }

    /// Inbound half of `GreetEveryone`: one response per greeting, in arrival
    /// order, until the caller closes its side.
    async fn greet_everyone_inner<S>(
        mut inbound: S,
        resp_tx: mpsc::Sender<Result<GreetEveryoneResponse, Status>>,
        shutdown: Shutdown,
    ) where
        S: Stream<Item = Result<GreetEveryoneRequest, Status>> + Unpin,
    {
        loop {
            let next = tokio::select! {
                next = inbound.next() => next,
                () = shutdown.cancelled() => {
                    let _ = resp_tx.send(Err(Error::ServiceShutdown.into())).await;
                    return;
                }
            };

            match next {
                Some(Ok(req)) => {
                    let greeting = req.greeting.unwrap_or_default();
                    let msg = GreetEveryoneResponse {
                        result: format!("Hello {}, {}!", greeting.first_name, greeting.last_name),
                    };
                    if resp_tx.send(Ok(msg)).await.is_err() {
                        // Client stopped consuming; release the channel.
                        tracing::debug!("GreetEveryone response stream abandoned");
                        return;
                    }
                }
                Some(Err(_status)) => {
                    // An aborted inbound stream is a completion signal, not a
                    // failure of this handler.
                    tracing::debug!("GreetEveryone inbound stream ended: {_status}");
                    return;
                }
                None => return,
            }
        }
    }
}

#[tonic::async_trait]
impl GreetService for GreetServer {
    async fn greet(&self, req: Request<GreetRequest>) -> Result<Response<GreetResponse>, Status> {
        let greeting = req.into_inner().greeting.unwrap_or_default();
        Ok(Response::new(GreetResponse {
            result: Self::hello(&greeting),
        }))
    }

    type GreetManyTimesStream = Pin<Box<dyn Stream<Item = Result<GreetManyTimesResponse, Status>> + Send>>;

    /// Streams exactly ten greetings, one per pacing interval.
    #[tracing::instrument(skip_all)]
    async fn greet_many_times(
        &self,
        req: Request<GreetManyTimesRequest>,
    ) -> Result<Response<Self::GreetManyTimesStream>, Status> {
        if self.shutdown.is_shutting_down() {
            return Err(Error::ServiceShutdown.into());
        }

        let greeting = req.into_inner().greeting.unwrap_or_default();
        let hello = Self::hello(&greeting);
        let pace = self.config.pace_interval;
        let shutdown = self.shutdown.clone();
        let (resp_tx, resp_rx) = mpsc::channel(self.config.stream_buffer_size);

        tokio::spawn(async move {
            let _guard = shutdown.register_stream();
            for i in 0..10 {
                let msg = GreetManyTimesResponse {
                    result: format!("{hello} number {i}"),
                };
                if resp_tx.send(Ok(msg)).await.is_err() {
                    tracing::debug!("GreetManyTimes stream abandoned by client");
                    return;
                }
                tokio::select! {
                    () = tokio::time::sleep(pace) => {}
                    () = shutdown.cancelled() => {
                        let _ = resp_tx.send(Err(Error::ServiceShutdown.into())).await;
                        return;
                    }
                }
            }
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(resp_rx))))
    }

    /// Aggregates the whole client stream into one accumulated greeting.
    #[tracing::instrument(skip_all)]
    async fn long_greet(
        &self,
        req: Request<Streaming<LongGreetRequest>>,
    ) -> Result<Response<LongGreetResponse>, Status> {
        let ctx = CallContext::from_request(&req);
        let result = Self::long_greet_inner(req.into_inner(), &ctx).await?;
        Ok(Response::new(LongGreetResponse { result }))
    }

    type GreetEveryoneStream = Pin<Box<dyn Stream<Item = Result<GreetEveryoneResponse, Status>> + Send>>;

    /// Bidirectional greeting: both directions progress concurrently; the
    /// response stream closes when the caller finishes sending.
    #[tracing::instrument(skip_all)]
    async fn greet_everyone(
        &self,
        req: Request<Streaming<GreetEveryoneRequest>>,
    ) -> Result<Response<Self::GreetEveryoneStream>, Status> {
        if self.shutdown.is_shutting_down() {
            return Err(Error::ServiceShutdown.into());
        }

        let inbound = req.into_inner();
        let shutdown = self.shutdown.clone();
        let (resp_tx, resp_rx) = mpsc::channel(self.config.stream_buffer_size);

        tokio::spawn(async move {
            let _guard = shutdown.register_stream();
            Self::greet_everyone_inner(inbound, resp_tx, shutdown.clone()).await;
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(resp_rx))))
    }

    /// Performs a fixed number of simulated work units, checking the call
    /// supervisor before each; the caller's budget comes from `grpc-timeout`.
    #[tracing::instrument(skip_all)]
    async fn greet_with_deadline(
        &self,
        req: Request<GreetWithDeadlineRequest>,
    ) -> Result<Response<GreetWithDeadlineResponse>, Status> {
        let ctx = CallContext::from_request(&req);
        let greeting = req.into_inner().greeting.unwrap_or_default();

        for _ in 0..self.config.work_units {
            ctx.checkpoint()?;
            tokio::time::sleep(self.config.work_unit).await;
        }

        Ok(Response::new(GreetWithDeadlineResponse {
            result: Self::hello(&greeting),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;
    use futures::stream;
    use tonic::metadata::MetadataValue;

    fn greeter() -> GreetServer {
        GreetServer::new(ServerConfig::for_tests(), Shutdown::new())
    }

    fn greeting(first: &str, last: &str) -> Greeting {
        Greeting {
            first_name: first.to_string(),
            last_name: last.to_string(),
        }
    }

    #[tokio::test]
    async fn greet_formats_the_name() {
        let resp = greeter()
            .greet(Request::new(GreetRequest {
                greeting: Some(greeting("Dom", "Lee")),
            }))
            .await
            .unwrap();
        assert_eq!(resp.into_inner().result, "Hello Dom Lee");
    }

    #[tokio::test]
    async fn greet_many_times_emits_exactly_ten_indexed_responses() {
        let resp = greeter()
            .greet_many_times(Request::new(GreetManyTimesRequest {
                greeting: Some(greeting("A", "B")),
            }))
            .await
            .unwrap();

        let mut stream = resp.into_inner();
        let mut results = Vec::new();
        while let Some(item) = stream.next().await {
            results.push(item.unwrap().result);
        }

        assert_eq!(results.len(), 10);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result, &format!("Hello A B number {i}"));
        }
    }

    #[tokio::test]
    async fn long_greet_concatenates_in_arrival_order() {
        let requests = ["Yellow", "Pink", "Hunter"].map(|first| {
            Ok(LongGreetRequest {
                greeting: Some(greeting(first, "X")),
            })
        });

        let ctx = CallContext::new(None);
        let result = GreetServer::long_greet_inner(stream::iter(requests), &ctx)
            .await
            .unwrap();
        assert_eq!(result, "Hello Yellow ! Hello Pink ! Hello Hunter ! ");
    }

    #[tokio::test]
    async fn long_greet_of_nothing_is_empty() {
        let empty: Vec<Result<LongGreetRequest, Status>> = Vec::new();
        let ctx = CallContext::new(None);
        let result = GreetServer::long_greet_inner(stream::iter(empty), &ctx)
            .await
            .unwrap();
        assert_eq!(result, "");
    }

    #[tokio::test(start_paused = true)]
    async fn long_greet_aborts_when_the_deadline_expires_mid_stream() {
        // The caller never completes its stream; the supervisor fires first.
        let ctx = CallContext::new(Some(Duration::from_millis(50)));
        let status =
            GreetServer::long_greet_inner(stream::pending::<Result<LongGreetRequest, Status>>(), &ctx)
                .await
                .unwrap_err();
        assert_eq!(status.code(), tonic::Code::DeadlineExceeded);
    }

    #[tokio::test]
    async fn greet_everyone_answers_each_greeting_in_order() {
        let inbound = [("Jonny", "Cash"), ("Jesus", "Wong")].map(|(first, last)| {
            Ok(GreetEveryoneRequest {
                greeting: Some(greeting(first, last)),
            })
        });
        let (resp_tx, mut resp_rx) = mpsc::channel(8);

        GreetServer::greet_everyone_inner(stream::iter(inbound), resp_tx, Shutdown::new()).await;

        let mut results = Vec::new();
        while let Some(item) = resp_rx.recv().await {
            results.push(item.unwrap().result);
        }
        assert_eq!(results, ["Hello Jonny, Cash!", "Hello Jesus, Wong!"]);
    }

    #[tokio::test(start_paused = true)]
    async fn greet_with_deadline_succeeds_within_budget() {
        let resp = greeter()
            .greet_with_deadline(Request::new(GreetWithDeadlineRequest {
                greeting: Some(greeting("Dom", "Lee")),
            }))
            .await
            .unwrap();
        assert_eq!(resp.into_inner().result, "Hello Dom Lee");
    }

    #[tokio::test(start_paused = true)]
    async fn greet_with_deadline_fails_when_the_budget_is_too_short() {
        // Three 30 ms work units against a 50 ms budget: the third checkpoint
        // observes the expired deadline.
        let mut req = Request::new(GreetWithDeadlineRequest {
            greeting: Some(greeting("Dom", "Lee")),
        });
        req.metadata_mut()
            .insert("grpc-timeout", MetadataValue::from_static("50m"));

        let status = greeter().greet_with_deadline(req).await.unwrap_err();
        assert_eq!(status.code(), tonic::Code::DeadlineExceeded);
    }
}
