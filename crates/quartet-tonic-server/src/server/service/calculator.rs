//! The calculator service: streaming arithmetic over the four call shapes.
//!
//! `Sum` and `SquareRoot` are unary, `DecomposePrimeNumber` streams factors,
//! `ComputeAverage` aggregates a client stream, and `FindMaximum` keeps a
//! running maximum across two concurrently progressing directions.

use core::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use quartet_tonic_core::Error;
use quartet_tonic_core::proto::calculator::calculator_service_server::CalculatorService;
use quartet_tonic_core::proto::calculator::{
    ComputeAverageRequest, ComputeAverageResponse, FindMaximumRequest, FindMaximumResponse,
    PrimeNumberDecompositionRequest, PrimeNumberDecompositionResponse, SquareRootRequest,
    SquareRootResponse, SumRequest, SumResponse,
};
use tokio::sync::{Mutex, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status, Streaming};

use crate::server::config::ServerConfig;
use crate::server::shutdown::Shutdown;

/// Implements the calculator contract.
#[derive(Clone)]
pub struct CalculatorServer {
    config: ServerConfig,
    shutdown: Shutdown,
}

impl CalculatorServer {
    pub fn new(config: ServerConfig, shutdown: Shutdown) -> Self {
        Self { config, shutdown }
    }

    /// Aggregation half of `ComputeAverage`, generic over the inbound stream.
    ///
    /// Completing without a single sample is a caller error; the mean of an
    /// empty sequence is undefined here rather than NaN.
    async fn average_inner<S>(mut samples: S) -> Result<f64, Status>
    where
        S: Stream<Item = Result<ComputeAverageRequest, Status>> + Unpin,
    {
        let mut sum: i64 = 0;
        let mut count: u64 = 0;

        while let Some(req) = samples.next().await {
            sum = sum.wrapping_add(req?.number);
            count += 1;
        }

        if count == 0 {
            return Err(Error::InvalidRequest {
                reason: "Cannot average an empty stream of numbers".to_string(),
            }
            .into());
        }

        Ok(sum as f64 / count as f64)
    }

    /// Inbound half of `FindMaximum`.
    ///
    /// The running maximum is the one piece of state shared between the
    /// consuming direction and the emitting direction; it lives behind a
    /// mutex so neither side can lose an update.
    async fn find_maximum_inner<S>(
        mut numbers: S,
        resp_tx: mpsc::Sender<Result<FindMaximumResponse, Status>>,
        shutdown: Shutdown,
    ) where
        S: Stream<Item = Result<FindMaximumRequest, Status>> + Unpin,
    {
        let running_max = Arc::new(Mutex::new(0_i64));

        loop {
            let next = tokio::select! {
                next = numbers.next() => next,
                () = shutdown.cancelled() => {
                    let _ = resp_tx.send(Err(Error::ServiceShutdown.into())).await;
                    return;
                }
            };

            match next {
                Some(Ok(req)) => {
                    let new_max = {
                        let mut cur = running_max.lock().await;
                        if req.number > *cur {
                            *cur = req.number;
                            Some(*cur)
                        } else {
                            None
                        }
                    };

                    if let Some(max_number) = new_max {
                        if resp_tx
                            .send(Ok(FindMaximumResponse { max_number }))
                            .await
                            .is_err()
                        {
                            tracing::debug!("FindMaximum response stream abandoned");
                            return;
                        }
                    }
                }
                Some(Err(_status)) => {
                    tracing::debug!("FindMaximum inbound stream ended: {_status}");
                    return;
                }
                // End of input closes the output direction.
                None => return,
            }
        }
    }
}

#[tonic::async_trait]
impl CalculatorService for CalculatorServer {
    async fn sum(&self, req: Request<SumRequest>) -> Result<Response<SumResponse>, Status> {
        let req = req.into_inner();
        // Native two's-complement wraparound, matching the wire type's width.
        Ok(Response::new(SumResponse {
            result: req.num_1.wrapping_add(req.num_2),
        }))
    }

    async fn square_root(
        &self,
        req: Request<SquareRootRequest>,
    ) -> Result<Response<SquareRootResponse>, Status> {
        let number = req.into_inner().number;

        if number < 0 {
            return Err(Error::InvalidRequest {
                reason: format!("Received a negative number: {number}"),
            }
            .into());
        }

        Ok(Response::new(SquareRootResponse {
            result: f64::from(number).sqrt(),
        }))
    }

    type DecomposePrimeNumberStream =
        Pin<Box<dyn Stream<Item = Result<PrimeNumberDecompositionResponse, Status>> + Send>>;

    /// Streams the prime factorization of `number` by trial division, one
    /// factor per response in non-decreasing order. For `number <= 1` the
    /// stream is empty.
    #[tracing::instrument(skip_all, fields(number = req.get_ref().number))]
    async fn decompose_prime_number(
        &self,
        req: Request<PrimeNumberDecompositionRequest>,
    ) -> Result<Response<Self::DecomposePrimeNumberStream>, Status> {
        if self.shutdown.is_shutting_down() {
            return Err(Error::ServiceShutdown.into());
        }

        let mut n = req.into_inner().number;
        let shutdown = self.shutdown.clone();
        let (resp_tx, resp_rx) = mpsc::channel(self.config.stream_buffer_size);

        tokio::spawn(async move {
            let _guard = shutdown.register_stream();
            let mut k = 2_i64;
            while n > 1 {
                if n % k == 0 {
                    let msg = PrimeNumberDecompositionResponse { result: k };
                    tokio::select! {
                        sent = resp_tx.send(Ok(msg)) => {
                            if sent.is_err() {
                                tracing::debug!("DecomposePrimeNumber stream abandoned");
                                return;
                            }
                        }
                        () = shutdown.cancelled() => {
                            let _ = resp_tx.send(Err(Error::ServiceShutdown.into())).await;
                            return;
                        }
                    }
                    n /= k;
                } else {
                    k += 1;
                }
            }
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(resp_rx))))
    }

    /// Arithmetic mean of every number received before the caller completes.
    #[tracing::instrument(skip_all)]
    async fn compute_average(
        &self,
        req: Request<Streaming<ComputeAverageRequest>>,
    ) -> Result<Response<ComputeAverageResponse>, Status> {
        let mean = Self::average_inner(req.into_inner()).await?;
        Ok(Response::new(ComputeAverageResponse { mean }))
    }

    type FindMaximumStream = Pin<Box<dyn Stream<Item = Result<FindMaximumResponse, Status>> + Send>>;

    /// Emits the running maximum on every strict increase; both directions
    /// progress independently until the caller closes its side.
    #[tracing::instrument(skip_all)]
    async fn find_maximum(
        &self,
        req: Request<Streaming<FindMaximumRequest>>,
    ) -> Result<Response<Self::FindMaximumStream>, Status> {
        if self.shutdown.is_shutting_down() {
            return Err(Error::ServiceShutdown.into());
        }

        let inbound = req.into_inner();
        let shutdown = self.shutdown.clone();
        let (resp_tx, resp_rx) = mpsc::channel(self.config.stream_buffer_size);

        tokio::spawn(async move {
            let _guard = shutdown.register_stream();
            Self::find_maximum_inner(inbound, resp_tx, shutdown.clone()).await;
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(resp_rx))))
    }
}
