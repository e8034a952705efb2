#![doc = include_str!("../README.md")]

mod server;

use std::sync::Arc;

use clap::Parser;
use futures::Stream;
use quartet_tonic_core::proto::FILE_DESCRIPTOR_SET;
use quartet_tonic_core::proto::blog::blog_service_server::BlogServiceServer;
use quartet_tonic_core::proto::calculator::calculator_service_server::CalculatorServiceServer;
use quartet_tonic_core::proto::greet::greet_service_server::GreetServiceServer;
use server::config::{CliArgs, ServerConfig};
use server::service::blog::BlogServer;
use server::service::calculator::CalculatorServer;
use server::service::greet::GreetServer;
use server::shutdown::Shutdown;
use server::store::MemoryBlogStore;
use server::telemetry::init_telemetry;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::signal;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::codec::CompressionEncoding;
use tonic::transport::Server;
use tonic::transport::server::Connected;
use tonic_health::server::HealthReporter;
use tonic_reflection::server::Builder;
use tonic_web::GrpcWebLayer;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    init_telemetry()?;

    if config.uds {
        #[cfg(unix)]
        {
            use tokio::net::UnixListener;
            use tokio_stream::wrappers::UnixListenerStream;
            let uds_path = config.server_addr.clone();
            let uds = UnixListener::bind(&uds_path)?;
            let incoming = UnixListenerStream::new(uds);
            log_startup_info(&uds_path, &config);
            let res = run_server_with_incoming(incoming, config).await;
            // TODO: Best effort to clean up the socket file although a panic
            // might leave it behind.
            let _ = std::fs::remove_file(&uds_path);
            res
        }
        #[cfg(not(unix))]
        {
            anyhow::bail!("Unix domain sockets are not supported on this platform");
        }
    } else {
        let tcp_path = config.server_addr.clone();
        let tcp = TcpListener::bind(&tcp_path).await?;
        let incoming = TcpListenerStream::new(tcp);
        log_startup_info(&tcp_path, &config);
        run_server_with_incoming(incoming, config).await
    }
}

async fn run_server_with_incoming<I, IO, IE>(incoming: I, config: ServerConfig) -> anyhow::Result<()>
where
    I: Stream<Item = Result<IO, IE>>,
    IO: AsyncRead + AsyncWrite + Connected + Unpin + Send + 'static,
    IE: Into<tower::BoxError>,
{
    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<GreetServiceServer<GreetServer>>()
        .await;
    health_reporter
        .set_serving::<CalculatorServiceServer<CalculatorServer>>()
        .await;
    health_reporter
        .set_serving::<BlogServiceServer<BlogServer>>()
        .await;

    let shutdown = Shutdown::new();
    // The persistence adapter is constructed here and injected; nothing else
    // in the process can reach it except through the blog service.
    let store = Arc::new(MemoryBlogStore::new());

    let greet = GreetServer::new(config.clone(), shutdown.clone());
    let calculator = CalculatorServer::new(config.clone(), shutdown.clone());
    let blog = BlogServer::new(config.clone(), store, shutdown.clone());

    let reflection = Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()?;

    Server::builder()
        .accept_http1(true)
        .http2_adaptive_window(Some(true))
        .layer(
            ServiceBuilder::new()
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                )
                .layer(GrpcWebLayer::new()),
        )
        .add_service(health_service.clone())
        .add_service(reflection)
        .add_service(build_greet_service(greet))
        .add_service(build_calculator_service(calculator))
        .add_service(build_blog_service(blog))
        .serve_with_incoming_shutdown(
            incoming,
            shutdown_signal(shutdown, health_reporter, config),
        )
        .await?;

    tracing::info!("Service shut down successfully");
    Ok(())
}

fn log_startup_info(addr: &str, config: &ServerConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Starting quartet server on {} with full config: {:#?}", addr, config);
    } else {
        tracing::info!("Starting quartet server on {}", addr);
    }
}

fn build_greet_service(service: GreetServer) -> GreetServiceServer<GreetServer> {
    GreetServiceServer::new(service)
        .send_compressed(CompressionEncoding::Zstd)
        .send_compressed(CompressionEncoding::Gzip)
        .send_compressed(CompressionEncoding::Deflate)
        .accept_compressed(CompressionEncoding::Zstd)
        .accept_compressed(CompressionEncoding::Gzip)
        .accept_compressed(CompressionEncoding::Deflate)
}

fn build_calculator_service(service: CalculatorServer) -> CalculatorServiceServer<CalculatorServer> {
    CalculatorServiceServer::new(service)
        .send_compressed(CompressionEncoding::Zstd)
        .send_compressed(CompressionEncoding::Gzip)
        .send_compressed(CompressionEncoding::Deflate)
        .accept_compressed(CompressionEncoding::Zstd)
        .accept_compressed(CompressionEncoding::Gzip)
        .accept_compressed(CompressionEncoding::Deflate)
}

fn build_blog_service(service: BlogServer) -> BlogServiceServer<BlogServer> {
    BlogServiceServer::new(service)
        .send_compressed(CompressionEncoding::Zstd)
        .send_compressed(CompressionEncoding::Gzip)
        .send_compressed(CompressionEncoding::Deflate)
        .accept_compressed(CompressionEncoding::Zstd)
        .accept_compressed(CompressionEncoding::Gzip)
        .accept_compressed(CompressionEncoding::Deflate)
}

async fn shutdown_signal(
    shutdown: Shutdown,
    health_reporter: HealthReporter,
    config: ServerConfig,
) {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        () = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }

    tracing::info!("Shutdown signal received, terminating gracefully...");

    // 1. Publish the status
    health_reporter
        .set_not_serving::<GreetServiceServer<GreetServer>>()
        .await;
    health_reporter
        .set_not_serving::<CalculatorServiceServer<CalculatorServer>>()
        .await;
    health_reporter
        .set_not_serving::<BlogServiceServer<BlogServer>>()
        .await;

    // 2. Drain in-flight streams, then cancel whatever remains
    shutdown.drain(config.shutdown_timeout).await;
}
