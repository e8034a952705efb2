#![doc = include_str!("../README.md")]

mod common;
pub use common::*;

/// gRPC service and message definitions generated from the `proto/` contracts.
///
/// Three packages make up the wire surface:
///
/// - [`greet`] - the four call shapes over a single `Greeting` message, plus
///   the deadline-supervised unary variant.
/// - [`calculator`] - streaming arithmetic: sum, square root, prime
///   decomposition, running average, running maximum.
/// - [`blog`] - CRUD over one persisted record type.
///
/// Method, message, and field names are the service's published contract;
/// changing any of them is a wire-level break for existing clients.
pub mod proto {
    pub mod greet {
        tonic::include_proto!("greet");
    }

    pub mod calculator {
        tonic::include_proto!("calculator");
    }

    pub mod blog {
        tonic::include_proto!("blog");
    }

    /// Encoded file descriptor set covering all three packages, registered
    /// with the gRPC reflection service by the server binary.
    pub const FILE_DESCRIPTOR_SET: &[u8] =
        include_bytes!(concat!(env!("OUT_DIR"), "/quartet_descriptor.bin"));
}
