//! Object-store wiring: the concrete `aws-sdk-s3`-backed [`ObjectStore`].

mod s3;

pub use s3::S3ObjectStore;
