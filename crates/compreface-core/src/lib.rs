//! compreface-core: CompreFace bridge building blocks.
//!
//! Entry and options records, the recognition response parser, CompreFace
//! service handles, host validation, the config/options flows and the
//! on-disk store shared by the daemon and the CLI.

pub mod client;
pub mod flow;
pub mod host;
pub mod store;
pub mod types;

pub use client::{ClientError, CompreFace, FaceService, Recognizer};
pub use host::{DnsResolver, HostError, HostResolver};
pub use store::{CameraDevice, Store, StoreError};
pub use types::{
    recognized_person, top_subject, Capability, EntryData, EntryOptions, RecognitionOutcome,
    Subject, NO_PERSON, SIMILARITY_THRESHOLD,
};
