//! Face Cut Service
//!
//! Webhook worker that cuts detected faces out of stored photos. Each call
//! carries a batch of event messages; every message names a photo in the
//! photo bucket and the corner points of one detected face. The service
//! crops the face, stores it as JPEG in the face bucket and records the link
//! between photo and face in PostgreSQL.
//!
//! ## Architecture
//!
//! ```text
//! Trigger           Photo Bucket          Face Bucket          PostgreSQL
//! ┌──────────┐      ┌──────────────┐      ┌──────────────┐     ┌──────────┐
//! │ POST /   │      │ photo1.jpg   │      │ photo1_0.jpg │     │ photo    │
//! └──────────┘      └──────────────┘      └──────────────┘     └──────────┘
//!      │                   │                     ▲                   ▲
//!      ▼                   ▼                     │                   │
//! ┌──────────┐      ┌──────────────┐             │                   │
//! │ Batch    │─────▶│ Message      │─────────────┴───────────────────┘
//! │Dispatcher│      │ Processor    │
//! └──────────┘      └──────────────┘
//! ```
//!
//! A failed message never fails the batch: it is logged and dropped.

pub mod api;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod geometry;
pub mod imaging;
pub mod object_store;
pub mod processor;
pub mod record_store;

pub use api::AppState;
pub use config::Config;
pub use dispatcher::{BatchDispatcher, BatchSummary};
pub use error::ProcessError;
pub use event::{EventMessage, FacePayload, Point, WebhookRequest};
pub use geometry::{BoundingBox, BoxSelection};
pub use object_store::{ObjectStore, S3ObjectStore};
pub use processor::{face_key, MessageProcessor, ProcessedFace, ProcessorSettings};
pub use record_store::{FaceRecord, FaceRecordStore, PgFaceRecordStore};
