use crate::config::Config;
use crate::error::ProcessError;
use crate::event::EventMessage;
use crate::geometry::{BoundingBox, BoxSelection};
use crate::imaging::{self, FACE_CONTENT_TYPE};
use crate::object_store::ObjectStore;
use crate::record_store::{FaceRecord, FaceRecordStore};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Extensions stripped from the photo key before the face suffix is added
const KNOWN_EXTENSIONS: [&str; 4] = [".jpg", ".jpeg", ".png", ".webp"];

/// Extension of every stored face
const FACE_EXTENSION: &str = "jpg";

/// Settings the processor needs out of the service configuration
#[derive(Debug, Clone)]
pub struct ProcessorSettings {
    pub photo_bucket: String,
    pub face_bucket: String,
    pub jpeg_quality: u8,
    pub box_selection: BoxSelection,
}

impl From<&Config> for ProcessorSettings {
    fn from(config: &Config) -> Self {
        Self {
            photo_bucket: config.storage.photo_bucket.clone(),
            face_bucket: config.storage.face_bucket.clone(),
            jpeg_quality: config.processing.jpeg_quality,
            box_selection: config.processing.box_selection,
        }
    }
}

/// Outcome of one successfully processed message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedFace {
    pub record: FaceRecord,
    pub size_bytes: usize,
}

/// Turns one event message into a stored face and its record
pub struct MessageProcessor {
    objects: Arc<dyn ObjectStore>,
    records: Arc<dyn FaceRecordStore>,
    settings: ProcessorSettings,
}

impl MessageProcessor {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        records: Arc<dyn FaceRecordStore>,
        settings: ProcessorSettings,
    ) -> Self {
        Self {
            objects,
            records,
            settings,
        }
    }

    /// Fetch the photo, cut the face out, store it and record the link.
    ///
    /// Nothing is written unless the face could be cut. A database failure
    /// after the upload leaves the stored face in place.
    #[instrument(skip(self, message))]
    pub async fn process(&self, message: serde_json::Value) -> Result<ProcessedFace, ProcessError> {
        let started = Instant::now();

        let payload = EventMessage::from_value(message)?.payload()?;
        let bbox = BoundingBox::from_points(&payload.face, self.settings.box_selection)?;

        debug!(
            object_key = %payload.object_key,
            left = bbox.left,
            top = bbox.top,
            right = bbox.right,
            bottom = bbox.bottom,
            "Face box computed"
        );

        let photo = self
            .objects
            .get_object(&self.settings.photo_bucket, &payload.object_key)
            .await
            .map_err(ProcessError::Storage)?;

        let quality = self.settings.jpeg_quality;
        let face = tokio::task::spawn_blocking(move || imaging::cut_face(&photo, &bbox, quality))
            .await??;
        let size_bytes = face.len();

        // One face per message, so the index never advances
        let face_id = face_key(&payload.object_key, 0);

        self.objects
            .put_object(&self.settings.face_bucket, &face_id, face, FACE_CONTENT_TYPE)
            .await
            .map_err(ProcessError::Storage)?;

        let record = FaceRecord::new(payload.object_key, face_id);
        self.records
            .insert(&record)
            .await
            .map_err(ProcessError::Database)?;

        metrics::histogram!("facecut.message.duration_seconds")
            .record(started.elapsed().as_secs_f64());

        info!(
            original_id = %record.original_id,
            face_id = %record.face_id,
            size_bytes = size_bytes,
            "Face stored successfully"
        );

        Ok(ProcessedFace { record, size_bytes })
    }
}

/// Key of the `index`-th face cut out of `object_key`.
///
/// `photo1.jpg` becomes `photo1_0.jpg`.
pub fn face_key(object_key: &str, index: usize) -> String {
    let lower = object_key.to_ascii_lowercase();
    let base = KNOWN_EXTENSIONS
        .iter()
        .find(|ext| lower.ends_with(*ext))
        .map(|ext| &object_key[..object_key.len() - ext.len()])
        .unwrap_or(object_key);

    format!("{base}_{index}.{FACE_EXTENSION}")
}
