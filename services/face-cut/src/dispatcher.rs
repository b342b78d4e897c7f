use crate::processor::MessageProcessor;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Counts for one handled batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub received: usize,
    pub processed: usize,
    pub failed: usize,
}

/// Runs every message of a batch through the processor, best effort
pub struct BatchDispatcher {
    processor: Arc<MessageProcessor>,
    concurrency: usize,
}

impl BatchDispatcher {
    pub fn new(processor: Arc<MessageProcessor>, concurrency: usize) -> Self {
        Self {
            processor,
            concurrency: concurrency.max(1),
        }
    }

    /// Process each message independently.
    ///
    /// Never fails: a failed message is logged, counted and dropped.
    #[instrument(skip(self, messages), fields(received = messages.len()))]
    pub async fn handle(&self, messages: Vec<serde_json::Value>) -> BatchSummary {
        let received = messages.len();
        metrics::counter!("facecut.batches.received").increment(1);

        let processor = self.processor.clone();
        let outcomes: Vec<bool> = stream::iter(messages.into_iter().enumerate())
            .map(move |(index, message)| {
                let processor = processor.clone();
                async move {
                    match processor.process(message).await {
                        Ok(_) => {
                            metrics::counter!("facecut.messages.processed").increment(1);
                            true
                        }
                        Err(e) => {
                            warn!(
                                index = index,
                                kind = e.kind(),
                                error = %e,
                                "Failed to process message"
                            );
                            metrics::counter!("facecut.messages.failed", "kind" => e.kind())
                                .increment(1);
                            false
                        }
                    }
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let processed = outcomes.iter().filter(|ok| **ok).count();
        let summary = BatchSummary {
            received,
            processed,
            failed: received - processed,
        };

        info!(
            received = summary.received,
            processed = summary.processed,
            failed = summary.failed,
            "Batch handled"
        );

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventMessage, FacePayload, Point};
    use crate::geometry::BoxSelection;
    use crate::imaging::test_support::{encode, quadrant_photo};
    use crate::object_store::MockObjectStore;
    use crate::processor::ProcessorSettings;
    use crate::record_store::MockFaceRecordStore;
    use image::ImageFormat;
    use std::sync::Mutex;

    fn message(object_key: &str) -> serde_json::Value {
        let payload = FacePayload {
            object_key: object_key.to_string(),
            face: vec![
                Point { x: 2.0, y: 2.0 },
                Point { x: 30.0, y: 2.0 },
                Point { x: 30.0, y: 40.0 },
                Point { x: 2.0, y: 40.0 },
            ],
        };
        serde_json::to_value(EventMessage::wrap(&payload).unwrap()).unwrap()
    }

    fn dispatcher(
        objects: MockObjectStore,
        records: MockFaceRecordStore,
        concurrency: usize,
    ) -> BatchDispatcher {
        let settings = ProcessorSettings {
            photo_bucket: "photos".to_string(),
            face_bucket: "faces".to_string(),
            jpeg_quality: 75,
            box_selection: BoxSelection::Span,
        };
        let processor = MessageProcessor::new(Arc::new(objects), Arc::new(records), settings);
        BatchDispatcher::new(Arc::new(processor), concurrency)
    }

    fn working_stores(
        photo: Vec<u8>,
        uploads: usize,
    ) -> (MockObjectStore, MockFaceRecordStore, Arc<Mutex<Vec<String>>>) {
        let keys = Arc::new(Mutex::new(Vec::new()));

        let mut objects = MockObjectStore::new();
        objects
            .expect_get_object()
            .returning(move |_, _| Ok(photo.clone()));
        let stored = keys.clone();
        objects
            .expect_put_object()
            .times(uploads)
            .returning(move |_, key, _, _| {
                stored.lock().unwrap().push(key.to_string());
                Ok(())
            });

        let mut records = MockFaceRecordStore::new();
        records.expect_insert().times(uploads).returning(|_| Ok(()));

        (objects, records, keys)
    }

    #[tokio::test]
    async fn test_malformed_message_does_not_stop_batch() {
        let photo = encode(quadrant_photo(64, 64), ImageFormat::Png);
        let (objects, records, keys) = working_stores(photo, 3);

        let batch = vec![
            message("a.jpg"),
            message("b.jpg"),
            serde_json::json!({"details": {"message": {"body": "not json at all"}}}),
            message("c.jpg"),
        ];

        let summary = dispatcher(objects, records, 1).handle(batch).await;

        assert_eq!(
            summary,
            BatchSummary {
                received: 4,
                processed: 3,
                failed: 1
            }
        );
        assert_eq!(
            *keys.lock().unwrap(),
            vec!["a_0.jpg".to_string(), "b_0.jpg".to_string(), "c_0.jpg".to_string()]
        );
    }

    #[tokio::test]
    async fn test_all_failures_still_return() {
        let mut objects = MockObjectStore::new();
        objects
            .expect_get_object()
            .times(2)
            .returning(|_, _| Err(anyhow::anyhow!("access denied")));
        objects.expect_put_object().never();
        let mut records = MockFaceRecordStore::new();
        records.expect_insert().never();

        let summary = dispatcher(objects, records, 4)
            .handle(vec![message("a.jpg"), message("b.jpg")])
            .await;

        assert_eq!(summary.processed, 0);
        assert_eq!(summary.failed, 2);
    }

    #[tokio::test]
    async fn test_concurrent_batch_processes_everything() {
        let photo = encode(quadrant_photo(64, 64), ImageFormat::Png);
        let (objects, records, keys) = working_stores(photo, 8);

        let batch = (0..8).map(|i| message(&format!("p{i}.jpg"))).collect();
        let summary = dispatcher(objects, records, 4).handle(batch).await;

        assert_eq!(summary.processed, 8);
        let mut keys = keys.lock().unwrap().clone();
        keys.sort();
        assert_eq!(keys.len(), 8);
        assert_eq!(keys[0], "p0_0.jpg");
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let summary = dispatcher(MockObjectStore::new(), MockFaceRecordStore::new(), 2)
            .handle(Vec::new())
            .await;
        assert_eq!(summary, BatchSummary::default());
    }
}
