//! QR generation batch.
//!
//! One invocation of [`QrPipeline::run`] walks
//! `Idle → Selecting → (Rendering → Updating)* → Done`:
//!
//! 1. open a session for the configured trackor type
//! 2. select every trackor whose generate flag is `1`, projecting only the key,
//!    value and title fields
//! 3. for each trackor, in selection order, render the QR image and write it
//!    back together with the cleared flag in a single update
//!
//! The first error ends the batch. Trackors updated before it keep their new
//! image and cleared flag; nothing is rolled back and nothing is retried.
//! Errors are returned to the caller, not logged here.

use tracing::{debug, info, instrument};

use crate::config::{PipelineConfig, SelectionMode};
use crate::encoder::{GeneratedImage, QrEncoder};
use crate::error::{PipelineError, PipelineResult, RecordStoreError};
use crate::record_store::{
    FieldFilter, FieldValue, FileAttachment, Record, RecordSession, RecordStore, SearchTrigger,
    SessionFactory, UpdatePayload,
};

/// Flag value that marks a trackor for generation.
pub const FLAG_SET: &str = "1";

/// Flag value written back once the image is attached.
pub const FLAG_CLEARED: &str = "0";

/// Batch job bound to one trackor type and field layout.
pub struct QrPipeline<F> {
    factory: F,
    config: PipelineConfig,
    encoder: QrEncoder,
}

impl<F: SessionFactory> QrPipeline<F> {
    /// Bind a session factory, the field layout and an encoder.
    ///
    /// Nothing is contacted until [`run`](Self::run).
    pub fn new(factory: F, config: PipelineConfig, encoder: QrEncoder) -> Self {
        Self {
            factory,
            config,
            encoder,
        }
    }

    /// Trackor type and field names in use.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run one batch to completion or to the first error.
    #[instrument(
        name = "qr_batch",
        skip(self),
        fields(trackor_type = %self.config.trackor_type)
    )]
    pub async fn run(&self) -> PipelineResult<()> {
        info!(
            generate_field = %self.config.generate_field,
            selection = ?self.config.selection,
            "Starting QR code generation"
        );
        let store = RecordStore::new(self.factory.open_session(&self.config.trackor_type)?);

        for record in self.select(&store).await? {
            self.process(&store, &record).await?;
        }
        Ok(())
    }

    /// Trackors currently flagged for generation.
    pub async fn select<S: RecordSession>(
        &self,
        store: &RecordStore<S>,
    ) -> Result<Vec<Record>, RecordStoreError> {
        let fields = self.config.projected_fields();
        match self.config.selection {
            SelectionMode::Search => {
                let search = SearchTrigger::equal(&self.config.generate_field, FLAG_SET);
                store.select_by_fields_and_search(&fields, &search).await
            }
            SelectionMode::Filter => {
                let mut filter = FieldFilter::new();
                filter.insert(self.config.generate_field.clone(), FLAG_SET.to_string());
                store.select_by_filter(&filter, &fields).await
            }
        }
    }

    #[instrument(name = "qr_record", skip_all, fields(id = record.id, key = %record.key))]
    async fn process<S: RecordSession>(
        &self,
        store: &RecordStore<S>,
        record: &Record,
    ) -> PipelineResult<()> {
        let value = record
            .text(&self.config.value_field)
            .ok_or_else(|| PipelineError::MissingField {
                record_key: record.key.clone(),
                field: self.config.value_field.clone(),
            })?;
        let title = self
            .config
            .title_field
            .as_deref()
            .and_then(|field| record.text(field))
            .filter(|title| !title.trim().is_empty());

        let data = self
            .encoder
            .encode(value, title)
            .map_err(|source| PipelineError::Render {
                record_key: record.key.clone(),
                source,
            })?;

        let payload = build_payload(&self.config, GeneratedImage::new(value, data));
        let updated = store.update_fields(&record.key, record.id, &payload).await?;
        debug!(fields = ?updated.fields.keys().collect::<Vec<_>>(), "trackor updated");

        info!(id = record.id, key = %record.key, "QR code uploaded");
        Ok(())
    }
}

/// Update that attaches `image` and clears the generate flag in one call.
pub fn build_payload(config: &PipelineConfig, image: GeneratedImage) -> UpdatePayload {
    let mut payload = UpdatePayload::new();
    payload.insert(
        config.generate_field.clone(),
        FieldValue::from(FLAG_CLEARED),
    );
    payload.insert(
        config.image_field.clone(),
        FieldValue::File(FileAttachment {
            file_name: image.file_name,
            data: image.data,
        }),
    );
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::RenderStyle;
    use crate::record_store::InMemoryBackend;
    use tracing_test::traced_test;

    fn config(selection: SelectionMode) -> PipelineConfig {
        PipelineConfig {
            trackor_type: "ASSET".into(),
            generate_field: "GEN".into(),
            image_field: "QR".into(),
            value_field: "TRACKOR_KEY".into(),
            title_field: None,
            selection,
        }
    }

    #[test]
    fn payload_clears_flag_and_attaches_png() {
        let payload = build_payload(
            &config(SelectionMode::Search),
            GeneratedImage::new("AST-001", "iVBOR".into()),
        );
        assert_eq!(payload.len(), 2);
        assert_eq!(payload["GEN"], FieldValue::from(FLAG_CLEARED));
        assert_eq!(
            payload["QR"],
            FieldValue::File(FileAttachment {
                file_name: "AST-001.png".into(),
                data: "iVBOR".into(),
            })
        );
    }

    #[tokio::test]
    async fn both_selection_modes_pick_flagged_rows() {
        let backend = InMemoryBackend::seeded(
            "ASSET",
            vec![
                Record::new(1, "A").with_field("GEN", "1"),
                Record::new(2, "B").with_field("GEN", "0"),
            ],
        );
        for mode in [SelectionMode::Search, SelectionMode::Filter] {
            let pipeline = QrPipeline::new(
                backend.clone(),
                config(mode),
                QrEncoder::new(RenderStyle::default()),
            );
            let store = RecordStore::new(backend.open_session("ASSET").unwrap());
            let rows = pipeline.select(&store).await.unwrap();
            assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1]);
        }
    }

    #[tokio::test]
    async fn missing_value_field_stops_the_batch() {
        let mut cfg = config(SelectionMode::Search);
        cfg.value_field = "SERIAL".into();
        let backend = InMemoryBackend::seeded("ASSET", vec![Record::new(1, "A").with_field("GEN", "1")]);
        let pipeline = QrPipeline::new(backend.clone(), cfg, QrEncoder::new(RenderStyle::default()));

        let err = pipeline.run().await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::MissingField { ref record_key, ref field } if record_key == "A" && field == "SERIAL"
        ));
        assert_eq!(backend.update_attempts().await, 0);
    }

    #[tokio::test]
    async fn blank_title_renders_without_caption() {
        let mut cfg = config(SelectionMode::Search);
        cfg.title_field = Some("NAME".into());
        let backend = InMemoryBackend::seeded(
            "ASSET",
            vec![Record::new(1, "A").with_field("GEN", "1").with_field("NAME", "  ")],
        );
        // No font loaded: a caption attempt would fail with FontNotConfigured.
        let pipeline = QrPipeline::new(backend.clone(), cfg, QrEncoder::new(RenderStyle::default()));
        pipeline.run().await.unwrap();
        assert_eq!(backend.applied_updates().await.len(), 1);
    }

    #[tokio::test]
    async fn caption_without_font_is_a_render_error() {
        let mut cfg = config(SelectionMode::Search);
        cfg.title_field = Some("NAME".into());
        let backend = InMemoryBackend::seeded(
            "ASSET",
            vec![Record::new(1, "A").with_field("GEN", "1").with_field("NAME", "Laptop")],
        );
        let pipeline = QrPipeline::new(backend.clone(), cfg, QrEncoder::new(RenderStyle::default()));
        assert!(matches!(
            pipeline.run().await,
            Err(PipelineError::Render { ref record_key, .. }) if record_key == "A"
        ));
    }

    #[traced_test]
    #[tokio::test]
    async fn start_and_each_upload_are_logged() {
        let backend = InMemoryBackend::seeded(
            "ASSET",
            vec![
                Record::new(1, "A").with_field("GEN", "1"),
                Record::new(2, "B").with_field("GEN", "1"),
            ],
        );
        let pipeline = QrPipeline::new(
            backend,
            config(SelectionMode::Search),
            QrEncoder::new(RenderStyle::default()),
        );
        pipeline.run().await.unwrap();

        assert!(logs_contain("Starting QR code generation"));
        assert!(logs_contain("QR code uploaded"));
        assert!(logs_contain("qr_record"));
        assert!(logs_contain("key=A"));
        assert!(logs_contain("key=B"));
        assert!(logs_contain("trackor updated"));
    }
}
