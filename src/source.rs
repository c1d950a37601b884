/// Where step lists and sample bytes come from
///
/// Controllers never fetch anything themselves: the app runs the
/// async wrappers below for the effects they emit. The wrappers push the
/// blocking work (SQLite queries, file reads, decoding) onto tokio's
/// blocking pool.
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task;

use crate::error::FetchError;
use crate::state::catalog::Catalog;
use crate::state::data::{DecodedImage, ImageKey, Session, StepRecord};

pub trait SampleSource: Send + Sync {
    /// Every (run, tag) pair that has samples
    fn sessions(&self) -> Result<Vec<Session>, FetchError>;

    /// The session's available steps, ordered by step
    fn step_list(&self, session: &Session) -> Result<Vec<StepRecord>, FetchError>;

    /// Raw encoded bytes of one sample
    fn image(&self, key: &ImageKey) -> Result<Vec<u8>, FetchError>;
}

/// Reads samples registered in the SQLite catalog
///
/// rusqlite::Connection is not Sync, so each call opens its own
/// connection to the catalog file.
#[derive(Debug, Clone)]
pub struct CatalogSource {
    db_path: PathBuf,
}

impl CatalogSource {
    pub fn new(db_path: PathBuf) -> Self {
        Self { db_path }
    }

    fn catalog(&self) -> Result<Catalog, FetchError> {
        Ok(Catalog::open(&self.db_path)?)
    }
}

impl SampleSource for CatalogSource {
    fn sessions(&self) -> Result<Vec<Session>, FetchError> {
        Ok(self.catalog()?.sessions()?)
    }

    fn step_list(&self, session: &Session) -> Result<Vec<StepRecord>, FetchError> {
        Ok(self.catalog()?.step_list(session)?)
    }

    fn image(&self, key: &ImageKey) -> Result<Vec<u8>, FetchError> {
        let session = Session::new(key.run.as_str(), key.tag.as_str());
        let path = self
            .catalog()?
            .sample_path(&session, key.step)?
            .ok_or_else(|| FetchError::NotFound {
                run: key.run.clone(),
                tag: key.tag.clone(),
                step: key.step,
            })?;
        Ok(std::fs::read(path)?)
    }
}

/// List the available sessions off the UI thread
pub async fn fetch_sessions(source: Arc<dyn SampleSource>) -> Result<Vec<Session>, FetchError> {
    task::spawn_blocking(move || source.sessions()).await?
}

/// Fetch a session's step list off the UI thread
pub async fn fetch_step_list(
    source: Arc<dyn SampleSource>,
    session: Session,
) -> Result<Vec<StepRecord>, FetchError> {
    task::spawn_blocking(move || source.step_list(&session)).await?
}

/// Fetch and decode one sample off the UI thread
pub async fn fetch_image(
    source: Arc<dyn SampleSource>,
    key: ImageKey,
) -> Result<Arc<DecodedImage>, FetchError> {
    task::spawn_blocking(move || -> Result<Arc<DecodedImage>, FetchError> {
        let bytes = source.image(&key)?;
        let decoded = DecodedImage::decode(&bytes)?;
        tracing::debug!(
            run = %key.run,
            tag = %key.tag,
            step = key.step,
            width = decoded.width,
            height = decoded.height,
            "decoded sample"
        );
        Ok(Arc::new(decoded))
    })
    .await?
}
