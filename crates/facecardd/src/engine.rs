use facecard_core::{
    identify, DescriptorExtractor, DetectedFace, ExtractError, Gallery, IdentifyError, Matcher,
};
use facecard_store::{Profile, Store, StoreError};
use image::RgbImage;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("extraction error: {0}")]
    Extract(#[from] ExtractError),
    #[error("identify error: {0}")]
    Identify(#[from] IdentifyError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// A gallery identity matched by a probe.
#[derive(Debug, Clone)]
pub struct Identified {
    pub profile: Profile,
    pub distance: f64,
}

/// Messages sent from HTTP handlers to the engine thread.
enum EngineRequest {
    Identify {
        image: RgbImage,
        reply: oneshot::Sender<Result<Option<Identified>, EngineError>>,
    },
    Extract {
        image: RgbImage,
        reply: oneshot::Sender<Result<Vec<DetectedFace>, EngineError>>,
    },
    Reload {
        reply: oneshot::Sender<Result<usize, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T, EngineError>>) -> EngineRequest,
    ) -> Result<T, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Match the faces in `image` against the loaded gallery.
    pub async fn identify(&self, image: RgbImage) -> Result<Option<Identified>, EngineError> {
        self.request(|reply| EngineRequest::Identify { image, reply })
            .await
    }

    /// Extract descriptors without matching, for registration.
    pub async fn extract(&self, image: RgbImage) -> Result<Vec<DetectedFace>, EngineError> {
        self.request(|reply| EngineRequest::Extract { image, reply })
            .await
    }

    /// Replace the gallery with the store's current contents. Returns its size.
    pub async fn reload(&self) -> Result<usize, EngineError> {
        self.request(|reply| EngineRequest::Reload { reply }).await
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// Loads the gallery synchronously so a corrupt store fails startup, then
/// enters a request loop owning the extractor, matcher and gallery.
pub fn spawn_engine(
    mut extractor: Box<dyn DescriptorExtractor + Send>,
    matcher: Box<dyn Matcher + Send>,
    store: Store,
    tolerance: f64,
) -> Result<EngineHandle, EngineError> {
    let dimension = extractor.dimension();
    let mut gallery = store.load_gallery(dimension)?;
    tracing::info!(identities = gallery.len(), dimension, tolerance, "gallery ready");

    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("facecard-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Identify { image, reply } => {
                        let result =
                            run_identify(&mut *extractor, &*matcher, &gallery, &image, tolerance);
                        let _ = reply.send(result);
                    }
                    EngineRequest::Extract { image, reply } => {
                        let result = extractor.extract(&image).map_err(EngineError::from);
                        let _ = reply.send(result);
                    }
                    EngineRequest::Reload { reply } => {
                        let result = match store.load_gallery(dimension) {
                            Ok(fresh) => {
                                gallery = fresh;
                                Ok(gallery.len())
                            }
                            Err(err) => {
                                tracing::error!(error = %err, "gallery reload failed; keeping previous gallery");
                                Err(err.into())
                            }
                        };
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .map_err(EngineError::Spawn)?;

    Ok(EngineHandle { tx })
}

fn run_identify(
    extractor: &mut dyn DescriptorExtractor,
    matcher: &dyn Matcher,
    gallery: &Gallery<Profile>,
    image: &RgbImage,
    tolerance: f64,
) -> Result<Option<Identified>, EngineError> {
    let hit = identify(extractor, matcher, gallery, image, tolerance)?;
    if let Some(hit) = &hit {
        tracing::debug!(id = hit.metadata.id, distance = hit.distance, "identify: matched");
    }
    Ok(hit.map(|hit| Identified {
        profile: hit.metadata.clone(),
        distance: hit.distance,
    }))
}
