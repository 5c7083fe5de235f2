//! Stream service.
//!
//! Entry point for callers that refer to media by id: resolves the
//! selection through the media store, validates the destination and hands
//! the request to the [`SessionController`].

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

use super::controller::{SessionController, SessionSnapshot, SessionStatus, StartRequest};
use crate::database::repositories::{MediaStore, UsageLedger};
use crate::input::StartOptions;
use crate::{Error, Result};

/// URL schemes accepted as streaming destinations.
const DESTINATION_SCHEMES: &[&str] = &["rtmp", "rtmps", "srt", "http", "https"];

/// Request to start broadcasting stored media.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSessionRequest {
    pub account_id: String,
    /// Selected media item ids in broadcast order.
    pub item_ids: Vec<String>,
    pub destination_url: String,
    #[serde(default)]
    pub looping: bool,
    /// Image to show during audio-only broadcasts.
    #[serde(default)]
    pub cover_item_id: Option<String>,
}

/// Broadcast status as seen by an account.
#[derive(Debug, Clone, Serialize)]
pub struct StreamStatus {
    /// Whether a session is starting or running.
    pub active: bool,
    pub status: SessionStatus,
    /// Usage consumed today by the account.
    pub usage_seconds: u64,
    /// The active session, when it belongs to the account.
    pub session: Option<SessionSnapshot>,
}

/// Caller-facing stream operations.
#[derive(Clone)]
pub struct StreamService {
    controller: SessionController,
    media: Arc<dyn MediaStore>,
    ledger: Arc<dyn UsageLedger>,
}

impl StreamService {
    pub fn new(
        controller: SessionController,
        media: Arc<dyn MediaStore>,
        ledger: Arc<dyn UsageLedger>,
    ) -> Self {
        Self {
            controller,
            media,
            ledger,
        }
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    /// Start broadcasting the selected items.
    pub async fn start_session(&self, request: StartSessionRequest) -> Result<SessionSnapshot> {
        if request.item_ids.is_empty() {
            return Err(Error::invalid_selection("No media items selected"));
        }
        validate_destination(&request.destination_url)?;

        let items = self
            .media
            .find_items(&request.account_id, &request.item_ids)
            .await?;
        if items.is_empty() {
            return Err(Error::invalid_selection(
                "None of the selected media items could be found",
            ));
        }
        if items.len() < request.item_ids.len() {
            debug!(
                "Ignoring {} unknown media ids for account {}",
                request.item_ids.len() - items.len(),
                request.account_id
            );
        }

        let cover = match &request.cover_item_id {
            Some(id) => self.media.find_item(&request.account_id, id).await?,
            None => None,
        };

        info!(
            "Start requested by account {} with {} items",
            request.account_id,
            items.len()
        );

        self.controller
            .start(StartRequest {
                account_id: request.account_id,
                items,
                destination: request.destination_url,
                options: StartOptions {
                    looping: request.looping,
                    cover,
                },
            })
            .await
    }

    /// Stop the active session. Returns whether one was running.
    pub async fn stop_session(&self) -> bool {
        self.controller.stop().await
    }

    pub async fn get_status(&self, account_id: &str) -> Result<StreamStatus> {
        let usage_seconds = self.ledger.get_usage(account_id).await?;
        let session = self
            .controller
            .snapshot()
            .await
            .filter(|session| session.account_id == account_id);

        Ok(StreamStatus {
            active: self.controller.is_active(),
            status: self.controller.status(),
            usage_seconds,
            session,
        })
    }
}

/// Check that a destination is a URL the engine can push to.
pub fn validate_destination(destination: &str) -> Result<()> {
    let destination = destination.trim();
    if destination.is_empty() {
        return Err(Error::validation("Destination URL is required"));
    }

    let url = Url::parse(destination)
        .map_err(|e| Error::validation(format!("Invalid destination URL: {}", e)))?;

    if !DESTINATION_SCHEMES.contains(&url.scheme()) {
        return Err(Error::validation(format!(
            "Unsupported destination scheme '{}'",
            url.scheme()
        )));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(Error::validation("Destination URL has no host"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MediaType, PlanPolicy};
    use crate::events::EventBroadcaster;
    use crate::session::SessionConfig;
    use crate::session::testing::{FixedPolicy, MemoryLedger, MemoryMedia, ScriptedEngine, item};

    fn service(engine: Arc<ScriptedEngine>, ledger: Arc<MemoryLedger>) -> StreamService {
        let controller = SessionController::new(
            engine,
            ledger.clone(),
            Arc::new(FixedPolicy(PlanPolicy::new(
                [MediaType::Audio, MediaType::Image],
                3600,
            ))),
            Arc::new(EventBroadcaster::new()),
            SessionConfig::default(),
        );
        let media = MemoryMedia(vec![
            item("a1", MediaType::Audio),
            item("a2", MediaType::Audio),
            item("img", MediaType::Image),
            item("v1", MediaType::Video),
        ]);
        StreamService::new(controller, Arc::new(media), ledger)
    }

    fn start_request(ids: &[&str]) -> StartSessionRequest {
        StartSessionRequest {
            account_id: "acc".to_string(),
            item_ids: ids.iter().map(|id| id.to_string()).collect(),
            destination_url: "rtmp://live.example.com/app/key".to_string(),
            looping: false,
            cover_item_id: None,
        }
    }

    #[test]
    fn test_validate_destination() {
        assert!(validate_destination("rtmp://live.example.com/app/key").is_ok());
        assert!(validate_destination("rtmps://live.example.com:443/app").is_ok());
        assert!(validate_destination("srt://10.0.0.1:9000").is_ok());

        for bad in ["", "   ", "not a url", "file:///tmp/out.flv", "ftp://host/x"] {
            assert!(
                matches!(validate_destination(bad), Err(Error::Validation(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_start_and_status() {
        let engine = Arc::new(ScriptedEngine::default());
        let ledger = Arc::new(MemoryLedger::with_usage("acc", 120));
        let service = service(engine.clone(), ledger);

        let status = service.get_status("acc").await.unwrap();
        assert!(!status.active);
        assert_eq!(status.usage_seconds, 120);
        assert!(status.session.is_none());

        let mut request = start_request(&["a1", "missing", "a2"]);
        request.cover_item_id = Some("img".to_string());
        let snapshot = service.start_session(request).await.unwrap();
        assert_eq!(snapshot.kind, "audio_mix");

        let status = service.get_status("acc").await.unwrap();
        assert!(status.active);
        assert_eq!(status.session.unwrap().session_id, snapshot.session_id);

        let other = service.get_status("someone-else").await.unwrap();
        assert!(other.active);
        assert!(other.session.is_none());

        assert!(service.stop_session().await);
        assert!(!service.stop_session().await);
        assert!(!service.get_status("acc").await.unwrap().active);
    }

    #[tokio::test]
    async fn test_start_rejections() {
        let engine = Arc::new(ScriptedEngine::default());
        let service = service(engine.clone(), Arc::new(MemoryLedger::default()));

        let err = service.start_session(start_request(&[])).await.unwrap_err();
        assert!(matches!(err, Error::InvalidSelection(_)));

        let mut request = start_request(&["a1"]);
        request.destination_url = String::new();
        let err = service.start_session(request).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = service
            .start_session(start_request(&["nope"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSelection(_)));

        let err = service
            .start_session(start_request(&["v1", "a1"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedMediaType(MediaType::Video)));

        assert_eq!(engine.launch_count(), 0);
    }
}
