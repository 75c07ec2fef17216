//! Cities/tags/questionnaire reference data cache.
//!
//! Reference data is fetched once per app session with a small retry budget
//! and kept in memory; the questionnaire definition is additionally
//! persisted to the secret store and preferred over the network on later
//! starts. A UI that cannot get reference data renders degraded rather
//! than blocking.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use log::{debug, warn};
use tokio::time::sleep;

use nestmate_core::models::{City, QuestionSection, ReferenceData, Tag};
use nestmate_core::retry::linear_backoff;
use nestmate_core::SecretStore;

use crate::client::ApiClient;
use crate::error::{ApiError, Result};

/// Fixed storage key for the persisted questionnaire blob.
pub const QUESTIONNAIRE_CACHE_KEY: &str = "questionnaire_cache";

const MAX_FETCH_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 400;

/// In-memory reference data plus the persisted questionnaire cache.
pub struct ReferenceDataCache {
    api: Arc<ApiClient>,
    secrets: Arc<dyn SecretStore>,
    retry_base_delay: Duration,
    data: RwLock<ReferenceData>,
    questions: RwLock<Vec<QuestionSection>>,
}

impl ReferenceDataCache {
    pub fn new(api: Arc<ApiClient>, secrets: Arc<dyn SecretStore>) -> Self {
        Self {
            api,
            secrets,
            retry_base_delay: Duration::from_millis(RETRY_BASE_DELAY_MS),
            data: RwLock::new(ReferenceData::default()),
            questions: RwLock::new(Vec::new()),
        }
    }

    /// Override the base retry delay (tests).
    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// Cached cities, possibly empty when loading failed or never ran.
    pub fn cities(&self) -> Vec<City> {
        self.data.read().map(|d| d.cities.clone()).unwrap_or_default()
    }

    /// Cached tags.
    pub fn tags(&self) -> Vec<Tag> {
        self.data.read().map(|d| d.tags.clone()).unwrap_or_default()
    }

    /// Cached questionnaire sections.
    pub fn questions(&self) -> Vec<QuestionSection> {
        self.questions.read().map(|q| q.clone()).unwrap_or_default()
    }

    /// Fetch cities + tags with the retry budget. On exhaustion the last
    /// error surfaces so the UI can show a non-fatal "reference data
    /// unavailable" state; previously cached values stay readable.
    pub async fn load(&self, cancel: Option<&AtomicBool>) -> Result<ReferenceData> {
        let payload = self
            .fetch_with_retry(cancel, || self.api.preferences_payload())
            .await?;
        if let Ok(mut data) = self.data.write() {
            *data = payload.clone();
        }
        Ok(payload)
    }

    /// Force a network re-fetch of cities + tags.
    pub async fn refresh(&self, cancel: Option<&AtomicBool>) -> Result<ReferenceData> {
        self.load(cancel).await
    }

    /// Questionnaire definitions, preferring the locally persisted copy.
    /// A fetch failure with no local fallback leaves questions empty; that
    /// is logged, not surfaced, because onboarding can proceed without it.
    pub async fn load_questions(&self, cancel: Option<&AtomicBool>) -> Vec<QuestionSection> {
        match self.read_persisted_questions() {
            Some(sections) => {
                debug!("Using persisted questionnaire ({} sections)", sections.len());
                if let Ok(mut questions) = self.questions.write() {
                    *questions = sections.clone();
                }
                sections
            }
            None => match self.fetch_and_persist_questions(cancel).await {
                Ok(sections) => sections,
                Err(err) => {
                    warn!("Questionnaire fetch failed with no local fallback: {}", err);
                    Vec::new()
                }
            },
        }
    }

    /// Force a network re-fetch of the questionnaire, overwriting the
    /// persisted copy.
    pub async fn refresh_questions(
        &self,
        cancel: Option<&AtomicBool>,
    ) -> Result<Vec<QuestionSection>> {
        self.fetch_and_persist_questions(cancel).await
    }

    fn read_persisted_questions(&self) -> Option<Vec<QuestionSection>> {
        match self.secrets.get_secret(QUESTIONNAIRE_CACHE_KEY) {
            Ok(Some(blob)) => match serde_json::from_str::<Vec<QuestionSection>>(&blob) {
                Ok(sections) => Some(sections),
                Err(err) => {
                    warn!("Discarding unparseable questionnaire cache: {}", err);
                    let _ = self.secrets.delete_secret(QUESTIONNAIRE_CACHE_KEY);
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                warn!("Failed to read questionnaire cache: {}", err);
                None
            }
        }
    }

    async fn fetch_and_persist_questions(
        &self,
        cancel: Option<&AtomicBool>,
    ) -> Result<Vec<QuestionSection>> {
        let sections = self
            .fetch_with_retry(cancel, || self.api.get_questionnaire())
            .await?;

        match serde_json::to_string(&sections) {
            Ok(blob) => {
                if let Err(err) = self.secrets.set_secret(QUESTIONNAIRE_CACHE_KEY, &blob) {
                    warn!("Failed to persist questionnaire cache: {}", err);
                }
            }
            Err(err) => warn!("Failed to serialize questionnaire cache: {}", err),
        }

        if let Ok(mut questions) = self.questions.write() {
            *questions = sections.clone();
        }
        Ok(sections)
    }

    /// Up to `MAX_FETCH_ATTEMPTS` tries with linear backoff between them
    /// (`delay * attempt`). The cancel flag is checked before every attempt
    /// so an unmounted screen can stop in-flight retries.
    async fn fetch_with_retry<T, F, Fut>(&self, cancel: Option<&AtomicBool>, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempt = 0_u32;
        loop {
            if cancel.map(|flag| flag.load(Ordering::Relaxed)).unwrap_or(false) {
                return Err(ApiError::precondition("reference data fetch cancelled"));
            }

            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < MAX_FETCH_ATTEMPTS => {
                    let delay = linear_backoff(self.retry_base_delay, attempt);
                    debug!(
                        "Reference fetch attempt {}/{} failed ({}); retrying in {:?}",
                        attempt, MAX_FETCH_ATTEMPTS, err, delay
                    );
                    sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{start_mock_server, MockOutcome};
    use nestmate_core::{MemorySecretStore, TokenStore};

    const PAYLOAD_BODY: &str = r#"{"cities":[{"id":1,"name":"Tel Aviv","areas":["Center","North"]}],"tags":[{"id":5,"name":"Pet friendly"}]}"#;
    const QUESTIONS_BODY: &str = r#"[{"id":1,"title":"Lifestyle","questions":[{"id":10,"title":"Do you smoke?","question_type":"radio","options":["Yes","No"]}]}]"#;

    fn cache_with(base_url: &str) -> (ReferenceDataCache, Arc<MemorySecretStore>) {
        let secrets = Arc::new(MemorySecretStore::new());
        let tokens = TokenStore::new(secrets.clone());
        let api = Arc::new(ApiClient::new(base_url, tokens));
        let cache = ReferenceDataCache::new(api, secrets.clone())
            .with_retry_base_delay(Duration::from_millis(5));
        (cache, secrets)
    }

    #[tokio::test]
    async fn load_succeeds_on_third_attempt_within_budget() {
        let (base_url, captured, server) = start_mock_server(vec![
            MockOutcome::respond(500, r#"{"detail":"boom"}"#),
            MockOutcome::DropConnection,
            MockOutcome::respond(200, PAYLOAD_BODY),
        ])
        .await;
        let (cache, _secrets) = cache_with(&base_url);

        let data = cache.load(None).await.expect("load within retry budget");
        assert_eq!(data.cities[0].name, "Tel Aviv");
        assert_eq!(data.tags[0].id, 5);
        assert_eq!(captured.lock().await.len(), 3);

        // cached copy is now readable
        assert_eq!(cache.cities().len(), 1);

        server.abort();
    }

    #[tokio::test]
    async fn load_surfaces_last_error_after_exhaustion() {
        let (base_url, captured, server) = start_mock_server(vec![
            MockOutcome::respond(500, r#"{"detail":"one"}"#),
            MockOutcome::respond(500, r#"{"detail":"two"}"#),
            MockOutcome::respond(503, r#"{"detail":"three"}"#),
        ])
        .await;
        let (cache, _secrets) = cache_with(&base_url);

        let err = cache.load(None).await.expect_err("budget exhausted");
        assert_eq!(err.to_string(), "API error (503): three");
        assert_eq!(captured.lock().await.len(), 3);

        server.abort();
    }

    #[tokio::test]
    async fn questions_prefer_persisted_copy() {
        let (base_url, captured, server) = start_mock_server(vec![]).await;
        let (cache, secrets) = cache_with(&base_url);
        secrets
            .set_secret(QUESTIONNAIRE_CACHE_KEY, QUESTIONS_BODY)
            .expect("seed");

        let sections = cache.load_questions(None).await;
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].questions[0].id, 10);
        assert!(captured.lock().await.is_empty());

        server.abort();
    }

    #[tokio::test]
    async fn refresh_questions_bypasses_and_overwrites_local_copy() {
        let (base_url, captured, server) =
            start_mock_server(vec![MockOutcome::respond(200, QUESTIONS_BODY)]).await;
        let (cache, secrets) = cache_with(&base_url);
        secrets
            .set_secret(QUESTIONNAIRE_CACHE_KEY, r#"[{"id":99,"title":"Stale","questions":[]}]"#)
            .expect("seed stale");

        let sections = cache.refresh_questions(None).await.expect("refresh");
        assert_eq!(sections[0].title, "Lifestyle");
        assert_eq!(captured.lock().await.len(), 1);

        let persisted = secrets
            .get_secret(QUESTIONNAIRE_CACHE_KEY)
            .expect("read")
            .expect("present");
        assert!(persisted.contains("Lifestyle"));
        assert!(!persisted.contains("Stale"));

        server.abort();
    }

    #[tokio::test]
    async fn questions_fetch_failure_without_local_copy_is_empty_not_fatal() {
        let (base_url, _captured, server) = start_mock_server(vec![
            MockOutcome::respond(500, r#"{"detail":"a"}"#),
            MockOutcome::respond(500, r#"{"detail":"b"}"#),
            MockOutcome::respond(500, r#"{"detail":"c"}"#),
        ])
        .await;
        let (cache, _secrets) = cache_with(&base_url);

        let sections = cache.load_questions(None).await;
        assert!(sections.is_empty());

        server.abort();
    }

    #[tokio::test]
    async fn cancel_flag_stops_before_first_attempt() {
        let (base_url, captured, server) = start_mock_server(vec![]).await;
        let (cache, _secrets) = cache_with(&base_url);
        let cancel = AtomicBool::new(true);

        let err = cache.load(Some(&cancel)).await.expect_err("cancelled");
        assert!(matches!(err, ApiError::Precondition(_)));
        assert!(captured.lock().await.is_empty());

        server.abort();
    }
}
