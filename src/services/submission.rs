// src/services/submission.rs
//! Form sessions and the submit → analyze → present flow.
//!
//! Each session moves through
//! `Idle → Submitting → ShowingResult | Notifying → Idle`. Validation runs
//! before `Submitting` is entered, so a rejected form never leaves `Idle`.
//! Every failure after that point returns the session to `Idle` with its
//! images and product info intact.

use crate::errors::ConsignError;
use crate::models::*;
use crate::services::analysis_client::Analyzer;
use crate::services::collector::ImageCollector;
use crate::services::presenter::{Presentation, present};
use crate::services::validator::validate_submission;
use log::{info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use uuid::Uuid;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone)]
pub enum SubmissionState {
    Idle,
    Submitting,
    ShowingResult(AnalysisResult),
    Notifying { until: Instant },
}

pub struct FormSession {
    pub id: Uuid,
    pub seller: String,
    collector: ImageCollector,
    product: ProductInfo,
    state: SubmissionState,
}

/// Snapshot of a session for the client.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub seller: String,
    pub images: Vec<ImageRef>,
    pub remaining: usize,
    pub product: ProductInfo,
    pub state: &'static str,
    pub result: Option<AnalysisResult>,
    pub can_submit: bool,
}

impl FormSession {
    pub fn new(seller: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            seller,
            collector: ImageCollector::new(),
            product: ProductInfo::default(),
            state: SubmissionState::Idle,
        }
    }

    /// Current state, with an expired notification already dismissed.
    pub fn state(&mut self) -> &SubmissionState {
        if let SubmissionState::Notifying { until } = self.state {
            if Instant::now() >= until {
                self.state = SubmissionState::Idle;
            }
        }
        &self.state
    }

    pub fn collector(&self) -> &ImageCollector {
        &self.collector
    }

    pub(crate) fn ensure_editable(&self) -> Result<(), ConsignError> {
        match self.state {
            SubmissionState::Submitting => Err(ConsignError::SubmissionInFlight),
            _ => Ok(()),
        }
    }

    pub fn add_images(&mut self, batch: Vec<ImageRef>) -> Result<(), ConsignError> {
        self.ensure_editable()?;
        self.collector.add(batch)
    }

    pub fn remove_image(&mut self, index: usize) -> Result<ImageRef, ConsignError> {
        self.ensure_editable()?;
        self.collector.remove_at(index)
    }

    pub fn update_product<F>(&mut self, edit: F) -> Result<(), ConsignError>
    where
        F: FnOnce(&mut ProductInfo),
    {
        self.ensure_editable()?;
        edit(&mut self.product);
        Ok(())
    }

    /// Leaves the result view.
    pub fn go_back(&mut self) {
        if matches!(self.state, SubmissionState::ShowingResult(_)) {
            self.state = SubmissionState::Idle;
        }
    }

    pub fn view(&mut self) -> SessionView {
        let (state, result) = match self.state() {
            SubmissionState::Idle => ("idle", None),
            SubmissionState::Submitting => ("submitting", None),
            SubmissionState::ShowingResult(result) => ("showing_result", Some(result.clone())),
            SubmissionState::Notifying { .. } => ("notifying", None),
        };
        let images = self.collector.images().to_vec();
        let can_submit = validate_submission(&images, &self.product).is_ok();

        SessionView {
            id: self.id,
            seller: self.seller.clone(),
            remaining: self.collector.remaining(),
            images,
            product: self.product.clone(),
            state,
            result,
            can_submit,
        }
    }
}

/// The form as it was when `Submitting` was entered.
#[derive(Debug, Clone)]
pub struct SubmissionSnapshot {
    pub session_id: Uuid,
    pub seller: String,
    pub product: ProductInfo,
    pub images: Vec<ImageRef>,
}

/// Holds a session in `Submitting`. Dropping it without `finish` returns
/// the session to `Idle`.
pub struct SubmissionGuard {
    session: Arc<Mutex<FormSession>>,
    armed: bool,
}

impl SubmissionGuard {
    /// Validates the form and enters `Submitting`, returning what is to be analyzed.
    pub fn begin(
        session: Arc<Mutex<FormSession>>,
    ) -> Result<(Self, SubmissionSnapshot), ConsignError> {
        let snapshot = {
            let mut form = lock(&session);
            match form.state() {
                SubmissionState::Submitting => return Err(ConsignError::SubmissionInFlight),
                SubmissionState::ShowingResult(_) => {
                    return Err(ConsignError::Validation(
                        "Go back from the result view before submitting again".to_string(),
                    ));
                }
                SubmissionState::Idle | SubmissionState::Notifying { .. } => {}
            }

            validate_submission(form.collector.images(), &form.product)?;
            form.state = SubmissionState::Submitting;
            SubmissionSnapshot {
                session_id: form.id,
                seller: form.seller.clone(),
                product: form.product.clone(),
                images: form.collector.images().to_vec(),
            }
        };

        Ok((
            Self {
                session,
                armed: true,
            },
            snapshot,
        ))
    }

    pub fn finish(
        mut self,
        images: Vec<ImageRef>,
        result: AnalysisResult,
        window: Duration,
    ) -> Presentation {
        {
            let mut form = lock(&self.session);
            form.state = if result.is_fake {
                SubmissionState::ShowingResult(result.clone())
            } else {
                SubmissionState::Notifying {
                    until: Instant::now() + window,
                }
            };
        }
        self.armed = false;
        present(images, result, window)
    }
}

impl Drop for SubmissionGuard {
    fn drop(&mut self) {
        if self.armed {
            let mut form = lock(&self.session);
            if matches!(form.state, SubmissionState::Submitting) {
                form.state = SubmissionState::Idle;
            }
        }
    }
}

/// Everything the caller needs after a completed submission.
#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    pub seller: String,
    pub product: ProductInfo,
    pub result: AnalysisResult,
    pub presentation: Presentation,
}

pub async fn submit(
    session: Arc<Mutex<FormSession>>,
    analyzer: &dyn Analyzer,
    notification: Duration,
) -> Result<SubmissionOutcome, ConsignError> {
    let (guard, snapshot) = SubmissionGuard::begin(session)?;
    let SubmissionSnapshot {
        session_id,
        seller,
        product,
        images,
    } = snapshot;
    info!(
        "Submitting {} images for session {} via {:?}",
        images.len(),
        session_id,
        analyzer.protocol()
    );

    let result = match analyzer.analyze(&images).await {
        Ok(result) => result,
        Err(e) => {
            warn!("Submission for session {} failed: {}", session_id, e);
            return Err(e);
        }
    };

    info!("Session {} verdict: is_fake={}", session_id, result.is_fake);

    let presentation = guard.finish(images, result.clone(), notification);
    Ok(SubmissionOutcome {
        seller,
        product,
        result,
        presentation,
    })
}

/// Live form sessions, keyed by id.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<Uuid, Arc<Mutex<FormSession>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, seller: String) -> Arc<Mutex<FormSession>> {
        let session = FormSession::new(seller);
        let id = session.id;
        let session = Arc::new(Mutex::new(session));
        lock(&self.sessions).insert(id, session.clone());
        session
    }

    pub fn get(&self, id: &Uuid) -> Result<Arc<Mutex<FormSession>>, ConsignError> {
        lock(&self.sessions)
            .get(id)
            .cloned()
            .ok_or_else(|| ConsignError::SessionNotFound(id.to_string()))
    }

    /// Abandons a form, discarding its images.
    pub fn remove(&self, id: &Uuid) -> Result<(), ConsignError> {
        lock(&self.sessions)
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ConsignError::SessionNotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisProtocol;
    use async_trait::async_trait;
    use bytes::Bytes;
    use tokio::sync::{Notify, oneshot};

    fn image(name: &str) -> ImageRef {
        ImageRef::new(
            Some(name.to_string()),
            "image/jpeg".to_string(),
            Bytes::from_static(b"jpeg"),
        )
    }

    fn ready_session() -> Arc<Mutex<FormSession>> {
        let store = SessionStore::new();
        let session = store.create("위탁판매자 003".to_string());
        {
            let mut form = lock(&session);
            form.add_images(vec![image("a.jpg"), image("b.jpg"), image("c.jpg")])
                .unwrap();
            form.update_product(|p| {
                p.set_item_name("알마 BB");
                p.set_model_name("루이비통 알마 BB");
                p.set_condition(Some(Condition::LightlyUsed));
            })
            .unwrap();
        }
        session
    }

    fn state_name(session: &Arc<Mutex<FormSession>>) -> &'static str {
        lock(session).view().state
    }

    struct FixedAnalyzer(Result<bool, ()>);

    #[async_trait]
    impl Analyzer for FixedAnalyzer {
        async fn analyze(&self, _images: &[ImageRef]) -> Result<AnalysisResult, ConsignError> {
            match self.0 {
                Ok(is_fake) => Ok(AnalysisResult {
                    is_fake,
                    details: AnalysisDetails::PerImage(Vec::new()),
                }),
                Err(()) => Err(ConsignError::Upstream {
                    status: 500,
                    body: String::new(),
                }),
            }
        }

        fn protocol(&self) -> AnalysisProtocol {
            AnalysisProtocol::PerImage
        }
    }

    /// Blocks until released, so a submission can be observed mid-flight.
    struct GatedAnalyzer {
        started: Mutex<Option<oneshot::Sender<()>>>,
        release: Notify,
    }

    #[async_trait]
    impl Analyzer for GatedAnalyzer {
        async fn analyze(&self, _images: &[ImageRef]) -> Result<AnalysisResult, ConsignError> {
            if let Some(tx) = lock(&self.started).take() {
                let _ = tx.send(());
            }
            self.release.notified().await;
            Ok(AnalysisResult {
                is_fake: false,
                details: AnalysisDetails::PerImage(Vec::new()),
            })
        }

        fn protocol(&self) -> AnalysisProtocol {
            AnalysisProtocol::PerImage
        }
    }

    #[actix_web::test]
    async fn test_incomplete_form_is_rejected_before_analysis() {
        let session = SessionStore::new().create("seller".to_string());
        lock(&session).add_images(vec![image("a.jpg")]).unwrap();

        let err = submit(session.clone(), &FixedAnalyzer(Ok(true)), Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, ConsignError::Validation(_)));
        assert_eq!(state_name(&session), "idle");
    }

    #[actix_web::test]
    async fn test_fake_verdict_shows_result_until_back() {
        let session = ready_session();
        let outcome = submit(session.clone(), &FixedAnalyzer(Ok(true)), Duration::from_secs(2))
            .await
            .unwrap();

        assert!(outcome.result.is_fake);
        assert_eq!(outcome.seller, "위탁판매자 003");
        match outcome.presentation {
            Presentation::ShowResult { images, .. } => assert_eq!(images.len(), 3),
            other => panic!("expected result view, got {:?}", other),
        }
        let view = lock(&session).view();
        assert_eq!(view.state, "showing_result");
        assert_eq!(view.result.map(|r| r.is_fake), Some(true));

        let err = submit(session.clone(), &FixedAnalyzer(Ok(true)), Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, ConsignError::Validation(_)));

        lock(&session).go_back();
        assert_eq!(state_name(&session), "idle");
    }

    #[actix_web::test]
    async fn test_clean_verdict_notifies_then_idles() {
        let session = ready_session();
        let outcome = submit(session.clone(), &FixedAnalyzer(Ok(false)), Duration::from_millis(50))
            .await
            .unwrap();

        assert!(matches!(outcome.presentation, Presentation::Notify { dismiss_after_ms: 50, .. }));
        assert_eq!(state_name(&session), "notifying");

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(state_name(&session), "idle");
        // form is kept for the next submission
        let view = lock(&session).view();
        assert_eq!(view.images.len(), 3);
        assert_eq!(view.product.item_name, "알마 BB");
        assert!(view.result.is_none());
    }

    #[actix_web::test]
    async fn test_error_returns_to_idle_with_form_intact() {
        let session = ready_session();
        let err = submit(session.clone(), &FixedAnalyzer(Err(())), Duration::from_secs(2))
            .await
            .unwrap_err();

        assert!(matches!(err, ConsignError::Upstream { .. }));
        assert_eq!(state_name(&session), "idle");
        assert_eq!(lock(&session).collector().images().len(), 3);

        // user may resubmit straight away
        assert!(submit(session, &FixedAnalyzer(Ok(false)), Duration::from_secs(2)).await.is_ok());
    }

    #[actix_web::test]
    async fn test_resubmission_blocked_while_in_flight() {
        let session = ready_session();
        let (tx, rx) = oneshot::channel();
        let analyzer = Arc::new(GatedAnalyzer {
            started: Mutex::new(Some(tx)),
            release: Notify::new(),
        });

        let first = {
            let session = session.clone();
            let analyzer = analyzer.clone();
            tokio::spawn(async move {
                submit(session, analyzer.as_ref(), Duration::from_secs(2)).await
            })
        };
        rx.await.unwrap();

        assert_eq!(state_name(&session), "submitting");
        let err = submit(session.clone(), analyzer.as_ref(), Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, ConsignError::SubmissionInFlight));
        assert!(matches!(
            lock(&session).remove_image(0),
            Err(ConsignError::SubmissionInFlight)
        ));

        analyzer.release.notify_one();
        assert!(first.await.unwrap().is_ok());
        assert_eq!(state_name(&session), "notifying");
    }

    #[test]
    fn test_dropped_guard_clears_submitting() {
        let session = ready_session();
        let (guard, snapshot) = SubmissionGuard::begin(session.clone()).unwrap();
        assert_eq!(snapshot.images.len(), 3);
        assert_eq!(state_name(&session), "submitting");

        drop(guard);
        assert_eq!(state_name(&session), "idle");
    }

    #[test]
    fn test_snapshot_matches_form_at_begin() {
        let session = ready_session();
        let (guard, snapshot) = SubmissionGuard::begin(session.clone()).unwrap();
        assert_eq!(snapshot.session_id, lock(&session).id);
        assert_eq!(snapshot.seller, "위탁판매자 003");
        assert_eq!(snapshot.product.model_name, "루이비통 알마 BB");

        // edits are refused until the guard is released
        let edit = lock(&session).update_product(|p| p.set_model_name("샤넬 클래식"));
        assert!(matches!(edit, Err(ConsignError::SubmissionInFlight)));
        drop(guard);

        lock(&session)
            .update_product(|p| p.set_model_name("샤넬 클래식"))
            .unwrap();
        assert_eq!(snapshot.product.model_name, "루이비통 알마 BB");
    }

    #[test]
    fn test_session_store_remove() {
        let store = SessionStore::new();
        let id = lock(&store.create("seller".to_string())).id;
        assert!(store.get(&id).is_ok());
        store.remove(&id).unwrap();
        assert!(matches!(store.get(&id), Err(ConsignError::SessionNotFound(_))));
        assert!(store.remove(&id).is_err());
    }
}
