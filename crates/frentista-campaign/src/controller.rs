//! Campaign controller — owns the pacing loop, the cancel flag, and the
//! checkpointing that makes a campaign crash-resumable.
//!
//! Sends are intentionally sequential: at most one message in flight per
//! campaign, separated by randomized human-like delays. The pacing IS the
//! anti-block mechanism; parallelizing would defeat it. Concurrent
//! campaigns coordinate only through the shared [`RateBudget`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;

use frentista_core::config::MessagingConfig;
use frentista_core::error::{FrentistaError, Result};
use frentista_core::phone;
use frentista_core::template;
use frentista_core::traits::{ContactStore, JobStore};
use frentista_core::types::{CampaignStatus, Contact};
use frentista_delivery::DeliveryClient;
use frentista_delivery::wait::interruptible_sleep;

use crate::budget::{RateBudget, ReserveOutcome};
use crate::job::{CampaignJob, JobView};

/// Human-like delay ranges for the three wait phases.
#[derive(Debug, Clone)]
pub struct PacingConfig {
    /// Simulates opening the chat.
    pub open_delay: (Duration, Duration),
    /// Simulates typing.
    pub type_delay: (Duration, Duration),
    /// Between consecutive contacts.
    pub send_delay: (Duration, Duration),
}

impl From<&MessagingConfig> for PacingConfig {
    fn from(cfg: &MessagingConfig) -> Self {
        Self {
            open_delay: cfg.open_delay(),
            type_delay: cfg.type_delay(),
            send_delay: cfg.send_delay(),
        }
    }
}

enum Step {
    Exit,
    Finish,
    Send { index: usize, phone: String },
}

pub struct CampaignController {
    job: Mutex<Option<CampaignJob>>,
    budget: Arc<RateBudget>,
    client: Arc<DeliveryClient>,
    store: Arc<dyn JobStore>,
    contacts: Arc<dyn ContactStore>,
    /// Cooperative stop signal, observed at every sub-second wait tick.
    stop: AtomicBool,
    /// Set by cancel(): the job parks as Idle instead of Paused.
    discard: AtomicBool,
    pacing: PacingConfig,
    country_code: String,
}

impl CampaignController {
    pub fn new(
        client: Arc<DeliveryClient>,
        store: Arc<dyn JobStore>,
        contacts: Arc<dyn ContactStore>,
        budget: Arc<RateBudget>,
        pacing: PacingConfig,
        country_code: &str,
    ) -> Self {
        Self {
            job: Mutex::new(None),
            budget,
            client,
            store,
            contacts,
            stop: AtomicBool::new(false),
            discard: AtomicBool::new(false),
            pacing,
            country_code: country_code.to_string(),
        }
    }

    /// Create a job from a target list and run it to completion, pause,
    /// or rate-limit stop. Idempotent: a second call while a job is
    /// running just reports it.
    pub async fn start(&self, targets: &[String], template: &str) -> Result<JobView> {
        {
            let guard = self.job.lock().await;
            if let Some(job) = guard.as_ref()
                && job.status == CampaignStatus::Running
            {
                return Ok(job.view(self.budget.limit()));
            }
        }

        if targets.is_empty() {
            return Err(FrentistaError::Validation(
                "campaign requires at least one target".into(),
            ));
        }
        let mut normalized = Vec::with_capacity(targets.len());
        for raw in targets {
            normalized.push(phone::normalize(raw, &self.country_code)?);
        }

        // Targets become contacts on first sight.
        for phone in &normalized {
            if self.contacts.get(phone).await?.is_none() {
                self.contacts.upsert(&Contact::new(phone)).await?;
            }
        }

        let mut job = CampaignJob::new(normalized, template);
        let window = self.budget.status().await;
        job.hour_window_start = window.window_start;
        job.sent_in_window = window.used;
        job.status = CampaignStatus::Running;

        self.stop.store(false, Ordering::Relaxed);
        self.discard.store(false, Ordering::Relaxed);
        self.store.save(&job.snapshot()).await?;
        tracing::info!(
            "📣 campaign {} started ({} targets)",
            job.id,
            job.targets.len()
        );
        *self.job.lock().await = Some(job);

        self.run_loop().await
    }

    /// Request a cooperative stop. The loop finishes its current phase,
    /// persists progress, and parks as Paused. Idempotent.
    pub async fn pause(&self) -> Result<JobView> {
        self.stop.store(true, Ordering::Relaxed);
        tracing::info!("⏸ campaign pause requested");
        self.current_view().await
    }

    /// Like pause, but the job parks as Idle and is not meant to be
    /// resumed. Idempotent.
    pub async fn cancel(&self) -> Result<JobView> {
        self.discard.store(true, Ordering::Relaxed);
        self.stop.store(true, Ordering::Relaxed);
        tracing::info!("🛑 campaign cancel requested");
        self.current_view().await
    }

    /// Reload the persisted snapshot, re-validate the rate budget, and
    /// re-enter the pacing loop at the cursor. A finished job is not
    /// resumed; a rate-limited job whose window has not elapsed stays
    /// parked. Idempotent.
    pub async fn resume(&self) -> Result<JobView> {
        let id = {
            let guard = self.job.lock().await;
            let Some(job) = guard.as_ref() else {
                return Err(FrentistaError::Validation(
                    "no campaign loaded; load a job first".into(),
                ));
            };
            match job.status {
                CampaignStatus::Running
                | CampaignStatus::Completed
                | CampaignStatus::Idle => return Ok(job.view(self.budget.limit())),
                CampaignStatus::Paused | CampaignStatus::PausedByLimit => job.id.clone(),
            }
        };

        // The persisted snapshot is the source of truth for progress.
        let snap = self.store.load(&id).await?.ok_or_else(|| {
            FrentistaError::Persistence(format!("snapshot for campaign {id} is missing"))
        })?;
        let mut job = CampaignJob::from_snapshot(snap)?;

        // Rate budget first: adopt the persisted window, then see where
        // the account stands now.
        self.budget
            .absorb(job.hour_window_start, job.sent_in_window)
            .await;
        let window = self.budget.status().await;
        job.hour_window_start = window.window_start;
        job.sent_in_window = window.used;

        if window.exhausted() {
            job.status = CampaignStatus::PausedByLimit;
            self.store.save(&job.snapshot()).await?;
            *self.job.lock().await = Some(job);
            tracing::info!("⏸ campaign {id} still rate-limited; staying paused");
            return self.current_view().await;
        }

        job.status = CampaignStatus::Running;
        let cursor = job.cursor;
        self.stop.store(false, Ordering::Relaxed);
        self.discard.store(false, Ordering::Relaxed);
        self.store.save(&job.snapshot()).await?;
        *self.job.lock().await = Some(job);
        tracing::info!("▶️ campaign {id} resumed at cursor {cursor}");

        self.run_loop().await
    }

    /// Current job summary.
    pub async fn status(&self) -> Result<JobView> {
        self.current_view().await
    }

    /// Load a persisted job into this controller without running it.
    /// A snapshot stored as Running was interrupted by a crash — it
    /// comes back as Paused so the operator resumes it explicitly.
    pub async fn load_job(&self, id: &str) -> Result<JobView> {
        let snap = self.store.load(id).await?.ok_or_else(|| {
            FrentistaError::Persistence(format!("snapshot for campaign {id} is missing"))
        })?;
        let mut job = CampaignJob::from_snapshot(snap)?;
        if job.status == CampaignStatus::Running {
            job.status = CampaignStatus::Paused;
        }
        *self.job.lock().await = Some(job);
        self.current_view().await
    }

    async fn current_view(&self) -> Result<JobView> {
        let guard = self.job.lock().await;
        match guard.as_ref() {
            Some(job) => Ok(job.view(self.budget.limit())),
            None => Err(FrentistaError::Validation("no campaign loaded".into())),
        }
    }

    async fn persist_current(&self) -> Result<()> {
        let snap = {
            let guard = self.job.lock().await;
            match guard.as_ref() {
                Some(job) => job.snapshot(),
                None => return Ok(()),
            }
        };
        self.store.save(&snap).await
    }

    async fn run_loop(&self) -> Result<JobView> {
        loop {
            let step = {
                let mut guard = self.job.lock().await;
                let Some(job) = guard.as_mut() else {
                    return Err(FrentistaError::Validation("no campaign loaded".into()));
                };
                if job.status != CampaignStatus::Running {
                    Step::Exit
                } else if job.is_done() {
                    job.status = CampaignStatus::Completed;
                    Step::Finish
                } else {
                    Step::Send {
                        index: job.cursor,
                        phone: job.targets[job.cursor].clone(),
                    }
                }
            };

            match step {
                Step::Exit => break,
                Step::Finish => {
                    self.persist_current().await?;
                    tracing::info!("✅ campaign completed");
                    break;
                }
                Step::Send { index, phone } => {
                    if !self.dispatch_one(index, &phone).await? {
                        break;
                    }
                }
            }
        }
        self.current_view().await
    }

    /// One full per-contact phase sequence. Returns Ok(false) when the
    /// loop must stop (pause or rate limit); Err only on a fatal
    /// checkpoint failure.
    async fn dispatch_one(&self, index: usize, phone: &str) -> Result<bool> {
        // Phase 1: rate check. Reserving up front keeps the cap honest
        // even with concurrent campaigns between check and send.
        let window = match self.budget.try_reserve().await {
            ReserveOutcome::Reserved(st) => st,
            ReserveOutcome::Exhausted(st) => {
                {
                    let mut guard = self.job.lock().await;
                    if let Some(job) = guard.as_mut() {
                        job.status = CampaignStatus::PausedByLimit;
                        job.hour_window_start = st.window_start;
                        job.sent_in_window = st.used;
                    }
                }
                self.persist_current().await?;
                tracing::info!(
                    "⏸ campaign paused by rate limit ({}/{} this hour)",
                    st.used,
                    st.limit
                );
                return Ok(false);
            }
        };
        tracing::debug!(
            "dispatching target {index} ({phone}), window {}/{}",
            window.used,
            window.limit
        );

        // Phases 2-3: opening + typing simulation.
        if !self.wait_range(self.pacing.open_delay).await
            || !self.wait_range(self.pacing.type_delay).await
        {
            self.budget.release().await;
            return self.park_on_stop().await;
        }

        // Phase 4: send the rendered template.
        let name = self
            .contacts
            .get(phone)
            .await?
            .and_then(|c| c.name)
            .unwrap_or_default();
        let template_text = {
            let guard = self.job.lock().await;
            match guard.as_ref() {
                Some(job) => job.template.clone(),
                None => return Ok(false),
            }
        };
        let text = template::render(&template_text, &[("name", &name)]);
        let outcome = self
            .client
            .send_with_cancel(phone, &text, Some(&self.stop))
            .await?;

        if !outcome.success {
            self.budget.release().await;
        }
        let window = self.budget.status().await;
        {
            let mut guard = self.job.lock().await;
            if let Some(job) = guard.as_mut() {
                if outcome.success {
                    job.sent.insert(index);
                } else {
                    job.failed.insert(
                        index,
                        outcome.error.clone().unwrap_or_else(|| "unknown error".into()),
                    );
                }
                job.cursor += 1;
                job.hour_window_start = window.window_start;
                job.sent_in_window = window.used;
            }
        }
        // A failed checkpoint is fatal: continuing after an unrecorded
        // send could double-send on resume.
        self.persist_current().await?;

        // Phase 5: inter-contact delay, unless the job just finished.
        let more = {
            let guard = self.job.lock().await;
            guard.as_ref().is_some_and(|j| !j.is_done())
        };
        if more {
            if self.stop.load(Ordering::Relaxed) {
                return self.park_on_stop().await;
            }
            if !self.wait_range(self.pacing.send_delay).await {
                return self.park_on_stop().await;
            }
        }
        Ok(true)
    }

    /// The stop flag was observed: persist exactly the progress made so
    /// far and park the job.
    async fn park_on_stop(&self) -> Result<bool> {
        let discard = self.discard.load(Ordering::Relaxed);
        {
            let mut guard = self.job.lock().await;
            if let Some(job) = guard.as_mut()
                && job.status == CampaignStatus::Running
            {
                job.status = if discard {
                    CampaignStatus::Idle
                } else {
                    CampaignStatus::Paused
                };
            }
        }
        self.persist_current().await?;
        tracing::info!(
            "campaign parked as {}",
            if discard { "idle (cancelled)" } else { "paused" }
        );
        Ok(false)
    }

    async fn wait_range(&self, (min, max): (Duration, Duration)) -> bool {
        let duration = if max > min {
            rand::thread_rng().gen_range(min..=max)
        } else {
            min
        };
        interruptible_sleep(duration, Some(&self.stop)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use frentista_core::traits::{
        AuditLog, ProviderReceipt, SendTransport, TransportError,
    };
    use frentista_core::types::{CampaignSnapshot, ConversationTurn, DeliveryAttempt, FlowState};
    use frentista_delivery::DeliveryConfig;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex as StdMutex;
    use tokio::time::Instant;

    use crate::budget::hours_ago;
    use crate::store::JsonJobStore;

    // ── scripted fakes ──────────────────────────────────

    struct ScriptedTransport {
        script: StdMutex<VecDeque<std::result::Result<ProviderReceipt, TransportError>>>,
        call_times: StdMutex<Vec<Instant>>,
    }

    impl ScriptedTransport {
        fn new(
            script: Vec<std::result::Result<ProviderReceipt, TransportError>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                script: StdMutex::new(script.into()),
                call_times: StdMutex::new(Vec::new()),
            })
        }

        fn always_ok() -> Arc<Self> {
            Arc::new(Self {
                script: StdMutex::new(VecDeque::new()),
                call_times: StdMutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.call_times.lock().unwrap().len()
        }

        fn gaps(&self) -> Vec<Duration> {
            let times = self.call_times.lock().unwrap();
            times.windows(2).map(|w| w[1] - w[0]).collect()
        }
    }

    #[async_trait]
    impl SendTransport for ScriptedTransport {
        async fn send(
            &self,
            _phone: &str,
            _text: &str,
        ) -> std::result::Result<ProviderReceipt, TransportError> {
            self.call_times.lock().unwrap().push(Instant::now());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(ProviderReceipt { message_id: None }))
        }
    }

    struct MemoryAudit;

    #[async_trait]
    impl AuditLog for MemoryAudit {
        async fn record_attempt(&self, _attempt: &DeliveryAttempt) -> frentista_core::error::Result<()> {
            Ok(())
        }
        async fn record_turn(&self, _turn: &ConversationTurn) -> frentista_core::error::Result<()> {
            Ok(())
        }
        async fn recent_turns(
            &self,
            _phone: &str,
            _limit: usize,
        ) -> frentista_core::error::Result<Vec<ConversationTurn>> {
            Ok(Vec::new())
        }
    }

    struct MemoryContacts {
        contacts: StdMutex<HashMap<String, Contact>>,
    }

    impl MemoryContacts {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                contacts: StdMutex::new(HashMap::new()),
            })
        }
    }

    #[async_trait]
    impl ContactStore for MemoryContacts {
        async fn get(&self, phone: &str) -> frentista_core::error::Result<Option<Contact>> {
            Ok(self.contacts.lock().unwrap().get(phone).cloned())
        }
        async fn upsert(&self, contact: &Contact) -> frentista_core::error::Result<()> {
            self.contacts
                .lock()
                .unwrap()
                .insert(contact.phone.clone(), contact.clone());
            Ok(())
        }
        async fn update_state(
            &self,
            _phone: &str,
            _expected: FlowState,
            _next: FlowState,
            _name: Option<&str>,
        ) -> frentista_core::error::Result<()> {
            Ok(())
        }
    }

    /// Job store that starts failing after N successful saves.
    struct FlakyJobStore {
        inner: JsonJobStore,
        saves_before_failure: StdMutex<u32>,
    }

    #[async_trait]
    impl JobStore for FlakyJobStore {
        async fn load(
            &self,
            id: &str,
        ) -> frentista_core::error::Result<Option<CampaignSnapshot>> {
            self.inner.load(id).await
        }
        async fn save(
            &self,
            snapshot: &CampaignSnapshot,
        ) -> frentista_core::error::Result<()> {
            let mut left = self.saves_before_failure.lock().unwrap();
            if *left == 0 {
                return Err(FrentistaError::Persistence("disk full".into()));
            }
            *left -= 1;
            drop(left);
            self.inner.save(snapshot).await
        }
        async fn list(&self) -> frentista_core::error::Result<Vec<String>> {
            self.inner.list().await
        }
    }

    fn permanent_error() -> std::result::Result<ProviderReceipt, TransportError> {
        Err(TransportError {
            status: Some(400),
            message: "provider error 400: invalid number".into(),
        })
    }

    fn ok_receipt() -> std::result::Result<ProviderReceipt, TransportError> {
        Ok(ProviderReceipt {
            message_id: Some("wamid".into()),
        })
    }

    fn fast_pacing() -> PacingConfig {
        PacingConfig {
            open_delay: (Duration::from_secs(6), Duration::from_secs(12)),
            type_delay: (Duration::from_secs(2), Duration::from_secs(4)),
            send_delay: (Duration::from_secs(25), Duration::from_secs(70)),
        }
    }

    fn controller_with(
        transport: Arc<ScriptedTransport>,
        store: Arc<dyn JobStore>,
        budget: Arc<RateBudget>,
    ) -> Arc<CampaignController> {
        let client = Arc::new(DeliveryClient::new(
            transport,
            Arc::new(MemoryAudit),
            DeliveryConfig::default(),
        ));
        Arc::new(CampaignController::new(
            client,
            store,
            MemoryContacts::new(),
            budget,
            fast_pacing(),
            "55",
        ))
    }

    fn targets(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("55119000000{i:02}")).collect()
    }

    // ── scenarios ───────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_end_to_end_two_sent_one_failed() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonJobStore::new(dir.path()));
        let transport =
            ScriptedTransport::new(vec![ok_receipt(), ok_receipt(), permanent_error()]);
        let controller =
            controller_with(transport.clone(), store.clone(), Arc::new(RateBudget::new(40)));

        let view = controller
            .start(&targets(3), "Olá {name}, promoção no posto!")
            .await
            .unwrap();

        assert_eq!(view.status, CampaignStatus::Completed);
        assert_eq!(view.sent, 2);
        assert_eq!(view.failed, 1);
        assert_eq!(view.cursor, 3);
        assert_eq!(view.window_used, 2);

        // Persisted snapshot agrees.
        let snap = store.load(&view.id).await.unwrap().unwrap();
        assert_eq!(snap.status, CampaignStatus::Completed);
        assert_eq!(snap.sent_indices, vec![0, 1]);
        assert_eq!(snap.failed_indices.len(), 1);
        assert_eq!(snap.failed_indices[0].index, 2);
        assert_eq!(snap.sent_in_window, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_target_list_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonJobStore::new(dir.path()));
        let controller = controller_with(
            ScriptedTransport::always_ok(),
            store.clone(),
            Arc::new(RateBudget::new(40)),
        );

        assert!(matches!(
            controller.start(&[], "oi").await,
            Err(FrentistaError::Validation(_))
        ));
        // Nothing persisted.
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_pauses_then_resumes_after_window() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonJobStore::new(dir.path()));
        let transport = ScriptedTransport::always_ok();
        let controller = controller_with(
            transport.clone(),
            store.clone(),
            Arc::new(RateBudget::new(2)),
        );

        let view = controller.start(&targets(5), "oi {name}").await.unwrap();
        assert_eq!(view.status, CampaignStatus::PausedByLimit);
        assert_eq!(view.cursor, 2);
        assert_eq!(view.sent, 2);
        assert_eq!(view.window_used, 2);
        assert!(view.pause_reason.unwrap().contains("budget exhausted"));
        assert_eq!(transport.calls(), 2);

        // Resume before the window elapses: stays parked.
        let view = controller.resume().await.unwrap();
        assert_eq!(view.status, CampaignStatus::PausedByLimit);
        assert_eq!(view.cursor, 2);
        assert_eq!(transport.calls(), 2);

        // A fresh process an hour later: same store, aged-out window.
        let transport2 = ScriptedTransport::always_ok();
        let controller2 = controller_with(
            transport2.clone(),
            store.clone(),
            Arc::new(RateBudget::with_window(2, hours_ago(2), 2)),
        );
        controller2.load_job(&view.id).await.unwrap();
        let view = controller2.resume().await.unwrap();

        // Window reset lets 2 more through, then the cap bites again.
        assert_eq!(view.status, CampaignStatus::PausedByLimit);
        assert_eq!(view.cursor, 4);
        assert_eq!(transport2.calls(), 2);

        let snap = store.load(&view.id).await.unwrap().unwrap();
        assert_eq!(snap.sent_indices, vec![0, 1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_resume_sends_each_target_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonJobStore::new(dir.path()));
        let transport = ScriptedTransport::always_ok();
        let controller = controller_with(
            transport.clone(),
            store.clone(),
            Arc::new(RateBudget::new(40)),
        );

        let runner = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.start(&targets(4), "oi {name}").await })
        };

        // Let at least one send land, then pause.
        while transport.calls() < 1 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        controller.pause().await.unwrap();
        let view = runner.await.unwrap().unwrap();
        assert_eq!(view.status, CampaignStatus::Paused);
        let paused_cursor = view.cursor;
        assert!(paused_cursor >= 1 && paused_cursor < 4);

        // Resuming twice is harmless; the second call reports Completed.
        let view = controller.resume().await.unwrap();
        assert_eq!(view.status, CampaignStatus::Completed);
        let view = controller.resume().await.unwrap();
        assert_eq!(view.status, CampaignStatus::Completed);

        // Every target exactly once, no index in both sets.
        assert_eq!(transport.calls(), 4);
        let snap = store.load(&view.id).await.unwrap().unwrap();
        assert_eq!(snap.sent_indices, vec![0, 1, 2, 3]);
        assert!(snap.failed_indices.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_phases_within_configured_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonJobStore::new(dir.path()));
        let transport = ScriptedTransport::always_ok();
        let controller = controller_with(
            transport.clone(),
            store.clone(),
            Arc::new(RateBudget::new(40)),
        );

        let started = Instant::now();
        controller.start(&targets(3), "oi").await.unwrap();

        // First send waits at least open_min + type_min, at most the maxes.
        let times = transport.call_times.lock().unwrap().clone();
        let lead = times[0] - started;
        assert!(lead >= Duration::from_secs(8), "lead was {lead:?}");
        assert!(lead <= Duration::from_secs(16), "lead was {lead:?}");

        // Consecutive sends are separated by delay + open + type.
        for gap in transport.gaps() {
            assert!(gap >= Duration::from_secs(33), "gap was {gap:?}");
            assert!(gap <= Duration::from_secs(86), "gap was {gap:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_checkpoint_failure_halts_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::always_ok();
        // One save for start, one for the first checkpoint, then failure.
        let store = Arc::new(FlakyJobStore {
            inner: JsonJobStore::new(dir.path()),
            saves_before_failure: StdMutex::new(2),
        });
        let controller = controller_with(
            transport.clone(),
            store,
            Arc::new(RateBudget::new(40)),
        );

        // Second checkpoint fails; the loop must stop without sending
        // target 2 or 3.
        let err = controller.start(&targets(3), "oi").await.unwrap_err();
        assert!(matches!(err, FrentistaError::Persistence(_)));
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_parks_job_as_idle() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonJobStore::new(dir.path()));
        let transport = ScriptedTransport::always_ok();
        let controller = controller_with(
            transport.clone(),
            store.clone(),
            Arc::new(RateBudget::new(40)),
        );

        let runner = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.start(&targets(3), "oi").await })
        };
        while transport.calls() < 1 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        controller.cancel().await.unwrap();
        let view = runner.await.unwrap().unwrap();
        assert_eq!(view.status, CampaignStatus::Idle);

        // A cancelled job is terminal for resume().
        let view = controller.resume().await.unwrap();
        assert_eq!(view.status, CampaignStatus::Idle);
        assert!(transport.calls() < 3);
    }
}
