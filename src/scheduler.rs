//! Daily drill delivery
//!
//! Every subscription owns one background task that sleeps until the next
//! `HH:MM` in the subscription's timezone, sends the drill and goes back to
//! sleep. Tasks are named `{task}_{lang}_{chat}` and stopped through their
//! cancellation token.

use crate::drill::{self, DrillError, Exercises, Language, Task};
use crate::runtime::{ChatTransport, TransportError};
use crate::state_machine::ChatId;
use crate::store::{StoreResult, SubInfo, SubscriptionStore};
use chrono::{DateTime, FixedOffset, NaiveTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Failed to compose drill: {0}")]
    Drill(#[from] DrillError),
    #[error("Failed to send drill: {0}")]
    Transport(#[from] TransportError),
}

/// Starting and stopping the daily job of a subscription
pub trait JobControl: Send + Sync {
    /// Start (or restart) the job for `sub`
    fn schedule(&self, chat_id: ChatId, sub: &SubInfo);

    /// Stop the job for `sub`; false if none was running
    fn unschedule(&self, chat_id: ChatId, sub: &SubInfo) -> bool;
}

pub fn job_name(chat_id: ChatId, task: Task, lang: Language) -> String {
    format!("{task}_{lang}_{chat_id}")
}

/// First `hour:minute` at GMT+`timezone` strictly after `now`.
/// `None` for an impossible time or offset.
pub fn next_fire_after(
    now: DateTime<Utc>,
    hour: u32,
    minute: u32,
    timezone: i32,
) -> Option<DateTime<Utc>> {
    let offset = FixedOffset::east_opt(timezone.checked_mul(3600)?)?;
    let at = NaiveTime::from_hms_opt(hour, minute, 0)?;
    let local_now = now.with_timezone(&offset);
    let mut next = local_now
        .date_naive()
        .and_time(at)
        .and_local_timezone(offset)
        .single()?;
    if next <= local_now {
        next = next.checked_add_signed(chrono::Duration::days(1))?;
    }
    Some(next.with_timezone(&Utc))
}

struct Inner<T> {
    transport: Arc<T>,
    exercises: Arc<Exercises>,
    data_dir: PathBuf,
    jobs: Mutex<HashMap<String, CancellationToken>>,
    shutdown: CancellationToken,
}

impl<T> Inner<T> {
    fn jobs(&self) -> MutexGuard<'_, HashMap<String, CancellationToken>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Runs the daily jobs on the tokio runtime
pub struct Scheduler<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Scheduler<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: ChatTransport + 'static> Scheduler<T> {
    pub fn new(transport: Arc<T>, exercises: Arc<Exercises>, data_dir: PathBuf) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                exercises,
                data_dir,
                jobs: Mutex::new(HashMap::new()),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Schedule every stored subscription; returns how many
    pub fn restore(&self, store: &SubscriptionStore) -> StoreResult<usize> {
        let subs = store.all()?;
        for (chat_id, sub) in &subs {
            tracing::info!(
                chat_id = %chat_id,
                task = %sub.task,
                schedule = %sub.schedule(),
                "Restoring subscription"
            );
            self.schedule(*chat_id, sub);
        }
        Ok(subs.len())
    }

    /// Send a drill right away, outside any schedule
    pub async fn run_now(
        &self,
        chat_id: ChatId,
        task: Task,
        lang: Language,
    ) -> Result<(), DeliveryError> {
        deliver_drill(&self.inner, chat_id, task, lang).await
    }

    /// Names of running jobs, sorted
    pub fn job_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.jobs().keys().cloned().collect();
        names.sort();
        names
    }

    /// Stop every job
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let stopped = self.inner.jobs().drain().count();
        tracing::info!(stopped, "Scheduler stopped");
    }
}

impl<T: ChatTransport + 'static> JobControl for Scheduler<T> {
    fn schedule(&self, chat_id: ChatId, sub: &SubInfo) {
        let name = job_name(chat_id, sub.task, sub.lang);
        let token = self.inner.shutdown.child_token();
        if let Some(previous) = self.inner.jobs().insert(name.clone(), token.clone()) {
            previous.cancel();
        }
        tracing::info!(job = %name, schedule = %sub.schedule(), "Scheduling daily job");

        let inner = Arc::clone(&self.inner);
        let sub = sub.clone();
        tokio::spawn(async move {
            run_daily(inner, chat_id, sub, token).await;
            tracing::debug!(job = %name, "Daily job stopped");
        });
    }

    fn unschedule(&self, chat_id: ChatId, sub: &SubInfo) -> bool {
        let name = job_name(chat_id, sub.task, sub.lang);
        let Some(token) = self.inner.jobs().remove(&name) else {
            return false;
        };
        token.cancel();
        tracing::info!(job = %name, "Unscheduled daily job");
        true
    }
}

async fn run_daily<T: ChatTransport>(
    inner: Arc<Inner<T>>,
    chat_id: ChatId,
    sub: SubInfo,
    token: CancellationToken,
) {
    let mut after = Utc::now();
    loop {
        let Some(next) = next_fire_after(after, sub.hour, sub.minute, sub.timezone) else {
            tracing::error!(
                chat_id = %chat_id,
                task = %sub.task,
                hour = sub.hour,
                minute = sub.minute,
                timezone = sub.timezone,
                "Impossible schedule"
            );
            return;
        };
        let wait = (next - Utc::now()).to_std().unwrap_or_default();

        tokio::select! {
            biased;

            () = token.cancelled() => return,
            () = tokio::time::sleep(wait) => {}
        }

        if let Err(e) = deliver_drill(&inner, chat_id, sub.task, sub.lang).await {
            tracing::warn!(chat_id = %chat_id, task = %sub.task, error = %e, "Daily delivery failed");
        }
        // Never fire twice for the same slot if the wall clock lags the timer
        after = next.max(Utc::now());
    }
}

async fn deliver_drill<T: ChatTransport>(
    inner: &Inner<T>,
    chat_id: ChatId,
    task: Task,
    lang: Language,
) -> Result<(), DeliveryError> {
    tracing::info!(chat_id = %chat_id, task = %task, lang = %lang, "Sending drill");
    let drill = {
        let mut rng = rand::thread_rng();
        drill::compose(task, lang, &inner.data_dir, &mut rng)?
    };
    inner.transport.send(chat_id, &drill.screen).await?;
    if let Some(exercise) = drill.exercise {
        inner.exercises.set(chat_id, exercise);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::testing::{MockTransport, Sent};
    use crate::state_machine::ParseMode;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn scheduler() -> (Scheduler<MockTransport>, Arc<MockTransport>, Arc<Exercises>) {
        let transport = Arc::new(MockTransport::new());
        let exercises = Arc::new(Exercises::new());
        let scheduler = Scheduler::new(
            Arc::clone(&transport),
            Arc::clone(&exercises),
            PathBuf::from("/nonexistent"),
        );
        (scheduler, transport, exercises)
    }

    fn sub(task: Task, lang: Language) -> SubInfo {
        SubInfo {
            task,
            lang,
            hour: 12,
            minute: 0,
            timezone: 0,
        }
    }

    #[test]
    fn test_next_fire_same_day() {
        let now = at(2024, 5, 1, 10, 0);
        assert_eq!(next_fire_after(now, 12, 0, 0), Some(at(2024, 5, 1, 12, 0)));
        assert_eq!(next_fire_after(now, 13, 45, 2), Some(at(2024, 5, 1, 11, 45)));
    }

    #[test]
    fn test_next_fire_rolls_over() {
        let now = at(2024, 5, 1, 10, 0);
        assert_eq!(next_fire_after(now, 9, 0, 0), Some(at(2024, 5, 2, 9, 0)));
        // Exactly now counts as passed
        assert_eq!(next_fire_after(now, 12, 0, 2), Some(at(2024, 5, 2, 10, 0)));
        // Local date differs from the UTC date
        assert_eq!(next_fire_after(now, 23, 30, -3), Some(at(2024, 5, 2, 2, 30)));
        assert_eq!(
            next_fire_after(at(2024, 12, 31, 23, 0), 0, 30, 0),
            Some(at(2025, 1, 1, 0, 30))
        );
    }

    #[test]
    fn test_next_fire_rejects_impossible_times() {
        let now = at(2024, 5, 1, 10, 0);
        assert_eq!(next_fire_after(now, 24, 0, 0), None);
        assert_eq!(next_fire_after(now, 12, 60, 0), None);
        assert_eq!(next_fire_after(now, 12, 0, 30), None);
    }

    #[test]
    fn test_job_name() {
        assert_eq!(
            job_name(ChatId(42), Task::Numbers, Language::De),
            "numbers_DE_42"
        );
    }

    #[tokio::test]
    async fn test_schedule_and_unschedule() {
        let (scheduler, _transport, _exercises) = scheduler();
        let chat = ChatId(7);

        scheduler.schedule(chat, &sub(Task::Numbers, Language::De));
        scheduler.schedule(chat, &sub(Task::Verbs, Language::En));
        // Rescheduling replaces the running job
        scheduler.schedule(chat, &sub(Task::Numbers, Language::De));
        assert_eq!(
            scheduler.job_names(),
            vec!["numbers_DE_7".to_string(), "verbs_EN_7".to_string()]
        );

        assert!(scheduler.unschedule(chat, &sub(Task::Numbers, Language::De)));
        assert!(!scheduler.unschedule(chat, &sub(Task::Numbers, Language::De)));
        assert_eq!(scheduler.job_names(), vec!["verbs_EN_7".to_string()]);

        scheduler.shutdown();
        assert!(scheduler.job_names().is_empty());
    }

    #[tokio::test]
    async fn test_restore_schedules_stored_subscriptions() {
        let dir = tempfile::tempdir().unwrap();
        let store = SubscriptionStore::open(dir.path()).unwrap();
        store.add_sub(ChatId(1), sub(Task::Numbers, Language::De)).unwrap();
        store.add_sub(ChatId(2), sub(Task::Verbs, Language::En)).unwrap();

        let (scheduler, _transport, _exercises) = scheduler();
        assert_eq!(scheduler.restore(&store).unwrap(), 2);
        assert_eq!(
            scheduler.job_names(),
            vec!["numbers_DE_1".to_string(), "verbs_EN_2".to_string()]
        );
        scheduler.shutdown();
    }

    #[tokio::test]
    async fn test_run_now_sends_numbers_and_keeps_exercise() {
        let (scheduler, transport, exercises) = scheduler();
        scheduler
            .run_now(ChatId(3), Task::Numbers, Language::En)
            .await
            .unwrap();

        let sent = transport.sent();
        assert!(matches!(
            &sent[..],
            [Sent::Send { chat_id: ChatId(3), screen }]
                if screen.parse_mode == ParseMode::Markdown && screen.text.contains("Daily Numbers")
        ));
        assert_eq!(exercises.get(ChatId(3)).unwrap().lang, Language::En);
    }

    #[tokio::test]
    async fn test_run_now_reports_failures() {
        let (scheduler, transport, exercises) = scheduler();
        assert!(matches!(
            scheduler.run_now(ChatId(3), Task::Verbs, Language::De).await,
            Err(DeliveryError::Drill(_))
        ));

        transport.fail();
        assert!(matches!(
            scheduler.run_now(ChatId(3), Task::Numbers, Language::De).await,
            Err(DeliveryError::Transport(_))
        ));
        // Nothing to grade if the drill never arrived
        assert!(exercises.get(ChatId(3)).is_none());
    }
}
