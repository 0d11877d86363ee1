//! Phase orchestrator for cross-checked verification.
//!
//! One run moves through four phases:
//! 1. **Init**: validate the question and the caller's authorization
//! 2. **Answering**: both answerers concurrently, under one phase deadline
//! 3. **Judging**: the 2x2 cross matrix, four judge calls concurrently
//! 4. **Fusing**: deterministic synthesis in `crosscheck-core`
//!
//! Each phase fans out on a `JoinSet` and writes into its own
//! [`PhaseSink`]; the sink is drained only once the join has finished or
//! the deadline has passed. A missing or failed answer ends the run before
//! any judge is called. Judge failures never end a run.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::stream::{BoxStream, Stream, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};

use crosscheck_core::{
    AnswerPair, AnswerResult, AnswerSource, JudgeId, JudgmentMatrix, JudgmentRequest,
    JudgmentResult, Phase, ProgressUpdate, Question, QuestionError, RunState, Synthesizer,
    VerdictPayload,
};

use crate::backends::{build_backend, AdapterOutcome, BackendAdapter};
use crate::config::{ConfigError, RuntimeConfig};
use crate::prompts;
use crate::providers::ProviderRegistry;
use crate::sink::PhaseSink;

/// Room for every event of one run, so progress is never dropped in practice.
const EVENT_CHANNEL_CAPACITY: usize = 8;

/// Errors from wiring an orchestrator.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("No backend configured for {0}")]
    BackendNotConfigured(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Terminal errors of a verification run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    #[error("Invalid question: {0}")]
    InvalidQuestion(#[from] QuestionError),

    #[error("Caller is not authorized to run a verification")]
    Unauthorized,

    #[error(
        "Answer phase failed: {}; {}",
        answer_status(.a),
        answer_status(.b)
    )]
    AnswerPhaseFailed { a: AnswerResult, b: AnswerResult },
}

fn answer_status(answer: &AnswerResult) -> String {
    if answer.is_usable() {
        format!("{} answered", answer.backend)
    } else {
        format!("{} failed ({})", answer.backend, answer.text)
    }
}

/// One verification request from the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRequest {
    pub question: String,

    /// Authorization decided upstream; quota bookkeeping is not done here
    pub authorized: bool,
}

impl VerificationRequest {
    pub fn new(question: impl Into<String>, authorized: bool) -> Self {
        Self {
            question: question.into(),
            authorized,
        }
    }
}

/// Receives informational progress updates during a run.
pub trait ProgressNotifier: Send + Sync {
    fn on_progress(&self, update: &ProgressUpdate);
}

/// Notifier that discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressNotifier for NoProgress {
    fn on_progress(&self, _update: &ProgressUpdate) {}
}

/// Events yielded by [`VerificationOrchestrator::run_verification`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationEvent {
    Progress(ProgressUpdate),
    Verdict(VerdictPayload),
    Failed(VerificationError),
}

impl VerificationEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, VerificationEvent::Progress(_))
    }
}

/// Stream of at most four progress events followed by one terminal event.
pub type VerificationStream = BoxStream<'static, VerificationEvent>;

/// Runs verification requests against two answerers and two judges.
///
/// Cheap to clone; clones share the backends but no run state.
#[derive(Clone)]
pub struct VerificationOrchestrator {
    answerer_a: Arc<dyn BackendAdapter>,
    answerer_b: Arc<dyn BackendAdapter>,
    judge_first: Arc<dyn BackendAdapter>,
    judge_second: Arc<dyn BackendAdapter>,
    answer_timeout: Duration,
    judge_timeout: Duration,
    synthesizer: Synthesizer,
}

impl Debug for VerificationOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationOrchestrator")
            .field("answerer_a", &self.answerer_a.name())
            .field("answerer_b", &self.answerer_b.name())
            .field("judge_first", &self.judge_first.name())
            .field("judge_second", &self.judge_second.name())
            .field("answer_timeout", &self.answer_timeout)
            .field("judge_timeout", &self.judge_timeout)
            .finish()
    }
}

impl VerificationOrchestrator {
    pub fn builder() -> VerificationOrchestratorBuilder {
        VerificationOrchestratorBuilder::new()
    }

    /// Wire every slot from configuration.
    ///
    /// A backend whose provider cannot be built becomes an
    /// [`UnavailableBackend`](crate::backends::UnavailableBackend).
    pub fn from_config(config: &RuntimeConfig, registry: &ProviderRegistry) -> Result<Self, RuntimeError> {
        config.validate()?;

        Self::builder()
            .answerer(AnswerSource::A, build_backend(&config.answerers.a, registry))
            .answerer(AnswerSource::B, build_backend(&config.answerers.b, registry))
            .judge(JudgeId::First, build_backend(&config.judges.first, registry))
            .judge(JudgeId::Second, build_backend(&config.judges.second, registry))
            .answer_timeout(config.answer_timeout)
            .judge_timeout(config.judge_timeout)
            .build()
    }

    pub fn answerer(&self, source: AnswerSource) -> &Arc<dyn BackendAdapter> {
        match source {
            AnswerSource::A => &self.answerer_a,
            AnswerSource::B => &self.answerer_b,
        }
    }

    pub fn judge(&self, judge: JudgeId) -> &Arc<dyn BackendAdapter> {
        match judge {
            JudgeId::First => &self.judge_first,
            JudgeId::Second => &self.judge_second,
        }
    }

    /// Every slot with its label, in pipeline order.
    pub fn backends(&self) -> [(&'static str, &Arc<dyn BackendAdapter>); 4] {
        [
            ("answerer a", &self.answerer_a),
            ("answerer b", &self.answerer_b),
            ("judge 1", &self.judge_first),
            ("judge 2", &self.judge_second),
        ]
    }

    /// Start a run as a lazy event stream.
    ///
    /// Nothing happens until the stream is first polled. Dropping the stream
    /// cancels the run, including in-flight backend calls.
    pub fn run_verification(&self, request: VerificationRequest) -> VerificationStream {
        let orchestrator = self.clone();

        futures::stream::once(async move {
            let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
            let cancel = CancellationToken::new();
            let guard = cancel.clone().drop_guard();

            tokio::spawn(async move {
                let notifier = ChannelNotifier { tx: tx.clone() };
                let event = match orchestrator.verify(request, &notifier, cancel).await {
                    Ok(payload) => VerificationEvent::Verdict(payload),
                    Err(e) => VerificationEvent::Failed(e),
                };
                // The receiver is gone if the caller dropped the stream.
                let _ = tx.send(event).await;
            });

            CancelOnDrop {
                inner: ReceiverStream::new(rx),
                _guard: guard,
            }
        })
        .flatten()
        .boxed()
    }

    /// Run one verification to completion.
    pub async fn verify(
        &self,
        request: VerificationRequest,
        progress: &dyn ProgressNotifier,
        cancel: CancellationToken,
    ) -> Result<VerdictPayload, VerificationError> {
        let mut state = RunState::Init;

        let question = match Question::new(&request.question) {
            Ok(question) => question,
            Err(e) => {
                advance(&mut state, RunState::Failed);
                return Err(e.into());
            }
        };
        if !request.authorized {
            advance(&mut state, RunState::Failed);
            tracing::warn!("Rejected unauthorized verification request");
            return Err(VerificationError::Unauthorized);
        }
        progress.on_progress(&Phase::Init.progress());

        advance(&mut state, RunState::Answering);
        let answers = self.answer_phase(&question, &cancel).await;
        progress.on_progress(&Phase::Answering.progress());

        if !answers.both_usable() {
            advance(&mut state, RunState::Failed);
            tracing::warn!(
                a_ok = answers.a.is_usable(),
                b_ok = answers.b.is_usable(),
                "Answer phase failed, skipping judges"
            );
            return Err(VerificationError::AnswerPhaseFailed {
                a: answers.a,
                b: answers.b,
            });
        }

        advance(&mut state, RunState::Judging);
        progress.on_progress(&Phase::Judging.progress());
        let judgments = self.judge_phase(&question, &answers, &cancel).await;

        advance(&mut state, RunState::Fusing);
        progress.on_progress(&Phase::Fusing.progress());
        let consensus = self.synthesizer.synthesize(&answers, &judgments);
        let payload = VerdictPayload::assemble(&question, &answers, &consensus);

        advance(&mut state, RunState::Done);
        tracing::info!(tier = %payload.credibility_tier, "Verification complete");
        Ok(payload)
    }

    async fn answer_phase(&self, question: &Question, cancel: &CancellationToken) -> AnswerPair {
        let prompt = prompts::answer_prompt(question.as_str());
        let jobs = AnswerSource::ALL
            .iter()
            .map(|&source| (source, Arc::clone(self.answerer(source)), prompt.clone()))
            .collect();

        let mut outcomes = run_phase(Phase::Answering, jobs, self.answer_timeout, cancel).await;

        let mut answer = |source: AnswerSource| {
            let name = self.answerer(source).name();
            match outcomes.remove(&source) {
                Some(outcome) if outcome.ok && !outcome.text.trim().is_empty() => {
                    AnswerResult::success(source, name, outcome.text)
                }
                Some(outcome) if outcome.ok => {
                    AnswerResult::failure(source, name, format!("{} returned an empty answer", name))
                }
                Some(outcome) => AnswerResult::failure(source, name, outcome.text),
                None => AnswerResult::failure(
                    source,
                    name,
                    format!(
                        "{} did not answer within {}",
                        name,
                        humantime::format_duration(self.answer_timeout)
                    ),
                ),
            }
        };

        let a = answer(AnswerSource::A);
        let b = answer(AnswerSource::B);
        AnswerPair::new(a, b)
    }

    async fn judge_phase(
        &self,
        question: &Question,
        answers: &AnswerPair,
        cancel: &CancellationToken,
    ) -> JudgmentMatrix {
        let jobs = JudgmentRequest::cross_matrix(answers)
            .into_iter()
            .map(|request| {
                (
                    (request.about, request.judge),
                    Arc::clone(self.judge(request.judge)),
                    prompts::judge_prompt(question.as_str(), &request.target_answer),
                )
            })
            .collect();

        let outcomes = run_phase(Phase::Judging, jobs, self.judge_timeout, cancel).await;

        // Cells missing from the sink are filled with the sentinel.
        JudgmentMatrix::from_results(outcomes.into_iter().map(|((about, judge), outcome)| {
            if outcome.ok {
                JudgmentResult::success(judge, about, outcome.text)
            } else {
                JudgmentResult::failure(judge, about, outcome.text)
            }
        }))
    }
}

/// Fan out one phase and collect whatever finished before the deadline.
async fn run_phase<K>(
    phase: Phase,
    jobs: Vec<(K, Arc<dyn BackendAdapter>, String)>,
    timeout: Duration,
    cancel: &CancellationToken,
) -> BTreeMap<K, AdapterOutcome>
where
    K: Ord + Copy + Debug + Send + 'static,
{
    let deadline = tokio::time::Instant::now() + timeout;
    let phase_cancel = cancel.child_token();
    let sink = PhaseSink::new();
    let mut join_set = JoinSet::new();

    for (key, adapter, prompt) in jobs {
        let writer = sink.writer();
        let token = phase_cancel.clone();

        join_set.spawn(async move {
            let started = std::time::Instant::now();
            let outcome = adapter.invoke(&prompt, timeout, token).await;
            tracing::debug!(
                phase = %phase,
                slot = ?key,
                backend = %adapter.name(),
                ok = outcome.ok,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Backend call finished"
            );
            writer.put(key, outcome);
        });
    }

    let joined = tokio::time::timeout_at(deadline, async {
        while let Some(result) = join_set.join_next().await {
            if let Err(e) = result {
                tracing::warn!(phase = %phase, error = %e, "Backend task failed");
            }
        }
    })
    .await;

    if joined.is_err() {
        tracing::warn!(
            phase = %phase,
            timeout_ms = timeout.as_millis() as u64,
            "Phase deadline passed, abandoning unfinished calls"
        );
        phase_cancel.cancel();
        join_set.shutdown().await;
    }

    sink.drain()
}

fn advance(state: &mut RunState, next: RunState) {
    debug_assert!(
        state.can_advance_to(next),
        "illegal transition {:?} -> {:?}",
        state,
        next
    );
    tracing::debug!(from = ?state, to = ?next, "Run state");
    *state = next;
}

struct ChannelNotifier {
    tx: mpsc::Sender<VerificationEvent>,
}

impl ProgressNotifier for ChannelNotifier {
    fn on_progress(&self, update: &ProgressUpdate) {
        // Progress is informational; a full channel drops it.
        let _ = self.tx.try_send(VerificationEvent::Progress(update.clone()));
    }
}

/// Event stream that cancels its run when dropped.
struct CancelOnDrop {
    inner: ReceiverStream<VerificationEvent>,
    _guard: DropGuard,
}

impl Stream for CancelOnDrop {
    type Item = VerificationEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

/// Builder for [`VerificationOrchestrator`].
pub struct VerificationOrchestratorBuilder {
    answerer_a: Option<Arc<dyn BackendAdapter>>,
    answerer_b: Option<Arc<dyn BackendAdapter>>,
    judge_first: Option<Arc<dyn BackendAdapter>>,
    judge_second: Option<Arc<dyn BackendAdapter>>,
    answer_timeout: Duration,
    judge_timeout: Duration,
}

impl VerificationOrchestratorBuilder {
    pub fn new() -> Self {
        let defaults = RuntimeConfig::default();
        Self {
            answerer_a: None,
            answerer_b: None,
            judge_first: None,
            judge_second: None,
            answer_timeout: defaults.answer_timeout,
            judge_timeout: defaults.judge_timeout,
        }
    }

    pub fn answerer(mut self, source: AnswerSource, adapter: Arc<dyn BackendAdapter>) -> Self {
        match source {
            AnswerSource::A => self.answerer_a = Some(adapter),
            AnswerSource::B => self.answerer_b = Some(adapter),
        }
        self
    }

    pub fn judge(mut self, judge: JudgeId, adapter: Arc<dyn BackendAdapter>) -> Self {
        match judge {
            JudgeId::First => self.judge_first = Some(adapter),
            JudgeId::Second => self.judge_second = Some(adapter),
        }
        self
    }

    pub fn answer_timeout(mut self, timeout: Duration) -> Self {
        self.answer_timeout = timeout;
        self
    }

    pub fn judge_timeout(mut self, timeout: Duration) -> Self {
        self.judge_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<VerificationOrchestrator, RuntimeError> {
        fn require(
            slot: Option<Arc<dyn BackendAdapter>>,
            label: &str,
        ) -> Result<Arc<dyn BackendAdapter>, RuntimeError> {
            slot.ok_or_else(|| RuntimeError::BackendNotConfigured(label.to_string()))
        }

        Ok(VerificationOrchestrator {
            answerer_a: require(self.answerer_a, "answerer a")?,
            answerer_b: require(self.answerer_b, "answerer b")?,
            judge_first: require(self.judge_first, "judge 1")?,
            judge_second: require(self.judge_second, "judge 2")?,
            answer_timeout: self.answer_timeout,
            judge_timeout: self.judge_timeout,
            synthesizer: Synthesizer::new(),
        })
    }
}

impl Default for VerificationOrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
