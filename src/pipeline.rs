//! Batch driver: roster in, archive and manifest out.
//!
//! Rows are processed in roster order. A row is skipped, rendered or recorded
//! as failed; only resource and precondition errors stop the batch.

use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use chrono::NaiveDateTime;
use rayon::prelude::*;

use crate::{
    archive::{ArchiveWriter, CertificateArchive, archive_file_name, suffixed_file_name},
    compose::{CertificateComposer, RenderedCertificate},
    foundation::error::{CertError, CertResult},
    model::{CertificateKind, CertificateRequest, PrizeRank},
    template::Template,
    text::{ParleyTypesetter, Typesetter},
};

/// Recipient name to prize rank, fixed before the batch starts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PrizeAssignments {
    ranks: BTreeMap<String, PrizeRank>,
}

impl PrizeAssignments {
    /// Build from the three winner lists. A name already holding a higher
    /// prize keeps it; blank names are ignored.
    pub fn from_winners<S: AsRef<str>>(first: &[S], second: &[S], third: &[S]) -> Self {
        let mut ranks = BTreeMap::new();
        for (rank, names) in [
            (PrizeRank::First, first),
            (PrizeRank::Second, second),
            (PrizeRank::Third, third),
        ] {
            for name in names {
                let name = name.as_ref().trim();
                if !name.is_empty() {
                    ranks.entry(name.to_string()).or_insert(rank);
                }
            }
        }
        Self { ranks }
    }

    /// Build from explicit pairs; a later pair for the same name replaces an earlier one.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, PrizeRank)>,
        S: AsRef<str>,
    {
        let ranks = pairs
            .into_iter()
            .filter_map(|(name, rank)| {
                let name = name.as_ref().trim();
                (!name.is_empty()).then(|| (name.to_string(), rank))
            })
            .collect();
        Self { ranks }
    }

    pub fn rank_for(&self, name: &str) -> Option<PrizeRank> {
        self.ranks.get(name.trim()).copied()
    }

    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }
}

/// What to do when two rows produce the same file name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CollisionPolicy {
    /// Record the later row as failed with reason "duplicate file name".
    #[default]
    Fail,
    /// Insert `_{row}` before `_certificate.pdf`.
    Suffix,
}

#[derive(Clone, Debug)]
pub struct BatchThreading {
    pub parallel: bool,
    pub chunk_size: usize,
    pub threads: Option<usize>,
}

impl Default for BatchThreading {
    fn default() -> Self {
        Self {
            parallel: false,
            chunk_size: 16,
            threads: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct BatchOptions {
    /// Refuse to start when any configured signer slot lacks a signature image.
    pub require_signatures: bool,
    pub collision: CollisionPolicy,
    pub threading: BatchThreading,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            require_signatures: true,
            collision: CollisionPolicy::default(),
            threading: BatchThreading::default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct BatchJob {
    pub roster: Vec<CertificateRequest>,
    pub prizes: PrizeAssignments,
    /// Names the archive.
    pub created_at: NaiveDateTime,
    pub options: BatchOptions,
}

impl BatchJob {
    pub fn new(
        roster: Vec<CertificateRequest>,
        prizes: PrizeAssignments,
        created_at: NaiveDateTime,
    ) -> Self {
        Self {
            roster,
            prizes,
            created_at,
            options: BatchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: BatchOptions) -> Self {
        self.options = options;
        self
    }
}

/// Shared cancellation flag, checked between rows.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SkipReason {
    BlankName,
    NoPrize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RowOutcome {
    Rendered { file_name: String },
    Skipped(SkipReason),
    Failed { reason: String },
}

/// Reported once per roster row, in roster order.
#[derive(Clone, Debug, PartialEq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    /// 1-based roster row.
    pub row: usize,
    pub outcome: RowOutcome,
}

impl Progress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

pub trait ProgressSink {
    fn report(&mut self, progress: &Progress);
}

impl<F: FnMut(&Progress)> ProgressSink for F {
    fn report(&mut self, progress: &Progress) {
        self(progress)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DocumentEntry {
    pub row: usize,
    pub recipient: String,
    pub file_name: String,
    pub sha256: String,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SkipEntry {
    pub row: usize,
    pub recipient: String,
    pub reason: SkipReason,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FailureEntry {
    pub row: usize,
    pub recipient: String,
    pub reason: String,
}

/// Per-batch record of what happened to every row.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Manifest {
    pub archive: String,
    pub total_rows: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: bool,
    pub documents: Vec<DocumentEntry>,
    pub skips: Vec<SkipEntry>,
    pub failures: Vec<FailureEntry>,
}

impl Manifest {
    fn new(archive: String, total_rows: usize) -> Self {
        Self {
            archive,
            total_rows,
            ..Self::default()
        }
    }

    pub fn to_json_pretty(&self) -> CertResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CertError::archive(format!("serialize manifest: {e}")))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchState {
    NotStarted,
    Running,
    Completed,
    Aborted,
}

#[derive(Clone, Debug)]
pub struct BatchReport {
    pub state: BatchState,
    pub archive: CertificateArchive,
    pub manifest: Manifest,
    pub cancelled: bool,
}

/// A roster row after name and prize resolution.
enum RowPlan {
    Skip(SkipReason),
    Compose(CertificateRequest),
}

fn plan_row(request: &CertificateRequest, prizes: &PrizeAssignments) -> RowPlan {
    let name = request.recipient.trim();
    if name.is_empty() {
        return RowPlan::Skip(SkipReason::BlankName);
    }
    if request.kind != CertificateKind::Excellence {
        return RowPlan::Compose(request.clone());
    }
    match prizes.rank_for(name) {
        Some(rank) => RowPlan::Compose(request.clone().with_prize_rank(rank)),
        None => RowPlan::Skip(SkipReason::NoPrize),
    }
}

/// Drives one batch through `NotStarted -> Running -> Completed | Aborted`.
pub struct BatchPipeline {
    template: Arc<Template>,
    state: BatchState,
}

impl BatchPipeline {
    pub fn new(template: Arc<Template>) -> Self {
        Self {
            template,
            state: BatchState::NotStarted,
        }
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    /// Run with Parley typesetting over the template's fonts.
    pub fn run(
        &mut self,
        job: &BatchJob,
        cancel: &CancelToken,
        progress: &mut dyn ProgressSink,
    ) -> CertResult<BatchReport> {
        let template = Arc::clone(&self.template);
        self.run_with(
            job,
            move || ParleyTypesetter::new(template.fonts()),
            cancel,
            progress,
        )
    }

    /// Run with typesetters built by `make_typesetter`, one per worker.
    #[tracing::instrument(skip_all, fields(rows = job.roster.len()))]
    pub fn run_with<T, F>(
        &mut self,
        job: &BatchJob,
        make_typesetter: F,
        cancel: &CancelToken,
        progress: &mut dyn ProgressSink,
    ) -> CertResult<BatchReport>
    where
        T: Typesetter,
        F: Fn() -> CertResult<T> + Sync + Send,
    {
        if self.state != BatchState::NotStarted {
            return Err(CertError::precondition(format!(
                "batch pipeline already used (state {:?})",
                self.state
            )));
        }

        let typesetter = match self.check_preconditions(job, &make_typesetter) {
            Ok(t) => t,
            Err(e) => {
                self.state = BatchState::Aborted;
                tracing::warn!(error = %e, "batch refused to start");
                return Err(e);
            }
        };

        self.state = BatchState::Running;
        tracing::info!(
            rows = job.roster.len(),
            prizes = job.prizes.len(),
            parallel = job.options.threading.parallel,
            "batch started"
        );

        let mut run = RunState::new(job);
        let result = if job.options.threading.parallel {
            drop(typesetter);
            self.drive_parallel(job, &make_typesetter, cancel, progress, &mut run)
        } else {
            let mut composer = CertificateComposer::new(Arc::clone(&self.template), typesetter);
            self.drive_sequential(job, &mut composer, cancel, progress, &mut run)
        };
        if let Err(e) = result {
            self.state = BatchState::Aborted;
            tracing::warn!(error = %e, "batch aborted");
            return Err(e);
        }

        let cancelled = run.manifest.cancelled;
        let archive = match run.archive.finish() {
            Ok(a) => a,
            Err(e) => {
                self.state = BatchState::Aborted;
                return Err(e);
            }
        };
        self.state = if cancelled {
            BatchState::Aborted
        } else {
            BatchState::Completed
        };
        tracing::info!(
            succeeded = run.manifest.succeeded,
            skipped = run.manifest.skipped,
            failed = run.manifest.failed,
            cancelled,
            "batch finished"
        );
        Ok(BatchReport {
            state: self.state,
            archive,
            manifest: run.manifest,
            cancelled,
        })
    }

    fn check_preconditions<T, F>(&self, job: &BatchJob, make_typesetter: &F) -> CertResult<T>
    where
        F: Fn() -> CertResult<T>,
    {
        self.template.fonts().validate()?;
        self.template
            .style()
            .validate()
            .map_err(|e| CertError::resource(format!("template style: {e}")))?;
        if let Some(0) = job.options.threading.threads {
            return Err(CertError::validation(
                "batch threading 'threads' must be >= 1 when set",
            ));
        }

        if job.options.require_signatures {
            for (i, request) in job.roster.iter().enumerate() {
                for (slot, signer) in request.signers.iter().enumerate() {
                    if !signer.has_signature() {
                        return Err(CertError::precondition(format!(
                            "row {} ('{}'): signer slot {} has no signature image",
                            i + 1,
                            request.recipient.trim(),
                            slot + 1
                        )));
                    }
                }
            }
        }

        make_typesetter().map_err(|e| match e {
            CertError::Resource(_) => e,
            other => CertError::resource(format!("typesetter: {other}")),
        })
    }

    fn drive_sequential<T: Typesetter>(
        &self,
        job: &BatchJob,
        composer: &mut CertificateComposer<T>,
        cancel: &CancelToken,
        progress: &mut dyn ProgressSink,
        run: &mut RunState,
    ) -> CertResult<()> {
        for (i, request) in job.roster.iter().enumerate() {
            if cancel.is_cancelled() {
                run.cancel(i);
                return Ok(());
            }
            let plan = plan_row(request, &job.prizes);
            let result = match &plan {
                RowPlan::Skip(_) => None,
                RowPlan::Compose(req) => Some(composer.compose(req)),
            };
            run.record(i + 1, request, &plan, result, job.options.collision, progress)?;
        }
        Ok(())
    }

    fn drive_parallel<T, F>(
        &self,
        job: &BatchJob,
        make_typesetter: &F,
        cancel: &CancelToken,
        progress: &mut dyn ProgressSink,
        run: &mut RunState,
    ) -> CertResult<()>
    where
        T: Typesetter,
        F: Fn() -> CertResult<T> + Sync + Send,
    {
        let pool = build_thread_pool(job.options.threading.threads)?;
        let chunk_size = job.options.threading.chunk_size.max(1);

        for (chunk_idx, chunk) in job.roster.chunks(chunk_size).enumerate() {
            let first = chunk_idx * chunk_size;
            if cancel.is_cancelled() {
                run.cancel(first);
                return Ok(());
            }

            let plans: Vec<RowPlan> = chunk.iter().map(|r| plan_row(r, &job.prizes)).collect();
            let template = &self.template;
            let results: Vec<Option<CertResult<RenderedCertificate>>> = pool.install(|| {
                plans
                    .par_iter()
                    .map_init(
                        || {
                            make_typesetter()
                                .map(|t| CertificateComposer::new(Arc::clone(template), t))
                        },
                        |composer, plan| match plan {
                            RowPlan::Skip(_) => None,
                            RowPlan::Compose(req) => Some(match composer {
                                Ok(c) => c.compose(req),
                                Err(e) => Err(CertError::resource(format!("typesetter: {e}"))),
                            }),
                        },
                    )
                    .collect()
            });

            for (offset, (plan, result)) in plans.iter().zip(results).enumerate() {
                let row = first + offset + 1;
                run.record(
                    row,
                    &job.roster[row - 1],
                    plan,
                    result,
                    job.options.collision,
                    progress,
                )?;
            }
        }
        Ok(())
    }
}

/// Driver-thread state: the single archive writer and the manifest.
struct RunState {
    archive: ArchiveWriter,
    manifest: Manifest,
    completed: usize,
    total: usize,
}

impl RunState {
    fn new(job: &BatchJob) -> Self {
        let name = archive_file_name(job.created_at);
        Self {
            archive: ArchiveWriter::new(name.clone()),
            manifest: Manifest::new(name, job.roster.len()),
            completed: 0,
            total: job.roster.len(),
        }
    }

    fn cancel(&mut self, rows_done: usize) {
        tracing::info!(rows_done, total = self.total, "batch cancelled");
        self.manifest.cancelled = true;
    }

    fn record(
        &mut self,
        row: usize,
        request: &CertificateRequest,
        plan: &RowPlan,
        result: Option<CertResult<RenderedCertificate>>,
        collision: CollisionPolicy,
        progress: &mut dyn ProgressSink,
    ) -> CertResult<()> {
        let recipient = request.recipient.trim().to_string();
        let outcome = match (plan, result) {
            (RowPlan::Skip(reason), _) => {
                tracing::debug!(row, reason = ?reason, "row skipped");
                self.manifest.skipped += 1;
                self.manifest.skips.push(SkipEntry {
                    row,
                    recipient,
                    reason: *reason,
                });
                RowOutcome::Skipped(*reason)
            }
            (RowPlan::Compose(_), Some(Ok(doc))) => self.store(row, doc, collision)?,
            (RowPlan::Compose(_), Some(Err(e))) if e.is_fatal() => return Err(e),
            (RowPlan::Compose(_), Some(Err(e))) => self.fail(row, recipient, e.to_string()),
            (RowPlan::Compose(_), None) => {
                return Err(CertError::composition(format!(
                    "row {row} was planned but never composed"
                )));
            }
        };

        self.completed += 1;
        progress.report(&Progress {
            completed: self.completed,
            total: self.total,
            row,
            outcome,
        });
        Ok(())
    }

    fn store(
        &mut self,
        row: usize,
        doc: RenderedCertificate,
        collision: CollisionPolicy,
    ) -> CertResult<RowOutcome> {
        let mut file_name = doc.file_name;
        if self.archive.contains(&file_name) && collision == CollisionPolicy::Suffix {
            file_name = suffixed_file_name(&file_name, row);
        }
        if self.archive.contains(&file_name) {
            return Ok(self.fail(row, doc.recipient, "duplicate file name".to_string()));
        }

        self.archive.add(&file_name, &doc.bytes)?;
        tracing::debug!(row, file = %file_name, "row rendered");
        self.manifest.succeeded += 1;
        self.manifest.documents.push(DocumentEntry {
            row,
            recipient: doc.recipient,
            file_name: file_name.clone(),
            sha256: doc.sha256,
        });
        Ok(RowOutcome::Rendered { file_name })
    }

    fn fail(&mut self, row: usize, recipient: String, reason: String) -> RowOutcome {
        tracing::warn!(row, recipient = %recipient, reason = %reason, "row failed");
        self.manifest.failed += 1;
        self.manifest.failures.push(FailureEntry {
            row,
            recipient,
            reason: reason.clone(),
        });
        RowOutcome::Failed { reason }
    }
}

fn build_thread_pool(threads: Option<usize>) -> CertResult<rayon::ThreadPool> {
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| CertError::resource(format!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn winners_keep_their_highest_prize() {
        let p = PrizeAssignments::from_winners(
            &["Ada", " "],
            &["Ada", "Alan"],
            &["Grace", "Alan"],
        );
        assert_eq!(p.len(), 3);
        assert_eq!(p.rank_for("Ada"), Some(PrizeRank::First));
        assert_eq!(p.rank_for(" Alan "), Some(PrizeRank::Second));
        assert_eq!(p.rank_for("Grace"), Some(PrizeRank::Third));
        assert_eq!(p.rank_for("Linus"), None);
    }

    #[test]
    fn explicit_pairs_last_one_wins() {
        let p = PrizeAssignments::from_pairs([
            ("Ada", PrizeRank::Third),
            ("Ada", PrizeRank::First),
            ("", PrizeRank::Second),
        ]);
        assert_eq!(p.len(), 1);
        assert_eq!(p.rank_for("Ada"), Some(PrizeRank::First));
    }

    #[test]
    fn progress_fraction_handles_empty_roster() {
        let p = Progress {
            completed: 0,
            total: 0,
            row: 0,
            outcome: RowOutcome::Skipped(SkipReason::BlankName),
        };
        assert_eq!(p.fraction(), 1.0);
        let p = Progress {
            completed: 1,
            total: 4,
            ..p
        };
        assert_eq!(p.fraction(), 0.25);
    }

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let a = CancelToken::new();
        let b = a.clone();
        assert!(!b.is_cancelled());
        a.cancel();
        assert!(b.is_cancelled());
    }

    #[test]
    fn plan_resolves_prize_only_for_excellence() {
        let prizes = PrizeAssignments::from_pairs([("Ada", PrizeRank::Second)]);

        let exc = CertificateRequest::new("Ada", CertificateKind::Excellence);
        match plan_row(&exc, &prizes) {
            RowPlan::Compose(r) => assert_eq!(r.prize_rank, Some(PrizeRank::Second)),
            RowPlan::Skip(_) => panic!("expected compose"),
        }

        let unranked = CertificateRequest::new("Alan", CertificateKind::Excellence);
        assert!(matches!(
            plan_row(&unranked, &prizes),
            RowPlan::Skip(SkipReason::NoPrize)
        ));

        let preset = CertificateRequest::new("Alan", CertificateKind::Excellence)
            .with_prize_rank(PrizeRank::First);
        assert!(matches!(
            plan_row(&preset, &prizes),
            RowPlan::Skip(SkipReason::NoPrize)
        ));

        let overridden = CertificateRequest::new("Ada", CertificateKind::Excellence)
            .with_prize_rank(PrizeRank::Third);
        match plan_row(&overridden, &prizes) {
            RowPlan::Compose(r) => assert_eq!(r.prize_rank, Some(PrizeRank::Second)),
            RowPlan::Skip(_) => panic!("expected compose"),
        }

        let part = CertificateRequest::new("Alan", CertificateKind::Participation);
        assert!(matches!(plan_row(&part, &prizes), RowPlan::Compose(_)));

        let blank = CertificateRequest::new("   ", CertificateKind::Participation);
        assert!(matches!(
            plan_row(&blank, &prizes),
            RowPlan::Skip(SkipReason::BlankName)
        ));
    }

    #[test]
    fn collision_policy_defaults_to_fail() {
        assert_eq!(CollisionPolicy::default(), CollisionPolicy::Fail);
        let p: CollisionPolicy = serde_json::from_str("\"Suffix\"").unwrap();
        assert_eq!(p, CollisionPolicy::Suffix);
    }
}
