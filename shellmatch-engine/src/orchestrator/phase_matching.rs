//! Phase 1: directory fetch, blocking, scoring and classification
//!
//! No external assessment happens here, and for unchanged input and
//! configuration the outcome is identical from run to run.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use shellmatch_common::{EventBus, MatchEvent, MatchPhase};

use super::{BatchJob, BatchProgress};
use crate::config::BatchConfig;
use crate::directory::{fetch_in_chunks, AccountDirectory, ChunkedLookup};
use crate::models::{AccountId, BatchRequest, CustomerRecord, MatchCandidate, MatchResult, ShellCounts, ShellRecord};
use crate::services::scorer::rank_candidates;
use crate::services::{
    BlockingIndex, CandidateLookup, Classifier, DomainPolicy, NormalizedIdentity, Normalizer, PreparedShell, Screening,
};

const CALLER_INVALID_REASON: &str = "Marked invalid by caller";
const DUPLICATE_REASON: &str = "Duplicate of an earlier customer id";

/// Progress events are published every this many customers
const PROGRESS_EVENT_INTERVAL: usize = 50;

/// One position of the de-duplicated customer input
#[derive(Debug, Clone)]
pub enum InputSlot {
    Pending(AccountId),
    Invalid { raw: String, reason: String },
    /// Repeat of an id already present at an earlier position
    Duplicate { raw: String },
}

impl InputSlot {
    pub fn raw(&self) -> &str {
        match self {
            InputSlot::Pending(id) => id.as_str(),
            InputSlot::Invalid { raw, .. } | InputSlot::Duplicate { raw } => raw,
        }
    }
}

/// Key used to recognize repeated ids: canonical when well-formed, else the trimmed text
fn dedupe_key(raw: &str, prefix: &str) -> String {
    match AccountId::parse(raw, prefix) {
        Ok(id) => id.canonical().to_string(),
        Err(_) => raw.trim().to_string(),
    }
}

/// Build the ordered input, one slot per entry of `ids`
///
/// The first occurrence of an id is processed; later repeats become
/// `Duplicate` slots. Ids listed in `invalid_ids` are INVALID even when they
/// also appear in `ids`; those listed only there are appended in order.
pub fn build_input(ids: &[String], invalid_ids: &[String], prefix: &str) -> Vec<InputSlot> {
    let caller_invalid: HashSet<String> = invalid_ids.iter().map(|raw| dedupe_key(raw, prefix)).collect();

    let mut seen = HashSet::new();
    let mut slots = Vec::with_capacity(ids.len() + invalid_ids.len());

    for raw in ids {
        let key = dedupe_key(raw, prefix);
        if !seen.insert(key.clone()) {
            warn!(id = %raw, "Duplicate account id in request, keeping first occurrence");
            slots.push(InputSlot::Duplicate {
                raw: raw.trim().to_string(),
            });
            continue;
        }

        if caller_invalid.contains(&key) {
            slots.push(InputSlot::Invalid {
                raw: raw.trim().to_string(),
                reason: CALLER_INVALID_REASON.to_string(),
            });
            continue;
        }

        match AccountId::parse(raw, prefix) {
            Ok(id) => slots.push(InputSlot::Pending(id)),
            Err(e) => slots.push(InputSlot::Invalid {
                raw: raw.trim().to_string(),
                reason: e.to_string(),
            }),
        }
    }

    for raw in invalid_ids {
        if seen.insert(dedupe_key(raw, prefix)) {
            slots.push(InputSlot::Invalid {
                raw: raw.trim().to_string(),
                reason: CALLER_INVALID_REASON.to_string(),
            });
        }
    }

    slots
}

/// Shell ids to fetch plus counts for the summary; repeated shell ids count once
fn build_shell_input(request: &BatchRequest, prefix: &str) -> (Vec<AccountId>, ShellCounts) {
    let shell_slots: Vec<InputSlot> = build_input(&request.shell_ids, &request.invalid_shell_ids, prefix)
        .into_iter()
        .filter(|slot| !matches!(slot, InputSlot::Duplicate { .. }))
        .collect();
    let total = shell_slots.len();
    let ids: Vec<AccountId> = shell_slots
        .into_iter()
        .filter_map(|slot| match slot {
            InputSlot::Pending(id) => Some(id),
            _ => None,
        })
        .collect();
    let invalid = total - ids.len();

    (ids, ShellCounts { total, invalid })
}

/// Shared read-only state for scoring one batch
pub struct MatchingContext {
    normalizer: Normalizer,
    policy: DomainPolicy,
    index: BlockingIndex,
    classifier: Classifier,
}

impl MatchingContext {
    /// Normalize the shell universe once and build the blocking index
    pub fn new(config: &BatchConfig, shells: Vec<(AccountId, ShellRecord)>) -> Self {
        let normalizer = Normalizer::new(config);
        let policy = DomainPolicy::new(&config.disallowed_domains);

        let prepared = shells
            .into_iter()
            .map(|(id, record)| PreparedShell::prepare(id, record, &normalizer, &policy))
            .collect();
        let index = BlockingIndex::build(prepared, config.fallback_candidate_cap);

        Self {
            normalizer,
            policy,
            index,
            classifier: Classifier::new(config.min_rank_score),
        }
    }

    pub fn index(&self) -> &BlockingIndex {
        &self.index
    }

    fn screen<'a>(
        &'a self,
        id: &AccountId,
        customer: &CustomerRecord,
        identity: &NormalizedIdentity,
    ) -> Screening<'a> {
        if let Some(domain) = identity.domain.as_ref().filter(|d| self.policy.is_disallowed(Some(*d))) {
            return Screening::DisallowedDomain(domain.registered.clone());
        }

        match self.index.candidates(id, identity) {
            CandidateLookup::Shells { members, source } => {
                debug!(
                    customer_id = %customer.id,
                    candidates = members.len(),
                    source = source.as_str(),
                    "Candidate lookup"
                );
                Screening::Ranked(rank_candidates(&customer.id, identity, &members))
            }
            CandidateLookup::Blocked { bad_neighbours } => Screening::Blocked { bad_neighbours },
            CandidateLookup::Empty => Screening::Ranked(Vec::new()),
        }
    }

    /// Full candidate ranking for one customer, best first
    pub fn rankings(&self, id: &AccountId, customer: &CustomerRecord) -> Vec<MatchCandidate> {
        let identity = self.normalizer.customer_identity(customer);
        match self.screen(id, customer, &identity) {
            Screening::Ranked(ranked) => ranked.into_iter().map(|s| s.candidate).collect(),
            _ => Vec::new(),
        }
    }

    /// Classify one customer
    pub fn match_customer(&self, id: &AccountId, customer: &CustomerRecord) -> MatchResult {
        let identity = self.normalizer.customer_identity(customer);
        let screening = self.screen(id, customer, &identity);
        let mut result = self.classifier.classify(customer, &identity, screening);
        // report the caller's spelling of the id
        result.customer_id = id.as_str().to_string();
        result
    }
}

/// Phase 1 outcome: one result per input slot, in input order
pub struct MatchingOutcome {
    pub results: Vec<MatchResult>,
    pub shells: ShellCounts,
}

pub async fn run_matching_phase(
    job: &BatchJob,
    directory: &dyn AccountDirectory,
    event_bus: &EventBus,
    request: &BatchRequest,
    input: &[InputSlot],
) -> MatchingOutcome {
    let config = &job.config;
    let (shell_ids, mut shell_counts) = build_shell_input(request, &config.account_id_prefix);

    let customer_ids: Vec<AccountId> = input
        .iter()
        .filter_map(|slot| match slot {
            InputSlot::Pending(id) => Some(id.clone()),
            _ => None,
        })
        .collect();

    info!(
        job_id = %job.id,
        customers = customer_ids.len(),
        shells = shell_ids.len(),
        chunk_size = config.directory_chunk_size,
        directory = directory.name(),
        "Phase 1: fetching accounts from directory"
    );

    let customers = fetch_in_chunks(&customer_ids, config.directory_chunk_size, |chunk| {
        directory.fetch_customers(chunk)
    })
    .await;
    let shells = fetch_in_chunks(&shell_ids, config.directory_chunk_size, |chunk| {
        directory.fetch_shells(chunk)
    })
    .await;

    let mut universe = Vec::with_capacity(shells.found.len());
    for id in &shell_ids {
        match shells.found.get(id.canonical()) {
            Some(record) => universe.push((id.clone(), record.clone())),
            None => {
                shell_counts.invalid += 1;
                if let Some(e) = shells.error_for(id) {
                    debug!(shell_id = %id, error = %e, "Shell excluded from universe");
                }
            }
        }
    }

    let context = MatchingContext::new(config, universe);
    info!(
        job_id = %job.id,
        shells = context.index().len(),
        bad_domain_shells = context.index().bad_domain_count(),
        "Phase 1: shell universe indexed"
    );

    job.progress.set_total(MatchPhase::Matching, input.len());

    // CPU-bound: up to one capped fallback scan per customer
    let slots = input.to_vec();
    let progress = Arc::clone(&job.progress);
    let events = event_bus.clone();
    let job_id = job.id;
    let results = match tokio::task::spawn_blocking(move || {
        classify_all(&context, &customers, &slots, &progress, &events, job_id)
    })
    .await
    {
        Ok(results) => results,
        Err(e) => {
            error!(job_id = %job.id, error = %e, "Phase 1: matching task failed");
            input
                .iter()
                .map(|slot| MatchResult::invalid(slot.raw(), format!("Matching task failed: {}", e)))
                .collect()
        }
    };

    MatchingOutcome {
        results,
        shells: shell_counts,
    }
}

/// Classify every input slot against the indexed shell universe, in input order
fn classify_all(
    context: &MatchingContext,
    customers: &ChunkedLookup<CustomerRecord>,
    input: &[InputSlot],
    progress: &BatchProgress,
    event_bus: &EventBus,
    job_id: Uuid,
) -> Vec<MatchResult> {
    let mut results = Vec::with_capacity(input.len());
    for slot in input {
        let result = match slot {
            InputSlot::Invalid { raw, reason } => MatchResult::invalid(raw.clone(), reason.clone()),
            InputSlot::Duplicate { raw } => MatchResult::invalid(raw.clone(), DUPLICATE_REASON),
            InputSlot::Pending(id) => match customers.found.get(id.canonical()) {
                Some(customer) => context.match_customer(id, customer),
                None => {
                    let reason = customers
                        .error_for(id)
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "Account not found in directory".to_string());
                    MatchResult::invalid(id.as_str(), reason)
                }
            },
        };
        results.push(result);

        let completed = progress.complete_one(MatchPhase::Matching);
        if completed % PROGRESS_EVENT_INTERVAL == 0 || completed == input.len() {
            event_bus.emit_lossy(MatchEvent::PhaseProgress {
                job_id,
                phase: MatchPhase::Matching,
                completed,
                total: input.len(),
                timestamp: chrono::Utc::now(),
            });
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_repeated_ids_keep_their_positions() {
        let slots = build_input(
            &strings(&["001Dn00000ABCde", "001Dn00000ABCdeIAH", "001000000000001", "001000000000001"]),
            &[],
            "001",
        );
        assert_eq!(slots.len(), 4);
        assert!(matches!(slots[0], InputSlot::Pending(_)));
        assert!(matches!(&slots[1], InputSlot::Duplicate { raw } if raw == "001Dn00000ABCdeIAH"));
        assert!(matches!(slots[2], InputSlot::Pending(_)));
        assert!(matches!(slots[3], InputSlot::Duplicate { .. }));
    }

    #[test]
    fn test_malformed_and_caller_invalid_ids() {
        let slots = build_input(
            &strings(&["bogus", "001000000000001", "001000000000002"]),
            &strings(&["001000000000002", "001000000000009"]),
            "001",
        );
        let raws: Vec<&str> = slots.iter().map(InputSlot::raw).collect();
        assert_eq!(raws, vec!["bogus", "001000000000001", "001000000000002", "001000000000009"]);

        assert!(matches!(&slots[0], InputSlot::Invalid { reason, .. } if reason.contains("Malformed")));
        assert!(matches!(slots[1], InputSlot::Pending(_)));
        assert!(matches!(&slots[2], InputSlot::Invalid { reason, .. } if reason == CALLER_INVALID_REASON));
        assert!(matches!(slots[3], InputSlot::Invalid { .. }));
    }

    #[test]
    fn test_wrong_prefix_is_invalid() {
        let slots = build_input(&strings(&["003000000000001"]), &[], "001");
        assert!(matches!(slots[0], InputSlot::Invalid { .. }));

        let slots = build_input(&strings(&["003000000000001"]), &[], "");
        assert!(matches!(slots[0], InputSlot::Pending(_)));
    }

    #[test]
    fn test_shell_counts() {
        let request = BatchRequest {
            customer_ids: vec![],
            shell_ids: strings(&["001000000000001", "nope", "001000000000001"]),
            invalid_shell_ids: strings(&["001000000000003"]),
            ..Default::default()
        };
        let (ids, counts) = build_shell_input(&request, "001");
        assert_eq!(ids.len(), 1);
        assert_eq!(counts.total, 3);
        assert_eq!(counts.invalid, 2);
    }
}
