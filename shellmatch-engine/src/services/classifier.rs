//! Customer classification
//!
//! Each customer is classified exactly once into a terminal status. Only
//! MATCHED results carry a recommended shell and go on to assessment.

use super::blocking_index::PreparedShell;
use super::normalizer::NormalizedIdentity;
use super::scorer::{provisional_confidence, signal_notes, ScoredCandidate};
use crate::models::{AssessmentStatus, CustomerRecord, MatchResult, MatchStatus, SignalNotes};

/// What phase 1 learned about a customer before classification
#[derive(Debug)]
pub enum Screening<'a> {
    /// The customer's own registered domain is disallowed
    DisallowedDomain(String),
    /// Every shell sharing a blocking key is a bad-domain shell
    Blocked { bad_neighbours: usize },
    /// Ranked candidates, best first (possibly empty)
    Ranked(Vec<ScoredCandidate<'a>>),
}

#[derive(Debug, Clone)]
pub struct Classifier {
    min_rank_score: f64,
}

impl Classifier {
    pub fn new(min_rank_score: f64) -> Self {
        Self { min_rank_score }
    }

    pub fn classify(&self, customer: &CustomerRecord, identity: &NormalizedIdentity, screening: Screening<'_>) -> MatchResult {
        match screening {
            Screening::DisallowedDomain(domain) => terminal(
                customer,
                MatchStatus::Flagged,
                format!("Customer domain '{}' is on the disallowed-domain list", domain),
                0,
            ),
            Screening::Blocked { bad_neighbours } => terminal(
                customer,
                MatchStatus::Flagged,
                format!(
                    "All {} nearby shell accounts are flagged as bad domains",
                    bad_neighbours
                ),
                0,
            ),
            Screening::Ranked(ranked) => self.classify_ranked(customer, identity, ranked),
        }
    }

    fn classify_ranked(&self, customer: &CustomerRecord, identity: &NormalizedIdentity, ranked: Vec<ScoredCandidate<'_>>) -> MatchResult {
        let candidate_count = ranked.len();

        let Some(best) = ranked.into_iter().next() else {
            return terminal(
                customer,
                MatchStatus::Unmatched,
                "No candidate shell accounts found".to_string(),
                0,
            );
        };

        let notes = signal_notes(&best.candidate, identity, &best.shell.identity);

        if best.candidate.rank_score < self.min_rank_score {
            let mut result = terminal(
                customer,
                MatchStatus::Unmatched,
                format!(
                    "Best candidate '{}' ({}) has rank score {:.1}, below the minimum of {:.1}",
                    best.shell.record.zi_company_name,
                    best.shell.record.id,
                    best.candidate.rank_score,
                    self.min_rank_score
                ),
                candidate_count,
            );
            // kept for audit; an unmatched customer has no recommended shell
            result.signals = Some(best.candidate);
            result.signal_notes = Some(notes);
            return result;
        }

        let provisional = provisional_confidence(&best.candidate, identity, &best.shell.identity);

        MatchResult {
            customer_id: customer.id.clone(),
            status: MatchStatus::Matched,
            recommended_shell_id: Some(best.shell.record.id.clone()),
            confidence: provisional,
            explanation_bullets: phase_one_bullets(best.shell, &notes),
            reason: None,
            signals: Some(best.candidate),
            signal_notes: Some(notes),
            provisional_confidence: Some(provisional),
            assessment: AssessmentStatus::NotRequested,
            candidate_count,
            customer: Some(customer.clone()),
            recommended_shell: Some(best.shell.record.clone()),
        }
    }
}

fn phase_one_bullets(shell: &PreparedShell, notes: &SignalNotes) -> Vec<String> {
    vec![
        format!("Recommended parent: {} ({})", shell.record.zi_company_name, shell.record.id),
        format!("Website: {}", notes.website),
        format!("Name: {}", notes.name),
        format!("Address: {}", notes.address),
    ]
}

fn terminal(customer: &CustomerRecord, status: MatchStatus, reason: String, candidate_count: usize) -> MatchResult {
    MatchResult {
        customer_id: customer.id.clone(),
        status,
        recommended_shell_id: None,
        confidence: 0,
        explanation_bullets: Vec::new(),
        reason: Some(reason),
        signals: None,
        signal_notes: None,
        provisional_confidence: None,
        assessment: AssessmentStatus::NotRequested,
        candidate_count,
        customer: Some(customer.clone()),
        recommended_shell: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BatchConfig;
    use crate::models::{AccountId, ShellRecord};
    use crate::services::domain_policy::DomainPolicy;
    use crate::services::normalizer::Normalizer;
    use crate::services::scorer::rank_candidates;

    fn customer(name: &str, website: Option<&str>) -> CustomerRecord {
        CustomerRecord {
            id: "001C00000000001".into(),
            name: name.into(),
            website: website.map(str::to_string),
            billing_city: None,
            billing_state: None,
            billing_country: None,
            billing_postal_code: None,
        }
    }

    fn prepared(name: &str, website: Option<&str>) -> PreparedShell {
        let config = BatchConfig::default();
        let record = ShellRecord {
            id: "001S00000000001".into(),
            zi_id: "ZI-1".into(),
            zi_company_name: name.into(),
            zi_website: website.map(str::to_string),
            zi_city: None,
            zi_state: None,
            zi_country: None,
            zi_postal_code: None,
            bad_domain: false,
        };
        PreparedShell::prepare(
            AccountId::parse(&record.id, "001").unwrap(),
            record,
            &Normalizer::new(&config),
            &DomainPolicy::new(&config.disallowed_domains),
        )
    }

    #[test]
    fn test_matched_carries_provisional_confidence() {
        let n = Normalizer::new(&BatchConfig::default());
        let c = customer("Acme Corp", Some("acme.com"));
        let identity = n.customer_identity(&c);
        let shell = prepared("Acme Corporation", Some("www.acme.com"));
        let ranked = rank_candidates(&c.id, &identity, &[&shell]);

        let result = Classifier::new(20.0).classify(&c, &identity, Screening::Ranked(ranked));
        assert_eq!(result.status, MatchStatus::Matched);
        assert_eq!(result.recommended_shell_id.as_deref(), Some("001S00000000001"));
        assert_eq!(result.confidence, 90);
        assert_eq!(result.provisional_confidence, Some(90));
        assert!(result.reason.is_none());
        assert_eq!(result.signals.as_ref().map(|s| s.website_match), Some(100));
        assert_eq!(result.explanation_bullets.len(), 4);
    }

    #[test]
    fn test_below_threshold_is_unmatched() {
        let n = Normalizer::new(&BatchConfig::default());
        let c = customer("Zyzzx Unmatched Co", None);
        let identity = n.customer_identity(&c);
        let shell = prepared("Globex", None);
        let ranked = rank_candidates(&c.id, &identity, &[&shell]);

        let result = Classifier::new(20.0).classify(&c, &identity, Screening::Ranked(ranked));
        assert_eq!(result.status, MatchStatus::Unmatched);
        assert_eq!(result.confidence, 0);
        assert!(result.recommended_shell_id.is_none());
        assert!(result.reason.as_deref().unwrap().contains("below the minimum"));
        assert!(result.signals.is_some());
    }

    #[test]
    fn test_no_candidates_is_unmatched() {
        let n = Normalizer::new(&BatchConfig::default());
        let c = customer("Acme", None);
        let identity = n.customer_identity(&c);
        let result = Classifier::new(20.0).classify(&c, &identity, Screening::Ranked(Vec::new()));
        assert_eq!(result.status, MatchStatus::Unmatched);
        assert_eq!(result.reason.as_deref(), Some("No candidate shell accounts found"));
    }

    #[test]
    fn test_flagged_outcomes() {
        let n = Normalizer::new(&BatchConfig::default());
        let c = customer("Joe", Some("gmail.com"));
        let identity = n.customer_identity(&c);
        let classifier = Classifier::new(20.0);

        let result = classifier.classify(&c, &identity, Screening::DisallowedDomain("gmail.com".into()));
        assert_eq!(result.status, MatchStatus::Flagged);
        assert!(result.reason.as_deref().unwrap().contains("gmail.com"));

        let result = classifier.classify(&c, &identity, Screening::Blocked { bad_neighbours: 3 });
        assert_eq!(result.status, MatchStatus::Flagged);
        assert_eq!(result.confidence, 0);
    }

    #[test]
    fn test_zero_threshold_matches_any_candidate() {
        let n = Normalizer::new(&BatchConfig::default());
        let c = customer("Zyzzx", None);
        let identity = n.customer_identity(&c);
        let shell = prepared("Qwerty", None);
        let ranked = rank_candidates(&c.id, &identity, &[&shell]);
        let result = Classifier::new(0.0).classify(&c, &identity, Screening::Ranked(ranked));
        assert_eq!(result.status, MatchStatus::Matched);
    }
}
