//! Blocking index over the shell universe
//!
//! Shells are bucketed by registered domain and by first normalized name
//! token so that a customer is only scored against a small neighbourhood.
//! The index is built once per batch and shared read-only afterwards.

use std::collections::HashMap;
use tracing::debug;

use super::domain_policy::DomainPolicy;
use super::normalizer::{NormalizedIdentity, Normalizer};
use crate::models::{AccountId, ShellRecord};

/// A shell with its validated id and cached normalized identity
#[derive(Debug, Clone)]
pub struct PreparedShell {
    pub id: AccountId,
    pub record: ShellRecord,
    pub identity: NormalizedIdentity,
}

impl PreparedShell {
    /// Normalize a shell and settle its bad-domain flag
    ///
    /// The flag is set when the directory reports it or when the shell's
    /// registered domain is disallowed.
    pub fn prepare(
        id: AccountId,
        mut record: ShellRecord,
        normalizer: &Normalizer,
        policy: &DomainPolicy,
    ) -> Self {
        let identity = normalizer.shell_identity(&record);
        record.bad_domain = record.bad_domain || policy.is_disallowed(identity.domain.as_ref());

        Self {
            id,
            record,
            identity,
        }
    }

    pub fn is_bad_domain(&self) -> bool {
        self.record.bad_domain
    }
}

/// Which stage of the lookup produced the candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockingSource {
    Domain,
    NameToken,
    Fallback,
}

impl BlockingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockingSource::Domain => "domain",
            BlockingSource::NameToken => "name_token",
            BlockingSource::Fallback => "fallback",
        }
    }
}

/// Result of a candidate lookup
#[derive(Debug)]
pub enum CandidateLookup<'a> {
    /// Viable shells, in shell-id order, without duplicates
    Shells {
        members: Vec<&'a PreparedShell>,
        source: BlockingSource,
    },
    /// Every shell sharing a blocking key is a bad-domain shell
    Blocked { bad_neighbours: usize },
    /// No viable shell exists anywhere in the universe
    Empty,
}

pub struct BlockingIndex {
    shells: Vec<PreparedShell>,
    by_domain: HashMap<String, Vec<usize>>,
    by_name_token: HashMap<String, Vec<usize>>,
    fallback_cap: usize,
}

impl BlockingIndex {
    /// Build the index; shells are ordered by canonical id
    pub fn build(mut shells: Vec<PreparedShell>, fallback_cap: usize) -> Self {
        shells.sort_by(|a, b| a.id.cmp(&b.id));
        shells.dedup_by(|a, b| a.id == b.id);

        let mut by_domain: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_name_token: HashMap<String, Vec<usize>> = HashMap::new();

        for (idx, shell) in shells.iter().enumerate() {
            if let Some(domain) = &shell.identity.domain {
                by_domain.entry(domain.registered.clone()).or_default().push(idx);
            }
            if let Some(token) = shell.identity.name.first_token() {
                by_name_token.entry(token.to_string()).or_default().push(idx);
            }
        }

        debug!(
            shells = shells.len(),
            domain_buckets = by_domain.len(),
            name_buckets = by_name_token.len(),
            "Blocking index built"
        );

        Self {
            shells,
            by_domain,
            by_name_token,
            fallback_cap,
        }
    }

    pub fn len(&self) -> usize {
        self.shells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shells.is_empty()
    }

    pub fn bad_domain_count(&self) -> usize {
        self.shells.iter().filter(|s| s.is_bad_domain()).count()
    }

    pub fn shells(&self) -> &[PreparedShell] {
        &self.shells
    }

    /// Candidate shells for one customer
    ///
    /// Domain bucket first, then first-name-token bucket, then the capped
    /// fallback over the whole universe. Bad-domain shells and the customer's
    /// own account are never returned. When both buckets are non-empty only
    /// because of bad-domain shells the lookup is `Blocked` and no fallback
    /// is attempted.
    pub fn candidates(&self, customer_id: &AccountId, identity: &NormalizedIdentity) -> CandidateLookup<'_> {
        let mut bad_neighbours = 0;

        let domain_bucket = identity
            .domain
            .as_ref()
            .and_then(|d| self.by_domain.get(&d.registered));
        if let Some(bucket) = domain_bucket {
            let (members, bad) = self.viable(bucket, customer_id);
            if !members.is_empty() {
                return CandidateLookup::Shells {
                    members,
                    source: BlockingSource::Domain,
                };
            }
            bad_neighbours += bad;
        }

        let token_bucket = identity
            .name
            .first_token()
            .and_then(|t| self.by_name_token.get(t));
        if let Some(bucket) = token_bucket {
            let (members, bad) = self.viable(bucket, customer_id);
            if !members.is_empty() {
                return CandidateLookup::Shells {
                    members,
                    source: BlockingSource::NameToken,
                };
            }
            bad_neighbours += bad;
        }

        if bad_neighbours > 0 {
            return CandidateLookup::Blocked { bad_neighbours };
        }

        let members: Vec<&PreparedShell> = self
            .shells
            .iter()
            .filter(|s| !s.is_bad_domain() && s.id != *customer_id)
            .take(self.fallback_cap)
            .collect();

        if members.is_empty() {
            CandidateLookup::Empty
        } else {
            CandidateLookup::Shells {
                members,
                source: BlockingSource::Fallback,
            }
        }
    }

    /// Viable members of a bucket and the number of bad-domain members seen
    fn viable(&self, bucket: &[usize], customer_id: &AccountId) -> (Vec<&PreparedShell>, usize) {
        let mut bad = 0;
        let members = bucket
            .iter()
            .map(|&idx| &self.shells[idx])
            .filter(|s| {
                if s.is_bad_domain() {
                    bad += 1;
                    false
                } else {
                    s.id != *customer_id
                }
            })
            .collect();
        (members, bad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BatchConfig;

    fn shell(id: &str, name: &str, website: Option<&str>, bad: bool) -> ShellRecord {
        ShellRecord {
            id: id.to_string(),
            zi_id: String::new(),
            zi_company_name: name.to_string(),
            zi_website: website.map(str::to_string),
            zi_city: None,
            zi_state: None,
            zi_country: None,
            zi_postal_code: None,
            bad_domain: bad,
        }
    }

    fn index(records: Vec<ShellRecord>, cap: usize) -> (BlockingIndex, Normalizer) {
        let config = BatchConfig::default();
        let normalizer = Normalizer::new(&config);
        let policy = DomainPolicy::new(&config.disallowed_domains);
        let prepared = records
            .into_iter()
            .map(|r| {
                let id = AccountId::parse(&r.id, "001").unwrap();
                PreparedShell::prepare(id, r, &normalizer, &policy)
            })
            .collect();
        (BlockingIndex::build(prepared, cap), normalizer)
    }

    fn ids(lookup: &CandidateLookup<'_>) -> Vec<String> {
        match lookup {
            CandidateLookup::Shells { members, .. } => {
                members.iter().map(|s| s.record.id.clone()).collect()
            }
            _ => Vec::new(),
        }
    }

    fn customer(n: &Normalizer, name: &str, website: Option<&str>) -> NormalizedIdentity {
        NormalizedIdentity {
            name: n.normalize_name(name),
            domain: n.normalize_website(website),
            address: Default::default(),
        }
    }

    fn cid() -> AccountId {
        AccountId::parse("001C00000000001", "001").unwrap()
    }

    #[test]
    fn test_domain_bucket_wins() {
        let (idx, n) = index(
            vec![
                shell("001S00000000002", "Acme Corporation", Some("www.acme.com"), false),
                shell("001S00000000001", "Acme Holdings", Some("acmeholdings.com"), false),
            ],
            10,
        );
        let lookup = idx.candidates(&cid(), &customer(&n, "Acme Corp", Some("acme.com")));
        assert!(matches!(lookup, CandidateLookup::Shells { source: BlockingSource::Domain, .. }));
        assert_eq!(ids(&lookup), vec!["001S00000000002"]);
    }

    #[test]
    fn test_name_token_bucket_when_no_domain() {
        let (idx, n) = index(
            vec![
                shell("001S00000000002", "Acme Corporation", Some("acme.com"), false),
                shell("001S00000000001", "Acme Holdings", Some("acmeholdings.com"), false),
                shell("001S00000000003", "Globex", None, false),
            ],
            10,
        );
        let lookup = idx.candidates(&cid(), &customer(&n, "Acme Widgets", None));
        assert!(matches!(lookup, CandidateLookup::Shells { source: BlockingSource::NameToken, .. }));
        assert_eq!(ids(&lookup), vec!["001S00000000001", "001S00000000002"]);
    }

    #[test]
    fn test_fallback_is_capped_and_ordered() {
        let (idx, n) = index(
            vec![
                shell("001S00000000003", "Gamma", None, false),
                shell("001S00000000001", "Alpha", None, false),
                shell("001S00000000002", "Beta", None, true),
                shell("001S00000000004", "Delta", None, false),
            ],
            2,
        );
        let lookup = idx.candidates(&cid(), &customer(&n, "Zyzzx Unmatched Co", None));
        assert!(matches!(lookup, CandidateLookup::Shells { source: BlockingSource::Fallback, .. }));
        assert_eq!(ids(&lookup), vec!["001S00000000001", "001S00000000003"]);
    }

    #[test]
    fn test_bad_domain_neighbourhood_is_blocked() {
        let (idx, n) = index(
            vec![
                shell("001S00000000001", "Acme Corporation", Some("acme.com"), true),
                shell("001S00000000002", "Globex", Some("globex.com"), false),
            ],
            10,
        );
        let lookup = idx.candidates(&cid(), &customer(&n, "Acme", Some("acme.com")));
        assert!(matches!(lookup, CandidateLookup::Blocked { bad_neighbours: 2 }));
    }

    #[test]
    fn test_disallowed_shell_domain_marked_bad_at_load() {
        let (idx, _) = index(
            vec![shell("001S00000000001", "Joe Plumbing", Some("gmail.com"), false)],
            10,
        );
        assert_eq!(idx.bad_domain_count(), 1);
        assert!(idx.shells()[0].record.bad_domain);
    }

    #[test]
    fn test_self_match_excluded() {
        let (idx, n) = index(
            vec![
                shell("001C00000000001", "Acme", Some("acme.com"), false),
                shell("001S00000000001", "Acme Inc", Some("acme.com"), false),
            ],
            10,
        );
        // 18-character spelling of the same customer account
        let customer_id = AccountId::parse(cid().canonical(), "001").unwrap();
        let lookup = idx.candidates(&customer_id, &customer(&n, "Acme", Some("acme.com")));
        assert_eq!(ids(&lookup), vec!["001S00000000001"]);
    }

    #[test]
    fn test_empty_universe() {
        let (idx, n) = index(vec![], 10);
        assert!(idx.is_empty());
        let lookup = idx.candidates(&cid(), &customer(&n, "Acme", None));
        assert!(matches!(lookup, CandidateLookup::Empty));
    }
}
