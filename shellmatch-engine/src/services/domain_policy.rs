//! Disallowed-domain policy
//!
//! Free-mail, ISP and placeholder domains say nothing about corporate
//! identity. A customer whose own domain is on the list is FLAGGED, and a
//! shell whose domain is on the list is marked `bad_domain` once at load.

use std::collections::HashSet;

use super::normalizer::NormalizedDomain;

#[derive(Debug, Clone, Default)]
pub struct DomainPolicy {
    disallowed: HashSet<String>,
}

impl DomainPolicy {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let disallowed = domains
            .into_iter()
            .map(|d| {
                let d = d.as_ref().trim().trim_end_matches('.').to_lowercase();
                d.strip_prefix("www.").map(str::to_string).unwrap_or(d)
            })
            .filter(|d| !d.is_empty())
            .collect();

        Self { disallowed }
    }

    /// True when the registered domain or the full host is disallowed
    ///
    /// An absent domain is never disallowed.
    pub fn is_disallowed(&self, domain: Option<&NormalizedDomain>) -> bool {
        match domain {
            Some(d) => self.disallowed.contains(&d.registered) || self.disallowed.contains(&d.host),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.disallowed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.disallowed.is_empty()
    }
}
