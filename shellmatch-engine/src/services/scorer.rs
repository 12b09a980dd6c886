//! Per-pair signal scoring
//!
//! Computes the website, name and address signals for a (customer, shell)
//! pair and the rank composite used to order candidates. Ranking is fully
//! deterministic: rank descending, shell id ascending.

use strsim::normalized_levenshtein;

use super::blocking_index::PreparedShell;
use super::normalizer::{NormalizedAddress, NormalizedDomain, NormalizedIdentity, NormalizedName};
use crate::models::{MatchCandidate, SignalNotes};

pub const WEBSITE_WEIGHT: f64 = 0.6;
pub const NAME_WEIGHT: f64 = 0.3;
pub const ADDRESS_WEIGHT: f64 = 0.1;

const WEBSITE_EXACT: u8 = 100;
const WEBSITE_SUBDOMAIN: u8 = 80;
const WEBSITE_FUZZY_MAX: f64 = 60.0;

const COUNTRY_POINTS: u8 = 30;
const STATE_POINTS: u8 = 30;
const CITY_POINTS: u8 = 30;
const POSTAL_POINTS: u8 = 10;

/// A scored candidate together with the shell it refers to
#[derive(Debug, Clone)]
pub struct ScoredCandidate<'a> {
    pub candidate: MatchCandidate,
    pub shell: &'a PreparedShell,
}

/// Website signal (0..=100)
///
/// 100 for identical registered domains, 80 when one registered domain nests
/// under the other, else the label similarity scaled to 60. For two
/// normalized websites the 80 case does not occur (see
/// [`NormalizedDomain::is_subdomain_of`]); "shop.acme.com" and "acme.com"
/// share a registered domain and score 100.
pub fn website_match(customer: Option<&NormalizedDomain>, shell: Option<&NormalizedDomain>) -> u8 {
    let (Some(c), Some(s)) = (customer, shell) else {
        return 0;
    };

    if c.registered == s.registered {
        WEBSITE_EXACT
    } else if c.is_subdomain_of(s) || s.is_subdomain_of(c) {
        WEBSITE_SUBDOMAIN
    } else {
        (normalized_levenshtein(&c.label, &s.label) * WEBSITE_FUZZY_MAX).round() as u8
    }
}

/// Name signal (0..=100) over de-duplicated, sorted token sets
pub fn name_match(customer: &NormalizedName, shell: &NormalizedName) -> u8 {
    if customer.is_empty() || shell.is_empty() {
        return 0;
    }

    let c = customer.token_set_key();
    let s = shell.token_set_key();
    if c == s {
        return 100;
    }

    (normalized_levenshtein(&c, &s) * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Address signal: country +30, state +30, city +30, postal +10
pub fn address_consistency(customer: &NormalizedAddress, shell: &NormalizedAddress) -> u8 {
    fn same(a: &Option<String>, b: &Option<String>) -> bool {
        matches!((a, b), (Some(x), Some(y)) if x == y)
    }

    let mut total = 0;
    if same(&customer.country, &shell.country) {
        total += COUNTRY_POINTS;
    }
    if same(&customer.state, &shell.state) {
        total += STATE_POINTS;
    }
    if same(&customer.city, &shell.city) {
        total += CITY_POINTS;
    }
    if same(&customer.postal_code, &shell.postal_code) {
        total += POSTAL_POINTS;
    }
    total
}

/// Ordering composite; monotone in every signal, website > name > address
pub fn rank_score(website: u8, name: u8, address: u8) -> f64 {
    WEBSITE_WEIGHT * f64::from(website) + NAME_WEIGHT * f64::from(name) + ADDRESS_WEIGHT * f64::from(address)
}

pub fn score_pair(customer_id: &str, customer: &NormalizedIdentity, shell: &PreparedShell) -> MatchCandidate {
    let website = website_match(customer.domain.as_ref(), shell.identity.domain.as_ref());
    let name = name_match(&customer.name, &shell.identity.name);
    let address = address_consistency(&customer.address, &shell.identity.address);

    MatchCandidate {
        customer_id: customer_id.to_string(),
        shell_id: shell.record.id.clone(),
        website_match: website,
        name_match: name,
        address_consistency: address,
        rank_score: rank_score(website, name, address),
    }
}

/// Score every candidate and sort: rank descending, shell id ascending
pub fn rank_candidates<'a>(
    customer_id: &str,
    customer: &NormalizedIdentity,
    shells: &[&'a PreparedShell],
) -> Vec<ScoredCandidate<'a>> {
    let mut scored: Vec<ScoredCandidate<'a>> = shells
        .iter()
        .map(|&shell| ScoredCandidate {
            candidate: score_pair(customer_id, customer, shell),
            shell,
        })
        .collect();

    scored.sort_by(|a, b| {
        b.candidate
            .rank_score
            .total_cmp(&a.candidate.rank_score)
            .then_with(|| a.candidate.shell_id.cmp(&b.candidate.shell_id))
    });

    scored
}

/// Provisional confidence of a matched pair
///
/// The rank score relative to the best rank attainable with the signals
/// available on both sides.
pub fn provisional_confidence(candidate: &MatchCandidate, customer: &NormalizedIdentity, shell: &NormalizedIdentity) -> u8 {
    let attainable = if customer.domain.is_some() && shell.domain.is_some() {
        100.0
    } else if !customer.name.is_empty() && !shell.name.is_empty() {
        NAME_WEIGHT * 100.0 + ADDRESS_WEIGHT * 100.0
    } else {
        ADDRESS_WEIGHT * 100.0
    };

    (candidate.rank_score / attainable * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Short justifications for each signal of a pair
pub fn signal_notes(candidate: &MatchCandidate, customer: &NormalizedIdentity, shell: &NormalizedIdentity) -> SignalNotes {
    let website = match (&customer.domain, &shell.domain) {
        (None, None) => "neither account has a usable website".to_string(),
        (None, Some(_)) => "customer has no usable website".to_string(),
        (Some(_), None) => "shell has no usable website".to_string(),
        (Some(c), Some(s)) if candidate.website_match == WEBSITE_EXACT => {
            format!("customer domain '{}' equals shell domain '{}'", c.registered, s.registered)
        }
        (Some(c), Some(s)) if candidate.website_match == WEBSITE_SUBDOMAIN => {
            format!("domains '{}' and '{}' are parent and subdomain", c.registered, s.registered)
        }
        (Some(c), Some(s)) => format!(
            "domains '{}' and '{}' differ (similarity {}/60)",
            c.registered, s.registered, candidate.website_match
        ),
    };

    let name = if customer.name.is_empty() || shell.name.is_empty() {
        "company name missing on one side".to_string()
    } else if candidate.name_match == 100 {
        format!("normalized names '{}' are identical", customer.name.display())
    } else {
        format!(
            "normalized names '{}' and '{}' are {}% similar",
            customer.name.display(),
            shell.name.display(),
            candidate.name_match
        )
    };

    let mut parts = Vec::new();
    let same = |a: &Option<String>, b: &Option<String>| matches!((a, b), (Some(x), Some(y)) if x == y);
    if same(&customer.address.country, &shell.address.country) {
        parts.push("country");
    }
    if same(&customer.address.state, &shell.address.state) {
        parts.push("state");
    }
    if same(&customer.address.city, &shell.address.city) {
        parts.push("city");
    }
    if same(&customer.address.postal_code, &shell.address.postal_code) {
        parts.push("postal code");
    }
    let address = if parts.is_empty() {
        "no billing address components agree".to_string()
    } else {
        format!(
            "{} agree ({}/100)",
            parts.join(", "),
            candidate.address_consistency
        )
    };

    SignalNotes {
        website,
        name,
        address,
    }
}
