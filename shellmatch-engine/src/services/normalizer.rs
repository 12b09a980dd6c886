//! Identity normalization
//!
//! Canonicalizes company names, websites and billing addresses into forms
//! that the blocking index and the scorer compare directly. Every function
//! here is pure: the same input always yields the same normalized form.

use std::collections::HashSet;
use url::{Host, Url};

use crate::config::BatchConfig;
use crate::models::{CustomerRecord, ShellRecord};

/// Tokenized company name with legal suffixes removed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedName {
    pub tokens: Vec<String>,
}

impl NormalizedName {
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Blocking key: first token of the normalized name
    pub fn first_token(&self) -> Option<&str> {
        self.tokens.first().map(String::as_str)
    }

    /// Sorted, de-duplicated tokens joined by a single space
    pub fn token_set_key(&self) -> String {
        let mut set: Vec<&str> = self.tokens.iter().map(String::as_str).collect();
        set.sort_unstable();
        set.dedup();
        set.join(" ")
    }

    pub fn display(&self) -> String {
        self.tokens.join(" ")
    }
}

/// Website reduced to its host and registered domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedDomain {
    /// Host without scheme, port, path or a leading "www."
    pub host: String,
    /// Rightmost two labels, or three under a multi-label public suffix
    pub registered: String,
    /// Registered domain minus its public suffix ("acme" for "acme.co.uk")
    pub label: String,
}

impl NormalizedDomain {
    /// True when `self`'s registered domain is a strict dotted subdomain of `other`'s
    ///
    /// Two outputs of [`Normalizer::normalize_website`] never relate this way:
    /// a host's registered domain already absorbs its subdomains, and a bare
    /// public suffix normalizes to `None`. Only domains built by hand reach it.
    pub fn is_subdomain_of(&self, other: &NormalizedDomain) -> bool {
        self.registered.len() > other.registered.len()
            && self.registered.ends_with(&other.registered)
            && self.registered[..self.registered.len() - other.registered.len()].ends_with('.')
    }
}

/// Billing address tuple after trimming, lower-casing and code lookup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedAddress {
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
}

/// All comparable forms of one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedIdentity {
    pub name: NormalizedName,
    /// `None` is the distinct "absent" state and never matches anything
    pub domain: Option<NormalizedDomain>,
    pub address: NormalizedAddress,
}

/// Normalizer configured with legal suffixes and multi-label public suffixes
#[derive(Debug, Clone)]
pub struct Normalizer {
    legal_suffixes: HashSet<String>,
    multi_label_suffixes: HashSet<String>,
}

impl Normalizer {
    pub fn new(config: &BatchConfig) -> Self {
        Self {
            legal_suffixes: config
                .legal_suffixes
                .iter()
                .map(|s| s.trim().to_lowercase())
                .collect(),
            multi_label_suffixes: config
                .multi_label_suffixes
                .iter()
                .map(|s| s.trim().trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    pub fn customer_identity(&self, customer: &CustomerRecord) -> NormalizedIdentity {
        NormalizedIdentity {
            name: self.normalize_name(&customer.name),
            domain: self.normalize_website(customer.website.as_deref()),
            address: normalize_address(
                customer.billing_city.as_deref(),
                customer.billing_state.as_deref(),
                customer.billing_country.as_deref(),
                customer.billing_postal_code.as_deref(),
            ),
        }
    }

    pub fn shell_identity(&self, shell: &ShellRecord) -> NormalizedIdentity {
        NormalizedIdentity {
            name: self.normalize_name(&shell.zi_company_name),
            domain: self.normalize_website(shell.zi_website.as_deref()),
            address: normalize_address(
                shell.zi_city.as_deref(),
                shell.zi_state.as_deref(),
                shell.zi_country.as_deref(),
                shell.zi_postal_code.as_deref(),
            ),
        }
    }

    /// Lower-case, strip punctuation, collapse whitespace, drop trailing
    /// legal-entity suffix tokens, tokenize
    ///
    /// Apostrophes and periods are deleted ("L.L.C." → "llc"); any other
    /// punctuation separates tokens. A name made only of suffix tokens keeps
    /// its first token.
    pub fn normalize_name(&self, raw: &str) -> NormalizedName {
        let cleaned: String = raw
            .to_lowercase()
            .chars()
            .filter(|c| !matches!(c, '\'' | '\u{2019}' | '.'))
            .map(|c| if c.is_alphanumeric() { c } else { ' ' })
            .collect();

        let mut tokens: Vec<String> = cleaned.split_whitespace().map(str::to_string).collect();

        while tokens.len() > 1
            && tokens
                .last()
                .map(|t| self.legal_suffixes.contains(t))
                .unwrap_or(false)
        {
            tokens.pop();
        }

        NormalizedName { tokens }
    }

    /// Reduce a website to its registered domain
    ///
    /// Returns `None` for null, blank or unparseable input and for IP hosts.
    pub fn normalize_website(&self, raw: Option<&str>) -> Option<NormalizedDomain> {
        let raw = raw?.trim();
        if raw.is_empty() {
            return None;
        }

        let with_scheme = if raw.contains("://") {
            raw.to_string()
        } else {
            format!("https://{}", raw)
        };

        let url = Url::parse(&with_scheme).ok()?;
        let host = match url.host()? {
            Host::Domain(domain) => domain.to_lowercase(),
            Host::Ipv4(_) | Host::Ipv6(_) => return None,
        };

        let host = host.trim_end_matches('.');
        let host = host.strip_prefix("www.").unwrap_or(host).to_string();

        let labels: Vec<&str> = host.split('.').collect();
        if labels.len() < 2
            || labels
                .iter()
                .any(|l| l.is_empty() || !l.chars().all(|c| c.is_alphanumeric() || c == '-'))
        {
            return None;
        }

        let last_two = labels[labels.len() - 2..].join(".");
        let suffix_labels = if self.multi_label_suffixes.contains(&last_two) {
            2
        } else {
            1
        };

        // a bare public suffix ("co.uk") has no registrable label
        if labels.len() <= suffix_labels {
            return None;
        }

        let registered = labels[labels.len() - suffix_labels - 1..].join(".");
        let label = labels[labels.len() - suffix_labels - 1].to_string();

        Some(NormalizedDomain {
            host,
            registered,
            label,
        })
    }
}

/// Trim and lower-case address parts, mapping country and state names to codes
pub fn normalize_address(
    city: Option<&str>,
    state: Option<&str>,
    country: Option<&str>,
    postal_code: Option<&str>,
) -> NormalizedAddress {
    let country = clean_part(country).map(|c| canonical_country(&c));
    let state = clean_part(state).map(|s| canonical_state(&s));

    NormalizedAddress {
        city: clean_part(city),
        state,
        country,
        postal_code: postal_code.and_then(normalize_postal_code),
    }
}

fn clean_part(raw: Option<&str>) -> Option<String> {
    let cleaned = raw?.trim().to_lowercase();
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Lower-case, drop inner whitespace, truncate US ZIP+4 to the 5-digit ZIP
fn normalize_postal_code(raw: &str) -> Option<String> {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();

    if compact.is_empty() {
        return None;
    }

    let bytes = compact.as_bytes();
    let is_zip_plus_four = bytes.len() == 10
        && bytes[5] == b'-'
        && bytes[..5].iter().all(u8::is_ascii_digit)
        && bytes[6..].iter().all(u8::is_ascii_digit);

    if is_zip_plus_four {
        Some(compact[..5].to_string())
    } else {
        Some(compact)
    }
}

fn canonical_country(cleaned: &str) -> String {
    let key = cleaned.replace('.', "");
    let key = key.trim();
    COUNTRY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, code)| code.to_string())
        .unwrap_or_else(|| cleaned.to_string())
}

fn canonical_state(cleaned: &str) -> String {
    let key = cleaned.replace('.', "");
    let key = key.trim();
    STATE_ALIASES
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, code)| code.to_string())
        .unwrap_or_else(|| cleaned.to_string())
}

const COUNTRY_ALIASES: &[(&str, &str)] = &[
    ("us", "us"),
    ("usa", "us"),
    ("u s", "us"),
    ("u s a", "us"),
    ("united states", "us"),
    ("united states of america", "us"),
    ("america", "us"),
    ("uk", "gb"),
    ("gb", "gb"),
    ("united kingdom", "gb"),
    ("great britain", "gb"),
    ("england", "gb"),
    ("scotland", "gb"),
    ("wales", "gb"),
    ("northern ireland", "gb"),
    ("canada", "ca"),
    ("germany", "de"),
    ("deutschland", "de"),
    ("france", "fr"),
    ("spain", "es"),
    ("españa", "es"),
    ("italy", "it"),
    ("italia", "it"),
    ("netherlands", "nl"),
    ("the netherlands", "nl"),
    ("holland", "nl"),
    ("belgium", "be"),
    ("switzerland", "ch"),
    ("austria", "at"),
    ("sweden", "se"),
    ("norway", "no"),
    ("denmark", "dk"),
    ("finland", "fi"),
    ("ireland", "ie"),
    ("portugal", "pt"),
    ("poland", "pl"),
    ("australia", "au"),
    ("new zealand", "nz"),
    ("japan", "jp"),
    ("china", "cn"),
    ("india", "in"),
    ("brazil", "br"),
    ("brasil", "br"),
    ("mexico", "mx"),
    ("méxico", "mx"),
    ("argentina", "ar"),
    ("singapore", "sg"),
    ("hong kong", "hk"),
    ("south korea", "kr"),
    ("korea", "kr"),
    ("republic of korea", "kr"),
    ("south africa", "za"),
    ("united arab emirates", "ae"),
    ("uae", "ae"),
    ("israel", "il"),
];

const STATE_ALIASES: &[(&str, &str)] = &[
    ("alabama", "al"),
    ("alaska", "ak"),
    ("arizona", "az"),
    ("arkansas", "ar"),
    ("california", "ca"),
    ("colorado", "co"),
    ("connecticut", "ct"),
    ("delaware", "de"),
    ("district of columbia", "dc"),
    ("florida", "fl"),
    ("georgia", "ga"),
    ("hawaii", "hi"),
    ("idaho", "id"),
    ("illinois", "il"),
    ("indiana", "in"),
    ("iowa", "ia"),
    ("kansas", "ks"),
    ("kentucky", "ky"),
    ("louisiana", "la"),
    ("maine", "me"),
    ("maryland", "md"),
    ("massachusetts", "ma"),
    ("michigan", "mi"),
    ("minnesota", "mn"),
    ("mississippi", "ms"),
    ("missouri", "mo"),
    ("montana", "mt"),
    ("nebraska", "ne"),
    ("nevada", "nv"),
    ("new hampshire", "nh"),
    ("new jersey", "nj"),
    ("new mexico", "nm"),
    ("new york", "ny"),
    ("north carolina", "nc"),
    ("north dakota", "nd"),
    ("ohio", "oh"),
    ("oklahoma", "ok"),
    ("oregon", "or"),
    ("pennsylvania", "pa"),
    ("rhode island", "ri"),
    ("south carolina", "sc"),
    ("south dakota", "sd"),
    ("tennessee", "tn"),
    ("texas", "tx"),
    ("utah", "ut"),
    ("vermont", "vt"),
    ("virginia", "va"),
    ("washington", "wa"),
    ("west virginia", "wv"),
    ("wisconsin", "wi"),
    ("wyoming", "wy"),
    ("alberta", "ab"),
    ("british columbia", "bc"),
    ("manitoba", "mb"),
    ("new brunswick", "nb"),
    ("newfoundland and labrador", "nl"),
    ("nova scotia", "ns"),
    ("northwest territories", "nt"),
    ("nunavut", "nu"),
    ("ontario", "on"),
    ("prince edward island", "pe"),
    ("quebec", "qc"),
    ("québec", "qc"),
    ("saskatchewan", "sk"),
    ("yukon", "yt"),
];
