//! Customer and shell account records as loaded from the account directory

use serde::{Deserialize, Serialize};

/// An account to be matched to a parent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub billing_city: Option<String>,
    #[serde(default)]
    pub billing_state: Option<String>,
    #[serde(default)]
    pub billing_country: Option<String>,
    #[serde(default)]
    pub billing_postal_code: Option<String>,
}

/// A candidate parent account from the authorized shell universe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShellRecord {
    pub id: String,
    #[serde(default)]
    pub zi_id: String,
    pub zi_company_name: String,
    #[serde(default)]
    pub zi_website: Option<String>,
    #[serde(default)]
    pub zi_city: Option<String>,
    #[serde(default)]
    pub zi_state: Option<String>,
    #[serde(default)]
    pub zi_country: Option<String>,
    #[serde(default)]
    pub zi_postal_code: Option<String>,
    /// Excluded from candidate retrieval when set
    #[serde(default)]
    pub bad_domain: bool,
}

impl CustomerRecord {
    /// "City, State, Country, Postal" with absent parts skipped
    pub fn billing_address_line(&self) -> Option<String> {
        address_line([
            &self.billing_city,
            &self.billing_state,
            &self.billing_country,
            &self.billing_postal_code,
        ])
    }
}

impl ShellRecord {
    pub fn billing_address_line(&self) -> Option<String> {
        address_line([
            &self.zi_city,
            &self.zi_state,
            &self.zi_country,
            &self.zi_postal_code,
        ])
    }
}

fn address_line(parts: [&Option<String>; 4]) -> Option<String> {
    let parts: Vec<&str> = parts
        .iter()
        .filter_map(|p| p.as_deref())
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_record_deserializes_with_defaults() {
        let shell: ShellRecord = serde_json::from_str(
            r#"{"id":"001000000000001","ziCompanyName":"Acme Corporation","ziWebsite":"www.acme.com"}"#,
        )
        .unwrap();
        assert_eq!(shell.zi_website.as_deref(), Some("www.acme.com"));
        assert!(!shell.bad_domain);
        assert_eq!(shell.zi_id, "");
    }

    #[test]
    fn test_address_line_skips_blank_parts() {
        let customer = CustomerRecord {
            id: "001000000000001".into(),
            name: "Acme".into(),
            website: None,
            billing_city: Some(" Austin ".into()),
            billing_state: Some("".into()),
            billing_country: Some("USA".into()),
            billing_postal_code: None,
        };
        assert_eq!(customer.billing_address_line().as_deref(), Some("Austin, USA"));
    }
}
