//! REST account directory client
//!
//! Queries the CRM REST query endpoint with one `WHERE Id IN (...)` query per
//! chunk and follows `nextRecordsUrl` paging until `done`.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize};
use std::time::Duration;

use super::{AccountDirectory, DirectoryError};
use crate::config::DirectorySettings;
use crate::models::{AccountId, CustomerRecord, ShellRecord};

const USER_AGENT: &str = concat!("shellmatch-engine/", env!("CARGO_PKG_VERSION"));

const CUSTOMER_FIELDS: &str =
    "Id, Name, Website, BillingCity, BillingState, BillingCountry, BillingPostalCode";
const SHELL_FIELDS: &str = "Id, ZI_Id__c, ZI_Company_Name__c, ZI_Website__c, ZI_Company_City__c, \
     ZI_Company_State__c, ZI_Company_Country__c, ZI_Company_Postal_Code__c, Bad_Domain__c";

/// One page of query results
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryPage<T> {
    #[serde(default = "default_done")]
    done: bool,
    #[serde(default)]
    next_records_url: Option<String>,
    records: Vec<T>,
}

fn default_done() -> bool {
    true
}

/// Customer account as returned by the directory
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AccountRow {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    website: Option<String>,
    #[serde(default)]
    billing_city: Option<String>,
    #[serde(default)]
    billing_state: Option<String>,
    #[serde(default)]
    billing_country: Option<String>,
    #[serde(default)]
    billing_postal_code: Option<String>,
}

impl From<AccountRow> for CustomerRecord {
    fn from(row: AccountRow) -> Self {
        Self {
            id: row.id,
            name: row.name.unwrap_or_default(),
            website: row.website,
            billing_city: row.billing_city,
            billing_state: row.billing_state,
            billing_country: row.billing_country,
            billing_postal_code: row.billing_postal_code,
        }
    }
}

/// Shell account enrichment fields as returned by the directory
#[derive(Debug, Deserialize)]
struct ShellRow {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "ZI_Id__c", default)]
    zi_id: Option<String>,
    #[serde(rename = "ZI_Company_Name__c", default)]
    zi_company_name: Option<String>,
    #[serde(rename = "ZI_Website__c", default)]
    zi_website: Option<String>,
    #[serde(rename = "ZI_Company_City__c", default)]
    zi_city: Option<String>,
    #[serde(rename = "ZI_Company_State__c", default)]
    zi_state: Option<String>,
    #[serde(rename = "ZI_Company_Country__c", default)]
    zi_country: Option<String>,
    #[serde(rename = "ZI_Company_Postal_Code__c", default)]
    zi_postal_code: Option<String>,
    #[serde(rename = "Bad_Domain__c", default)]
    bad_domain: Option<bool>,
}

impl From<ShellRow> for ShellRecord {
    fn from(row: ShellRow) -> Self {
        Self {
            id: row.id,
            zi_id: row.zi_id.unwrap_or_default(),
            zi_company_name: row.zi_company_name.unwrap_or_default(),
            zi_website: row.zi_website,
            zi_city: row.zi_city,
            zi_state: row.zi_state,
            zi_country: row.zi_country,
            zi_postal_code: row.zi_postal_code,
            bad_domain: row.bad_domain.unwrap_or(false),
        }
    }
}

/// Account directory reached over REST
pub struct RestDirectory {
    http_client: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
}

impl RestDirectory {
    pub fn new(settings: &DirectorySettings) -> Result<Self, DirectoryError> {
        let base_url = settings
            .base_url
            .clone()
            .ok_or_else(|| DirectoryError::NetworkError("directory base_url not configured".to_string()))?;

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| DirectoryError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: settings.api_token.clone(),
        })
    }

    /// Run a query and collect every page
    async fn query_all<T: DeserializeOwned>(&self, soql: &str) -> Result<Vec<T>, DirectoryError> {
        let mut records = Vec::new();
        let mut page: QueryPage<T> = self
            .get_page(&format!("{}/query", self.base_url), Some(soql))
            .await?;

        loop {
            records.append(&mut page.records);
            match (page.done, page.next_records_url.take()) {
                (false, Some(next)) => {
                    let url = if next.starts_with("http") {
                        next
                    } else {
                        format!("{}{}", origin(&self.base_url), next)
                    };
                    page = self.get_page(&url, None).await?;
                }
                _ => break,
            }
        }

        Ok(records)
    }

    async fn get_page<T: DeserializeOwned>(&self, url: &str, soql: Option<&str>) -> Result<QueryPage<T>, DirectoryError> {
        tracing::debug!(url = %url, "Querying account directory");

        let mut request = self.http_client.get(url);
        if let Some(q) = soql {
            request = request.query(&[("q", q)]);
        }
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DirectoryError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(DirectoryError::ApiError(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| DirectoryError::ParseError(e.to_string()))
    }
}

/// Scheme and authority of a URL, used to resolve relative paging links
fn origin(base_url: &str) -> String {
    match url::Url::parse(base_url) {
        Ok(parsed) => parsed.origin().ascii_serialization(),
        Err(_) => base_url.to_string(),
    }
}

/// `SELECT <fields> FROM Account WHERE Id IN ('a', 'b')` over canonical ids
fn build_query(fields: &str, ids: &[AccountId]) -> String {
    let quoted: Vec<String> = ids.iter().map(|id| format!("'{}'", id.canonical())).collect();
    format!("SELECT {} FROM Account WHERE Id IN ({})", fields, quoted.join(", "))
}

#[async_trait]
impl AccountDirectory for RestDirectory {
    fn name(&self) -> &'static str {
        "rest"
    }

    async fn fetch_customers(&self, ids: &[AccountId]) -> Result<Vec<CustomerRecord>, DirectoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<AccountRow> = self.query_all(&build_query(CUSTOMER_FIELDS, ids)).await?;
        Ok(rows.into_iter().map(CustomerRecord::from).collect())
    }

    async fn fetch_shells(&self, ids: &[AccountId]) -> Result<Vec<ShellRecord>, DirectoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<ShellRow> = self.query_all(&build_query(SHELL_FIELDS, ids)).await?;
        Ok(rows.into_iter().map(ShellRecord::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    const API_PATH: &str = "/services/data/v59.0";

    fn directory_for(server: &MockServer) -> RestDirectory {
        RestDirectory::new(&DirectorySettings {
            base_url: Some(server.url(API_PATH)),
            api_token: Some("token-123".into()),
            ..Default::default()
        })
        .unwrap()
    }

    fn ids(raw: &[&str]) -> Vec<AccountId> {
        raw.iter().map(|r| AccountId::parse(r, "001").unwrap()).collect()
    }

    #[test]
    fn test_query_uses_canonical_ids() {
        let ids = vec![
            AccountId::parse("001Dn00000ABCde", "001").unwrap(),
            AccountId::parse("001000000000001", "001").unwrap(),
        ];
        let query = build_query("Id, Name", &ids);
        assert_eq!(
            query,
            "SELECT Id, Name FROM Account WHERE Id IN ('001Dn00000ABCdeIAH', '001000000000001AAA')"
        );
    }

    #[test]
    fn test_shell_row_maps_enrichment_fields() {
        let page: QueryPage<ShellRow> = serde_json::from_str(
            r#"{
                "totalSize": 1,
                "done": true,
                "records": [{
                    "attributes": {"type": "Account"},
                    "Id": "001000000000001AAA",
                    "ZI_Id__c": "123",
                    "ZI_Company_Name__c": "Acme Corporation",
                    "ZI_Website__c": "www.acme.com",
                    "ZI_Company_Country__c": "USA",
                    "Bad_Domain__c": null
                }]
            }"#,
        )
        .unwrap();

        let shell = ShellRecord::from(page.records.into_iter().next().unwrap());
        assert_eq!(shell.zi_company_name, "Acme Corporation");
        assert_eq!(shell.zi_country.as_deref(), Some("USA"));
        assert!(!shell.bad_domain);
    }

    #[test]
    fn test_account_row_maps_billing_fields() {
        let row: AccountRow = serde_json::from_str(
            r#"{"Id":"001000000000001","Name":"Acme Corp","Website":"acme.com","BillingCity":"Austin","BillingPostalCode":"78701"}"#,
        )
        .unwrap();
        let customer = CustomerRecord::from(row);
        assert_eq!(customer.billing_city.as_deref(), Some("Austin"));
        assert!(customer.billing_state.is_none());
    }

    #[test]
    fn test_relative_paging_link_resolution() {
        assert_eq!(
            origin("https://example.my.salesforce.com/services/data/v59.0"),
            "https://example.my.salesforce.com"
        );
    }

    #[test]
    fn test_missing_base_url_is_rejected() {
        assert!(RestDirectory::new(&DirectorySettings::default()).is_err());
    }

    #[tokio::test]
    async fn test_follows_next_records_url_across_pages() {
        let server = MockServer::start_async().await;

        let first_page = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path(format!("{}/query", API_PATH))
                    .query_param_exists("q")
                    .header("authorization", "Bearer token-123");
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({
                        "totalSize": 3,
                        "done": false,
                        "nextRecordsUrl": format!("{}/query/01gNEXT-2000", API_PATH),
                        "records": [
                            {"Id": "001000000000001AAA", "Name": "Acme Corp"},
                            {"Id": "001000000000002AAA", "Name": "Globex"}
                        ]
                    }));
            })
            .await;

        let second_page = server
            .mock_async(|when, then| {
                when.method(GET).path(format!("{}/query/01gNEXT-2000", API_PATH));
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({
                        "totalSize": 3,
                        "done": true,
                        "records": [{"Id": "001000000000003AAA", "Name": "Initech", "Website": "initech.io"}]
                    }));
            })
            .await;

        let directory = directory_for(&server);
        let customers = directory
            .fetch_customers(&ids(&["001000000000001", "001000000000002", "001000000000003"]))
            .await
            .unwrap();

        first_page.assert_async().await;
        second_page.assert_async().await;
        let names: Vec<&str> = customers.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Acme Corp", "Globex", "Initech"]);
        assert_eq!(customers[2].website.as_deref(), Some("initech.io"));
    }

    #[tokio::test]
    async fn test_error_status_becomes_api_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path(format!("{}/query", API_PATH));
                then.status(401)
                    .json_body(json!([{"message": "Session expired or invalid", "errorCode": "INVALID_SESSION_ID"}]));
            })
            .await;

        let err = directory_for(&server)
            .fetch_shells(&ids(&["001000000000001"]))
            .await
            .unwrap_err();

        match err {
            DirectoryError::ApiError(status, body) => {
                assert_eq!(status, 401);
                assert!(body.contains("INVALID_SESSION_ID"));
            }
            other => panic!("expected ApiError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_page_becomes_parse_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path(format!("{}/query", API_PATH));
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"done": true, "records": "not a list"}"#);
            })
            .await;

        let err = directory_for(&server)
            .fetch_customers(&ids(&["001000000000001"]))
            .await
            .unwrap_err();
        assert!(matches!(err, DirectoryError::ParseError(_)));
    }

    #[tokio::test]
    async fn test_empty_chunk_skips_the_request() {
        let server = MockServer::start_async().await;
        let query = server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(500);
            })
            .await;

        let shells = directory_for(&server).fetch_shells(&[]).await.unwrap();
        assert!(shells.is_empty());
        query.assert_calls_async(0).await;
    }
}
