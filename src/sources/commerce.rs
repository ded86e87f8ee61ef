use crate::error::{ReconcileError, Result};
use crate::utils::{commerce_wire_date, DateRange};
use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::future::Future;

const COC_BASE_URL: &str = "https://api.checkoutchamp.com";
pub const RESULTS_PER_PAGE: u64 = 200;

/// Accepts numbers, numeric strings, or nothing at all; anything the
/// provider mangles becomes 0 rather than a deserialization error.
fn lenient_money<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

/// A purchased line item inside a completed order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub product_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_money")]
    pub price: f64,
}

impl LineItem {
    /// Upsell line items are marked by product type; the provider has used
    /// both spellings over time.
    pub fn is_upsell(&self) -> bool {
        matches!(
            self.product_type.as_deref().map(str::trim),
            Some(t) if t.eq_ignore_ascii_case("UPSALE") || t.eq_ignore_ascii_case("UPSELL")
        )
    }
}

/// A completed sale from `order/query`. Older deployments of the provider
/// return snake_case tag fields, hence the aliases.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_money")]
    pub total_amount: f64,
    #[serde(default, deserialize_with = "lenient_money")]
    pub base_shipping: f64,
    #[serde(default, deserialize_with = "lenient_money")]
    pub sales_tax: f64,
    #[serde(default, deserialize_with = "lenient_money")]
    pub surcharge: f64,
    #[serde(default, deserialize_with = "lenient_money")]
    pub ship_upcharge: f64,
    #[serde(default, deserialize_with = "lenient_money")]
    pub refund_amount: f64,
    #[serde(default, alias = "utm_medium")]
    pub utm_medium: Option<String>,
    #[serde(default, alias = "utm_content")]
    pub utm_content: Option<String>,
    #[serde(default)]
    pub items: Vec<LineItem>,
}

/// A declined sale attempt from `transactions/query`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub txn_type: Option<String>,
    #[serde(default, alias = "response_type")]
    pub response_type: Option<String>,
    #[serde(default, alias = "utm_medium")]
    pub utm_medium: Option<String>,
    #[serde(default, alias = "utm_content")]
    pub utm_content: Option<String>,
}

/// An abandoned/incomplete checkout from `leads/query`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialRecord {
    #[serde(default, alias = "utm_medium")]
    pub utm_medium: Option<String>,
    #[serde(default, alias = "utm_content")]
    pub utm_content: Option<String>,
}

/// One page of a filtered record query, reduced to what pagination needs.
#[derive(Debug, Clone)]
pub struct RecordPage<T> {
    pub success: bool,
    pub total_results: Option<u64>,
    pub records: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct QueryEnvelope<T> {
    result: Option<String>,
    message: Option<QueryMessage<T>>,
    // Some endpoints skip the message wrapper and put data at the top level.
    #[serde(default)]
    data: Option<Vec<T>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryMessage<T> {
    total_results: Option<u64>,
    data: Option<Vec<T>>,
}

impl<T> QueryEnvelope<T> {
    fn into_page(self) -> RecordPage<T> {
        let success = self
            .result
            .as_deref()
            .map(|r| r.eq_ignore_ascii_case("SUCCESS"))
            .unwrap_or(false);
        let (total_results, records) = match self.message {
            Some(message) => (message.total_results, message.data.unwrap_or_default()),
            None => (None, self.data.unwrap_or_default()),
        };
        RecordPage {
            success,
            total_results,
            records,
        }
    }
}

/// Drains every page of a filtered record query. Pages are requested from 1;
/// the provider-reported total is captured from the first page. Stops once
/// the accumulated count reaches that total, a page comes back empty, or the
/// provider signals a non-success result.
///
/// A failed fetch on the first page is the caller's error to record; a
/// failure later on keeps whatever was accumulated. No retries.
pub async fn fetch_all_pages<T, F, Fut>(mut fetch_page: F) -> Result<Vec<T>>
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = Result<RecordPage<T>>>,
{
    let mut records: Vec<T> = Vec::new();
    let mut reported_total: Option<u64> = None;
    let mut page = 1u64;

    loop {
        let fetched = match fetch_page(page).await {
            Ok(p) => p,
            Err(err) if page == 1 => return Err(err),
            Err(err) => {
                warn!(
                    "page {} fetch failed, keeping {} accumulated records: {}",
                    page,
                    records.len(),
                    err
                );
                break;
            }
        };

        if !fetched.success {
            break;
        }
        if reported_total.is_none() {
            reported_total = fetched.total_results;
        }
        if fetched.records.is_empty() {
            break;
        }
        records.extend(fetched.records);

        match reported_total {
            Some(total) if (records.len() as u64) >= total => break,
            _ => page += 1,
        }
    }

    Ok(records)
}

/// Server-side tag-equality filters applied to every record query.
#[derive(Debug, Clone, Default)]
pub struct UtmFilter {
    pub utm_campaign: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_content: Option<String>,
}

impl UtmFilter {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn for_campaign(name: impl Into<String>) -> Self {
        Self {
            utm_campaign: Some(name.into()),
            ..Self::default()
        }
    }
}

/// Client for the commerce back-office query API. Credentials ride along as
/// query parameters on every GET, which is how the provider authenticates.
#[derive(Clone)]
pub struct CommerceClient {
    client: reqwest::Client,
    login_id: String,
    password: String,
    base_url: String,
}

impl CommerceClient {
    pub fn new(login_id: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            login_id: login_id.into(),
            password: password.into(),
            base_url: COC_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Completed new-sale orders, all pages.
    pub async fn completed_orders(
        &self,
        campaign_id: u64,
        range: &DateRange,
        filter: &UtmFilter,
    ) -> Result<Vec<OrderRecord>> {
        let mut params = self.base_params(campaign_id, range, filter);
        params.push(("orderStatus".into(), "COMPLETE".into()));
        params.push(("orderType".into(), "NEW_SALE".into()));
        fetch_all_pages(move |page| self.query_page("order/query", params.clone(), page)).await
    }

    /// Declined sale attempts, all pages. May contain duplicates across
    /// pages; callers deduplicate by order id before counting.
    pub async fn declined_transactions(
        &self,
        campaign_id: u64,
        range: &DateRange,
        filter: &UtmFilter,
    ) -> Result<Vec<TransactionRecord>> {
        let mut params = self.base_params(campaign_id, range, filter);
        params.push(("txnType".into(), "SALE".into()));
        params.push(("responseType".into(), "DECLINED".into()));
        fetch_all_pages(move |page| self.query_page("transactions/query", params.clone(), page))
            .await
    }

    /// Abandoned/incomplete checkouts, all pages.
    pub async fn partial_orders(
        &self,
        campaign_id: u64,
        range: &DateRange,
        filter: &UtmFilter,
    ) -> Result<Vec<PartialRecord>> {
        let params = self.base_params(campaign_id, range, filter);
        fetch_all_pages(move |page| self.query_page("leads/query", params.clone(), page)).await
    }

    fn base_params(
        &self,
        campaign_id: u64,
        range: &DateRange,
        filter: &UtmFilter,
    ) -> Vec<(String, String)> {
        let mut params = vec![
            ("loginId".to_string(), self.login_id.clone()),
            ("password".to_string(), self.password.clone()),
            ("campaignId".to_string(), campaign_id.to_string()),
            ("startDate".to_string(), commerce_wire_date(range.start)),
            ("endDate".to_string(), commerce_wire_date(range.end)),
        ];
        if let Some(campaign) = &filter.utm_campaign {
            params.push(("utmCampaign".to_string(), campaign.clone()));
        }
        if let Some(medium) = &filter.utm_medium {
            params.push(("utmMedium".to_string(), medium.clone()));
        }
        if let Some(content) = &filter.utm_content {
            params.push(("utmContent".to_string(), content.clone()));
        }
        params
    }

    async fn query_page<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: Vec<(String, String)>,
        page: u64,
    ) -> Result<RecordPage<T>> {
        let url = format!("{}/{}/", self.base_url, endpoint);
        let response = self
            .client
            .get(&url)
            .query(&params)
            .query(&[
                ("page".to_string(), page.to_string()),
                ("resultsPerPage".to_string(), RESULTS_PER_PAGE.to_string()),
            ])
            .send()
            .await
            .map_err(|e| self.api_error(endpoint, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.api_error(endpoint, format!("HTTP {}: {}", status, body)));
        }

        let envelope: QueryEnvelope<T> = response
            .json()
            .await
            .map_err(|e| self.api_error(endpoint, format!("malformed response: {}", e)))?;
        Ok(envelope.into_page())
    }

    fn api_error(&self, endpoint: &str, message: String) -> ReconcileError {
        ReconcileError::CommerceApi {
            endpoint: endpoint.to_string(),
            message,
        }
    }
}
