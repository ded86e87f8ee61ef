use crate::error::Result;
use crate::hierarchy::{build_commerce_tree, campaign_totals};
use crate::merge::{merge_hierarchy, AccountReport};
use crate::schema::{AdAccountScope, ClientConfig, ClientRoster};
use crate::sources::ads::AdsClient;
use crate::sources::commerce::CommerceClient;
use crate::spend::{build_spend_tree, CampaignSpend, ScopeName};
use crate::utils::DateRange;
use futures::future::join_all;
use log::{debug, error, info};
use serde::Serialize;

/// A whole-scope failure, reported alongside the successful accounts so the
/// routing layer can return partial results.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeFailure {
    pub fb_ad_account_id: String,
    pub coc_campaign_name: String,
    pub error: String,
}

/// The full reconciliation result for one client and date range.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardReport {
    pub client_id: String,
    pub client_name: String,
    pub start_date: chrono::NaiveDate,
    pub end_date: chrono::NaiveDate,
    pub ad_accounts: Vec<AccountReport>,
    pub errors: Vec<ScopeFailure>,
}

/// Current range plus the equally long range immediately before it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardComparison {
    pub current: DashboardReport,
    pub previous: DashboardReport,
}

/// The campaign names discovered on the spend side, in discovery order.
/// These drive the commerce-side tag queries: the two providers share no
/// identifiers, only names.
pub fn campaign_names(spend_tree: &[CampaignSpend]) -> Vec<ScopeName> {
    spend_tree.iter().map(|c| c.name.clone()).collect()
}

/// Both provider clients for one configured client. Credentials are
/// client-level, so one pair serves every ad account.
fn provider_clients(client: &ClientConfig) -> (AdsClient, CommerceClient) {
    (
        AdsClient::new(&client.fb_access_token),
        CommerceClient::new(&client.coc_login_id, &client.coc_password),
    )
}

/// Runs the two-phase pipeline for one ad account: spend hierarchy and
/// unfiltered commerce totals concurrently, then the name-driven commerce
/// hierarchy, then the merge. The commerce fetch cannot start earlier
/// because its filter values come out of the spend tree.
pub async fn process_ad_account(
    client: &ClientConfig,
    scope: &AdAccountScope,
    range: &DateRange,
) -> Result<AccountReport> {
    let (ads, commerce) = provider_clients(client);
    process_ad_account_with(&ads, &commerce, scope, range).await
}

pub async fn process_ad_account_with(
    ads: &AdsClient,
    commerce: &CommerceClient,
    scope: &AdAccountScope,
    range: &DateRange,
) -> Result<AccountReport> {
    info!(
        "processing ad account {} ({})",
        scope.fb_ad_account_id, scope.coc_campaign_name
    );

    let (rows, coc_totals) = tokio::join!(
        ads.fetch_insight_rows(&scope.fb_ad_account_id, range),
        campaign_totals(commerce, scope.coc_campaign_id, range),
    );
    let rows = rows?;

    let spend_tree = build_spend_tree(&rows);
    let names = campaign_names(&spend_tree);
    debug!(
        "{}: {} campaigns discovered on the spend side",
        scope.fb_ad_account_id,
        names.len()
    );

    let commerce_tree =
        build_commerce_tree(commerce, scope.coc_campaign_id, range, &names).await;

    let mut report = merge_hierarchy(&spend_tree, &commerce_tree, scope);
    report.coc_totals = coc_totals;
    Ok(report)
}

/// Builds the dashboard for every ad account of a client. Accounts are
/// independent and run concurrently; one account's failure becomes a
/// `ScopeFailure` entry and never aborts the others. Results are re-sorted
/// by commerce campaign name once everything has completed.
pub async fn build_dashboard(client: &ClientConfig, range: &DateRange) -> DashboardReport {
    let (ads, commerce) = provider_clients(client);
    build_dashboard_with(&ads, &commerce, client, range).await
}

pub async fn build_dashboard_with(
    ads: &AdsClient,
    commerce: &CommerceClient,
    client: &ClientConfig,
    range: &DateRange,
) -> DashboardReport {
    info!(
        "building dashboard for client '{}' over {}..{}",
        client.id, range.start, range.end
    );

    let outcomes = join_all(client.ad_accounts.iter().map(|scope| async move {
        let outcome = process_ad_account_with(ads, commerce, scope, range).await;
        (scope, outcome)
    }))
    .await;

    let mut ad_accounts = Vec::new();
    let mut errors = Vec::new();
    for (scope, outcome) in outcomes {
        match outcome {
            Ok(report) => ad_accounts.push(report),
            Err(err) => {
                error!(
                    "ad account {} failed: {}",
                    scope.fb_ad_account_id, err
                );
                errors.push(ScopeFailure {
                    fb_ad_account_id: scope.fb_ad_account_id.clone(),
                    coc_campaign_name: scope.coc_campaign_name.clone(),
                    error: err.to_string(),
                });
            }
        }
    }

    ad_accounts.sort_by(|a, b| a.coc_campaign_name.cmp(&b.coc_campaign_name));

    DashboardReport {
        client_id: client.id.clone(),
        client_name: client.name.clone(),
        start_date: range.start,
        end_date: range.end,
        ad_accounts,
        errors,
    }
}

/// Looks the client up in the roster first; an unknown id is a request-level
/// failure, not a partial result.
pub async fn dashboard_for_client(
    roster: &ClientRoster,
    client_id: &str,
    range: &DateRange,
) -> Result<DashboardReport> {
    let client = roster.client_by_id(client_id)?;
    Ok(build_dashboard(client, range).await)
}

/// Builds the dashboard for the requested range and for the equally long
/// range immediately preceding it, concurrently.
pub async fn build_comparison(client: &ClientConfig, range: &DateRange) -> DashboardComparison {
    let prior = range.prior_equivalent();
    let (current, previous) = tokio::join!(
        build_dashboard(client, range),
        build_dashboard(client, &prior),
    );
    DashboardComparison { current, previous }
}
