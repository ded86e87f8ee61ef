use crate::engine;
use crate::error::Result;
use crate::merge::{MergedAdset, MergedCampaign};
use crate::schema::{AdAccountScope, ClientConfig};
use crate::utils::{trailing_week, yesterday, DateRange};
use chrono::NaiveDate;
use log::info;
use serde::Serialize;
use std::cmp::Ordering;

pub const DEFAULT_THRESHOLD_PCT: f64 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagLevel {
    Adset,
    Ad,
}

/// One node whose single-day cost-per-purchase is notably above its
/// trailing-window behavior or the account baseline.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CppFlag {
    pub level: FlagLevel,
    pub campaign: String,
    pub adset: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ad: Option<String>,
    pub fb_spend: f64,
    pub day_cpp: f64,
    /// None when the node has no match in the trailing-window tree.
    pub week_cpp: Option<f64>,
    pub vs_week_pct: Option<f64>,
    pub vs_account_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vs_target_pct: Option<f64>,
    pub is_rising: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CppReport {
    pub account_avg_cpp: f64,
    pub spend_floor: f64,
    pub threshold_pct: f64,
    pub flags: Vec<CppFlag>,
}

fn pct_deviation(value: f64, baseline: f64) -> Option<f64> {
    if baseline > 0.0 {
        Some((value - baseline) / baseline * 100.0)
    } else {
        None
    }
}

/// Compares the single-day merged tree against the trailing-window tree and
/// flags every adset/ad whose CPP deviation (vs its own trailing value, or
/// vs the account average) exceeds `threshold_pct`. Only nodes with at
/// least `spend_floor` of single-day spend and a nonzero CPP are considered.
pub fn detect_cpp_anomalies(
    day: &[MergedCampaign],
    week: &[MergedCampaign],
    spend_floor: f64,
    threshold_pct: f64,
    cpp_target: Option<f64>,
) -> CppReport {
    // Account baseline: trailing-window spend per trailing-window purchase.
    let week_spend: f64 = week.iter().map(|c| c.fb_spend).sum();
    let week_sales: u64 = week
        .iter()
        .filter_map(|c| c.coc_data.as_ref())
        .map(|m| m.sales)
        .sum();
    let account_avg_cpp = if week_sales > 0 {
        week_spend / week_sales as f64
    } else {
        0.0
    };

    let mut flags = Vec::new();

    for campaign in day {
        let week_campaign = week.iter().find(|c| c.name == campaign.name);

        for adset in &campaign.adsets {
            let week_adset = week_campaign
                .and_then(|c| c.adsets.iter().find(|a| a.name == adset.name));

            evaluate_node(
                &mut flags,
                FlagLevel::Adset,
                campaign.name.to_string(),
                adset.name.to_string(),
                None,
                adset.fb_spend,
                adset.cpp,
                week_adset.map(|a| a.cpp),
                account_avg_cpp,
                spend_floor,
                threshold_pct,
                cpp_target,
            );

            for ad in &adset.ads {
                let week_ad = week_adset.and_then(|a: &MergedAdset| {
                    a.ads.iter().find(|w| w.name == ad.name)
                });
                evaluate_node(
                    &mut flags,
                    FlagLevel::Ad,
                    campaign.name.to_string(),
                    adset.name.to_string(),
                    Some(ad.name.to_string()),
                    ad.fb_spend,
                    ad.cpp,
                    week_ad.map(|w| w.cpp),
                    account_avg_cpp,
                    spend_floor,
                    threshold_pct,
                    cpp_target,
                );
            }
        }
    }

    // Worst week-over-week offenders first; nodes with no trailing match at
    // the end.
    flags.sort_by(|a, b| match (a.vs_week_pct, b.vs_week_pct) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    CppReport {
        account_avg_cpp,
        spend_floor,
        threshold_pct,
        flags,
    }
}

#[allow(clippy::too_many_arguments)]
fn evaluate_node(
    flags: &mut Vec<CppFlag>,
    level: FlagLevel,
    campaign: String,
    adset: String,
    ad: Option<String>,
    fb_spend: f64,
    day_cpp: f64,
    week_cpp: Option<f64>,
    account_avg_cpp: f64,
    spend_floor: f64,
    threshold_pct: f64,
    cpp_target: Option<f64>,
) {
    if fb_spend < spend_floor || day_cpp <= 0.0 {
        return;
    }

    let vs_week_pct = week_cpp.and_then(|base| pct_deviation(day_cpp, base));
    let vs_account_pct = pct_deviation(day_cpp, account_avg_cpp);
    let vs_target_pct = cpp_target.and_then(|target| pct_deviation(day_cpp, target));

    let over = |dev: Option<f64>| matches!(dev, Some(pct) if pct > threshold_pct);
    if !over(vs_week_pct) && !over(vs_account_pct) {
        return;
    }

    flags.push(CppFlag {
        level,
        campaign,
        adset,
        ad,
        fb_spend,
        day_cpp,
        week_cpp,
        vs_week_pct,
        vs_account_pct,
        vs_target_pct,
        is_rising: matches!(vs_week_pct, Some(pct) if pct > 0.0),
    });
}

/// The trend view returned to the routing layer for one ad account.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendReport {
    pub fb_ad_account_id: String,
    pub coc_campaign_name: String,
    pub day_range: DateRange,
    pub week_range: DateRange,
    #[serde(flatten)]
    pub report: CppReport,
}

/// Runs the full account pipeline twice, once for yesterday and once for
/// the trailing seven days, and diffs the merged outputs into CPP flags.
pub async fn analyze_account_trends(
    client: &ClientConfig,
    scope: &AdAccountScope,
    today: NaiveDate,
    spend_floor: f64,
    threshold_pct: f64,
) -> Result<TrendReport> {
    let day_range = yesterday(today);
    let week_range = trailing_week(today);
    info!(
        "analyzing CPP trends for {} ({} vs {}..{})",
        scope.fb_ad_account_id, day_range.start, week_range.start, week_range.end
    );

    let (day, week) = tokio::join!(
        engine::process_ad_account(client, scope, &day_range),
        engine::process_ad_account(client, scope, &week_range),
    );
    let day = day?;
    let week = week?;

    let report = detect_cpp_anomalies(
        &day.campaigns,
        &week.campaigns,
        spend_floor,
        threshold_pct,
        scope.cpp_target,
    );

    Ok(TrendReport {
        fb_ad_account_id: scope.fb_ad_account_id.clone(),
        coc_campaign_name: scope.coc_campaign_name.clone(),
        day_range,
        week_range,
        report,
    })
}
