use crate::metrics::{aggregate, CommerceMetrics};
use crate::sources::commerce::{
    CommerceClient, OrderRecord, PartialRecord, TransactionRecord, UtmFilter,
};
use crate::spend::ScopeName;
use crate::utils::DateRange;
use log::{debug, error, warn};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Commerce-side metrics for one adset tag, with per-ad breakdowns.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommerceAdset {
    pub coc_data: CommerceMetrics,
    pub ads: HashMap<String, CommerceMetrics>,
}

/// Commerce-side data for one campaign name discovered on the spend side.
/// `coc_data: None` with an attached error records a failed lookup without
/// touching sibling names.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommerceCampaign {
    pub coc_data: Option<CommerceMetrics>,
    pub adsets: HashMap<String, CommerceAdset>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommerceCampaign {
    fn failed(message: String) -> Self {
        Self {
            coc_data: None,
            adsets: HashMap::new(),
            error: Some(message),
        }
    }
}

pub type CommerceTree = HashMap<ScopeName, CommerceCampaign>;

/// Fetches and groups commerce data for every campaign name discovered on
/// the spend side. Names are processed one at a time to bound simultaneous
/// load on the commerce API; the three record-type queries for a single name
/// run concurrently.
pub async fn build_commerce_tree(
    client: &CommerceClient,
    campaign_id: u64,
    range: &DateRange,
    campaign_names: &[ScopeName],
) -> CommerceTree {
    let mut tree = CommerceTree::new();
    for name in campaign_names {
        let entry = fetch_campaign_entry(client, campaign_id, range, name).await;
        tree.insert(name.clone(), entry);
    }
    tree
}

async fn fetch_campaign_entry(
    client: &CommerceClient,
    campaign_id: u64,
    range: &DateRange,
    name: &ScopeName,
) -> CommerceCampaign {
    let filter = UtmFilter::for_campaign(name.as_str());
    let (orders, declines, partials) = tokio::join!(
        client.completed_orders(campaign_id, range, &filter),
        client.declined_transactions(campaign_id, range, &filter),
        client.partial_orders(campaign_id, range, &filter),
    );

    // The sales query carries the revenue; its failure marks this name
    // failed. Decline/partial query failures degrade to empty instead.
    let orders = match orders {
        Ok(orders) => orders,
        Err(err) => {
            error!("commerce lookup failed for campaign '{}': {}", name, err);
            return CommerceCampaign::failed(err.to_string());
        }
    };
    let declines = declines.unwrap_or_else(|err| {
        warn!("decline query failed for campaign '{}': {}", name, err);
        Vec::new()
    });
    let partials = partials.unwrap_or_else(|err| {
        warn!("partials query failed for campaign '{}': {}", name, err);
        Vec::new()
    });

    debug!(
        "campaign '{}': {} orders, {} decline rows, {} partials",
        name,
        orders.len(),
        declines.len(),
        partials.len()
    );

    let (metrics, adsets) = group_records(&orders, &declines, &partials);
    CommerceCampaign {
        coc_data: Some(metrics),
        adsets,
        error: None,
    }
}

/// Account-level commerce totals with no tag filter applied.
pub async fn campaign_totals(
    client: &CommerceClient,
    campaign_id: u64,
    range: &DateRange,
) -> Option<CommerceMetrics> {
    let filter = UtmFilter::none();
    let (orders, declines, partials) = tokio::join!(
        client.completed_orders(campaign_id, range, &filter),
        client.declined_transactions(campaign_id, range, &filter),
        client.partial_orders(campaign_id, range, &filter),
    );

    let orders = match orders {
        Ok(orders) => orders,
        Err(err) => {
            warn!("account totals query failed: {}", err);
            return None;
        }
    };
    let declines = declines.unwrap_or_default();
    let partials = partials.unwrap_or_default();

    let deduped = dedup_declines(&declines);
    Some(aggregate(&orders, deduped.len() as u64, partials.len() as u64))
}

/// The commerce API can report the same declined attempt on more than one
/// page; collapse by order id. Records without an id have nothing to collide
/// on and are kept.
pub fn dedup_declines(declines: &[TransactionRecord]) -> Vec<&TransactionRecord> {
    let mut seen: HashSet<&str> = HashSet::new();
    declines
        .iter()
        .filter(|txn| match txn.order_id.as_deref() {
            Some(id) => seen.insert(id),
            None => true,
        })
        .collect()
}

#[derive(Default)]
struct ScopeBucket<'a> {
    orders: Vec<&'a OrderRecord>,
    declines: u64,
    partials: u64,
}

impl<'a> ScopeBucket<'a> {
    fn metrics(&self) -> CommerceMetrics {
        let orders: Vec<OrderRecord> = self.orders.iter().map(|o| (*o).clone()).collect();
        aggregate(&orders, self.declines, self.partials)
    }
}

#[derive(Default)]
struct AdsetBucket<'a> {
    scope: ScopeBucket<'a>,
    ads: HashMap<String, ScopeBucket<'a>>,
}

fn tag(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Groups raw records by the medium tag into adsets, then the content tag
/// into ads, tagging each record by its status as it lands. Metrics at every
/// level come from that level's own records, not from rolling up children.
pub fn group_records(
    orders: &[OrderRecord],
    declines: &[TransactionRecord],
    partials: &[PartialRecord],
) -> (CommerceMetrics, HashMap<String, CommerceAdset>) {
    let deduped = dedup_declines(declines);

    let mut adsets: HashMap<String, AdsetBucket> = HashMap::new();

    for order in orders {
        let Some(medium) = tag(&order.utm_medium) else {
            continue;
        };
        let bucket = adsets.entry(medium).or_default();
        bucket.scope.orders.push(order);
        if let Some(content) = tag(&order.utm_content) {
            bucket.ads.entry(content).or_default().orders.push(order);
        }
    }

    for txn in &deduped {
        let Some(medium) = tag(&txn.utm_medium) else {
            continue;
        };
        let bucket = adsets.entry(medium).or_default();
        bucket.scope.declines += 1;
        if let Some(content) = tag(&txn.utm_content) {
            bucket.ads.entry(content).or_default().declines += 1;
        }
    }

    for partial in partials {
        let Some(medium) = tag(&partial.utm_medium) else {
            continue;
        };
        let bucket = adsets.entry(medium).or_default();
        bucket.scope.partials += 1;
        if let Some(content) = tag(&partial.utm_content) {
            bucket.ads.entry(content).or_default().partials += 1;
        }
    }

    let campaign_metrics = aggregate(orders, deduped.len() as u64, partials.len() as u64);

    let adsets = adsets
        .into_iter()
        .map(|(medium, bucket)| {
            let ads = bucket
                .ads
                .iter()
                .map(|(content, scope)| (content.clone(), scope.metrics()))
                .collect();
            (
                medium,
                CommerceAdset {
                    coc_data: bucket.scope.metrics(),
                    ads,
                },
            )
        })
        .collect();

    (campaign_metrics, adsets)
}
