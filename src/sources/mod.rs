pub mod ads;
pub mod commerce;

pub use ads::{AdsClient, InsightRow};
pub use commerce::{
    fetch_all_pages, CommerceClient, LineItem, OrderRecord, PartialRecord, RecordPage,
    TransactionRecord, UtmFilter,
};
