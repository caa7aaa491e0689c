use serde::Serialize;
use tracing::{error, info};

use crate::trading::market::price_cache::PriceSource;
use crate::trading::store::LedgerStore;

#[derive(Debug, Serialize)]
pub struct SyncReport {
    pub total: usize,
    pub updated: usize,
    pub failed: usize,
}

/// 把实时价回写到参考价字段
///
/// 参考价是行情断供时快照与执行价的最后兜底，单个标的失败只跳过，
/// 同步时不允许再拿旧参考价兜底，否则陈价会被原样写回。
pub async fn sync_reference_prices(
    store: &dyn LedgerStore,
    prices: &dyn PriceSource,
) -> anyhow::Result<SyncReport> {
    let instruments = store.tradable_instruments().await?;
    let mut updated = 0usize;
    let mut failed = 0usize;

    for instrument in &instruments {
        match prices.resolve(&instrument.ticker, None).await {
            Ok(quote) => match store.update_reference_price(instrument.pitch_id, quote.price).await {
                Ok(_) => {
                    updated += 1;
                    info!("📊 {}: ${:.2} 参考价已更新 ({:?})", instrument.ticker, quote.price, quote.origin);
                }
                Err(e) => {
                    failed += 1;
                    error!("参考价写入失败 {}: {}", instrument.ticker, e);
                }
            },
            Err(e) => {
                failed += 1;
                error!("行情获取失败 {}: {}", instrument.ticker, e);
            }
        }
    }

    info!(
        "参考价同步完成 total={} updated={} failed={}",
        instruments.len(),
        updated,
        failed
    );
    Ok(SyncReport { total: instruments.len(), updated, failed })
}
