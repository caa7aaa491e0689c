use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::app_config::env::env_parse;
use crate::trading::market::finnhub_client::get_finnhub_client;

/// 行情解析错误
#[derive(thiserror::Error, Debug)]
pub enum QuoteError {
    #[error("行情不可用: {ticker}: {reason}")]
    Unavailable { ticker: String, reason: String },
}

/// 价格来源：命中的是实时价、缓存价、过期缓存价还是数据库参考价
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteOrigin {
    Live,
    Cached,
    CachedStale,
    Reference,
}

#[derive(Debug, Clone)]
pub struct ResolvedQuote {
    pub ticker: String,
    pub price: f64,
    pub origin: QuoteOrigin,
}

/// 抽象：实时报价拉取方
#[async_trait]
pub trait QuoteFetcher: Send + Sync {
    async fn fetch_quote(&self, ticker: &str) -> anyhow::Result<f64>;
}

/// 抽象：价格解析入口，交易与快照统一注入此接口取价
///
/// 约定：返回的价格恒为正数；全链路取不到价时返回错误，调用方必须
/// 放弃该笔交易，不允许用 0 或猜测价继续。
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn resolve(
        &self,
        ticker: &str,
        reference: Option<f64>,
    ) -> Result<ResolvedQuote, QuoteError>;
}

struct CachedQuote {
    price: f64,
    fetched_at: Instant,
}

/// 进程内 TTL 报价缓存
///
/// 解析链：TTL 内缓存 -> 实时拉取 -> 过期缓存 -> 参考价 -> 报错。
/// 共享 map 无锁，同一 ticker 并发未命中允许重复拉取，时间戳后写覆盖即可。
pub struct QuoteCache {
    fetcher: Arc<dyn QuoteFetcher>,
    map: DashMap<String, CachedQuote>,
    ttl: Duration,
}

impl QuoteCache {
    pub fn new(fetcher: Arc<dyn QuoteFetcher>, ttl: Duration) -> Self {
        Self {
            fetcher,
            map: DashMap::new(),
            ttl,
        }
    }

    /// 按环境变量组装生产缓存（finnhub + PRICE_CACHE_TTL_SECS，默认 300 秒）
    pub fn from_env() -> Self {
        let ttl = Duration::from_secs(env_parse("PRICE_CACHE_TTL_SECS", 300u64));
        Self::new(Arc::new(get_finnhub_client()), ttl)
    }
}

#[async_trait]
impl PriceSource for QuoteCache {
    async fn resolve(
        &self,
        ticker: &str,
        reference: Option<f64>,
    ) -> Result<ResolvedQuote, QuoteError> {
        if let Some(entry) = self.map.get(ticker) {
            let age = entry.fetched_at.elapsed();
            if age < self.ttl {
                debug!("价格缓存命中 {}: {} (age: {}s)", ticker, entry.price, age.as_secs());
                return Ok(ResolvedQuote {
                    ticker: ticker.to_string(),
                    price: entry.price,
                    origin: QuoteOrigin::Cached,
                });
            }
        }

        match self.fetcher.fetch_quote(ticker).await {
            Ok(price) => {
                self.map.insert(
                    ticker.to_string(),
                    CachedQuote {
                        price,
                        fetched_at: Instant::now(),
                    },
                );
                debug!("实时拉取报价 {}: {}", ticker, price);
                Ok(ResolvedQuote {
                    ticker: ticker.to_string(),
                    price,
                    origin: QuoteOrigin::Live,
                })
            }
            Err(e) => {
                // 拉取失败：先退过期缓存，再退参考价
                if let Some(entry) = self.map.get(ticker) {
                    warn!("报价拉取失败，使用过期缓存 {}: {} ({})", ticker, entry.price, e);
                    return Ok(ResolvedQuote {
                        ticker: ticker.to_string(),
                        price: entry.price,
                        origin: QuoteOrigin::CachedStale,
                    });
                }
                match reference {
                    Some(price) if price > 0.0 => {
                        warn!("报价拉取失败且无缓存，使用数据库参考价 {}: {}", ticker, price);
                        Ok(ResolvedQuote {
                            ticker: ticker.to_string(),
                            price,
                            origin: QuoteOrigin::Reference,
                        })
                    }
                    _ => Err(QuoteError::Unavailable {
                        ticker: ticker.to_string(),
                        reason: e.to_string(),
                    }),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct ScriptedFetcher {
        price: Option<f64>,
        calls: AtomicU32,
    }

    impl ScriptedFetcher {
        fn ok(price: f64) -> Self {
            Self {
                price: Some(price),
                calls: AtomicU32::new(0),
            }
        }
        fn failing() -> Self {
            Self {
                price: None,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl QuoteFetcher for ScriptedFetcher {
        async fn fetch_quote(&self, ticker: &str) -> anyhow::Result<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.price {
                Some(p) => Ok(p),
                None => Err(anyhow::anyhow!("provider down for {}", ticker)),
            }
        }
    }

    #[tokio::test]
    async fn test_fresh_hit_skips_provider() {
        let fetcher = Arc::new(ScriptedFetcher::ok(42.5));
        let cache = QuoteCache::new(fetcher.clone(), Duration::from_secs(300));

        let first = cache.resolve("META", None).await.unwrap();
        assert_eq!(first.origin, QuoteOrigin::Live);
        assert_eq!(first.price, 42.5);

        let second = cache.resolve("META", None).await.unwrap();
        assert_eq!(second.origin, QuoteOrigin::Cached);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stale_cache_used_on_provider_failure() {
        // ttl = 0 让缓存条目立即过期，逼出过期缓存分支
        let warm = Arc::new(ScriptedFetcher::ok(100.0));
        let cache = QuoteCache::new(warm, Duration::from_secs(0));
        cache.resolve("NET", None).await.unwrap();

        let cache = QuoteCache {
            fetcher: Arc::new(ScriptedFetcher::failing()),
            map: cache.map,
            ttl: Duration::from_secs(0),
        };
        let resolved = cache.resolve("NET", Some(55.0)).await.unwrap();
        assert_eq!(resolved.origin, QuoteOrigin::CachedStale);
        assert_eq!(resolved.price, 100.0);
    }

    #[tokio::test]
    async fn test_reference_price_on_cold_cache() {
        let cache = QuoteCache::new(Arc::new(ScriptedFetcher::failing()), Duration::from_secs(300));
        let resolved = cache.resolve("MRNA", Some(87.3)).await.unwrap();
        assert_eq!(resolved.origin, QuoteOrigin::Reference);
        assert_eq!(resolved.price, 87.3);
    }

    #[tokio::test]
    async fn test_no_price_anywhere_is_an_error() {
        let cache = QuoteCache::new(Arc::new(ScriptedFetcher::failing()), Duration::from_secs(300));
        let err = cache.resolve("KIND", None).await;
        assert!(err.is_err());

        // 参考价为 0 视同缺失，绝不返回非正价格
        let err = cache.resolve("KIND", Some(0.0)).await;
        assert!(err.is_err());
    }
}
