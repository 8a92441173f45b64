use serde::{Deserialize, Serialize};
use soba_cache::mem::MemCache;
use soba_core::cache::port::{Cache, CacheExt};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct QuoteSnapshot {
    symbol: String,
    price: f64,
}

#[tokio::test]
async fn test_mem_cache_raw_ops() {
    let cache = MemCache::new();
    let key = "raw_key";
    let value = vec![1, 2, 3, 4];

    // 测试存取
    cache.set_raw(key, value.clone()).await.unwrap();
    let result = cache.get_raw(key).await.unwrap().unwrap();
    assert_eq!(result, value);

    // 测试删除
    cache.del(key).await.unwrap();
    let result = cache.get_raw(key).await.unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn test_mem_cache_typed_ops() {
    let cache = MemCache::new();
    let key = "q:BTC/USD";
    let snapshot = QuoteSnapshot {
        symbol: "BTC/USD".to_string(),
        price: 64230.5,
    };

    cache.set(key, &snapshot).await.unwrap();

    let result: QuoteSnapshot = cache.get(key).await.unwrap().unwrap();
    assert_eq!(result, snapshot);

    // 覆盖写入后读到新值
    let newer = QuoteSnapshot {
        symbol: "BTC/USD".to_string(),
        price: 64231.0,
    };
    cache.set(key, &newer).await.unwrap();
    let result: QuoteSnapshot = cache.get(key).await.unwrap().unwrap();
    assert_eq!(result, newer);
}
