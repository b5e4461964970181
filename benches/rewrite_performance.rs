//! Benchmarks for request rewriting and cache hits
//!
//! Rewriting runs on every request, so it should stay well under a
//! microsecond. The cache-hit benchmark covers the whole router path.

use axum::body::Body;
use criterion::{criterion_group, criterion_main, Criterion};
use http::Request;
use movie_cache_proxy::proxy::cache_store::{CacheStore, CachedResponse, MemoryCacheStore};
use movie_cache_proxy::proxy::types::*;
use movie_cache_proxy::proxy::url_resolver::UrlResolver;
use movie_cache_proxy::proxy::{HttpUpstreamClient, ProxyService};
use std::hint::black_box;
use std::sync::Arc;
use tower::ServiceExt;

fn bench_rewrite(c: &mut Criterion) {
    let mut group = c.benchmark_group("rewrite");
    let resolver = UrlResolver::default();

    for (name, raw) in [
        ("api_no_query", "/movie/550"),
        ("api_with_language", "/search/multi?query=star%20wars&language=en-US&page=2"),
        ("image", "/kqjL17yufvn9OVLyXYpvtyrFfak.jpg"),
        ("comments", "/comments?movieId=550"),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| black_box(resolver.classify_raw(black_box(raw))));
        });
    }

    group.finish();
}

fn bench_cache_hit(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("runtime");

    let config = ProxyConfig::default();
    let store = Arc::new(MemoryCacheStore::new());
    let key = UpstreamUrl::try_new("http://api.themoviedb.org/3/movie/550?language=fr-FR".to_string())
        .expect("valid URL");
    let entry = CachedResponse::new(
        200,
        Some("application/json".to_string()),
        bytes::Bytes::from(vec![b'x'; 16 * 1024]),
    );
    runtime
        .block_on(store.put(&key, &entry))
        .expect("store entry");

    let upstream = HttpUpstreamClient::new(&config).expect("client");
    let router = ProxyService::new(config, store, Arc::new(upstream)).into_router();

    c.bench_function("cache_hit_16kb", |b| {
        b.to_async(&runtime).iter(|| {
            let router = router.clone();
            async move {
                let response = router
                    .oneshot(Request::builder().uri("/movie/550").body(Body::empty()).unwrap())
                    .await
                    .unwrap();
                black_box(response.status())
            }
        });
    });
}

criterion_group!(benches, bench_rewrite, bench_cache_hit);
criterion_main!(benches);
