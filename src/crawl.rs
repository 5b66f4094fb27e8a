//! Runs every configured source at once and gathers what they produce.
//!
//! Sources are independent: each gets its own task and its own fetch
//! session, and a source that fails, times out, or even panics only costs
//! that source's documents. The batch is assembled in the order sources
//! finish.

use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument};

use crate::config::CrawlConfig;
use crate::fetch::FetchProvider;
use crate::models::{CrawlBatch, Source};
use crate::scrapers::SourceExtractor;

/// Crawl all `extractors` concurrently and wait for every one to settle.
///
/// Never fails. An empty batch means no source produced anything; deciding
/// what that means is up to the caller.
#[instrument(level = "info", skip_all, fields(sources = extractors.len()))]
pub async fn run_all(
    extractors: &[Arc<dyn SourceExtractor>],
    provider: Arc<dyn FetchProvider>,
    config: &CrawlConfig,
) -> CrawlBatch {
    let t0 = Instant::now();
    let config = Arc::new(config.clone());

    let mut running: FuturesUnordered<_> = extractors
        .iter()
        .map(|extractor| {
            let source = extractor.source();
            let extractor = Arc::clone(extractor);
            let provider = Arc::clone(&provider);
            let config = Arc::clone(&config);
            let handle = tokio::spawn(async move {
                extractor.crawl(provider.as_ref(), &config).await
            });
            async move { (source, handle.await) }
        })
        .collect();

    let mut batch = CrawlBatch::new();
    let mut counts: Vec<(Source, usize)> = Vec::with_capacity(extractors.len());
    while let Some((source, joined)) = running.next().await {
        match joined {
            Ok(documents) => {
                info!(%source, count = documents.len(), "Source settled");
                counts.push((source, documents.len()));
                batch.extend(documents);
            }
            Err(e) => {
                error!(%source, error = %e, "Source task did not complete; continuing without it");
                counts.push((source, 0));
            }
        }
    }

    info!(
        total = batch.len(),
        per_source = ?counts,
        elapsed_ms = t0.elapsed().as_millis() as u64,
        "Crawl finished"
    );
    batch
}
