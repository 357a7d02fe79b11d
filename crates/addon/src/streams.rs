//! The stream search pipeline.
//!
//! One request becomes one pipeline run. The single source record fans
//! out per enabled indexer (and, for series, per search variant), every
//! search hit becomes its own record, and the stages progressively
//! parse, filter, rank, enrich and cross-reference the candidates until
//! the sink has collected enough playable streams to stop the run
//! early.

use crate::clients::{DebridService, MetaProvider, TorrentSearcher};
use crate::filters;
use crate::manifest::{StreamBehaviorHints, StreamItem};
use crate::rank;
use anyhow::Context;
use dashmap::DashMap;
use debrid::CachedFile;
use indexer::{Indexer, Torrent};
use media::files::FileRef;
use media::{detector, files, MetaInfo, TitleInfo};
use pipeline::{Pipeline, StageOptions};
use shared::types::{ContentType, StreamId};
use shared::FingerprintCache;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, warn};

// Infohash resolution is pure I/O; it gets a wider worker pool than the
// other stages.
const ENRICH_CONCURRENCY: usize = 10;

/// Unit of work flowing through the stages, enriched as it goes.
/// Cloned on every fan-out; shared parts sit behind `Arc`.
#[derive(Clone)]
pub struct StreamRecord {
    pub stream_id: StreamId,
    /// `scheme://host/{userData}` prefix for download URLs
    pub base_url: String,
    pub client_ip: String,
    pub meta: Option<Arc<MetaInfo>>,
    pub indexer: Option<Arc<Indexer>>,
    pub torrent: Option<Torrent>,
    pub title_info: Option<TitleInfo>,
    /// Series only: this branch searches for whole-season packs
    pub search_by_season: bool,
    pub cached_files: Vec<CachedFile>,
    pub media_file: Option<CachedFile>,
}

impl StreamRecord {
    fn new(stream_id: StreamId, base_url: String, client_ip: String) -> Self {
        Self {
            stream_id,
            base_url,
            client_ip,
            meta: None,
            indexer: None,
            torrent: None,
            title_info: None,
            search_by_season: false,
            cached_files: Vec::new(),
            media_file: None,
        }
    }

    fn info_hash(&self) -> Option<&str> {
        self.torrent.as_ref()?.info_hash.as_deref()
    }
}

/// Immutable per-request context captured by the stage closures
pub(crate) struct StreamsContext {
    pub searcher: Arc<dyn TorrentSearcher>,
    pub debrid: Arc<dyn DebridService>,
    pub metadata: Arc<dyn MetaProvider>,
    pub cache: Arc<FingerprintCache>,
    /// Infohashes already emitted in this request
    pub seen_hashes: DashMap<String, ()>,
    pub addon_name: String,
}

/// Run the pipeline for one request and collect up to `max_results`
/// stream items. Collaborator failures inside stages drop records;
/// engine-level failures are logged and whatever was collected so far
/// is returned.
pub(crate) async fn collect_streams(
    ctx: Arc<StreamsContext>,
    stream_id: StreamId,
    base_url: String,
    client_ip: String,
    max_results: usize,
) -> Vec<StreamItem> {
    let content_type = stream_id.content_type;
    let initial = StreamRecord::new(stream_id, base_url, client_ip);

    let mut p = Pipeline::new(move || async move { Ok(vec![initial]) });

    // Resolve the canonical name and release window first; nothing
    // downstream can filter without it.
    let stage_ctx = ctx.clone();
    p.map(move |mut record: StreamRecord| {
        let ctx = stage_ctx.clone();
        async move {
            let meta = match record.stream_id.content_type {
                ContentType::Movie => ctx.metadata.movie(&record.stream_id.imdb_id).await,
                ContentType::Series => ctx.metadata.series(&record.stream_id.imdb_id).await,
            }
            .context("failed to fetch content metadata")?;

            record.meta = Some(Arc::new(meta));
            Ok(record)
        }
    });

    // One record per enabled indexer
    let stage_ctx = ctx.clone();
    p.fan_out(move |record: StreamRecord| {
        let ctx = stage_ctx.clone();
        async move {
            let indexers = ctx
                .searcher
                .get_all_indexers()
                .await
                .context("couldn't load indexers")?;

            Ok(indexers
                .into_iter()
                .map(|indexer| {
                    let mut branch = record.clone();
                    branch.indexer = Some(Arc::new(indexer));
                    branch
                })
                .collect())
        }
    });

    // Series also search for whole-season packs
    if content_type == ContentType::Series {
        p.fan_out(|record: StreamRecord| async move {
            let mut by_season = record.clone();
            by_season.search_by_season = true;
            Ok(vec![record, by_season])
        });
    }

    let stage_ctx = ctx.clone();
    p.channel(move |record, token, out| {
        let ctx = stage_ctx.clone();
        async move { search_torrents(ctx, record, token, out).await }
    });

    p.map(|mut record: StreamRecord| async move {
        if let Some(torrent) = &record.torrent {
            record.title_info = Some(detector::parse(&torrent.title));
        }
        Ok(record)
    });

    p.filter(|record: &StreamRecord| {
        let (Some(meta), Some(title_info), Some(torrent)) =
            (&record.meta, &record.title_info, &record.torrent)
        else {
            return false;
        };
        filters::should_keep(meta, &record.stream_id, title_info, torrent.imdb_id)
    });

    // Put the candidates most worth enriching in front before paying
    // for infohash resolution.
    p.shuffle(rank::prefer_confirmed_then_quality);

    let stage_ctx = ctx.clone();
    p.fan_out_opts(
        move |mut record: StreamRecord| {
            let ctx = stage_ctx.clone();
            async move {
                let hash = match &record.torrent {
                    None => return Ok(Vec::new()),
                    Some(torrent) => {
                        match ctx.searcher.fetch_info_hash(torrent, &ctx.cache).await {
                            Ok(hash) => hash,
                            Err(err) => {
                                debug!("Failed to resolve infohash: {}", err);
                                return Ok(Vec::new());
                            }
                        }
                    }
                };

                if let Some(torrent) = record.torrent.as_mut() {
                    torrent.info_hash = Some(hash);
                }
                Ok(vec![record])
            }
        },
        StageOptions {
            concurrency: ENRICH_CONCURRENCY,
            ..Default::default()
        },
    );

    // Concurrent enrichment workers race; the insert is what decides
    // which record of a duplicate pair survives.
    let stage_ctx = ctx.clone();
    p.filter(move |record: &StreamRecord| {
        let Some(hash) = record.info_hash() else {
            return false;
        };
        stage_ctx.seen_hashes.insert(hash.to_string(), ()).is_none()
    });

    // One availability call per batch of records
    let stage_ctx = ctx.clone();
    p.batch(move |records: Vec<StreamRecord>| {
        let ctx = stage_ctx.clone();
        async move {
            let hashes: Vec<String> = records
                .iter()
                .filter_map(|record| record.info_hash().map(str::to_string))
                .collect();

            let available = match ctx.debrid.get_files(&hashes).await {
                Ok(available) => available,
                Err(err) => {
                    warn!("Instant availability lookup failed: {}", err);
                    return Ok(Vec::new());
                }
            };

            let mut cached = Vec::new();
            for mut record in records {
                let Some(files) = record.info_hash().and_then(|hash| available.get(hash)) else {
                    continue;
                };
                if files.is_empty() {
                    continue;
                }
                record.cached_files = files.clone();
                cached.push(record);
            }
            Ok(cached)
        }
    });

    p.fan_out(|mut record: StreamRecord| async move {
        let refs: Vec<FileRef> = record
            .cached_files
            .iter()
            .enumerate()
            .map(|(index, file)| FileRef {
                index,
                name: &file.filename,
                size: file.filesize,
            })
            .collect();

        let best = match record.stream_id.content_type {
            ContentType::Movie => files::best_movie_file(&refs),
            ContentType::Series => files::best_episode_file(
                &refs,
                record.stream_id.season,
                record.stream_id.episode,
            ),
        };

        match best {
            Some(found) => {
                let index = found.index;
                record.media_file = Some(record.cached_files[index].clone());
                Ok(vec![record])
            }
            None => Ok(Vec::new()),
        }
    });

    p.shuffle(rank::higher_resolution_then_larger_file);

    let handle = p.handle();
    let results = Arc::new(Mutex::new(Vec::with_capacity(max_results)));
    let sink_ctx = ctx.clone();
    let sink_results = results.clone();

    let outcome = p
        .run(move |record| {
            let mut collected = sink_results.lock().expect("results lock poisoned");
            if collected.len() == max_results {
                return Ok(());
            }

            collected.push(stream_item(&sink_ctx, &record));

            if collected.len() == max_results {
                debug!("Enough results have been collected");
                handle.stop();
            }
            Ok(())
        })
        .await;

    if let Err(err) = outcome {
        error!("Stream pipeline failed: {:#}", err);
    }

    let collected = results.lock().expect("results lock poisoned").clone();
    collected
}

/// Channel-stage search: one record per found torrent, with a page-limit
/// aware follow-up query on the plain series path. Search failures drop
/// the branch; one broken indexer never poisons the request.
async fn search_torrents(
    ctx: Arc<StreamsContext>,
    record: StreamRecord,
    token: tokio_util::sync::CancellationToken,
    out: tokio::sync::mpsc::Sender<StreamRecord>,
) -> anyhow::Result<()> {
    let (Some(meta), Some(indexer)) = (record.meta.clone(), record.indexer.clone()) else {
        return Ok(());
    };

    match record.stream_id.content_type {
        ContentType::Movie => {
            let torrents = ctx.searcher.search_movie_torrents(&indexer, &meta.name).await;
            emit_torrents(&record, torrents, &indexer, &token, &out).await;
        }
        ContentType::Series if record.search_by_season => {
            let torrents = ctx
                .searcher
                .search_season_torrents(&indexer, &meta.name, record.stream_id.season)
                .await;
            emit_torrents(&record, torrents, &indexer, &token, &out).await;
        }
        ContentType::Series => {
            let first = ctx
                .searcher
                .search_series_torrents(&indexer, &meta.name, 0)
                .await;
            let first_count = first.as_ref().map(Vec::len).unwrap_or(0);
            if !emit_torrents(&record, first, &indexer, &token, &out).await {
                return Ok(());
            }

            // A full first page suggests more results behind the
            // indexer's limit; fetch exactly one more page.
            if first_count >= indexer.page_limit as usize {
                let second = ctx
                    .searcher
                    .search_series_torrents(&indexer, &meta.name, first_count as u32)
                    .await;
                emit_torrents(&record, second, &indexer, &token, &out).await;
            }
        }
    }

    Ok(())
}

/// Emit one record per torrent; returns false once the pipeline stopped
async fn emit_torrents(
    record: &StreamRecord,
    torrents: anyhow::Result<Vec<Torrent>>,
    indexer: &Indexer,
    token: &tokio_util::sync::CancellationToken,
    out: &tokio::sync::mpsc::Sender<StreamRecord>,
) -> bool {
    let torrents = match torrents {
        Ok(torrents) => torrents,
        Err(err) => {
            warn!("Search failed on {}: {}", indexer.name, err);
            return true;
        }
    };

    for torrent in torrents {
        let mut branch = record.clone();
        branch.torrent = Some(torrent);

        tokio::select! {
            _ = token.cancelled() => return false,
            sent = out.send(branch) => {
                if sent.is_err() {
                    return false;
                }
            }
        }
    }
    true
}

fn stream_item(ctx: &StreamsContext, record: &StreamRecord) -> StreamItem {
    let resolution = record
        .title_info
        .as_ref()
        .and_then(|info| info.resolution)
        .map(|resolution| format!(" {}p", resolution))
        .unwrap_or_default();

    let torrent_title = record
        .torrent
        .as_ref()
        .map(|torrent| torrent.title.as_str())
        .unwrap_or_default();
    let seeders = record
        .torrent
        .as_ref()
        .map(|torrent| torrent.seeders)
        .unwrap_or(0);
    let indexer_name = record
        .indexer
        .as_ref()
        .map(|indexer| indexer.name.as_str())
        .unwrap_or_default();

    let (file_id, file_name, file_size) = record
        .media_file
        .as_ref()
        .map(|file| (file.id.as_str(), file.filename.as_str(), file.filesize))
        .unwrap_or(("", "", 0));

    let info_hash = record.info_hash().unwrap_or_default();

    StreamItem {
        name: format!("{}{}", ctx.addon_name, resolution),
        title: format!(
            "{}\n{} | {} seeders | {}",
            torrent_title,
            human_size(file_size),
            seeders,
            indexer_name
        ),
        url: format!("{}/download/{}/{}", record.base_url, info_hash, file_id),
        behavior_hints: StreamBehaviorHints {
            video_size: file_size,
            file_name: file_name.to_string(),
        },
    }
}

/// Render a byte count the way release lists do
fn human_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[unit])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// A fully-enriched record, adjusted by the caller
    pub(crate) fn record_with(adjust: impl FnOnce(&mut StreamRecord)) -> StreamRecord {
        let mut record = StreamRecord::new(
            StreamId {
                content_type: ContentType::Movie,
                imdb_id: "tt1392190".into(),
                season: 0,
                episode: 0,
            },
            "https://relay.example/u".into(),
            "1.2.3.4".into(),
        );
        record.meta = Some(Arc::new(MetaInfo {
            imdb_id: "tt1392190".into(),
            imdb_numeric: 1392190,
            name: "Mad Max Fury Road".into(),
            from_year: 2015,
            to_year: 2015,
        }));
        record.indexer = Some(Arc::new(Indexer {
            id: 1,
            name: "Example".into(),
            enable: true,
            page_limit: 100,
        }));
        record.torrent = Some(Torrent::default());
        record.title_info = Some(TitleInfo::default());
        record.media_file = Some(CachedFile {
            id: "1".into(),
            filename: "movie.mkv".into(),
            filesize: 1000,
        });
        adjust(&mut record);
        record
    }
}
