use anyhow::Context;
use clap::Parser;
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use streetscope::component::cache::{CacheDepth, prefetch_from};
use streetscope::graph::GraphService;
use streetscope::graph::node_cache::CachingProgress;
use streetscope::graph::provider::{NodeInfo, StaticGraphSource};
use streetscope::io::http::{HttpTransport, Transport};
use streetscope::io::loader::ResourceLoader;
use streetscope::io::texture_store::TextureStore;
use streetscope::settings::{CliArgs, OperationMode, ViewerSettings};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = CliArgs::parse();
    log::trace!("Starting with args: {:?}", args);

    let runtime = tokio::runtime::Runtime::new().context("Failed to start the async runtime")?;
    runtime.block_on(run(args))
}

async fn run(args: CliArgs) -> anyhow::Result<()> {
    match &args.operation_mode {
        OperationMode::Probe { key, pano, merged } => {
            let mut source = StaticGraphSource::default();
            source.insert_node(
                key,
                NodeInfo {
                    pano: *pano,
                    merged: *merged,
                },
            );
            let graph = graph_service(&args, source)?;
            probe(&graph, key).await
        }
        OperationMode::Warm {
            key,
            graph_file,
            depth,
        } => {
            let file = File::open(graph_file)
                .with_context(|| format!("Failed to open graph fixture {}", graph_file.display()))?;
            let source = StaticGraphSource::from_reader(BufReader::new(file))
                .with_context(|| format!("Failed to parse graph fixture {}", graph_file.display()))?;
            let graph = graph_service(&args, source)?;
            warm(&graph, key, *depth).await
        }
    }
}

fn graph_service(args: &CliArgs, source: StaticGraphSource) -> anyhow::Result<GraphService> {
    let transport = Arc::new(HttpTransport::new().context("Failed to construct the HTTP transport")?);
    let loader = Arc::new(ResourceLoader::new(
        transport as Arc<dyn Transport>,
        args.api_options(),
    ));
    Ok(GraphService::new(
        Arc::new(source),
        loader,
        Arc::new(TextureStore::default()),
        &ViewerSettings::default(),
    ))
}

async fn probe(graph: &GraphService, key: &str) -> anyhow::Result<()> {
    let mut progress = graph.cache_node_assets(key)?;
    loop {
        let current = progress.borrow_and_update().clone();
        match current {
            CachingProgress::Loading(status) => {
                log::info!("Loading {}: {}/{} bytes", key, status.loaded, status.total);
            }
            CachingProgress::Done(status) => {
                let cache = graph.node_cache(key);
                match cache.image() {
                    Some(image) => log::info!(
                        "Cached {}: {}x{} px at the {} px target, {} bytes total",
                        key,
                        image.width,
                        image.height,
                        image.size.pixels(),
                        status.loaded
                    ),
                    None => log::info!("Cached {} without a new image ({} bytes)", key, status.loaded),
                }
                if let Some(mesh) = cache.mesh() {
                    log::info!("Mesh for {}: {} faces", key, mesh.faces.len());
                }
                return Ok(());
            }
            CachingProgress::Failed(err) => {
                anyhow::bail!("Caching {} failed: {}", key, err);
            }
        }
        if progress.changed().await.is_err() {
            anyhow::bail!("Caching {} was aborted", key);
        }
    }
}

async fn warm(graph: &GraphService, key: &str, depth: u32) -> anyhow::Result<()> {
    let requests = prefetch_from(graph, key, CacheDepth::uniform(depth));
    log::info!("Warming {} nodes around {} at depth {}", requests.len(), key, depth);

    let mut failures = 0usize;
    for request in requests {
        let mut progress = request.progress;
        match progress.wait_for(|progress| progress.is_terminal()).await {
            Ok(terminal) => match &*terminal {
                CachingProgress::Done(status) => {
                    log::info!("Warmed {} ({} bytes)", request.key, status.loaded);
                }
                CachingProgress::Failed(err) => {
                    log::warn!("Warming {} failed: {}", request.key, err);
                    failures += 1;
                }
                CachingProgress::Loading(_) => unreachable!("wait_for only returns terminal values"),
            },
            Err(_) => {
                log::warn!("Warming {} was aborted", request.key);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} nodes failed to warm", failures);
    }
    Ok(())
}
