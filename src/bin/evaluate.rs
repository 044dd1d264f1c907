//! Evaluate a persisted embedding dump, with and without re-ranking.
//!
//! Usage: `evaluate [DUMP_PATH]` — defaults to `./res/embds.json`.

use log::info;

use reid_eval::builder::EvaluatorBuilder;
use reid_eval::error::Result;
use reid_eval::store::EmbeddingDump;

const DEFAULT_DUMP: &str = "./res/embds.json";
const RERANK_TOP_N: usize = 50;

fn main() -> Result<()> {
    env_logger::init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_DUMP.to_string());
    info!("loading embedding dump from {}", path);
    let dump = EmbeddingDump::load(&path)?;

    let report = EvaluatorBuilder::new().build().evaluate(&dump)?;
    println!(
        "without post_processing: cmc is: {:?}, map is: {}",
        report.cmc, report.map
    );

    let report = EvaluatorBuilder::new()
        .with_post_top_n(Some(RERANK_TOP_N))
        .build()
        .evaluate(&dump)?;
    println!(
        "with post_processing: cmc is: {:?}, map is: {}",
        report.cmc, report.map
    );

    Ok(())
}
