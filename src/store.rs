//! Persisted embedding record shared between extraction and evaluation.
//!
//! Embedding extraction is the expensive half of a run; its output is dumped
//! once as a single serialized record and read back by the evaluation entry
//! point so extraction need not be repeated. The record keeps the historical
//! six-tuple shape and field order: query embeddings, query identities,
//! query cameras, then the same three for the gallery.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::core::EmbeddingSet;
use crate::error::{EvalError, Result};

/// Parallel-array record of both embedding sets.
///
/// Field order matters for compatibility with existing dumps; do not
/// reorder.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingDump {
    pub query_embeds: Vec<Vec<f64>>,
    pub query_ids: Vec<i64>,
    pub query_cams: Vec<i64>,
    pub gallery_embeds: Vec<Vec<f64>>,
    pub gallery_ids: Vec<i64>,
    pub gallery_cams: Vec<i64>,
}

impl EmbeddingDump {
    /// Writes the record as JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())?;
        serde_json::to_writer(BufWriter::new(file), self)?;
        info!("embedding dump written to {}", path.as_ref().display());
        Ok(())
    }

    /// Reads a record back and validates its shape.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let dump: EmbeddingDump = serde_json::from_reader(BufReader::new(file))?;
        dump.validate()?;
        info!(
            "embedding dump loaded from {}: {} queries, {} gallery items",
            path.as_ref().display(),
            dump.query_embeds.len(),
            dump.gallery_embeds.len()
        );
        Ok(dump)
    }

    /// Checks the parallel arrays agree in length and that every row of
    /// both sets shares one dimensionality.
    pub fn validate(&self) -> Result<()> {
        let (qs, gs) = (self.to_query_set()?, self.to_gallery_set()?);
        if !qs.is_empty() && !gs.is_empty() && qs.dim != gs.dim {
            return Err(EvalError::ShapeMismatch(format!(
                "query dim {} vs gallery dim {}",
                qs.dim, gs.dim
            )));
        }
        Ok(())
    }

    /// Materializes the query half as an [`EmbeddingSet`].
    pub fn to_query_set(&self) -> Result<EmbeddingSet> {
        EmbeddingSet::from_rows(&self.query_embeds, &self.query_ids, &self.query_cams)
    }

    /// Materializes the gallery half as an [`EmbeddingSet`].
    pub fn to_gallery_set(&self) -> Result<EmbeddingSet> {
        EmbeddingSet::from_rows(&self.gallery_embeds, &self.gallery_ids, &self.gallery_cams)
    }
}
