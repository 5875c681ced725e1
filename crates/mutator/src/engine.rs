//! Pool-based unique mutant generation.

use crate::ops::{MutationOperator, ALL_OPERATORS};
use anyhow::Result;
use fastrand::Rng;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tensure_kernel::kernel::Kernel;
use tracing::warn;

/// Mutants generated per iteration by default.
pub const DEFAULT_MAX_MUTANTS: usize = 10;

/// Attempts per mutant before a parent is considered exhausted.
const MAX_RETRIES: usize = 100;

/// Generates families of semantically equivalent kernels.
///
/// The engine keeps a pool of every kernel produced so far (seed included)
/// and mutates a uniformly chosen pool member with a uniformly chosen
/// operator, accepting only states whose signature has not been seen.
pub struct MutationEngine {
    operators: Vec<MutationOperator>,
}

impl MutationEngine {
    pub fn new() -> Self {
        Self {
            operators: ALL_OPERATORS.to_vec(),
        }
    }

    /// Restrict the engine to a subset of operators.
    pub fn with_operators(operators: &[MutationOperator]) -> Self {
        assert!(!operators.is_empty());
        Self {
            operators: operators.to_vec(),
        }
    }

    /// Produce up to `max_mutants` unique mutants of `seed_file` (a kernel
    /// JSON inside `dir`), writing them as `dir/kernel<k>.json`.
    ///
    /// Returns the produced file paths with the seed at index 0. The list is
    /// shorter than `max_mutants + 1` when the uniqueness safeguard runs out
    /// of fresh states first.
    pub fn mutate_equivalent_kernel(
        &self,
        dir: &Path,
        seed_file: &str,
        max_mutants: usize,
        rng: &mut Rng,
    ) -> Result<Vec<PathBuf>> {
        let seed_path = dir.join(seed_file);
        let seed = Kernel::load(&seed_path)?;

        let mut produced = vec![seed_path];
        let mut signatures = HashSet::new();
        signatures.insert(seed.signature());
        let mut source_pool = vec![seed_file.to_string()];

        let mut safeguard = max_mutants * 10;
        let mut mutation_id = 1;
        while mutation_id <= max_mutants {
            let parent = source_pool[rng.usize(..source_pool.len())].clone();
            match self.mutate_single_unique(dir, &parent, &mut signatures, mutation_id, rng)? {
                Some(path) => {
                    source_pool.push(
                        path.file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_default(),
                    );
                    produced.push(path);
                    mutation_id += 1;
                }
                None => {
                    safeguard -= 1;
                    if safeguard == 0 {
                        warn!("reached safeguard limit while mutating kernels, stopping early");
                        break;
                    }
                }
            }
        }

        Ok(produced)
    }

    /// One attempt batch: mutate `parent_file` until a signature not yet in
    /// `signatures` appears, then persist it as `kernel<mutation_id>.json`.
    fn mutate_single_unique(
        &self,
        dir: &Path,
        parent_file: &str,
        signatures: &mut HashSet<String>,
        mutation_id: usize,
        rng: &mut Rng,
    ) -> Result<Option<PathBuf>> {
        let parent = Kernel::load(&dir.join(parent_file))?;

        for _ in 0..MAX_RETRIES {
            let mut mutant = parent.clone();
            let op = self.operators[rng.usize(..self.operators.len())];
            if !op.apply(&mut mutant, rng) {
                continue;
            }

            let signature = mutant.signature();
            if signatures.contains(&signature) {
                continue;
            }
            signatures.insert(signature);

            let path = dir.join(format!("kernel{mutation_id}.json"));
            mutant.save(&path)?;
            return Ok(Some(path));
        }

        Ok(None)
    }
}

impl Default for MutationEngine {
    fn default() -> Self {
        Self::new()
    }
}
