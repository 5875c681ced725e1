//! Kernel description IO.

use crate::tensor::{TensorDesc, OUTPUT_DATA_FILE};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// One einsum expression, e.g. `A(i,j) = B(i,k) * C(k,j)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Computation {
    pub expression: String,
}

/// A complete kernel description.
///
/// `tensors[0]` is the output; the remaining entries are inputs in the order
/// they appear on the expression's right-hand side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kernel {
    pub tensors: Vec<TensorDesc>,
    pub computations: Vec<Computation>,
}

impl Kernel {
    /// Build the reference kernel from generated tensors, assigning the data
    /// files to the inputs in order. The output keeps the `"-"` sentinel.
    pub fn reference(mut tensors: Vec<TensorDesc>, expression: &str, data_files: &[PathBuf]) -> Self {
        if let Some(output) = tensors.first_mut() {
            output.data_file = OUTPUT_DATA_FILE.to_string();
        }
        for (tensor, path) in tensors.iter_mut().skip(1).zip(data_files) {
            tensor.data_file = path.display().to_string();
        }
        Self {
            tensors,
            computations: vec![Computation {
                expression: expression.to_string(),
            }],
        }
    }

    pub fn output(&self) -> &TensorDesc {
        &self.tensors[0]
    }

    pub fn inputs(&self) -> &[TensorDesc] {
        &self.tensors[1..]
    }

    pub fn expression(&self) -> &str {
        &self.computations[0].expression
    }

    /// Load a kernel description from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let blob = fs::read_to_string(path)
            .with_context(|| format!("failed to read kernel file {}", path.display()))?;
        let kernel = serde_json::from_str(&blob)
            .with_context(|| format!("failed to parse kernel file {}", path.display()))?;
        Ok(kernel)
    }

    /// Write the kernel description atomically: temporary file, then rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        let blob = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, blob)
            .with_context(|| format!("failed to write kernel file {}", tmp.display()))?;
        fs::rename(&tmp, path)
            .with_context(|| format!("failed to rename kernel file into {}", path.display()))?;
        Ok(())
    }

    /// Canonical signature of the kernel's physical state: tensor names and
    /// per-dimension storage, in current tensor order. The expression is not
    /// included; operators that reorder tensors change the signature through
    /// the name order instead.
    pub fn signature(&self) -> String {
        let mut sig = String::new();
        for tensor in &self.tensors {
            sig.push(tensor.name);
            sig.push(':');
            for fmt in &tensor.storage {
                sig.push_str(fmt.as_str());
                sig.push(',');
            }
            sig.push('|');
        }
        sig
    }

    /// Check the structural invariants of a kernel description.
    pub fn validate(&self) -> Result<()> {
        if self.tensors.is_empty() {
            bail!("kernel has no tensors");
        }
        if self.computations.is_empty() {
            bail!("kernel has no computation");
        }
        if self.output().data_file != OUTPUT_DATA_FILE {
            bail!("output tensor data file must be the '-' sentinel");
        }

        let mut sizes: HashMap<char, usize> = HashMap::new();
        for tensor in &self.tensors {
            if tensor.idxs.len() != tensor.shape.len() || tensor.idxs.len() != tensor.storage.len()
            {
                bail!(
                    "tensor {} has inconsistent idxs/shape/storage lengths",
                    tensor.name
                );
            }
            for (idx, dim) in tensor.idxs.iter().zip(&tensor.shape) {
                match sizes.get(idx) {
                    Some(known) if known != dim => {
                        bail!("index {idx} has conflicting sizes {known} and {dim}")
                    }
                    Some(_) => {}
                    None => {
                        sizes.insert(*idx, *dim);
                    }
                }
            }
        }

        for tensor in self.inputs() {
            if tensor.data_file == OUTPUT_DATA_FILE {
                bail!("input tensor {} has no data file", tensor.name);
            }
        }

        // Reducibility: every index missing from the output occurs in at
        // least two inputs.
        for tensor in self.inputs() {
            for idx in &tensor.idxs {
                if self.output().idxs.contains(idx) {
                    continue;
                }
                let occurrences: usize = self
                    .inputs()
                    .iter()
                    .filter(|t| t.idxs.contains(idx))
                    .count();
                if occurrences < 2 {
                    bail!("reduction index {idx} occurs in only one input tensor");
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::StorageFormat::{Dense, Sparse};

    fn sample_kernel() -> Kernel {
        let a = TensorDesc::new('A', vec!['i', 'j'], vec![5, 4], vec![Dense, Sparse]);
        let b = TensorDesc::new('B', vec!['i', 'k'], vec![5, 3], vec![Dense, Dense]);
        let c = TensorDesc::new('C', vec!['k', 'j'], vec![3, 4], vec![Sparse, Sparse]);
        Kernel::reference(
            vec![a, b, c],
            "A(i,j) = B(i,k) * C(k,j)",
            &[PathBuf::from("/data/B.tns"), PathBuf::from("/data/C.tns")],
        )
    }

    #[test]
    fn test_json_roundtrip() {
        let kernel = sample_kernel();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kernel.json");
        kernel.save(&path).unwrap();
        let loaded = Kernel::load(&path).unwrap();
        assert_eq!(kernel, loaded);
        // No temporary file left behind by the atomic write.
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_reference_assigns_data_files() {
        let kernel = sample_kernel();
        assert_eq!(kernel.output().data_file, "-");
        assert_eq!(kernel.inputs()[0].data_file, "/data/B.tns");
        assert_eq!(kernel.inputs()[1].data_file, "/data/C.tns");
        kernel.validate().unwrap();
    }

    #[test]
    fn test_signature_tracks_storage_and_order() {
        let kernel = sample_kernel();
        assert_eq!(kernel.signature(), "A:Dense,Sparse,|B:Dense,Dense,|C:Sparse,Sparse,|");

        let mut mutated = kernel.clone();
        mutated.tensors[1].storage = vec![Sparse, Dense];
        assert_ne!(kernel.signature(), mutated.signature());

        let mut reordered = kernel.clone();
        reordered.tensors.swap(1, 2);
        assert_ne!(kernel.signature(), reordered.signature());
    }

    #[test]
    fn test_validate_rejects_shape_conflict() {
        let mut kernel = sample_kernel();
        kernel.tensors[2].shape[0] = 7; // k disagrees with B
        assert!(kernel.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_single_occurrence_reduction() {
        let mut kernel = sample_kernel();
        // Drop k from C; it now occurs only in B and not in the output.
        kernel.tensors[2].idxs = vec!['j'];
        kernel.tensors[2].shape = vec![4];
        kernel.tensors[2].storage = vec![Sparse];
        assert!(kernel.validate().is_err());
    }
}
