//! Tensor descriptors.

use serde::{Deserialize, Serialize};

/// The index alphabet every einsum expression draws from.
pub const INDEX_ALPHABET: [char; 6] = ['i', 'j', 'k', 'l', 'm', 'n'];

/// Sentinel data-file entry for the output tensor.
pub const OUTPUT_DATA_FILE: &str = "-";

/// How one dimension of a tensor is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageFormat {
    Dense,
    Sparse,
}

impl StorageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageFormat::Dense => "Dense",
            StorageFormat::Sparse => "Sparse",
        }
    }
}

/// One tensor of a contraction.
///
/// The output tensor is named `A` and carries the [`OUTPUT_DATA_FILE`]
/// sentinel; inputs are named `B`, `C`, … in expression order. All tensors
/// mentioning an index agree on its dimension size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorDesc {
    pub name: char,
    /// Textual form, e.g. `B(i,k)`.
    pub str_repr: String,
    pub idxs: Vec<char>,
    pub shape: Vec<usize>,
    #[serde(rename = "storageFormat")]
    pub storage: Vec<StorageFormat>,
    #[serde(rename = "dataFile")]
    pub data_file: String,
}

impl TensorDesc {
    pub fn new(name: char, idxs: Vec<char>, shape: Vec<usize>, storage: Vec<StorageFormat>) -> Self {
        let str_repr = tensor_repr(name, &idxs);
        Self {
            name,
            str_repr,
            idxs,
            shape,
            storage,
            data_file: OUTPUT_DATA_FILE.to_string(),
        }
    }

    pub fn rank(&self) -> usize {
        self.idxs.len()
    }
}

/// Render `name(i,j,…)`.
pub fn tensor_repr(name: char, idxs: &[char]) -> String {
    let joined: Vec<String> = idxs.iter().map(|c| c.to_string()).collect();
    format!("{}({})", name, joined.join(","))
}
