//! Mutation operators.

use fastrand::Rng;
use tensure_kernel::kernel::Kernel;
use tensure_kernel::tensor::StorageFormat;

/// The semantic-preserving operators the engine can apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationOperator {
    /// Redraw one tensor's per-dimension storage. Storage is a physical
    /// representation; the mathematical result is invariant.
    Sparsity,
    /// Shuffle the right-hand-side factors. Pointwise multiplication is
    /// commutative and reduction order does not change the result beyond
    /// floating rounding, which the oracle tolerance absorbs.
    Commutativity,
}

pub const ALL_OPERATORS: [MutationOperator; 2] =
    [MutationOperator::Sparsity, MutationOperator::Commutativity];

impl MutationOperator {
    /// Apply the operator in place. Returns `false` when no change could be
    /// produced (the caller retries).
    pub fn apply(&self, kernel: &mut Kernel, rng: &mut Rng) -> bool {
        match self {
            MutationOperator::Sparsity => apply_sparsity(kernel, rng),
            MutationOperator::Commutativity => apply_commutativity(kernel, rng),
        }
    }
}

/// Replace a uniformly chosen tensor's storage with a fresh draw from
/// `{Dense, Sparse}^rank`. Rejected when the draw reproduces the current
/// storage.
fn apply_sparsity(kernel: &mut Kernel, rng: &mut Rng) -> bool {
    if kernel.tensors.is_empty() {
        return false;
    }
    let pick = rng.usize(..kernel.tensors.len());
    let tensor = &mut kernel.tensors[pick];

    let fresh: Vec<StorageFormat> = (0..tensor.storage.len())
        .map(|_| {
            if rng.bool() {
                StorageFormat::Sparse
            } else {
                StorageFormat::Dense
            }
        })
        .collect();

    if fresh == tensor.storage {
        return false;
    }
    tensor.storage = fresh;
    true
}

/// Shuffle the RHS factors of the expression and reorder the tensor list to
/// match (output first, then inputs in the new factor order).
fn apply_commutativity(kernel: &mut Kernel, rng: &mut Rng) -> bool {
    let Some(computation) = kernel.computations.first() else {
        return false;
    };
    let Some((lhs, rhs)) = computation.expression.split_once('=') else {
        return false;
    };
    let lhs = lhs.trim().to_string();

    let mut factors: Vec<String> = rhs.split('*').map(|t| t.trim().to_string()).collect();
    if factors.len() < 2 {
        return false;
    }
    rng.shuffle(&mut factors);

    let mut reordered = Vec::with_capacity(kernel.tensors.len());
    match find_tensor(kernel, factor_name(&lhs)) {
        Some(output) => reordered.push(output),
        None => return false,
    }
    for factor in &factors {
        match find_tensor(kernel, factor_name(factor)) {
            Some(tensor) => reordered.push(tensor),
            None => return false,
        }
    }
    if reordered.len() != kernel.tensors.len() {
        return false;
    }

    kernel.computations[0].expression = format!("{lhs} = {}", factors.join(" * "));
    kernel.tensors = reordered;
    true
}

/// Tensor name of a factor like `B(i,k)`.
fn factor_name(factor: &str) -> &str {
    factor.split('(').next().unwrap_or(factor).trim()
}

fn find_tensor(kernel: &Kernel, name: &str) -> Option<tensure_kernel::tensor::TensorDesc> {
    kernel
        .tensors
        .iter()
        .find(|t| t.name.to_string() == name)
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tensure_kernel::tensor::StorageFormat::{Dense, Sparse};
    use tensure_kernel::tensor::TensorDesc;

    fn seed_kernel() -> Kernel {
        let a = TensorDesc::new('A', vec!['i'], vec![4], vec![Dense]);
        let b = TensorDesc::new('B', vec!['i', 'k'], vec![4, 3], vec![Dense, Dense]);
        let c = TensorDesc::new('C', vec!['k'], vec![3], vec![Sparse]);
        Kernel::reference(
            vec![a, b, c],
            "A(i) = B(i,k) * C(k)",
            &[PathBuf::from("/data/B.tns"), PathBuf::from("/data/C.tns")],
        )
    }

    #[test]
    fn test_sparsity_changes_only_storage() {
        let seed = seed_kernel();
        let mut rng = Rng::with_seed(11);
        for _ in 0..50 {
            let mut mutant = seed.clone();
            if !MutationOperator::Sparsity.apply(&mut mutant, &mut rng) {
                continue;
            }
            assert_eq!(mutant.expression(), seed.expression());
            assert_ne!(mutant.signature(), seed.signature());
            let changed: Vec<usize> = seed
                .tensors
                .iter()
                .zip(&mutant.tensors)
                .enumerate()
                .filter(|(_, (s, m))| s.storage != m.storage)
                .map(|(i, _)| i)
                .collect();
            assert_eq!(changed.len(), 1, "exactly one tensor redrawn");
            for (s, m) in seed.tensors.iter().zip(&mutant.tensors) {
                assert_eq!(s.name, m.name);
                assert_eq!(s.idxs, m.idxs);
                assert_eq!(s.shape, m.shape);
            }
        }
    }

    #[test]
    fn test_commutativity_permutes_factors() {
        let seed = seed_kernel();
        let mut rng = Rng::with_seed(3);
        let mut saw_reorder = false;
        for _ in 0..50 {
            let mut mutant = seed.clone();
            assert!(MutationOperator::Commutativity.apply(&mut mutant, &mut rng));

            let (lhs, rhs) = mutant.expression().split_once(" = ").unwrap();
            assert_eq!(lhs, "A(i)");
            let mut factors: Vec<&str> = rhs.split(" * ").collect();
            // Tensor order mirrors the factor order.
            assert_eq!(mutant.tensors[0].name, 'A');
            for (factor, tensor) in factors.iter().zip(&mutant.tensors[1..]) {
                assert_eq!(*factor, tensor.str_repr);
            }
            factors.sort_unstable();
            assert_eq!(factors, vec!["B(i,k)", "C(k)"]);
            if mutant.tensors[1].name != 'B' {
                saw_reorder = true;
            }
        }
        assert!(saw_reorder, "shuffle never produced a reordering");
    }

    #[test]
    fn test_commutativity_needs_two_factors() {
        let a = TensorDesc::new('A', vec!['i'], vec![4], vec![Dense]);
        let b = TensorDesc::new('B', vec!['i'], vec![4], vec![Dense]);
        let mut kernel = Kernel::reference(
            vec![a, b],
            "A(i) = B(i)",
            &[PathBuf::from("/data/B.tns")],
        );
        let mut rng = Rng::with_seed(0);
        assert!(!MutationOperator::Commutativity.apply(&mut kernel, &mut rng));
    }
}
