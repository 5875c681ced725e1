//! Random einsum synthesis.

use fastrand::Rng;
use std::collections::BTreeMap;
use tensure_kernel::tensor::{StorageFormat, TensorDesc, INDEX_ALPHABET};

/// Synthesize a random contraction expression and its tensor schema.
///
/// Returns the tensor descriptors (output `A` first, then inputs `B`, `C`, …
/// in expression order) and the expression string
/// `A(out) = B(..) * C(..) * …`. Every index absent from the output is
/// guaranteed to occur in at least two inputs, so the expression is always a
/// valid contraction.
pub fn generate_random_einsum(
    rng: &mut Rng,
    num_inputs: usize,
    max_rank: usize,
) -> (Vec<TensorDesc>, String) {
    assert!(num_inputs >= 2, "a contraction needs at least two inputs");
    assert!((1..=INDEX_ALPHABET.len()).contains(&max_rank));

    // Step 1: draw each input's rank and that many distinct indices.
    let mut input_idxs: Vec<Vec<char>> = vec![Vec::new(); num_inputs];
    let mut idx_count: BTreeMap<char, usize> = BTreeMap::new();
    for idxs in &mut input_idxs {
        let rank = rng.usize(1..=max_rank);
        while idxs.len() < rank {
            let c = INDEX_ALPHABET[rng.usize(..INDEX_ALPHABET.len())];
            if !idxs.contains(&c) {
                idxs.push(c);
                *idx_count.entry(c).or_insert(0) += 1;
            }
        }
    }

    // Step 2: a fair coin marks each distinct index as an output index.
    let mut output_idxs: Vec<char> = Vec::new();
    for &idx in idx_count.keys() {
        if rng.bool() {
            output_idxs.push(idx);
        }
    }

    // Step 3: reduction repair. A non-output index seen exactly once cannot
    // be contracted; append it to a different input so it occurs twice.
    let singles: Vec<char> = idx_count
        .iter()
        .filter(|&(idx, &count)| count == 1 && !output_idxs.contains(idx))
        .map(|(&idx, _)| idx)
        .collect();
    for idx in singles {
        let src = input_idxs
            .iter()
            .position(|idxs| idxs.contains(&idx))
            .unwrap_or(0);
        let mut target = src;
        while target == src {
            target = rng.usize(..num_inputs);
        }
        input_idxs[target].push(idx);
        *idx_count.entry(idx).or_insert(0) += 1;
    }

    // Step 5 of the pipeline is drawn up front so descriptors can be built in
    // one pass: one size per index, shared by every occurrence.
    let upper = idx_count.len().clamp(3, 6);
    let sizes: BTreeMap<char, usize> = idx_count
        .keys()
        .map(|&idx| (idx, rng.usize(3..=upper)))
        .collect();

    let make_tensor = |name: char, idxs: Vec<char>, rng: &mut Rng| {
        let shape: Vec<usize> = idxs.iter().map(|idx| sizes[idx]).collect();
        let storage: Vec<StorageFormat> = idxs
            .iter()
            .map(|_| {
                if rng.bool() {
                    StorageFormat::Sparse
                } else {
                    StorageFormat::Dense
                }
            })
            .collect();
        TensorDesc::new(name, idxs, shape, storage)
    };

    // Step 4 + 6: build descriptors (output first) and the expression text.
    let mut tensors = Vec::with_capacity(num_inputs + 1);
    tensors.push(make_tensor('A', output_idxs, rng));

    let mut rhs = String::new();
    for (t, idxs) in input_idxs.into_iter().enumerate() {
        let name = (b'B' + t as u8) as char;
        let tensor = make_tensor(name, idxs, rng);
        if t > 0 {
            rhs.push_str(" * ");
        }
        rhs.push_str(&tensor.str_repr);
        tensors.push(tensor);
    }
    let expression = format!("{} = {}", tensors[0].str_repr, rhs);

    (tensors, expression)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_seed_42_is_reproducible() {
        let mut a = Rng::with_seed(42);
        let mut b = Rng::with_seed(42);
        let (tensors_a, expr_a) = generate_random_einsum(&mut a, 2, 6);
        let (tensors_b, expr_b) = generate_random_einsum(&mut b, 2, 6);
        assert_eq!(expr_a, expr_b);
        assert_eq!(tensors_a, tensors_b);
    }

    #[test]
    fn test_every_reduction_index_occurs_twice() {
        for seed in 0..200 {
            let mut rng = Rng::with_seed(seed);
            let num_inputs = rng.usize(2..=5);
            let (tensors, expr) = generate_random_einsum(&mut rng, num_inputs, 6);
            let output = &tensors[0];
            for tensor in &tensors[1..] {
                for idx in &tensor.idxs {
                    if output.idxs.contains(idx) {
                        continue;
                    }
                    let occurrences = tensors[1..]
                        .iter()
                        .filter(|t| t.idxs.contains(idx))
                        .count();
                    assert!(
                        occurrences >= 2,
                        "index {idx} occurs once in {expr} (seed {seed})"
                    );
                }
            }
        }
    }

    #[test]
    fn test_shapes_agree_across_tensors() {
        for seed in 0..100 {
            let mut rng = Rng::with_seed(seed);
            let (tensors, _) = generate_random_einsum(&mut rng, 4, 6);
            let mut sizes: HashMap<char, usize> = HashMap::new();
            for tensor in &tensors {
                assert_eq!(tensor.idxs.len(), tensor.shape.len());
                assert_eq!(tensor.idxs.len(), tensor.storage.len());
                for (idx, dim) in tensor.idxs.iter().zip(&tensor.shape) {
                    assert!((3..=6).contains(dim));
                    let known = sizes.entry(*idx).or_insert(*dim);
                    assert_eq!(known, dim, "index {idx} has two sizes");
                }
            }
        }
    }

    #[test]
    fn test_naming_and_expression_shape() {
        let mut rng = Rng::with_seed(7);
        let (tensors, expr) = generate_random_einsum(&mut rng, 3, 4);
        assert_eq!(tensors.len(), 4);
        assert_eq!(tensors[0].name, 'A');
        assert_eq!(tensors[1].name, 'B');
        assert_eq!(tensors[3].name, 'D');

        let (lhs, rhs) = expr.split_once(" = ").unwrap();
        assert_eq!(lhs, tensors[0].str_repr);
        let factors: Vec<&str> = rhs.split(" * ").collect();
        assert_eq!(factors.len(), 3);
        for (factor, tensor) in factors.iter().zip(&tensors[1..]) {
            assert_eq!(*factor, tensor.str_repr);
        }
    }

    #[test]
    fn test_input_indices_stay_distinct() {
        for seed in 0..100 {
            let mut rng = Rng::with_seed(seed);
            let (tensors, _) = generate_random_einsum(&mut rng, 2, 3);
            for tensor in &tensors[1..] {
                // Repair may append one occurrence of an existing index, but
                // the indices of a tensor stay distinct.
                let mut seen = tensor.idxs.clone();
                seen.sort_unstable();
                seen.dedup();
                assert_eq!(seen.len(), tensor.idxs.len());
                assert!(!tensor.idxs.is_empty());
            }
        }
    }
}
