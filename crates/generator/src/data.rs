//! Random sparse tensor materialization.

use fastrand::Rng;
use std::path::{Path, PathBuf};
use tensure_kernel::formats::{write_coordinate_file, CoordinateData, TensorFileFormat};
use tensure_kernel::tensor::TensorDesc;
use tracing::error;

/// Density of the generated tensors: probability that a coordinate holds a
/// nonzero entry.
const FILL_PROBABILITY: f64 = 0.4;

/// Materialize data files for the *input* tensors of a kernel (entry 0 is the
/// output and is skipped).
///
/// Files are written as `<dir>/<name>[_<suffix>].<fmt>` and the paths are
/// returned in input order. On a write failure the loop stops early; callers
/// detect the failure by comparing the returned length against the number of
/// inputs.
pub fn generate_tensor_data(
    tensors: &[TensorDesc],
    dir: &Path,
    suffix: &str,
    format: TensorFileFormat,
    rng: &mut Rng,
) -> Vec<PathBuf> {
    let mut data_files = Vec::new();
    if let Err(e) = std::fs::create_dir_all(dir) {
        error!(dir = %dir.display(), error = %e, "failed to create data directory");
        return data_files;
    }

    for tensor in tensors.iter().skip(1) {
        let data = fill_tensor(&tensor.shape, rng);

        let stem = if suffix.is_empty() {
            tensor.name.to_string()
        } else {
            format!("{}_{suffix}", tensor.name)
        };
        let path = dir.join(format!("{stem}.{}", format.extension()));

        if let Err(e) = write_coordinate_file(&tensor.shape, &data, format, &path) {
            error!(file = %path.display(), error = %e, "failed saving tensor data file");
            break;
        }
        let path = path.canonicalize().unwrap_or(path);
        data_files.push(path);
    }

    data_files
}

/// Walk the full coordinate space in row-major order, keeping each entry with
/// probability [`FILL_PROBABILITY`]. Values are uniform in `[0, 0.5]`,
/// rounded to two decimals.
fn fill_tensor(shape: &[usize], rng: &mut Rng) -> CoordinateData {
    let mut data = CoordinateData::default();
    if shape.iter().any(|&dim| dim == 0) {
        return data;
    }

    let total: usize = shape.iter().product();
    let mut coordinate = vec![0usize; shape.len()];
    for _ in 0..total {
        let value = (rng.f64() * 0.5 * 100.0).round() / 100.0;
        if rng.f64() < FILL_PROBABILITY {
            data.push(coordinate.clone(), value);
        }

        for dim in (0..shape.len()).rev() {
            coordinate[dim] += 1;
            if coordinate[dim] < shape[dim] {
                break;
            }
            coordinate[dim] = 0;
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensure_kernel::formats::read_coordinate_file;
    use tensure_kernel::tensor::StorageFormat::Dense;

    fn sample_tensors() -> Vec<TensorDesc> {
        vec![
            TensorDesc::new('A', vec!['i'], vec![4], vec![Dense]),
            TensorDesc::new('B', vec!['i', 'k'], vec![4, 3], vec![Dense, Dense]),
            TensorDesc::new('C', vec!['k'], vec![3], vec![Dense]),
        ]
    }

    #[test]
    fn test_one_file_per_input() {
        let dir = tempfile::tempdir().unwrap();
        let mut rng = Rng::with_seed(42);
        let files = generate_tensor_data(&sample_tensors(), dir.path(), "", TensorFileFormat::Tns, &mut rng);

        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("B.tns"));
        assert!(files[1].ends_with("C.tns"));
        assert!(files.iter().all(|p| p.is_absolute() && p.exists()));
    }

    #[test]
    fn test_suffix_in_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut rng = Rng::with_seed(1);
        let files =
            generate_tensor_data(&sample_tensors(), dir.path(), "run7", TensorFileFormat::Ttx, &mut rng);
        assert!(files[0].ends_with("B_run7.ttx"));
    }

    #[test]
    fn test_entries_are_in_range_and_rounded() {
        let dir = tempfile::tempdir().unwrap();
        let mut rng = Rng::with_seed(9);
        let files = generate_tensor_data(&sample_tensors(), dir.path(), "", TensorFileFormat::Tns, &mut rng);

        let entries = read_coordinate_file(&files[0]).unwrap();
        assert!(!entries.is_empty());
        for (coordinate, value) in entries {
            assert_eq!(coordinate.len(), 2);
            assert!(coordinate[0] < 4 && coordinate[1] < 3);
            assert!((0.0..=0.5).contains(&value));
            let cents = value * 100.0;
            assert!((cents - cents.round()).abs() < 1e-9);
        }
    }

    #[test]
    fn test_same_seed_same_files() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        let mut rng_a = Rng::with_seed(1234);
        let mut rng_b = Rng::with_seed(1234);
        let files_a =
            generate_tensor_data(&sample_tensors(), dir_a.path(), "", TensorFileFormat::Tns, &mut rng_a);
        let files_b =
            generate_tensor_data(&sample_tensors(), dir_b.path(), "", TensorFileFormat::Tns, &mut rng_b);

        let blob_a = std::fs::read_to_string(&files_a[0]).unwrap();
        let blob_b = std::fs::read_to_string(&files_b[0]).unwrap();
        assert_eq!(blob_a, blob_b);
    }
}
