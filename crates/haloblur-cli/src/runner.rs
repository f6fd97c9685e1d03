//! Blur runner: ties together matrix files, parameters and backends.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use haloblur_compute::{BlurBackend, DistributedBackend};
use haloblur_core::{BlurParams, Weighting};
use haloblur_io::render::render_matrix;
use haloblur_io::{read_matrix, write_matrix, RawMatrixReader, RawMatrixWriter};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::config::JobConfig;

/// Everything needed for one blur run.
#[derive(Debug, Clone)]
pub struct BlurJob {
    /// Requested depth, before clamping.
    pub depth: usize,
    pub matrix_size: usize,
    pub workers: Option<usize>,
    pub backend: String,
    pub weighting: Weighting,
    pub input: PathBuf,
    pub output: PathBuf,
}

impl From<&JobConfig> for BlurJob {
    fn from(config: &JobConfig) -> Self {
        Self {
            depth: config.blur.depth,
            matrix_size: config.blur.matrix_size,
            workers: config.blur.workers,
            backend: config.blur.backend.clone(),
            weighting: config.blur.weighting,
            input: config.io.input.clone(),
            output: config.io.output.clone(),
        }
    }
}

/// What a finished run did.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub matrix_size: usize,
    pub requested_depth: usize,
    pub depth: usize,
    pub workers: usize,
    pub backend: String,
    pub weighting: Weighting,
    pub input: PathBuf,
    pub output: PathBuf,
    pub elapsed_ms: f64,
}

/// Check the job and build its parameters and backend, touching no files.
pub fn prepare(job: &BlurJob) -> Result<(BlurParams, Arc<dyn BlurBackend>)> {
    let params = BlurParams::new(job.matrix_size, job.depth)
        .with_context(|| format!("Invalid matrix size {}", job.matrix_size))?;
    if params.depth < job.depth {
        log::warn!(
            "Depth {} exceeds matrix size - 1; clamped to {}",
            job.depth,
            params.depth
        );
    }

    let workers = resolve_workers(job.workers, params.matrix_size)?;
    // Rejects worker counts the partitioner cannot honour.
    haloblur_core::plan(params.matrix_size, workers, params.depth)?;

    let backend = create_backend(&job.backend, workers, job.workers)?;
    Ok((params, backend))
}

/// Run a full blur: read, convolve, write.
pub fn run_blur(job: &BlurJob) -> Result<RunSummary> {
    let (params, backend) = prepare(job)?;
    let info = backend.device_info();
    println!("Backend: {}", info.name);

    // Open both files before any work is distributed. The output keeps its
    // old contents until the result is ready.
    let mut source = RawMatrixReader::open(&job.input, params.matrix_size)
        .with_context(|| format!("Cannot read input matrix {}", job.input.display()))?;
    let mut sink = RawMatrixWriter::open(&job.output, params.matrix_size)
        .with_context(|| format!("Cannot write output matrix {}", job.output.display()))?;

    let matrix = read_matrix(&mut source)
        .with_context(|| format!("Unable to get and initialise matrix from {}", job.input.display()))?;
    println!(
        "Matrix: {}x{}, depth {}, weighting {}",
        params.matrix_size, params.matrix_size, params.depth, job.weighting
    );

    let start = Instant::now();
    let result = backend
        .convolve(&matrix, &params, job.weighting)
        .context("Blur failed")?;
    let elapsed = start.elapsed();

    sink.set_matrix_len()
        .and_then(|()| write_matrix(&mut sink, &result))
        .with_context(|| format!("Unable to write matrix to {}", job.output.display()))?;
    println!("Result written to: {}", job.output.display());

    Ok(RunSummary {
        matrix_size: params.matrix_size,
        requested_depth: job.depth,
        depth: params.depth,
        workers: info.workers,
        backend: info.backend_type.to_string(),
        weighting: job.weighting,
        input: job.input.clone(),
        output: job.output.clone(),
        elapsed_ms: elapsed.as_secs_f64() * 1e3,
    })
}

/// Write a run summary to a JSON file.
pub fn write_summary_json(summary: &RunSummary, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(summary)
        .map_err(|e| anyhow::anyhow!("JSON serialisation error: {}", e))?;
    std::fs::write(path, json)?;
    println!("Summary written to: {}", path.display());
    Ok(())
}

/// Write an `N×N` matrix of uniform random values in `0..=max`.
pub fn generate_matrix(path: &Path, matrix_size: usize, seed: Option<u64>, max: i32) -> Result<()> {
    if matrix_size == 0 {
        anyhow::bail!("Matrix size must be at least 1");
    }
    if max < 0 {
        anyhow::bail!("Maximum value must be non-negative, got {}", max);
    }
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let matrix = Array2::from_shape_simple_fn((matrix_size, matrix_size), || rng.gen_range(0..=max));

    let mut sink = RawMatrixWriter::create(path, matrix_size)
        .with_context(|| format!("Cannot write matrix {}", path.display()))?;
    write_matrix(&mut sink, &matrix)?;
    println!(
        "Wrote random {}x{} matrix to: {}",
        matrix_size,
        matrix_size,
        path.display()
    );
    Ok(())
}

/// Read a matrix file and render it as text.
pub fn print_matrix(path: &Path, matrix_size: usize) -> Result<String> {
    let mut source = RawMatrixReader::open(path, matrix_size)
        .with_context(|| format!("Cannot read matrix {}", path.display()))?;
    let matrix = read_matrix(&mut source)?;
    Ok(render_matrix(&matrix))
}

/// Pick the worker count: explicit if given, otherwise available
/// parallelism capped at the matrix size.
fn resolve_workers(requested: Option<usize>, matrix_size: usize) -> Result<usize> {
    match requested {
        Some(0) => anyhow::bail!("Worker count must be at least 1"),
        Some(w) if w > matrix_size => anyhow::bail!(
            "Number of workers ({}) cannot be greater than the matrix dimensions ({})",
            w,
            matrix_size
        ),
        Some(w) => Ok(w),
        None => {
            let available = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1);
            Ok(available.min(matrix_size))
        }
    }
}

/// Create a compute backend based on the user's preference string.
///
/// - `"cpu"`: single worker, rows parallelised with Rayon. An explicit
///   worker count sizes a dedicated thread pool.
/// - `"distributed"` (default): coordinator plus `workers` worker threads.
fn create_backend(
    preference: &str,
    workers: usize,
    requested: Option<usize>,
) -> Result<Arc<dyn BlurBackend>> {
    match preference {
        "cpu" => {
            #[cfg(feature = "cpu")]
            {
                use haloblur_compute::CpuBackend;
                let backend = match requested {
                    Some(threads) => CpuBackend::with_threads(threads)
                        .with_context(|| format!("Cannot start a {}-thread CPU pool", threads))?,
                    None => CpuBackend::new(),
                };
                Ok(Arc::new(backend))
            }
            #[cfg(not(feature = "cpu"))]
            {
                let _ = requested;
                anyhow::bail!("CPU backend requested but binary was built without --features cpu")
            }
        }
        "distributed" => Ok(Arc::new(DistributedBackend::new(workers))),
        other => anyhow::bail!(
            "Unknown backend '{}'. Valid backends: cpu, distributed",
            other
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_path(dir: &TempDir, name: &str) -> PathBuf {
        dir.path().join(name)
    }

    fn job(input: PathBuf, output: PathBuf, backend: &str, workers: Option<usize>) -> BlurJob {
        BlurJob {
            depth: 1,
            matrix_size: 4,
            workers,
            backend: backend.into(),
            weighting: Weighting::RingSum,
            input,
            output,
        }
    }

    fn write_sequential(path: &Path) {
        let m = Array2::from_shape_fn((4, 4), |(r, c)| (r * 4 + c + 1) as i32);
        let mut sink = RawMatrixWriter::create(path, 4).unwrap();
        write_matrix(&mut sink, &m).unwrap();
    }

    #[test]
    fn test_resolve_workers() {
        assert_eq!(resolve_workers(Some(3), 4).unwrap(), 3);
        assert!(resolve_workers(Some(5), 4).is_err());
        assert!(resolve_workers(Some(0), 4).is_err());
        let default = resolve_workers(None, 2).unwrap();
        assert!((1..=2).contains(&default));
    }

    #[test]
    fn test_unknown_backend_rejected() {
        assert!(create_backend("gpu", 2, None).is_err());
    }

    #[test]
    fn test_cpu_backend_honours_worker_count() {
        let j = job(PathBuf::new(), PathBuf::new(), "cpu", Some(3));
        let (_, backend) = prepare(&j).unwrap();
        let info = backend.device_info();
        assert_eq!(info.threads_per_worker, 3);
        assert_eq!(info.workers, 1);
    }

    #[test]
    fn test_prepare_clamps_depth() {
        let mut j = job(PathBuf::new(), PathBuf::new(), "distributed", Some(2));
        j.depth = 9;
        let (params, backend) = prepare(&j).unwrap();
        assert_eq!(params.depth, 3);
        assert_eq!(backend.device_info().workers, 2);
    }

    #[test]
    fn test_run_blur_sequential_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = temp_path(&dir, "seq-in.bin");
        let output = temp_path(&dir, "seq-out.bin");
        write_sequential(&input);

        for (backend, workers) in [("distributed", Some(2)), ("cpu", None), ("cpu", Some(2))] {
            let summary = run_blur(&job(input.clone(), output.clone(), backend, workers)).unwrap();
            assert_eq!(summary.depth, 1);

            let mut source = RawMatrixReader::open(&output, 4).unwrap();
            let out = read_matrix(&mut source).unwrap();
            assert_eq!(out.row(0).to_vec(), vec![13, 22, 27, 18]);
            assert_eq!(out.row(3).to_vec(), vec![33, 58, 63, 38]);
        }
    }

    #[test]
    fn test_longer_output_file_is_replaced_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let input = temp_path(&dir, "in.bin");
        let output = temp_path(&dir, "out.bin");
        write_sequential(&input);
        std::fs::write(&output, vec![0xAB; 200]).unwrap();

        run_blur(&job(input, output.clone(), "distributed", Some(1))).unwrap();
        assert_eq!(std::fs::metadata(&output).unwrap().len(), 64);
    }

    #[test]
    #[cfg(unix)]
    fn test_failed_run_keeps_existing_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = temp_path(&dir, "out.bin");
        std::fs::write(&output, b"previous result").unwrap();

        // A directory opens as the input but fails once rows are read.
        let mut j = job(dir.path().to_path_buf(), output.clone(), "distributed", Some(1));
        j.matrix_size = 1;
        let err = run_blur(&j).unwrap_err();
        assert!(err.to_string().contains("Unable to get and initialise matrix"));
        assert_eq!(std::fs::read(&output).unwrap(), b"previous result");
    }

    #[test]
    fn test_missing_input_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let input = temp_path(&dir, "does-not-exist.bin");
        let output = temp_path(&dir, "missing-out.bin");
        let err = run_blur(&job(input, output, "distributed", Some(1))).unwrap_err();
        assert!(err.to_string().contains("Cannot read input matrix"));
    }

    #[test]
    fn test_generate_then_print() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "generated.bin");
        generate_matrix(&path, 3, Some(11), 9).unwrap();
        let text = print_matrix(&path, 3).unwrap();
        assert_eq!(text.lines().count(), 3);

        let mut source = RawMatrixReader::open(&path, 3).unwrap();
        let m = read_matrix(&mut source).unwrap();
        assert!(m.iter().all(|&v| (0..=9).contains(&v)));

        generate_matrix(&path, 3, Some(11), 9).unwrap();
        let again = read_matrix(&mut RawMatrixReader::open(&path, 3).unwrap()).unwrap();
        assert_eq!(m, again);
    }

    #[test]
    fn test_truncated_input_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "short.bin");
        std::fs::write(&path, [0u8; 10]).unwrap();
        assert!(print_matrix(&path, 2).is_err());
    }
}
