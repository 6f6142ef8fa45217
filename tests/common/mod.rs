#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Once;

use footprinter::cutcounts::InMemoryAlignments;
use footprinter::genomics::{AlignedRead, InMemoryGenome};

fn snapshot_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("snapshots")
}

pub fn assert_snapshot(name: &str, actual: &str) {
    let path = snapshot_root().join(name);
    if std::env::var("FOOTPRINTER_UPDATE_SNAPSHOTS").is_ok() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create snapshot directory");
        }
        fs::write(&path, actual).expect("write snapshot");
        return;
    }

    let expected =
        fs::read_to_string(&path).unwrap_or_else(|_| panic!("snapshot {:?} not found", path));
    if normalize(&expected) != normalize(actual) {
        panic!(
            "Snapshot mismatch for {:?}. Set FOOTPRINTER_UPDATE_SNAPSHOTS=1 to regenerate.\nExpected:\n{}\nActual:\n{}",
            path,
            expected,
            actual
        );
    }
}

fn normalize(input: &str) -> String {
    input.replace("\r\n", "\n").trim_end().to_string()
}

/// Route `tracing` output through the test harness once per binary.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

/// Deterministic pseudo-random genome of `len` bases.
pub fn genome_sequence(len: usize, seed: u64) -> Vec<u8> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            b"ACGT"[(state >> 62) as usize]
        })
        .collect()
}

/// Reads starting at every base of `chrom` in `[start, end)`, `depth` per
/// base and strand, skipping the protected window.
pub fn tiled_reads(
    chrom: &str,
    start: u32,
    end: u32,
    depth: usize,
    protected: Option<(u32, u32)>,
) -> InMemoryAlignments {
    let mut source = InMemoryAlignments::new().with_contig(chrom);
    for pos in start..end {
        if let Some((lo, hi)) = protected {
            if (lo..hi).contains(&pos) {
                continue;
            }
        }
        for _ in 0..depth {
            source.push(AlignedRead::contiguous(chrom, pos, b"ACGTACGTAC", false));
            // A ten-base reverse read starting at `pos - 9` is cut at `pos`.
            if pos >= 9 {
                source.push(AlignedRead::contiguous(chrom, pos - 9, b"ACGTACGTAC", true));
            }
        }
    }
    source
}

pub fn genome(chrom: &str, len: usize, seed: u64) -> InMemoryGenome {
    InMemoryGenome::new().with_contig(chrom, &genome_sequence(len, seed))
}
