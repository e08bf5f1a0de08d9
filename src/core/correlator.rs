use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::{BracecovError, Result};

/// Per-file correlation result.
#[derive(Debug, Clone, Copy)]
pub struct FileStats {
    /// Probe sites with a non-zero counter
    pub hits: usize,

    /// Probe sites found in the file
    pub instrumented: usize,
}

impl FileStats {
    /// Integer floor percentage; a file with no probe sites is fully covered.
    pub fn percent(&self) -> usize {
        if self.instrumented == 0 {
            100
        } else {
            self.hits * 100 / self.instrumented
        }
    }
}

/// Parsed counter dump written by an instrumented program.
///
/// The on-disk form is plain text, one value per line with optional trailing
/// comments: `num_files`, then `max_probes`, then per file an informational
/// file-index line followed by `max_probes` counters.
#[derive(Debug, Clone)]
pub struct CoverageDump {
    pub num_files: usize,
    pub max_probes: usize,

    /// Raw value stream after the two header lines, file-index markers
    /// included, `num_files * (1 + max_probes)` entries.
    values: Vec<u64>,
}

impl CoverageDump {
    /// A zeroed dump of the given shape.
    pub fn empty(num_files: usize, max_probes: usize) -> Self {
        let mut values = Vec::with_capacity(num_files * (1 + max_probes));
        for file_index in 0..num_files {
            values.push(file_index as u64);
            values.extend(std::iter::repeat(0).take(max_probes));
        }
        Self {
            num_files,
            max_probes,
            values,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Tolerant line reader: the first whitespace-separated token on each
    /// non-empty line must be an integer; the rest of the line is ignored.
    pub fn parse(content: &str) -> Result<Self> {
        let mut values = Vec::new();
        for (line_num, line) in content.lines().enumerate() {
            let token = match line.split_whitespace().next() {
                Some(token) => token,
                None => continue,
            };
            let value: u64 = token.parse().map_err(|_| {
                BracecovError::DumpFormat(format!(
                    "line {}: expected an integer, found '{}'",
                    line_num + 1,
                    token
                ))
            })?;
            values.push(value);
        }

        if values.len() < 2 {
            return Err(BracecovError::DumpFormat(
                "missing num_files/max_probes header".to_string(),
            ));
        }
        let num_files = values[0] as usize;
        let max_probes = values[1] as usize;
        // header values come straight from the dump; reject dimensions too
        // large to size a matrix instead of overflowing
        let expected = max_probes
            .checked_add(1)
            .and_then(|stride| num_files.checked_mul(stride))
            .ok_or_else(|| {
                BracecovError::DumpFormat(format!(
                    "dump dimensions {} x {} are out of range",
                    num_files, max_probes
                ))
            })?;
        let body = values.split_off(2);
        if body.len() < expected {
            return Err(BracecovError::DumpFormat(format!(
                "expected {} values for {} files x {} probes, found {}",
                expected,
                num_files,
                max_probes,
                body.len()
            )));
        }

        Ok(Self {
            num_files,
            max_probes,
            values: body,
        })
    }

    /// Counters for one file in probe-index order, the informational
    /// file-index marker already skipped.
    pub fn file_counters(&self, file_index: usize) -> Result<&[u64]> {
        if file_index >= self.num_files {
            return Err(BracecovError::DumpFormat(format!(
                "file index {} out of range, dump holds {} files",
                file_index, self.num_files
            )));
        }
        let start = file_index * (1 + self.max_probes) + 1;
        Ok(&self.values[start..start + self.max_probes])
    }

    /// Additive merge of another dump into this one. A dump whose header
    /// dimensions disagree is discarded wholesale: returns false and leaves
    /// this matrix unchanged.
    pub fn merge(&mut self, other: &CoverageDump) -> bool {
        if other.num_files != self.num_files || other.max_probes != self.max_probes {
            warn!(
                "Discarding coverage dump with mismatched shape: {}x{} vs {}x{}",
                other.num_files, other.max_probes, self.num_files, self.max_probes
            );
            return false;
        }
        let stride = 1 + self.max_probes;
        for file_index in 0..self.num_files {
            for probe in 0..self.max_probes {
                let slot = file_index * stride + 1 + probe;
                self.values[slot] += other.values[slot];
            }
        }
        true
    }

    /// Serialize back to the documented text format.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("{}   # Number of files\n", self.num_files));
        out.push_str(&format!(
            "{}   # Max number of instrumented lines per file\n",
            self.max_probes
        ));
        let stride = 1 + self.max_probes;
        for file_index in 0..self.num_files {
            out.push_str(&format!("{}   # File Index\n", file_index));
            for probe in 0..self.max_probes {
                out.push_str(&format!("{}\n", self.values[file_index * stride + 1 + probe]));
            }
        }
        out
    }
}

/// Walks instrumented files and attaches dump counters to probe sites in
/// textual order: the Nth probe call in the file consumes the Nth counter
/// of that file's slice.
pub struct Correlator {
    dump: CoverageDump,
}

impl Correlator {
    pub fn new(dump: CoverageDump) -> Self {
        Self { dump }
    }

    pub fn dump(&self) -> &CoverageDump {
        &self.dump
    }

    /// Annotate one instrumented file's content: every probe-bearing line
    /// gains a trailing comment with its accumulated hit count.
    pub fn annotate_file(&self, file_index: usize, content: &str) -> Result<(String, FileStats)> {
        let counters = self.dump.file_counters(file_index)?;
        let mut out = String::new();
        let mut instrumented = 0;
        let mut hits = 0;
        for line in content.lines() {
            out.push_str(line);
            if line.contains("COV_IN") {
                let count = counters.get(instrumented).copied().unwrap_or_else(|| {
                    warn!(
                        "file {} has more probe sites than dump columns ({})",
                        file_index, self.dump.max_probes
                    );
                    0
                });
                out.push_str(&format!("\t\t// {}", count));
                if count != 0 {
                    hits += 1;
                }
                instrumented += 1;
            }
            out.push('\n');
        }
        Ok((out, FileStats { hits, instrumented }))
    }

    /// Derived output name for an annotated copy: dots become underscores
    /// and `.txt` is appended, keeping the annotated file out of any build.
    pub fn annotated_path(output_root: &Path, rel_path: &Path) -> PathBuf {
        let derived = format!("{}.txt", rel_path.to_string_lossy().replace('.', "_"));
        output_root.join(derived)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMP: &str = "\
2   # Number of files
3   # Max number of instrumented lines per file
0   # File Index
5
0
2
1   # File Index
0
0
7
";

    #[test]
    fn test_parse_header_and_slices() {
        let dump = CoverageDump::parse(DUMP).unwrap();
        assert_eq!(dump.num_files, 2);
        assert_eq!(dump.max_probes, 3);
        assert_eq!(dump.file_counters(0).unwrap(), &[5, 0, 2]);
        assert_eq!(dump.file_counters(1).unwrap(), &[0, 0, 7]);
        assert!(dump.file_counters(2).is_err());
    }

    #[test]
    fn test_parse_rejects_truncated_body() {
        let err = CoverageDump::parse("2\n3\n0\n5\n").unwrap_err();
        assert!(matches!(err, BracecovError::DumpFormat(_)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(CoverageDump::parse("two\n3\n").is_err());
    }

    #[test]
    fn test_parse_rejects_overflowing_dimensions() {
        // a corrupt dump claiming usize::MAX files must error, not panic
        let huge = format!("{}\n{}\n", usize::MAX, usize::MAX);
        let err = CoverageDump::parse(&huge).unwrap_err();
        assert!(matches!(err, BracecovError::DumpFormat(_)));
    }

    #[test]
    fn test_merge_accumulates() {
        let mut dump = CoverageDump::parse(DUMP).unwrap();
        let other = CoverageDump::parse(DUMP).unwrap();
        assert!(dump.merge(&other));
        assert_eq!(dump.file_counters(0).unwrap(), &[10, 0, 4]);
        assert_eq!(dump.file_counters(1).unwrap(), &[0, 0, 14]);
    }

    #[test]
    fn test_merge_skips_mismatched_shape() {
        let mut dump = CoverageDump::parse(DUMP).unwrap();
        let other = CoverageDump::empty(2, 4);
        assert!(!dump.merge(&other));
        // matrix unchanged
        assert_eq!(dump.file_counters(0).unwrap(), &[5, 0, 2]);
    }

    #[test]
    fn test_to_text_roundtrip() {
        let dump = CoverageDump::parse(DUMP).unwrap();
        let again = CoverageDump::parse(&dump.to_text()).unwrap();
        assert_eq!(again.file_counters(1).unwrap(), &[0, 0, 7]);
    }

    #[test]
    fn test_annotation_consumes_counters_in_order() {
        let dump = CoverageDump::parse(DUMP).unwrap();
        let correlator = Correlator::new(dump);
        let content = "\
#include \"coverage.h\"
void f()
{
COV_IN(1,0)
if (x > 0){ COV_IN(1,1) doWork();}
run(); COV_IN(1,2)
}
";
        let (annotated, stats) = correlator.annotate_file(1, content).unwrap();
        assert!(annotated.contains("COV_IN(1,0)\t\t// 0"));
        assert!(annotated.contains("doWork();}\t\t// 0"));
        assert!(annotated.contains("COV_IN(1,2)\t\t// 7"));
        assert_eq!(stats.instrumented, 3);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.percent(), 33);
    }

    #[test]
    fn test_percent_floor_and_empty_file() {
        let full = FileStats { hits: 2, instrumented: 3 };
        assert_eq!(full.percent(), 66);
        let empty = FileStats { hits: 0, instrumented: 0 };
        assert_eq!(empty.percent(), 100);
    }

    #[test]
    fn test_annotated_path_derivation() {
        let path = Correlator::annotated_path(Path::new("covsrc"), Path::new("sub/widget.cpp"));
        assert_eq!(path, PathBuf::from("covsrc/sub/widget_cpp.txt"));
    }
}
