use std::path::Path;

use crate::error::Result;

/// Emits the generated runtime support files once, after the whole tree has
/// been instrumented: `coverage.h` declares the counter matrix and the
/// `COV_IN` increment macro, `coverage.cpp` defines the storage plus a
/// persistence helper that merges with any prior dump at process shutdown.
///
/// Emission is a pure function of `(num_files, max_probes)` and the dump
/// file name; the helper's merge/write lives in an explicitly callable
/// `update()` so it can also be driven without process teardown.
pub struct SupportEmitter {
    dump_file: String,
}

impl SupportEmitter {
    pub fn new(dump_file: &Path) -> Self {
        Self {
            dump_file: dump_file.to_string_lossy().to_string(),
        }
    }

    /// Write `coverage.h` and `coverage.cpp` into the support directory.
    pub fn emit(&self, support_dir: &Path, num_files: usize, max_probes: usize) -> Result<()> {
        std::fs::create_dir_all(support_dir)?;
        std::fs::write(
            support_dir.join("coverage.h"),
            Self::header_text(num_files, max_probes),
        )?;
        std::fs::write(
            support_dir.join("coverage.cpp"),
            self.definitions_text(num_files, max_probes),
        )?;
        Ok(())
    }

    /// The declarations every instrumented file includes.
    pub fn header_text(num_files: usize, max_probes: usize) -> String {
        format!(
            "extern unsigned short gCoverage[{}][{}];\n\
             #define COV_IN(fileIndex, lineIndex) gCoverage[fileIndex][lineIndex]++;\n",
            num_files, max_probes
        )
    }

    /// The matrix storage and the shutdown-time merge/write helper. A dump
    /// whose header dimensions disagree with this build is ignored rather
    /// than partially merged.
    pub fn definitions_text(&self, num_files: usize, max_probes: usize) -> String {
        let mut out = String::new();
        out.push_str("// This file is automatically generated\n");
        out.push_str(&format!(
            "unsigned short gCoverage[{}][{}];\n",
            num_files, max_probes
        ));
        out.push_str("#include <stdio.h>\n");
        out.push_str("class cCoverageOutput\n");
        out.push_str("  {\n");
        out.push_str("  public:\n");
        out.push_str("  ~cCoverageOutput()\n");
        out.push_str("    {\n");
        out.push_str("    update();\n");
        out.push_str("    }\n");
        out.push_str("  void update()\n");
        out.push_str("    {\n");
        out.push_str("    read();\n");
        out.push_str("    write();\n");
        out.push_str("    }\n");
        out.push_str("  void read()\n");
        out.push_str("    {\n");
        out.push_str(&format!(
            "    FILE *fp = fopen(\"{}\", \"r\");\n",
            self.dump_file
        ));
        out.push_str("    if(fp)\n");
        out.push_str("      {\n");
        out.push_str("      int maxLines = 0;\n");
        out.push_str("      int numFiles = 0;\n");
        out.push_str("      fscanf(fp, \"%d%*[^\\n]\", &numFiles);\n");
        out.push_str("      fscanf(fp, \"%d%*[^\\n]\", &maxLines);\n");
        out.push_str(&format!(
            "      if(numFiles == {} && maxLines == {})\n",
            num_files, max_probes
        ));
        out.push_str("        {\n");
        out.push_str(&format!(
            "        for(int fi=0; fi<{}; fi++)\n",
            num_files
        ));
        out.push_str("          {\n");
        out.push_str(&format!(
            "          for(int li=0; li<{}; li++)\n",
            max_probes
        ));
        out.push_str("            {\n");
        out.push_str("            unsigned int val;\n");
        out.push_str("            if(li == 0)    // discard file index\n");
        out.push_str("               fscanf(fp, \"%u%*[^\\n]\", &val);\n");
        out.push_str("            fscanf(fp, \"%u\", &val);\n");
        out.push_str("            gCoverage[fi][li] += val;\n");
        out.push_str("            }\n");
        out.push_str("          }\n");
        out.push_str("        }\n");
        out.push_str("      fclose(fp);\n");
        out.push_str("      }\n");
        out.push_str("    }\n");
        out.push_str("  void write()\n");
        out.push_str("    {\n");
        out.push_str(&format!(
            "    FILE *fp = fopen(\"{}\", \"w\");\n",
            self.dump_file
        ));
        out.push_str(&format!(
            "    fprintf(fp, \"%d   # Number of files\\n\", {});\n",
            num_files
        ));
        out.push_str(&format!(
            "    fprintf(fp, \"%d   # Max number of instrumented lines per file\\n\", {});\n",
            max_probes
        ));
        out.push_str(&format!(
            "    for(int fi=0; fi<{}; fi++)\n",
            num_files
        ));
        out.push_str("      {\n");
        out.push_str(&format!(
            "      for(int li=0; li<{}; li++)\n",
            max_probes
        ));
        out.push_str("        {\n");
        out.push_str("        if(li == 0)  // add file index for reference (not used)\n");
        out.push_str("          fprintf(fp, \"%d   # File Index\\n\", fi);\n");
        out.push_str("        fprintf(fp, \"%u\", gCoverage[fi][li]);\n");
        out.push_str("        fprintf(fp, \"\\n\");\n");
        out.push_str("        }\n");
        out.push_str("      }\n");
        out.push_str("    fclose(fp);\n");
        out.push_str("    }\n");
        out.push_str("  };\n");
        out.push_str("cCoverageOutput coverageOutput;\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_declares_matrix_and_macro() {
        let text = SupportEmitter::header_text(3, 17);
        assert!(text.contains("extern unsigned short gCoverage[3][17];"));
        assert!(text.contains("#define COV_IN(fileIndex, lineIndex) gCoverage[fileIndex][lineIndex]++;"));
    }

    #[test]
    fn test_definitions_check_dump_shape() {
        let emitter = SupportEmitter::new(std::path::Path::new("coverageStats.txt"));
        let text = emitter.definitions_text(2, 5);
        assert!(text.contains("unsigned short gCoverage[2][5];"));
        assert!(text.contains("if(numFiles == 2 && maxLines == 5)"));
        assert!(text.contains("fopen(\"coverageStats.txt\", \"r\")"));
        assert!(text.contains("fopen(\"coverageStats.txt\", \"w\")"));
    }

    #[test]
    fn test_emit_writes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let emitter = SupportEmitter::new(std::path::Path::new("coverageStats.txt"));
        emitter.emit(dir.path(), 1, 4).unwrap();

        assert!(dir.path().join("coverage.h").exists());
        let defs = std::fs::read_to_string(dir.path().join("coverage.cpp")).unwrap();
        assert!(defs.contains("cCoverageOutput coverageOutput;"));
    }
}
