use std::path::{Path, PathBuf};
use anyhow::Result;
use tracing::{debug, info, warn};

use crate::config::Config;
use super::classifier::LineClassifier;
use super::correlator::{Correlator, CoverageDump, FileStats};
use super::instrumenter::FileInstrumenter;
use super::support::SupportEmitter;
use super::walker::SourceWalker;

/// Main orchestration engine for Bracecov.
///
/// Runs the two passes: `instrument` copies the source tree while inserting
/// probes and emits the runtime support files; `correlate` maps a counter
/// dump back onto the instrumented files and reports coverage.
pub struct Engine {
    config: Config,
    classifier: LineClassifier,
    walker: SourceWalker,
}

impl Engine {
    /// Create a new engine instance
    pub fn new(config_path: Option<&Path>) -> Result<Self> {
        let config = Config::load_or_default(config_path)?;

        debug!("Loaded configuration: {:?}", config);

        let classifier = LineClassifier::new();
        let walker = SourceWalker::new(&config.project, &config.instrument);

        Ok(Self {
            config,
            classifier,
            walker,
        })
    }

    /// Copy the source tree into the output tree, instrumenting matching
    /// files and copying everything else verbatim, then emit the generated
    /// support files sized by the tree-wide maximum probe count.
    pub async fn instrument(
        &mut self,
        source: Option<PathBuf>,
        output: Option<PathBuf>,
        support: Option<PathBuf>,
    ) -> Result<()> {
        let source_dir = source.unwrap_or_else(|| self.config.project.source_dir.clone());
        let output_dir = output.unwrap_or_else(|| self.config.project.output_dir.clone());
        let support_dir = support.unwrap_or_else(|| self.config.project.support_dir.clone());

        info!("Instrumenting {}", source_dir.display());
        info!("Output: {}", output_dir.display());

        let files = self.walker.collect(&source_dir)?;

        let mut file_index = 0usize;
        let mut max_probes = 0usize;
        for file in &files {
            let dest = output_dir.join(&file.rel_path);
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            if file.instrument {
                debug!("Instrumenting {}", file.path.display());
                match std::fs::read_to_string(&file.path) {
                    Ok(content) => {
                        let instrumenter = FileInstrumenter::new(
                            &self.classifier,
                            file_index,
                            self.config.instrument.display_warnings,
                            &file.path.display().to_string(),
                        );
                        let instrumented = instrumenter.instrument(&content);
                        std::fs::write(&dest, instrumented.text())?;
                        max_probes = max_probes.max(instrumented.probe_count);
                    }
                    Err(e) => {
                        warn!(
                            "Cannot read {}: {}; copying unchanged",
                            file.path.display(),
                            e
                        );
                        std::fs::copy(&file.path, &dest)?;
                    }
                }
                // the file index is consumed either way, so a later
                // correlation walk still agrees on index order
                file_index += 1;
            } else {
                std::fs::copy(&file.path, &dest)?;
            }
        }

        let emitter = SupportEmitter::new(&self.config.correlate.dump_file);
        emitter.emit(&support_dir, file_index, max_probes)?;

        info!(
            "Instrumented {} files, max {} probes per file",
            file_index, max_probes
        );
        Ok(())
    }

    /// Correlate an accumulated counter dump back onto the instrumented
    /// tree: write annotated copies and print per-file and total coverage.
    pub async fn correlate(
        &mut self,
        source: Option<PathBuf>,
        output: Option<PathBuf>,
        dump: Option<PathBuf>,
    ) -> Result<()> {
        let source_dir = source.unwrap_or_else(|| self.config.project.source_dir.clone());
        let output_dir = output.unwrap_or_else(|| self.config.project.output_dir.clone());
        let dump_path = dump.unwrap_or_else(|| self.config.correlate.dump_file.clone());

        info!(
            "Correlating {} onto {}",
            dump_path.display(),
            output_dir.display()
        );

        let dump = CoverageDump::load(&dump_path)?;
        let correlator = Correlator::new(dump);
        let files = self.walker.collect(&source_dir)?;

        let mut file_index = 0usize;
        let mut total = FileStats {
            hits: 0,
            instrumented: 0,
        };
        for file in files.iter().filter(|f| f.instrument) {
            let instrumented_path = output_dir.join(&file.rel_path);
            let content = match std::fs::read_to_string(&instrumented_path) {
                Ok(content) => content,
                Err(e) => {
                    warn!(
                        "Cannot read {}: {}; skipping",
                        instrumented_path.display(),
                        e
                    );
                    file_index += 1;
                    continue;
                }
            };
            let (annotated, stats) = correlator.annotate_file(file_index, &content)?;

            let annotated_path = Correlator::annotated_path(&output_dir, &file.rel_path);
            if let Some(parent) = annotated_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&annotated_path, annotated)?;

            println!(
                "{} {} {} {}%",
                instrumented_path.display(),
                stats.hits,
                stats.instrumented,
                stats.percent()
            );
            total.hits += stats.hits;
            total.instrumented += stats.instrumented;
            file_index += 1;
        }

        if file_index != correlator.dump().num_files {
            warn!(
                "Dump holds {} files but the tree has {}; counts may be misattributed",
                correlator.dump().num_files,
                file_index
            );
        }

        println!(
            "Total {} {} {}%",
            total.hits,
            total.instrumented,
            total.percent()
        );
        Ok(())
    }

    /// Write a default Bracecov.toml into the target directory.
    pub async fn init(&self, path: Option<PathBuf>) -> Result<()> {
        let target_dir = path.unwrap_or_else(|| PathBuf::from("."));
        let config_path = target_dir.join("Bracecov.toml");
        if config_path.exists() {
            anyhow::bail!("{} already exists", config_path.display());
        }
        Config::default().save(&config_path)?;
        info!("Wrote {}", config_path.display());
        Ok(())
    }
}
