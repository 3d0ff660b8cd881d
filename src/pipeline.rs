use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::acquirer::Acquirer;
use crate::config::Config;
use crate::database::get_pool;
use crate::errors::Error;
use crate::loader::Loader;
use crate::models::{resolve_datasets, Dataset, LoadMode, ReleaseInfo, TABLES_WITH_UNIQUE_CONSTRAINTS, TABLE_LOAD_ORDER};
use crate::transform;

/// Sequences the transformer and loader for one `run(dataset, mode)` invocation (§4.2.3).
pub struct Pipeline<'a> {
    config: &'a Config,
    acquirer: &'a dyn Acquirer,
    loader: Loader,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a Config, acquirer: &'a dyn Acquirer) -> Result<Pipeline<'a>, Error> {
        let pool = get_pool(config)?;
        let loader = Loader::new(pool, config);
        Ok(Pipeline { config, acquirer, loader })
    }

    pub fn run(&self, dataset_arg: &str, mode: LoadMode) -> Result<(), Error> {
        let datasets = resolve_datasets(dataset_arg)?;
        let run_id = Uuid::new_v4();
        let start_time = Utc::now();

        let result = self.run_inner(run_id, &datasets, mode, start_time);

        // cleanup() always runs, on every exit path, regardless of success or failure.
        if let Err(err) = self.loader.cleanup() {
            warn!(%err, "failed to clean up staging schema");
        }

        result
    }

    fn run_inner(
        &self,
        run_id: Uuid,
        datasets: &[Dataset],
        mode: LoadMode,
        start_time: chrono::DateTime<Utc>,
    ) -> Result<(), Error> {
        let release = self.acquirer.get_release_info()?;

        if mode == LoadMode::Delta {
            if let Some(current) = self.loader.get_current_release_version()? {
                if release.version == current {
                    info!(version = %release.version, "incoming release matches current production version, nothing to do");
                    return Ok(());
                }
                if release.version.as_str() < current.as_str() {
                    return Err(Error::VersionNotNewer { incoming: release.version.clone(), current });
                }
            }
        }

        let outcome = self.load_all_datasets(datasets, mode, &release);

        // Logging failures must never mask or replace the actual outcome of the run.
        let log_result = match &outcome {
            Ok(()) => self.loader.log_run(run_id, mode, &dataset_label(datasets), "COMPLETED", start_time, Some(Utc::now()), None),
            Err(err) => self.loader.log_run(
                run_id,
                mode,
                &dataset_label(datasets),
                "FAILED",
                start_time,
                Some(Utc::now()),
                Some(format!("{err:#}")),
            ),
        };
        if let Err(log_err) = log_result {
            warn!(%log_err, "failed to record run history");
        }

        outcome
    }

    fn load_all_datasets(&self, datasets: &[Dataset], mode: LoadMode, release: &ReleaseInfo) -> Result<(), Error> {
        self.loader.initialize_schema(mode)?;

        for dataset in datasets {
            self.transform_and_load_one(*dataset)?;
        }

        for (table, key) in TABLES_WITH_UNIQUE_CONSTRAINTS {
            self.loader.deduplicate_staging(table, key)?;
        }

        self.loader.finalize(mode)?;
        self.loader.update_metadata(release)?;
        Ok(())
    }

    fn transform_and_load_one(&self, dataset: Dataset) -> Result<(), Error> {
        let source_path = self.config.data_dir.join(dataset.xml_filename());
        if !source_path.exists() {
            return Err(Error::SourceFileMissing(source_path));
        }

        let scratch = tempfile::Builder::new().prefix(&format!("uniprot_{}_", dataset.as_str())).tempdir()?;

        let result = transform::transform(&source_path, scratch.path(), self.config.profile, self.config.num_workers);
        let result = result.and_then(|_stats| {
            for table in TABLE_LOAD_ORDER {
                let file = scratch.path().join(format!("{table}.tsv.gz"));
                if file.exists() {
                    self.loader.bulk_load(&file, table)?;
                }
                else {
                    warn!(table, "intermediate file not produced for this dataset, skipping");
                }
            }
            Ok(())
        });

        // scratch directory is removed regardless of outcome (TempDir also does this on drop,
        // but we do it explicitly so a failed removal surfaces rather than silently leaking).
        let _ = scratch.close();

        result
    }
}

fn dataset_label(datasets: &[Dataset]) -> String {
    if datasets.len() > 1 {
        "all".to_string()
    }
    else {
        datasets.first().map(|d| d.as_str().to_string()).unwrap_or_default()
    }
}
