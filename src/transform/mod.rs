mod tables;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Arc, Mutex};

use flate2::bufread::MultiGzDecoder;
use tracing::instrument;

use crate::errors::Error;
use crate::models::EntryRecords;
use crate::profile::Profile;
use crate::utils::TransformBars;
use crate::xml::entry::extract_entry;
use crate::xml::stream::{count_entries, EntryStream};
use crate::xml::Element;

pub use tables::TableWriters;

#[derive(Debug, Default, Clone, Copy)]
pub struct TransformStats {
    pub entries_seen: u64,
    pub entries_written: u64,
}

/// Transforms a gzipped UniProt XML file into one gzipped TSV per table under `out_dir`.
///
/// Dispatches to a single-threaded path when `num_workers <= 1` and to a producer/worker/writer
/// pipeline otherwise (§4.1, §5).
#[instrument(skip_all, fields(source = %source.display(), workers = num_workers))]
pub fn transform(source: &Path, out_dir: &Path, profile: Profile, num_workers: usize) -> Result<TransformStats, Error> {
    std::fs::create_dir_all(out_dir)?;

    let total = count_entries(open_gz(source)?)?;
    let bars = TransformBars::new(total);

    let result = if num_workers <= 1 {
        transform_sequential(source, out_dir, profile, &bars)
    }
    else {
        transform_parallel(source, out_dir, profile, num_workers, &bars)
    };

    bars.finish();
    result
}

fn open_gz(path: &Path) -> Result<BufReader<MultiGzDecoder<BufReader<File>>>, Error> {
    let file = File::open(path)?;
    let decoder = MultiGzDecoder::new(BufReader::new(file));
    Ok(BufReader::new(decoder))
}

fn transform_sequential(
    source: &Path,
    out_dir: &Path,
    profile: Profile,
    bars: &TransformBars,
) -> Result<TransformStats, Error> {
    let mut writers = TableWriters::create(out_dir)?;
    let mut stream = EntryStream::new(open_gz(source)?);
    let mut stats = TransformStats::default();

    let result: Result<(), Error> = (|| {
        while let Some(entry) = stream.next_entry()? {
            stats.entries_seen += 1;
            bars.parsed.inc(1);
            if let Some(records) = extract_entry(&entry, profile)? {
                writers.write_entry(records)?;
                stats.entries_written += 1;
                bars.written.inc(1);
            }
        }
        Ok(())
    })();

    match result {
        Ok(()) => {
            writers.finish()?;
            Ok(stats)
        }
        Err(err) => {
            writers.discard();
            Err(err)
        }
    }
}

fn transform_parallel(
    source: &Path,
    out_dir: &Path,
    profile: Profile,
    num_workers: usize,
    bars: &TransformBars,
) -> Result<TransformStats, Error> {
    let capacity = num_workers.saturating_mul(4).max(1);
    let (task_tx, task_rx) = sync_channel::<Element>(capacity);
    let task_rx = Arc::new(Mutex::new(task_rx));
    let (result_tx, result_rx) = std::sync::mpsc::channel::<Result<Option<EntryRecords>, Error>>();
    let error_flag = Arc::new(AtomicBool::new(false));

    let producer_bars = bars.clone();
    let producer_flag = error_flag.clone();
    let source = source.to_path_buf();
    let producer = std::thread::spawn(move || -> Result<(), Error> {
        run_producer(&source, task_tx, producer_flag, producer_bars)
    });

    let mut worker_handles = Vec::with_capacity(num_workers);
    for _ in 0..num_workers {
        let task_rx = task_rx.clone();
        let result_tx = result_tx.clone();
        let worker_flag = error_flag.clone();
        worker_handles.push(std::thread::spawn(move || run_worker(task_rx, result_tx, worker_flag, profile)));
    }
    drop(result_tx);

    let outcome = run_writer(out_dir, result_rx, &error_flag, bars)?;

    for handle in worker_handles {
        let _ = handle.join();
    }
    // Drop our reference to the shared receiver now that every worker has exited, so if the
    // producer is still blocked trying to enqueue, the channel actually disconnects under it
    // instead of leaving a live Receiver nothing will ever drain again.
    drop(task_rx);
    let producer_result = producer.join().expect("producer thread panicked");

    if let Some(err) = outcome.error {
        return Err(err);
    }
    producer_result?;

    Ok(outcome.stats)
}

fn run_producer(
    source: &Path,
    task_tx: SyncSender<Element>,
    error_flag: Arc<AtomicBool>,
    bars: TransformBars,
) -> Result<(), Error> {
    let mut stream = EntryStream::new(open_gz(source)?);
    loop {
        if error_flag.load(Ordering::SeqCst) {
            return Ok(());
        }
        match stream.next_entry()? {
            Some(entry) => {
                bars.parsed.inc(1);
                if task_tx.send(entry).is_err() {
                    // all workers (and their shared receiver) have gone away
                    return Ok(());
                }
            }
            None => return Ok(()),
        }
    }
}

fn run_worker(
    task_rx: Arc<Mutex<Receiver<Element>>>,
    result_tx: std::sync::mpsc::Sender<Result<Option<EntryRecords>, Error>>,
    error_flag: Arc<AtomicBool>,
    profile: Profile,
) {
    loop {
        if error_flag.load(Ordering::SeqCst) {
            return;
        }
        let entry = {
            let rx = task_rx.lock().expect("task channel mutex poisoned");
            rx.recv()
        };
        let entry = match entry {
            Ok(entry) => entry,
            Err(_) => return, // producer finished and dropped the sender
        };

        let outcome: Result<Option<EntryRecords>, Error> = extract_entry(&entry, profile).map_err(Error::from);
        if result_tx.send(outcome).is_err() {
            return; // writer has stopped listening
        }
    }
}

struct WriterOutcome {
    stats: TransformStats,
    error: Option<Error>,
}

fn run_writer(
    out_dir: &Path,
    result_rx: Receiver<Result<Option<EntryRecords>, Error>>,
    error_flag: &Arc<AtomicBool>,
    bars: &TransformBars,
) -> Result<WriterOutcome, Error> {
    let mut writers = TableWriters::create(out_dir)?;
    let mut stats = TransformStats::default();
    let mut failure: Option<Error> = None;

    for item in result_rx.iter() {
        if failure.is_some() {
            continue; // drain remaining items so worker sends don't block forever
        }
        match item {
            Ok(Some(records)) => {
                stats.entries_seen += 1;
                match writers.write_entry(records) {
                    Ok(()) => {
                        stats.entries_written += 1;
                        bars.written.inc(1);
                    }
                    Err(err) => {
                        error_flag.store(true, Ordering::SeqCst);
                        failure = Some(err);
                    }
                }
            }
            Ok(None) => stats.entries_seen += 1,
            Err(err) => {
                error_flag.store(true, Ordering::SeqCst);
                failure = Some(err);
            }
        }
    }

    match failure {
        Some(err) => {
            writers.discard();
            Ok(WriterOutcome { stats, error: Some(err) })
        }
        None => {
            writers.finish()?;
            Ok(WriterOutcome { stats, error: None })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::write::GzEncoder;
    use flate2::Compression;

    use super::*;

    const FIXTURE_ENTRIES: &str = r#"<uniprot>
<entry created="2024-01-01" modified="2024-02-01">
  <accession>P00001</accession>
  <name>ONE_HUMAN</name>
  <protein><recommendedName><fullName>Protein One</fullName></recommendedName></protein>
  <sequence length="4" mass="400">MTES</sequence>
</entry>
<entry created="2024-01-01" modified="2024-02-01">
  <accession>P00002</accession>
  <name>TWO_HUMAN</name>
  <protein><recommendedName><fullName>Protein Two</fullName></recommendedName></protein>
  <sequence length="4" mass="400">MKLV</sequence>
</entry>
<entry created="2024-01-01" modified="2024-02-01">
  <name>NO_ACCESSION</name>
  <sequence length="4" mass="400">MKLV</sequence>
</entry>
</uniprot>"#;

    fn write_fixture(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("source.xml.gz");
        let file = File::create(&path).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(FIXTURE_ENTRIES.as_bytes()).unwrap();
        encoder.finish().unwrap();
        path
    }

    #[test]
    fn entries_without_a_primary_accession_are_silently_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_fixture(dir.path());
        let out = dir.path().join("out");

        let stats = transform(&source, &out, Profile::Standard, 1).unwrap();
        assert_eq!(stats.entries_seen, 3);
        assert_eq!(stats.entries_written, 2);
    }

    #[test]
    fn sequential_and_parallel_paths_agree_on_entry_counts() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_fixture(dir.path());

        let seq_out = dir.path().join("seq");
        let seq_stats = transform(&source, &seq_out, Profile::Standard, 1).unwrap();

        let par_out = dir.path().join("par");
        let par_stats = transform(&source, &par_out, Profile::Standard, 4).unwrap();

        assert_eq!(seq_stats.entries_seen, par_stats.entries_seen);
        assert_eq!(seq_stats.entries_written, par_stats.entries_written);
    }

    #[test]
    fn empty_source_produces_zero_entries_without_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.xml.gz");
        let file = File::create(&path).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(b"<uniprot></uniprot>").unwrap();
        encoder.finish().unwrap();

        let stats = transform(&path, &dir.path().join("out"), Profile::Standard, 1).unwrap();
        assert_eq!(stats.entries_seen, 0);
        assert_eq!(stats.entries_written, 0);
    }
}
