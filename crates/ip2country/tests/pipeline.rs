use ip2country::{BATCH_SIZE, CountryLookup, Error, PipelineConfig, PipelineSummary, RangeTable};
use std::{collections::HashMap, path::Path, sync::Arc};
use tokio::io::BufReader;

const DATABASE: &str = "\
1.2.3.0,1.2.3.255,US
5.6.0.0,5.6.255.255,DE
10.0.0.0,10.0.0.127,JP
";

fn database() -> Arc<RangeTable> {
    Arc::new(RangeTable::from_reader(DATABASE.as_bytes()).unwrap())
}

async fn run(config: &PipelineConfig, input: &str) -> ip2country::Result<PipelineSummary> {
    ip2country::run(config, BufReader::new(input.as_bytes()), database()).await
}

/// Reads every shard for `workers` workers, asserting each exists.
fn read_shards(config: &PipelineConfig) -> Vec<String> {
    (0..config.workers)
        .map(|id| {
            let path = config.shard_path(id);
            assert!(path.is_file(), "missing shard {}", path.display());
            std::fs::read_to_string(path).unwrap()
        })
        .collect()
}

fn sorted_lines(shards: &[String]) -> Vec<String> {
    let mut lines: Vec<String> = shards
        .iter()
        .flat_map(|s| s.split_inclusive('\n').map(str::to_owned))
        .collect();
    lines.sort();
    lines
}

fn count_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn known_address_is_replaced_by_country() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::new(dir.path(), 1);

    run(&config, "alpha|1.2.3.4|x\n").await.unwrap();

    assert_eq!(sorted_lines(&read_shards(&config)), vec!["alpha|US|x\n"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unknown_address_is_replaced_by_sentinel() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::new(dir.path(), 1);

    let summary = run(&config, "alpha|9.9.9.9|x\n").await.unwrap();

    assert_eq!(summary.unresolved, 1);
    assert_eq!(sorted_lines(&read_shards(&config)), vec!["alpha|--|x\n"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn empty_input_leaves_one_empty_shard_per_worker() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::new(dir.path(), 0).with_workers(5);

    let summary = run(&config, "").await.unwrap();

    assert_eq!(summary.batches, 0);
    assert_eq!(summary.lines, 0);
    assert_eq!(count_entries(dir.path()), 5);
    assert!(read_shards(&config).iter().all(String::is_empty));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_line_lands_in_exactly_one_shard() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::new(dir.path(), 2)
        .with_workers(4)
        .with_prefix("part-");

    let ips = ["1.2.3.4", "5.6.7.8", "10.0.0.5", "10.0.0.200", "bogus", "::1"];
    let input: String = (0..(BATCH_SIZE * 7 + 13))
        .map(|i| format!("{i}|row|{}|tail\n", ips[i % ips.len()]))
        .collect();

    let summary = run(&config, &input).await.unwrap();
    assert_eq!(summary.batches, 8);
    assert_eq!(summary.lines, (BATCH_SIZE * 7 + 13) as u64);
    assert_eq!(summary.malformed, 0);
    assert_eq!(count_entries(dir.path()), 4);

    let expected: Vec<String> = {
        let mut lines: Vec<String> = (0..(BATCH_SIZE * 7 + 13))
            .map(|i| {
                let country = match ips[i % ips.len()] {
                    "1.2.3.4" => "US",
                    "5.6.7.8" => "DE",
                    "10.0.0.5" => "JP",
                    _ => "--",
                };
                format!("{i}|row|{country}|tail\n")
            })
            .collect();
        lines.sort();
        lines
    };
    assert_eq!(sorted_lines(&read_shards(&config)), expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn batches_stay_whole_within_a_shard() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::new(dir.path(), 1)
        .with_workers(3)
        .with_batch_size(10);

    let input: String = (0..200).map(|i| format!("{i:03}|1.2.3.4\n")).collect();
    run(&config, &input).await.unwrap();

    // Each batch is ten consecutive rows written by one worker in order.
    for shard in read_shards(&config) {
        let rows: Vec<u32> = shard
            .lines()
            .map(|l| l.split('|').next().unwrap().parse().unwrap())
            .collect();
        assert_eq!(rows.len() % 10, 0);
        for chunk in rows.chunks(10) {
            assert_eq!(chunk[0] % 10, 0);
            assert!(chunk.windows(2).all(|w| w[1] == w[0] + 1), "{chunk:?}");
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn reruns_produce_the_same_multiset() {
    let input: String = (0..3_500)
        .map(|i| format!("user{i}|5.6.{}.{}\n", i % 256, i % 7))
        .collect();

    let mut runs = Vec::new();
    for _ in 0..2 {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::new(dir.path(), 1).with_workers(3);
        run(&config, &input).await.unwrap();
        runs.push(sorted_lines(&read_shards(&config)));
    }

    assert_eq!(runs[0].len(), 3_500);
    assert_eq!(runs[0], runs[1]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn malformed_records_pass_through_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::new(dir.path(), 3).with_workers(2);

    let summary = run(&config, "a|b|c|1.2.3.4\nno-fields\na|b|c\n")
        .await
        .unwrap();

    assert_eq!(summary.malformed, 2);
    assert_eq!(summary.resolved, 1);
    assert_eq!(
        sorted_lines(&read_shards(&config)),
        vec!["a|b|c\n", "a|b|c|US\n", "no-fields\n"]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn line_terminators_are_preserved() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::new(dir.path(), 0).with_workers(1);

    run(&config, "1.2.3.4|a\r\n9.9.9.9|b\n5.6.7.8|c").await.unwrap();

    assert_eq!(read_shards(&config), vec!["US|a\r\n--|b\nDE|c"]);
}

#[tokio::test]
async fn missing_output_directory_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::new(dir.path().join("nope"), 0);

    let err = run(&config, "1.2.3.4\n").await.unwrap_err();
    assert!(matches!(err, Error::ShardCreate { .. }), "{err}");
}

#[tokio::test]
async fn works_with_any_lookup() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::new(dir.path(), 0).with_workers(1);
    let lookup = Arc::new(HashMap::from([("home".to_owned(), "NZ".to_owned())]));

    ip2country::run(&config, BufReader::new(&b"home|1\naway|2\n"[..]), lookup)
        .await
        .unwrap();

    assert_eq!(read_shards(&config), vec!["NZ|1\n--|2\n"]);
}

/// Lookup that panics on the key `"boom"` and knows nothing else.
struct ExplodingLookup;

impl CountryLookup for ExplodingLookup {
    fn country(&self, key: &str) -> Option<&str> {
        if key == "boom" {
            panic!("lookup exploded on {key}");
        }
        None
    }
}

/// `boom` first, then `lines` ordinary records.
fn input_with_bad_first_key(lines: usize) -> String {
    std::iter::once("boom|x\n".to_owned())
        .chain((0..lines).map(|i| format!("10.0.0.{}|{i}\n", i % 256)))
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn panicking_lookup_is_reported_as_worker_panic() {
    let input = input_with_bad_first_key(50_000);

    for _ in 0..5 {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::new(dir.path(), 0)
            .with_workers(1)
            .with_batch_size(10);

        let lookup = Arc::new(ExplodingLookup);
        let err = ip2country::run(&config, BufReader::new(input.as_bytes()), lookup)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::WorkerPanicked { worker_id: 0 }), "{err:?}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn worker_panic_stops_the_other_workers_early() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::new(dir.path(), 0)
        .with_workers(3)
        .with_batch_size(10);
    let total = 100_000;

    let err = ip2country::run(
        &config,
        BufReader::new(input_with_bad_first_key(total).as_bytes()),
        Arc::new(ExplodingLookup),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::WorkerPanicked { .. }), "{err:?}");

    let written: usize = (0..config.workers)
        .map(|id| {
            std::fs::read_to_string(config.shard_path(id))
                .unwrap_or_default()
                .lines()
                .count()
        })
        .sum();
    assert!(written < total / 2, "{written} of {total} lines written after a panic");
}

#[cfg(target_os = "linux")]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shard_write_failure_is_reported_over_closed_queue() {
    let pad = "x".repeat(380);
    let input: String = (0..20_000).map(|i| format!("{i}|1.2.3.4|{pad}\n")).collect();

    for _ in 0..5 {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::new(dir.path(), 1).with_workers(1);
        std::os::unix::fs::symlink("/dev/full", config.shard_path(0)).unwrap();

        let err = run(&config, &input).await.unwrap_err();
        assert!(matches!(err, Error::ShardWrite { .. }), "{err:?}");
    }
}
