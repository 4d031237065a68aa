use rtmap::{
    JsonlReadSource, MapScheduler, PafRecord, ReplayMapper, ReplayTable, RtMapConfig,
    ThreadedMapPool,
};
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

const READS: &str = r#"{"id":"a1","channel":0,"number":1,"start_sample":0,"chunks":[[1,1,1,1],[1,1,1,1],[1,1,1,1]],"replay":{"after_chunks":2,"target":{"query_start":0,"query_end":8,"strand":"+","name":"chr1","length":1000,"start":100,"end":108,"matches":8,"block_len":8,"mapq":60}}}
{"id":"a2","channel":0,"number":2,"start_sample":400,"chunks":[[2,2],[2,2]]}
{"id":"b1","channel":1,"number":1,"start_sample":10,"chunks":[[3,3,3]],"replay":{"after_chunks":1,"fail":true}}
{"id":"c1","channel":3,"number":5,"start_sample":0,"chunks":[[4],[4],[4],[4],[4],[4]],"replay":{"after_chunks":1}}
"#;

/// Tick the scheduler until it reports no more work, collecting every record
fn run_to_completion(scheduler: &mut MapScheduler<ThreadedMapPool>) -> Vec<(u16, PafRecord)> {
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut records = Vec::new();
    while scheduler.is_running() {
        assert!(Instant::now() < deadline, "scheduler did not finish in time");
        records.extend(scheduler.tick());
        std::thread::sleep(Duration::from_millis(1));
    }
    records
}

#[test]
fn test_replayed_reads_map_end_to_end() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(READS.as_bytes()).unwrap();

    let mut config = RtMapConfig::default();
    config.global.num_channels = 4;
    config.global.threads = 2;
    config.pool.max_active_reads = 2;
    config.pool.chunk_queue_len = 1;
    config.pool.max_chunks = 4;

    let table = Arc::new(ReplayTable::new());
    let factory = ReplayMapper::factory(Arc::clone(&table));
    let pool = Arc::new(ThreadedMapPool::new(&config, factory).unwrap());
    let mut scheduler = MapScheduler::from_config(&config, pool).unwrap();

    let mut source = JsonlReadSource::open([file.path()])
        .unwrap()
        .with_replay_table(table);
    let summary = scheduler.load_all(&mut source).unwrap();
    assert_eq!(summary.loaded, 4);
    assert_eq!(summary.channels_used, 3);

    let records = run_to_completion(&mut scheduler);
    assert_eq!(records.len(), 4);

    let find = |id: &str| {
        records
            .iter()
            .map(|(_, r)| r)
            .find(|r| r.read_id == id)
            .unwrap_or_else(|| panic!("no record for {}", id))
    };

    let a1 = find("a1");
    assert!(a1.is_mapped());
    assert_eq!(a1.chunks_mapped, 2);
    assert_eq!(a1.read_len, 8);

    let a2 = find("a2");
    assert!(!a2.is_mapped());
    assert_eq!(a2.chunks_mapped, 2);

    assert!(find("b1").failed);

    // No recorded target: unmapped on its first chunk
    let c1 = find("c1");
    assert!(!c1.is_mapped());
    assert_eq!(c1.chunks_mapped, 1);

    // Reads on a channel come back in temporal order
    let channel0: Vec<&str> = records
        .iter()
        .filter(|(ch, _)| *ch == 0)
        .map(|(_, r)| r.read_id.as_str())
        .collect();
    assert_eq!(channel0, vec!["a1", "a2"]);

    let stats = scheduler.stats();
    assert_eq!(stats.reads_retired, 4);
    assert_eq!(stats.stale_results, 0);
    assert_eq!(scheduler.pool().active_reads(), 0);
}

#[test]
fn test_stop_abandons_in_flight_reads() {
    let mut config = RtMapConfig::default();
    config.global.num_channels = 2;
    config.global.threads = 1;
    config.pool.max_chunks = 100;

    let table = Arc::new(ReplayTable::new());
    let pool = Arc::new(ThreadedMapPool::new(&config, ReplayMapper::factory(table)).unwrap());
    let mut scheduler = MapScheduler::from_config(&config, pool).unwrap();

    let reads = (0..2u16)
        .map(|ch| rtmap::ReadBuffer::new(format!("r{}", ch), ch, 1, 0, vec![vec![0.0; 4]; 50]))
        .collect::<Vec<_>>();
    scheduler
        .load_all(&mut rtmap::VecReadSource::new(reads))
        .unwrap();

    for _ in 0..3 {
        scheduler.tick();
    }
    scheduler.stop();

    // Queues remain, so the scheduler still has work it will never finish
    assert!(scheduler.tick().is_empty());
    assert!(scheduler.is_running());
    assert_eq!(scheduler.channel(0).unwrap().len(), 1);
    assert!(scheduler.stats().chunks_rejected >= 2);
}
