use crate::cli::RunArgs;
use crate::commands;
use crate::exit_codes;
use crate::output::{self, RecordWriter};
use chrono::{DateTime, Utc};
use rtmap::{
    JsonlReadSource, LoadSummary, MapScheduler, ReplayMapper, ReplayTable, SchedulerStats,
    ThreadedMapPool,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Why the tick loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum StopReason {
    Completed,
    Interrupted,
    MaxTicks,
    Duration,
}

#[derive(Debug, Default, Serialize)]
struct RecordCounts {
    mapped: u64,
    unmapped: u64,
    failed: u64,
}

#[derive(Serialize)]
struct RunSummary {
    run_id: String,
    started_at: DateTime<Utc>,
    elapsed_secs: f64,
    stop_reason: StopReason,
    read_files: Vec<String>,
    load: LoadSummary,
    records: RecordCounts,
    stats: SchedulerStats,
}

pub async fn execute(args: RunArgs) -> i32 {
    let config = match commands::load_config(&args.conf) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return commands::exit_code_for(&e);
        }
    };

    let files = match resolve_reads(&args.reads) {
        Ok(f) => f,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };
    if files.is_empty() {
        eprintln!("Error: No read files matched");
        return exit_codes::INPUT_ERROR;
    }

    let table = Arc::new(ReplayTable::new());
    let mut source = match JsonlReadSource::open(&files) {
        Ok(s) => s.with_replay_table(Arc::clone(&table)),
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::INPUT_ERROR;
        }
    };

    let pool = match ThreadedMapPool::new(&config, ReplayMapper::factory(table)) {
        Ok(p) => Arc::new(p),
        Err(e) => {
            eprintln!("Error: {}", e);
            return commands::exit_code_for(&e);
        }
    };
    let mut scheduler = match MapScheduler::from_config(&config, pool) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return commands::exit_code_for(&e);
        }
    };

    let run_id = uuid::Uuid::new_v4().to_string();
    let started_at = Utc::now();
    let start_time = Instant::now();

    if !args.quiet {
        eprintln!("Loading reads from {} file(s)...", files.len());
    }
    let load = match scheduler.load_all(&mut source) {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("Error: {}", e);
            return commands::exit_code_for(&e);
        }
    };
    if !args.quiet {
        eprintln!(
            "  Loaded {} reads on {} channels; mapping with {} workers",
            load.loaded, load.channels_used, config.global.threads
        );
    }

    let mut writer = match RecordWriter::create(args.output.as_deref(), args.json) {
        Ok(w) => w,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::EXECUTION_ERROR;
        }
    };

    let mut records = RecordCounts::default();
    let stop_reason = match drive(&mut scheduler, &mut writer, &mut records, &args).await {
        Ok(reason) => reason,
        Err(e) => {
            eprintln!("Error: {}", e);
            scheduler.stop();
            return exit_codes::EXECUTION_ERROR;
        }
    };
    if stop_reason != StopReason::Completed {
        log::info!("Stopping early: {:?}", stop_reason);
        scheduler.stop();
    }

    if let Err(e) = writer.finish() {
        eprintln!("Error: {}", e);
        return exit_codes::EXECUTION_ERROR;
    }
    if !args.quiet {
        if let Some(ref path) = args.output {
            eprintln!("Records written to {}", path);
        }
        let summary = RunSummary {
            run_id,
            started_at,
            elapsed_secs: start_time.elapsed().as_secs_f64(),
            stop_reason,
            read_files: files,
            load,
            records,
            stats: scheduler.stats().clone(),
        };
        match output::to_json(&summary, false) {
            Ok(json) => eprintln!("{}", json),
            Err(e) => {
                eprintln!("Error: {}", e);
                return exit_codes::EXECUTION_ERROR;
            }
        }
    }

    exit_codes::SUCCESS
}

/// Tick until the scheduler drains or a stop condition fires
async fn drive(
    scheduler: &mut MapScheduler<ThreadedMapPool>,
    writer: &mut RecordWriter,
    records: &mut RecordCounts,
    args: &RunArgs,
) -> Result<StopReason, String> {
    let mut tick = interval(Duration::from_millis(args.tick_interval_ms));
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let deadline = args
        .duration
        .map(|secs| Instant::now() + Duration::from_secs_f64(secs.max(0.0)));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut ticks = 0u64;
    while scheduler.is_running() {
        tokio::select! {
            biased;

            _ = &mut ctrl_c => {
                log::info!("Interrupted");
                return Ok(StopReason::Interrupted);
            }
            _ = tick.tick() => {}
        }

        for (_, record) in scheduler.tick() {
            if record.failed {
                records.failed += 1;
            } else if record.is_mapped() {
                records.mapped += 1;
            } else {
                records.unmapped += 1;
            }
            writer.write(&record)?;
        }
        ticks += 1;

        if args.max_ticks.is_some_and(|max| ticks >= max) {
            return Ok(StopReason::MaxTicks);
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Ok(StopReason::Duration);
        }
    }
    Ok(StopReason::Completed)
}

/// Expand read arguments: glob patterns are expanded, plain paths kept as given.
fn resolve_reads(patterns: &[String]) -> Result<Vec<String>, String> {
    let mut files: Vec<String> = Vec::new();
    for pattern in patterns {
        if !pattern.contains(['*', '?', '[']) {
            files.push(pattern.clone());
            continue;
        }
        let paths = glob::glob(pattern)
            .map_err(|e| format!("Invalid glob pattern '{}': {}", pattern, e))?;
        let mut matched: Vec<String> = Vec::new();
        for entry in paths {
            match entry {
                Ok(path) => {
                    if path.is_file() {
                        if let Some(s) = path.to_str() {
                            matched.push(s.to_string());
                        }
                    }
                }
                Err(e) => {
                    eprintln!("Warning: glob error: {}", e);
                }
            }
        }
        matched.sort();
        files.extend(matched);
    }
    Ok(files)
}
