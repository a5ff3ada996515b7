//! Example harness for kfile.
//!
//! Writes generated files concurrently and prints their locators, or reads a
//! file back from its locator.
//!
//! # Writing and Reading Against Kafka
//!
//! Requires a build with the `kafka` feature:
//!
//! ```bash
//! kfile --transport kafka --addr localhost:9092 write
//! kfile --transport kafka --addr localhost:9092 read \
//!     --uri 'kfile://kfile.default?name=file0&partition=3&start=0&end=99'
//! ```
//!
//! # In-Process Demo
//!
//! The in-memory transport does not outlive the process, so `demo` writes
//! and reads back in one run:
//!
//! ```bash
//! kfile demo --concurrent 4 --lines 10
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use kfile::{Locator, ReadFile, TopicSpec, WriteFile, WriterConfig};
use kfile_transport::{LogTransport, SimulatedLog};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Log transport to run against.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum TransportKind {
    /// In-process simulated log.
    #[default]
    Memory,
    /// Kafka cluster at `--addr`.
    Kafka,
}

/// Write files to, and read files from, a partitioned log.
#[derive(Parser, Debug)]
#[command(name = "kfile")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log transport to use.
    #[arg(long, value_enum, default_value = "memory", global = true)]
    transport: TransportKind,

    /// Broker address. Can be repeated or comma separated.
    #[arg(
        long = "addr",
        value_delimiter = ',',
        default_value = "localhost:9092",
        global = true
    )]
    addrs: Vec<String>,

    /// Topic holding the files.
    #[arg(long, default_value = "kfile.default", global = true)]
    topic: String,

    /// Number of files written, or readers started, in parallel.
    #[arg(long, default_value = "3", global = true)]
    concurrent: usize,

    /// Partition count used if the topic has to be created.
    #[arg(long, default_value = "6", global = true)]
    num_partitions: i32,

    /// Replication factor used if the topic has to be created.
    #[arg(long, default_value = "1", global = true)]
    replication_factor: i16,

    /// Retention in days used if the topic has to be created.
    #[arg(long, default_value = "31", global = true)]
    retention_days: u64,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    log_level: Level,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write generated lines to new files and print their locators.
    Write {
        /// Lines per file.
        #[arg(long, default_value = "100")]
        lines: usize,

        /// Prefix of the generated file names.
        #[arg(long, default_value = "file")]
        name_prefix: String,

        /// Seconds to wait for acknowledgments when closing a file.
        #[arg(long, default_value = "10")]
        max_wait_secs: u64,
    },
    /// Read a file back and print its contents.
    Read {
        /// Locator printed by `write`.
        #[arg(long)]
        uri: String,
    },
    /// Write files, then read each one back, in one process.
    Demo {
        /// Lines per file.
        #[arg(long, default_value = "100")]
        lines: usize,
    },
}

impl Args {
    fn writer_config(&self) -> WriterConfig {
        let retention = Duration::from_secs(self.retention_days * 24 * 3600);
        WriterConfig::new().with_topic(
            TopicSpec::new()
                .with_num_partitions(self.num_partitions)
                .with_replication_factor(self.replication_factor)
                .with_retention(retention),
        )
    }
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn connect(args: &Args) -> Result<Arc<dyn LogTransport>, BoxError> {
    match args.transport {
        TransportKind::Memory => Ok(Arc::new(SimulatedLog::default())),
        #[cfg(feature = "kafka")]
        TransportKind::Kafka => {
            let config = kfile_transport::KafkaConfig::new(args.addrs.iter().cloned());
            Ok(Arc::new(kfile_transport::KafkaTransport::new(config)?))
        }
        #[cfg(not(feature = "kafka"))]
        TransportKind::Kafka => {
            Err("kafka transport requires building with --features kafka".into())
        }
    }
}

/// The `i`-th generated line of file `name`.
fn generated_line(i: usize, name: &str) -> String {
    format!("Line {i} of file {name}\n")
}

async fn write_one(
    transport: Arc<dyn LogTransport>,
    topic: String,
    name: String,
    config: WriterConfig,
    lines: usize,
    max_wait: Duration,
) -> kfile::FileResult<Locator> {
    let mut file = WriteFile::open(transport.as_ref(), &topic, &name, config).await?;
    file.append((0..lines).map(|i| generated_line(i, &name))).await?;
    file.close(Some(max_wait)).await
}

async fn write_files(
    transport: &Arc<dyn LogTransport>,
    args: &Args,
    lines: usize,
    name_prefix: &str,
    max_wait: Duration,
) -> Vec<Locator> {
    let tasks = (0..args.concurrent).map(|i| {
        tokio::spawn(write_one(
            Arc::clone(transport),
            args.topic.clone(),
            format!("{name_prefix}{i}"),
            args.writer_config(),
            lines,
            max_wait,
        ))
    });

    let mut locators = Vec::new();
    for result in futures::future::join_all(tasks).await {
        match result {
            Ok(Ok(locator)) => {
                println!("write to {locator}");
                locators.push(locator);
            }
            Ok(Err(err)) => error!(error = %err, "Write failed"),
            Err(err) => error!(error = %err, "Writer task panicked"),
        }
    }
    locators
}

async fn read_one(transport: Arc<dyn LogTransport>, uri: String) -> kfile::FileResult<String> {
    let mut file = ReadFile::open(transport.as_ref(), &uri).await?;
    let bytes = file.read_all().await?;
    file.close();
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

async fn read_files(transport: &Arc<dyn LogTransport>, uri: &str, readers: usize) -> usize {
    let tasks =
        (0..readers).map(|_| tokio::spawn(read_one(Arc::clone(transport), uri.to_string())));

    let mut failures = 0;
    for result in futures::future::join_all(tasks).await {
        match result {
            Ok(Ok(contents)) => {
                println!("read from {uri}");
                println!("{contents}");
            }
            Ok(Err(err)) => {
                failures += 1;
                error!(uri, error = %err, "Read failed");
            }
            Err(err) => {
                failures += 1;
                error!(uri, error = %err, "Reader task panicked");
            }
        }
    }
    failures
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let args = Args::parse();

    // Logs go to stderr so stdout carries only locators and file contents.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!(
        transport = ?args.transport,
        addrs = ?args.addrs,
        topic = %args.topic,
        concurrent = args.concurrent,
        "Starting kfile"
    );
    let transport = connect(&args)?;

    match &args.command {
        Command::Write {
            lines,
            name_prefix,
            max_wait_secs,
        } => {
            let max_wait = Duration::from_secs(*max_wait_secs);
            let locators = write_files(&transport, &args, *lines, name_prefix, max_wait).await;
            if locators.len() < args.concurrent {
                let failed = args.concurrent - locators.len();
                return Err(format!("{failed} of {} writes failed", args.concurrent).into());
            }
        }
        Command::Read { uri } => {
            let failures = read_files(&transport, uri, args.concurrent).await;
            if failures > 0 {
                return Err(format!("{failures} of {} reads failed", args.concurrent).into());
            }
        }
        Command::Demo { lines } => {
            let locators =
                write_files(&transport, &args, *lines, "file", Duration::from_secs(10)).await;
            for locator in &locators {
                let failures = read_files(&transport, &locator.format(), 1).await;
                if failures > 0 {
                    return Err(format!("reading {locator} failed").into());
                }
            }
        }
    }

    Ok(())
}
