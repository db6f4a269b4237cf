use clap::{Args, Parser, Subcommand};
use hstream_client::{
    ClientConfig, ClientSettings, HStreamClient, Payload, Record, ReaderConfig, ShardOffset,
    SpecialOffset, Stream, Subscription, telemetry,
};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "hstream-cli", version, author, about = "HStream client")]
struct Cli {
    /// Seed node URL, e.g. hstream://127.0.0.1:6570
    #[arg(long, default_value = "hstream://127.0.0.1:6570")]
    url: String,

    /// Settings file (JSON or YAML); overrides --url
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Connect and print the known cluster members
    Describe,
    /// Create a stream
    CreateStream(CreateStreamCmd),
    /// Delete a stream
    DeleteStream(DeleteStreamCmd),
    /// List streams
    ListStreams,
    /// List the shards of a stream
    ListShards(StreamCmd),
    /// Append one or more records to a stream
    Append(AppendCmd),
    /// Create a subscription
    CreateSubscription(CreateSubscriptionCmd),
    /// List subscriptions
    ListSubscriptions,
    /// Delete a subscription
    DeleteSubscription(DeleteSubscriptionCmd),
    /// Read records from one shard through a temporary reader
    Read(ReadCmd),
}

#[derive(Args, Debug)]
struct StreamCmd {
    #[arg(long)]
    stream: String,
}

#[derive(Args, Debug)]
struct CreateStreamCmd {
    #[arg(long)]
    stream: String,
    #[arg(long, default_value_t = 1)]
    replication_factor: u32,
    /// Backlog retention in seconds (0 = none)
    #[arg(long, default_value_t = 0)]
    backlog_seconds: u64,
    #[arg(long, default_value_t = 1)]
    shard_count: u32,
}

#[derive(Args, Debug)]
struct DeleteStreamCmd {
    #[arg(long)]
    stream: String,
    #[arg(long)]
    ignore_missing: bool,
    #[arg(long)]
    force: bool,
}

#[derive(Args, Debug)]
struct AppendCmd {
    #[arg(long)]
    stream: String,
    /// Record payload(s). Repeat to send multiple records.
    #[arg(long, required = true)]
    value: Vec<String>,
    /// Partition key applied to all records
    #[arg(long)]
    key: Option<String>,
    /// Send payloads as JSON documents instead of raw bytes
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct CreateSubscriptionCmd {
    #[arg(long)]
    subscription_id: String,
    #[arg(long)]
    stream: String,
    #[arg(long, default_value_t = 600)]
    ack_timeout_seconds: u64,
    #[arg(long, default_value_t = 10_000)]
    max_unacked_records: u32,
    /// Start from the earliest record instead of the latest
    #[arg(long)]
    earliest: bool,
}

#[derive(Args, Debug)]
struct DeleteSubscriptionCmd {
    #[arg(long)]
    subscription_id: String,
    #[arg(long)]
    force: bool,
}

#[derive(Args, Debug)]
struct ReadCmd {
    #[arg(long)]
    stream: String,
    /// Shard to read; derived from --key when omitted
    #[arg(long)]
    shard_id: Option<u64>,
    #[arg(long)]
    key: Option<String>,
    #[arg(long, default_value_t = 100)]
    max_records: u64,
    #[arg(long)]
    earliest: bool,
    /// Server-side read timeout in milliseconds
    #[arg(long, default_value_t = 1000)]
    timeout_ms: u64,
}

fn print_record(r: &Record) {
    match &r.payload {
        Payload::Raw(bytes) => print!("{} {}", r.id, String::from_utf8_lossy(bytes)),
        Payload::Json(value) => print!("{} {}", r.id, value),
    }
    if !r.key.is_empty() {
        print!(" (key: {})", r.key);
    }
    println!();
}

fn special_offset(earliest: bool) -> SpecialOffset {
    if earliest {
        SpecialOffset::Earliest
    } else {
        SpecialOffset::Latest
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ClientSettings::from_path(path)?.into_config()?,
        None => ClientConfig::from_url(&cli.url)?,
    };
    let client = HStreamClient::connect(config).await?;

    match cli.command {
        Commands::Describe => {
            println!("control: {}", client.control_target());
            for target in client.known_targets() {
                println!("{target}");
            }
        }
        Commands::CreateStream(args) => {
            let stream = Stream::new(args.stream)
                .with_replication_factor(args.replication_factor)
                .with_backlog_duration(Duration::from_secs(args.backlog_seconds))
                .with_shard_count(args.shard_count);
            client.create_stream(&stream).await?;
            println!("created");
        }
        Commands::DeleteStream(args) => {
            client
                .delete_stream(&args.stream, args.ignore_missing, args.force)
                .await?;
            println!("deleted");
        }
        Commands::ListStreams => {
            for s in client.list_streams().await? {
                println!(
                    "{} (shards: {}, replication: {})",
                    s.name, s.shard_count, s.replication_factor
                );
            }
        }
        Commands::ListShards(args) => {
            for shard in client.list_shards(&args.stream).await? {
                println!(
                    "{} [{}, {}]",
                    shard.shard_id, shard.start_hash_range_key, shard.end_hash_range_key
                );
            }
        }
        Commands::Append(args) => {
            let payloads = args
                .value
                .into_iter()
                .map(|v| {
                    if args.json {
                        serde_json::from_str(&v).map(Payload::Json)
                    } else {
                        Ok(Payload::from(v))
                    }
                })
                .collect::<Result<Vec<_>, _>>()?;
            for id in client
                .append(&args.stream, payloads, args.key.as_deref())
                .await?
            {
                println!("{id}");
            }
        }
        Commands::CreateSubscription(args) => {
            let subscription = Subscription::new(args.subscription_id, args.stream)
                .with_ack_timeout(Duration::from_secs(args.ack_timeout_seconds))
                .with_max_unacked_records(args.max_unacked_records)
                .with_offset(special_offset(args.earliest));
            client.create_subscription(&subscription).await?;
            println!("created");
        }
        Commands::ListSubscriptions => {
            for s in client.list_subscriptions().await? {
                println!("{} -> {}", s.subscription_id, s.stream_name);
            }
        }
        Commands::DeleteSubscription(args) => {
            client
                .delete_subscription(&args.subscription_id, args.force)
                .await?;
            println!("deleted");
        }
        Commands::Read(args) => {
            let reader_id = format!("hstream-cli-{}", std::process::id());
            let mut reader = ReaderConfig::new(
                args.stream,
                reader_id,
                ShardOffset::Special(special_offset(args.earliest)),
                Duration::from_millis(args.timeout_ms),
            );
            if let Some(shard_id) = args.shard_id {
                reader = reader.with_shard_id(shard_id);
            }
            if let Some(key) = args.key {
                reader = reader.with_key(key);
            }

            let max_records = args.max_records;
            client
                .with_reader(reader, |handle| async move {
                    for record in handle.read(max_records).await? {
                        print_record(&record);
                    }
                    Ok(())
                })
                .await?;
        }
    }

    client.shutdown();
    Ok(())
}
