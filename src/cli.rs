// ShrimpScale CLI binary

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};

use shrimpscale::auth::AuthGateway;
use shrimpscale::config::RemoteConfig;
use shrimpscale::constants::{
    CONFIG_FILE, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_INPUT_SIZE, DEFAULT_MODEL_PATH,
    REMOTE_AUTH_TIMEOUT_SECS, REMOTE_DELETE_TIMEOUT_SECS, REMOTE_SYNC_TIMEOUT_SECS,
    SAMPLE_INTERVAL_MS,
};
use shrimpscale::db::{default_data_dir, get_db_path, initialize, open_db, schema};
use shrimpscale::detect::{annotate, Detector, ShrimpDetector};
use shrimpscale::remote::MongoRemote;
use shrimpscale::session::{DirectoryFrameSource, FeedBreakdown, MeasurementSession};
use shrimpscale::sync::{DeleteOutcome, SyncEngine};

#[derive(Parser)]
#[command(name = "shrimpscale")]
#[command(about = "ShrimpScale - shrimp biomass measurement and record sync", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the local record store
    Init {
        /// Data directory (defaults to ~/.shrimpscale)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Verify credentials and print the user id
    Login {
        /// Username
        username: String,
        /// Password
        #[arg(short, long)]
        password: String,
        /// Data directory (defaults to ~/.shrimpscale)
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Remote config file
        #[arg(long, default_value = CONFIG_FILE)]
        config: PathBuf,
    },

    /// List records for an owner
    List {
        /// Owner id (as printed by login)
        #[arg(short, long)]
        owner: String,
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
        /// Data directory (defaults to ~/.shrimpscale)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Show the most recent record
    Latest {
        /// Owner id; omit for the most recent record overall
        #[arg(short, long)]
        owner: Option<String>,
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
        /// Data directory (defaults to ~/.shrimpscale)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Run a measurement session over a directory of frames
    Measure {
        /// Directory of frame images
        images: PathBuf,
        /// Owner id; required with --save
        #[arg(short, long)]
        owner: Option<String>,
        /// ONNX model path
        #[arg(long, default_value = DEFAULT_MODEL_PATH)]
        model: PathBuf,
        /// Confidence threshold
        #[arg(long, default_value_t = DEFAULT_CONFIDENCE_THRESHOLD)]
        threshold: f32,
        /// Model input size
        #[arg(long, default_value_t = DEFAULT_INPUT_SIZE)]
        input_size: u32,
        /// Persist the final count as a record
        #[arg(long)]
        save: bool,
        /// Data directory (defaults to ~/.shrimpscale)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Save a record for a known count
    Save {
        /// Shrimp count
        count: i64,
        /// Owner id
        #[arg(short, long)]
        owner: String,
        /// Data directory (defaults to ~/.shrimpscale)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Push unsynced records to the remote mirror
    Sync {
        /// Owner id
        #[arg(short, long)]
        owner: String,
        /// Data directory (defaults to ~/.shrimpscale)
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Remote config file
        #[arg(long, default_value = CONFIG_FILE)]
        config: PathBuf,
    },

    /// Delete a record locally and, if synced, from the remote mirror
    Delete {
        /// Record id (local, as shown by list)
        id: i64,
        /// Owner id
        #[arg(short, long)]
        owner: String,
        /// Data directory (defaults to ~/.shrimpscale)
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Remote config file
        #[arg(long, default_value = CONFIG_FILE)]
        config: PathBuf,
    },

    /// Detect shrimp in a single image
    Detect {
        /// Image path
        image: PathBuf,
        /// ONNX model path
        #[arg(long, default_value = DEFAULT_MODEL_PATH)]
        model: PathBuf,
        /// Confidence threshold
        #[arg(long, default_value_t = DEFAULT_CONFIDENCE_THRESHOLD)]
        threshold: f32,
        /// Model input size
        #[arg(long, default_value_t = DEFAULT_INPUT_SIZE)]
        input_size: u32,
        /// Write the annotated frame here
        #[arg(long)]
        out: Option<PathBuf>,
        /// TTF font for the HUD overlay
        #[arg(long)]
        font: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { data_dir } => cmd_init(data_dir),
        Commands::Login {
            username,
            password,
            data_dir,
            config,
        } => cmd_login(username, password, data_dir, config),
        Commands::List {
            owner,
            json,
            data_dir,
        } => cmd_list(owner, json, data_dir),
        Commands::Latest {
            owner,
            json,
            data_dir,
        } => cmd_latest(owner, json, data_dir),
        Commands::Measure {
            images,
            owner,
            model,
            threshold,
            input_size,
            save,
            data_dir,
        } => cmd_measure(images, owner, model, threshold, input_size, save, data_dir),
        Commands::Save {
            count,
            owner,
            data_dir,
        } => cmd_save(count, owner, data_dir),
        Commands::Sync {
            owner,
            data_dir,
            config,
        } => cmd_sync(owner, data_dir, config),
        Commands::Delete {
            id,
            owner,
            data_dir,
            config,
        } => cmd_delete(id, owner, data_dir, config),
        Commands::Detect {
            image,
            model,
            threshold,
            input_size,
            out,
            font,
        } => cmd_detect(image, model, threshold, input_size, out, font),
    }
}

// Stand-in feed table. The production formula ships with the deployment and
// is injected into the session; counts map linearly here so the CLI stays
// usable without it.
fn compute_feed(count: i64) -> FeedBreakdown {
    let biomass = count as f64 * 0.25;
    let feed = biomass * 0.32;
    let protein = feed * 0.38;
    let filler = feed - protein;
    FeedBreakdown {
        biomass,
        feed,
        protein,
        filler,
    }
}

fn cmd_init(data_dir: Option<PathBuf>) -> Result<()> {
    let data_dir = data_dir.map_or_else(default_data_dir, Ok)?;
    let db_path = get_db_path(&data_dir);

    let existed = db_path.exists();
    let conn = open_db(&db_path)?;
    initialize(&conn)?;

    if existed {
        println!("Record store already initialized at {}", data_dir.display());
    } else {
        println!("Initialized record store at {}", data_dir.display());
        println!("Offline login: admin / admin");
    }
    Ok(())
}

fn cmd_login(
    username: String,
    password: String,
    data_dir: Option<PathBuf>,
    config: PathBuf,
) -> Result<()> {
    let conn = open_store(data_dir)?;
    let remote_config = RemoteConfig::load(&config);
    let remote = MongoRemote::new(remote_config, Duration::from_secs(REMOTE_AUTH_TIMEOUT_SECS));

    let gateway = AuthGateway::new(&remote, &conn);
    match gateway.verify(&username, &password)? {
        Some(user_id) => {
            println!("Login ok");
            println!("User id: {}", user_id);
            Ok(())
        }
        None => anyhow::bail!("Invalid credentials"),
    }
}

fn cmd_list(owner: String, json: bool, data_dir: Option<PathBuf>) -> Result<()> {
    let conn = open_store(data_dir)?;
    let records = schema::list_records_by_owner(&conn, &owner)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No records for this owner.");
        return Ok(());
    }

    println!(
        "{:>5}  {:>7}  {:>9}  {:>7}  {:>6}  {:>25}",
        "ID", "Count", "Biomass", "Feed", "Sync", "Created"
    );
    println!("{}", "-".repeat(70));

    for record in &records {
        let created = record
            .created_at
            .split('.')
            .next()
            .unwrap_or(&record.created_at);
        println!(
            "{:>5}  {:>7}  {:>9.2}  {:>7.2}  {:>6}  {:>25}",
            record.local_id,
            record.shrimp_count,
            record.biomass,
            record.feed_measurement,
            if record.synced { "yes" } else { "no" },
            created
        );
    }

    println!();
    println!("{} record(s)", records.len());
    Ok(())
}

fn cmd_latest(owner: Option<String>, json: bool, data_dir: Option<PathBuf>) -> Result<()> {
    let conn = open_store(data_dir)?;
    let record = match owner.as_deref() {
        Some(owner) => schema::latest_record_by_owner(&conn, owner)?,
        None => schema::latest_record_any(&conn)?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    match record {
        Some(record) => {
            println!("Record #{}", record.local_id);
            println!("Count:    {}", record.shrimp_count);
            println!("Biomass:  {:.2}", record.biomass);
            println!("Feed:     {:.2}", record.feed_measurement);
            println!("Created:  {}", record.created_at);
            println!("Synced:   {}", if record.synced { "yes" } else { "no" });
        }
        None => println!("No records yet."),
    }
    Ok(())
}

fn cmd_measure(
    images: PathBuf,
    owner: Option<String>,
    model: PathBuf,
    threshold: f32,
    input_size: u32,
    save: bool,
    data_dir: Option<PathBuf>,
) -> Result<()> {
    if save && owner.is_none() {
        anyhow::bail!("--save requires --owner");
    }

    let detector = ShrimpDetector::load(&model, threshold, input_size);
    if !detector.is_enabled() {
        println!("Warning: model unavailable, every frame counts as zero.");
    }

    let frames = DirectoryFrameSource::open(&images)?;
    let mut session = MeasurementSession::new(frames, detector, compute_feed);

    session.start();
    let mut ticks = 0usize;
    while let Some(result) = session.tick() {
        ticks += 1;
        log::info!(
            "tick {}: count {} ({:.1} ms inference)",
            ticks,
            result.count,
            result.inference_time_ms
        );
        std::thread::sleep(Duration::from_millis(SAMPLE_INTERVAL_MS));
    }
    session.stop();
    session.release();

    let metrics = session.metrics();
    println!("Frames sampled: {}", ticks);
    println!("Final count:    {}", session.count());
    println!("Biomass:        {:.2}", metrics.biomass);
    println!("Feed:           {:.2}", metrics.feed);
    println!("Protein:        {:.2}", metrics.protein);
    println!("Filler:         {:.2}", metrics.filler);

    if save {
        let conn = open_store(data_dir)?;
        let record = session.save(&conn, owner.as_deref().unwrap_or_default())?;
        println!();
        println!("Saved record {} (local id {})", record.record_id, record.local_id);
    }

    Ok(())
}

fn cmd_save(count: i64, owner: String, data_dir: Option<PathBuf>) -> Result<()> {
    if count < 0 {
        anyhow::bail!("Count must be non-negative");
    }

    let conn = open_store(data_dir)?;
    let breakdown = compute_feed(count);
    let record = schema::insert_record(&conn, &owner, count, breakdown.biomass, breakdown.feed)?;

    println!("Saved record {} (local id {})", record.record_id, record.local_id);
    println!("Count: {}  Biomass: {:.2}  Feed: {:.2}", count, breakdown.biomass, breakdown.feed);
    Ok(())
}

fn cmd_sync(owner: String, data_dir: Option<PathBuf>, config: PathBuf) -> Result<()> {
    let conn = open_store(data_dir)?;
    let remote_config = RemoteConfig::load(&config);
    if !remote_config.is_configured() {
        println!("Remote not configured; records stay local.");
    }
    let remote = MongoRemote::new(remote_config, Duration::from_secs(REMOTE_SYNC_TIMEOUT_SECS));

    let engine = SyncEngine::new(&conn, &remote);
    let synced = engine.sync_owner(&owner)?;
    println!("{} record(s) synced", synced);
    Ok(())
}

fn cmd_delete(id: i64, owner: String, data_dir: Option<PathBuf>, config: PathBuf) -> Result<()> {
    let conn = open_store(data_dir)?;
    let remote_config = RemoteConfig::load(&config);
    let remote = MongoRemote::new(remote_config, Duration::from_secs(REMOTE_DELETE_TIMEOUT_SECS));

    let engine = SyncEngine::new(&conn, &remote);
    match engine.delete_record(id, &owner)? {
        DeleteOutcome::NotFound => anyhow::bail!("Record {} not found for this owner", id),
        DeleteOutcome::DeletedLocalOnly => {
            println!("Deleted record {} (was never synced)", id);
        }
        DeleteOutcome::DeletedBoth => {
            println!("Deleted record {} locally and from the remote mirror", id);
        }
        DeleteOutcome::RemoteMissing => {
            println!("Deleted record {} locally; no matching remote document", id);
        }
        DeleteOutcome::RemoteUnreachable => {
            println!("Deleted record {} locally; remote mirror unreachable", id);
        }
    }
    Ok(())
}

fn cmd_detect(
    image: PathBuf,
    model: PathBuf,
    threshold: f32,
    input_size: u32,
    out: Option<PathBuf>,
    font: Option<PathBuf>,
) -> Result<()> {
    let detector = ShrimpDetector::load(&model, threshold, input_size);
    if !detector.is_enabled() {
        println!("Warning: model unavailable, reporting zero detections.");
    }

    let frame = image::open(&image)?.to_rgb8();
    let result = detector.detect(&frame);

    println!("Count: {}", result.count);
    println!("Inference: {:.1} ms", result.inference_time_ms);
    for (i, b) in result.boxes.iter().enumerate() {
        println!(
            "  [{}] ({:.0}, {:.0}) - ({:.0}, {:.0})",
            i, b.x1, b.y1, b.x2, b.y2
        );
    }

    if let Some(out) = out {
        let loaded_font = font.as_deref().and_then(annotate::load_font);
        let annotated = annotate::annotate(&frame, &result, loaded_font.as_ref());
        annotated.save(&out)?;
        println!("Annotated frame written to {}", out.display());
    }

    Ok(())
}

// --- Helper Functions ---

/// Open the record store, requiring a prior `init`.
fn open_store(data_dir: Option<PathBuf>) -> Result<rusqlite::Connection> {
    let data_dir = data_dir.map_or_else(default_data_dir, Ok)?;
    let db_path = get_db_path(&data_dir);
    if !db_path.exists() {
        anyhow::bail!(
            "No record store at {}. Use 'shrimpscale init' to create one.",
            data_dir.display()
        );
    }

    let conn = open_db(&db_path)?;
    initialize(&conn)?;
    Ok(conn)
}
