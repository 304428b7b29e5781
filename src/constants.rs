// ShrimpScale Constants

// Detection model defaults
pub const DEFAULT_MODEL_PATH: &str = "models/YOLOshrimp.onnx";
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
pub const DEFAULT_INPUT_SIZE: u32 = 416;

// Letterbox fill value (neutral gray, same value for all three channels)
pub const LETTERBOX_FILL: u8 = 114;

// Decode layout detection: a trailing output dim of 6 or 7 means the model
// ships its own NMS; anything wider is raw anchor rows (x, y, w, h, obj, classes...)
pub const PRE_NMS_MIN_FIELDS: usize = 6;
pub const PRE_NMS_MAX_FIELDS: usize = 7;

// Session sampling
pub const SAMPLE_INTERVAL_MS: u64 = 100;

// Annotation
pub const OVERLAY_ALPHA: f32 = 0.6;
pub const HUD_TEXT_PX: f32 = 28.0;
pub const HUD_ORIGIN_X: i32 = 15;
pub const HUD_ORIGIN_Y: i32 = 20;

// Paths
pub const DATA_DIR: &str = ".shrimpscale";
pub const DB_FILENAME: &str = "shrimpscale.db";
pub const CONFIG_FILE: &str = "config/config.env";

// Remote store
pub const REMOTE_DB_NAME_DEFAULT: &str = "test";
pub const REMOTE_USERS_COLLECTION: &str = "users";
pub const REMOTE_RECORDS_COLLECTION: &str = "biomassrecords";

// Remote timeouts (seconds). Auth and sync tolerate slow cold clusters;
// delete is best-effort and kept short so a dead link doesn't stall the caller.
pub const REMOTE_AUTH_TIMEOUT_SECS: u64 = 20;
pub const REMOTE_SYNC_TIMEOUT_SECS: u64 = 20;
pub const REMOTE_DELETE_TIMEOUT_SECS: u64 = 4;
pub const REMOTE_CONNECT_TIMEOUT_SECS: u64 = 3;

// Bootstrap credential, seeded only when the user table is empty
pub const BOOTSTRAP_USER_ID: &str = "local-admin";
pub const BOOTSTRAP_USERNAME: &str = "admin";
pub const BOOTSTRAP_PASSWORD: &str = "admin";
pub const BOOTSTRAP_EMAIL: &str = "admin@example.com";
