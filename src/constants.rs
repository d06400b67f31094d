// Showcache Constants
// Stored paths and dates depend on these. Changing them invalidates existing caches.

// Paths
pub const PATH_DB_SEPARATOR: char = '/';
pub const CACHE_FOLDER: &str = ".showcache";
pub const DB_FILENAME: &str = "showcache.db";

// Dates
pub const STORAGE_DATE_FORMAT: &str = "%Y-%m-%d";
pub const PROVIDER_DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

// Video extensions considered by the scanner
pub const VIDEO_EXTENSIONS: [&str; 14] = [
    "mkv", "mp4", "avi", "mov", "m4v", "wmv", "mpg", "mpeg",
    "ts", "m2ts", "webm", "flv", "ogv", "divx",
];
