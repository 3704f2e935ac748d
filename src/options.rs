use serde::Deserialize;

use crate::source::DEFAULT_READ_BUFFER_SIZE;

/// Options for detecting and reading routes.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParserOptions {
    /// Bytes kept for rewinding between candidate formats (default: 64 MiB)
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,

    /// Label positions without comment as "Position N" (default: true)
    #[serde(default = "default_true")]
    pub number_positions: bool,

    /// Maximum length of generated route names (default: 64)
    #[serde(default = "default_label_length")]
    pub max_label_length: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            number_positions: true,
            max_label_length: default_label_length(),
        }
    }
}

/// Options for writing a route to one or more files.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteOptions {
    /// Write into fewer files than the position limit requires (default: false)
    #[serde(default)]
    pub allow_overflow: bool,

    /// Name each file's route after its first and last position (default: true)
    #[serde(default = "default_true")]
    pub name_fragments: bool,

    /// Maximum length of generated fragment names (default: 64)
    #[serde(default = "default_label_length")]
    pub max_label_length: usize,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            allow_overflow: false,
            name_fragments: true,
            max_label_length: default_label_length(),
        }
    }
}

/// Options of the `convertRoutes` binding.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertOptions {
    #[serde(default)]
    pub parser: ParserOptions,

    #[serde(default)]
    pub write: WriteOptions,

    /// Index of the route to convert (default: 0)
    #[serde(default)]
    pub route_index: usize,

    /// Douglas-Peucker threshold in meters applied before writing (default: none)
    #[serde(default)]
    pub simplify_threshold: Option<f64>,

    /// Drop adjacent duplicates from routes and tracks (default: false)
    #[serde(default)]
    pub remove_duplicates: bool,

    /// Interpolate missing timestamps of tracks (default: false)
    #[serde(default)]
    pub repair_times: bool,

    /// Write all routes into one file when the target format holds
    /// multiple routes (default: false)
    #[serde(default)]
    pub combine_routes: bool,
}

fn default_true() -> bool {
    true
}

fn default_read_buffer_size() -> usize {
    DEFAULT_READ_BUFFER_SIZE
}

fn default_label_length() -> usize {
    64
}
