use thiserror::Error;
use wasm_bindgen::JsValue;

/// Errors raised while detecting, reading, converting or writing routes.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Missing attribute '{attribute}' on <{element}>")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },

    #[error("Invalid value '{value}' for attribute '{attribute}' on <{element}>")]
    InvalidAttribute {
        element: &'static str,
        attribute: &'static str,
        value: String,
    },

    /// A candidate format rejected the content it was given.
    #[error("{format}: {message}")]
    Format {
        format: &'static str,
        message: String,
    },

    /// No candidate produced a route.
    #[error("Unrecognized format{}", attempted_suffix(.attempted))]
    UnrecognizedFormat { attempted: Option<&'static str> },

    #[error("Rewind buffer of {limit} bytes exhausted")]
    RewindExhausted { limit: usize },

    #[error(
        "Route with {positions} positions needs {required} files of at most {maximum} positions, but only {available} destinations were given"
    )]
    CapacityExceeded {
        positions: usize,
        maximum: usize,
        required: usize,
        available: usize,
    },

    #[error("Unknown format '{0}'")]
    UnknownFormat(String),

    #[error("No route at index {index}, the source has {count} route(s)")]
    NoSuchRoute { index: usize, count: usize },

    #[error("{format} does not support {operation}")]
    Unsupported {
        format: &'static str,
        operation: &'static str,
    },
}

impl RouteError {
    pub(crate) fn format(format: &'static str, message: impl Into<String>) -> Self {
        Self::Format {
            format,
            message: message.into(),
        }
    }
}

fn attempted_suffix(attempted: &Option<&'static str>) -> String {
    match attempted {
        Some(name) => format!(" ({name} read the input but found no routes)"),
        None => String::new(),
    }
}

impl From<quick_xml::events::attributes::AttrError> for RouteError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        Self::Xml(e.into())
    }
}

impl From<RouteError> for JsValue {
    fn from(e: RouteError) -> Self {
        JsValue::from_str(&e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RouteError>;
