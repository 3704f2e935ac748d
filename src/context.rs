use chrono::NaiveDate;

use crate::error::RouteError;
use crate::format::{FormatRef, extension_of};
use crate::model::Route;
use crate::parser::NavigationFormatParser;

/// Observes a detection run. All methods have empty defaults.
pub trait ParserListener: Send + Sync {
    /// A candidate format is about to read the source.
    fn reading(&self, _format: FormatRef) {}

    /// A candidate format rejected the source.
    fn read_failed(&self, _format: FormatRef, _error: &RouteError) {}

    /// A candidate format produced routes.
    fn recognized(&self, _format: FormatRef, _routes: usize) {}

    /// Checked between the members of an archive.
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Accumulates the routes of one detection call, including routes found in
/// nested archive members.
pub struct ParseContext<'a> {
    parser: &'a NavigationFormatParser,
    routes: Vec<Route>,
    formats: Vec<FormatRef>,
    start_date: Option<NaiveDate>,
}

impl<'a> ParseContext<'a> {
    pub(crate) fn new(parser: &'a NavigationFormatParser) -> Self {
        Self {
            parser,
            routes: Vec::new(),
            formats: Vec::new(),
            start_date: None,
        }
    }

    pub fn append_route(&mut self, route: Route) {
        self.routes.push(route);
    }

    pub fn append_routes(&mut self, routes: impl IntoIterator<Item = Route>) {
        self.routes.extend(routes);
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Formats that contributed routes, latest and most specific first.
    pub fn formats(&self) -> &[FormatRef] {
        &self.formats
    }

    /// Date for formats that record only the time of day.
    pub fn start_date(&self) -> Option<NaiveDate> {
        self.start_date
    }

    pub fn set_start_date(&mut self, date: Option<NaiveDate>) {
        self.start_date = date;
    }

    pub fn is_cancelled(&self) -> bool {
        self.parser.is_cancelled()
    }

    /// Run detection over an archive member, preferring formats matching its
    /// file name. Routes found are appended to this context.
    pub fn parse_nested(&mut self, bytes: &[u8], member_name: &str) -> bool {
        let parser = self.parser;
        let formats = parser.catalog().read_formats();
        let formats = match extension_of(member_name) {
            Some(extension) => parser.catalog().preferred_by_extension(&formats, &extension),
            None => formats,
        };
        let before = self.routes.len();
        parser.detect(bytes, &formats, self);
        self.routes.len() > before
    }

    pub(crate) fn state(&self) -> (usize, usize) {
        (self.routes.len(), self.formats.len())
    }

    /// Forget what a failed candidate appended.
    pub(crate) fn rollback(&mut self, (routes, formats): (usize, usize)) {
        self.routes.truncate(routes);
        self.formats.truncate(formats);
    }

    /// Record the format that produced routes since `state`. Containers whose
    /// members already recorded more specific formats go behind them.
    pub(crate) fn record_format(&mut self, format: FormatRef, (_, formats): (usize, usize)) {
        if self.formats.len() == formats {
            self.formats.insert(0, format);
        } else {
            self.formats.push(format);
        }
    }

    pub(crate) fn into_parts(self) -> (Vec<Route>, Vec<FormatRef>) {
        (self.routes, self.formats)
    }
}

/// Outcome of reading one source.
#[derive(Debug)]
pub struct ParserResult {
    /// Winning format, or the first format that read the source without
    /// error when nothing produced routes.
    pub format: Option<FormatRef>,
    pub formats: Vec<FormatRef>,
    pub routes: Vec<Route>,
}

impl ParserResult {
    pub fn is_successful(&self) -> bool {
        !self.routes.is_empty()
    }

    pub fn position_counts(&self) -> Vec<usize> {
        self.routes.iter().map(Route::position_count).collect()
    }

    /// Turn an unsuccessful result into `UnrecognizedFormat`.
    pub fn into_routes(self) -> Result<Vec<Route>, RouteError> {
        if self.is_successful() {
            Ok(self.routes)
        } else {
            Err(RouteError::UnrecognizedFormat {
                attempted: self.format.map(|f| f.name()),
            })
        }
    }
}
