//! Format detection: offer a rewindable byte stream to candidate formats in
//! priority order until one of them produces routes.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use log::{debug, warn};

use crate::catalog::FormatCatalog;
use crate::comments;
use crate::context::{ParseContext, ParserListener, ParserResult};
use crate::error::Result;
use crate::format::{FormatRef, extension_of};
use crate::options::ParserOptions;
use crate::source::RewindableSource;

pub struct NavigationFormatParser {
    catalog: FormatCatalog,
    options: ParserOptions,
    listeners: Vec<Box<dyn ParserListener>>,
}

impl Default for NavigationFormatParser {
    fn default() -> Self {
        Self::new(FormatCatalog::default(), ParserOptions::default())
    }
}

impl NavigationFormatParser {
    pub fn new(catalog: FormatCatalog, options: ParserOptions) -> Self {
        Self {
            catalog,
            options,
            listeners: Vec::new(),
        }
    }

    pub fn add_listener(&mut self, listener: impl ParserListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn catalog(&self) -> &FormatCatalog {
        &self.catalog
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.listeners.iter().any(|l| l.is_cancelled())
    }

    /// Read `source` trying `formats` in order. Routes are post-processed
    /// (labels, names, shared-coordinate back-fill) before they are returned.
    pub fn read<R: Read>(&self, source: R, formats: &[FormatRef]) -> ParserResult {
        let mut context = ParseContext::new(self);
        let of_record = self.detect(source, formats, &mut context);
        let (mut routes, formats) = context.into_parts();
        comments::finalize(&mut routes, &self.options);

        ParserResult {
            format: formats.first().copied().or(of_record),
            formats,
            routes,
        }
    }

    /// Read an in-memory buffer with all read formats, preferring those
    /// matching the extension of `file_name`.
    pub fn read_bytes(&self, bytes: &[u8], file_name: Option<&str>) -> ParserResult {
        let formats = self.formats_for(file_name);
        self.read(bytes, &formats)
    }

    pub fn read_path(&self, path: impl AsRef<Path>) -> Result<ParserResult> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let formats = self.formats_for(path.file_name().and_then(|name| name.to_str()));
        Ok(self.read(BufReader::new(file), &formats))
    }

    /// Read with `preferred` tried first, e.g. the format that recognized
    /// the previous file.
    pub fn read_preferring<R: Read>(&self, source: R, preferred: FormatRef) -> ParserResult {
        let formats = self
            .catalog
            .preferred_format(&self.catalog.read_formats(), preferred);
        self.read(source, &formats)
    }

    fn formats_for(&self, file_name: Option<&str>) -> Vec<FormatRef> {
        let formats = self.catalog.read_formats();
        match file_name.and_then(extension_of) {
            Some(extension) => self.catalog.preferred_by_extension(&formats, &extension),
            None => formats,
        }
    }

    /// Returns the winning format, or the first format that read the source
    /// without error if none produced routes.
    pub(crate) fn detect<R: Read>(
        &self,
        source: R,
        formats: &[FormatRef],
        context: &mut ParseContext<'_>,
    ) -> Option<FormatRef> {
        let mut source = RewindableSource::new(source);
        source.mark(self.options.read_buffer_size);
        let mut first_empty = None;

        for (index, &format) in formats.iter().enumerate() {
            if index > 0 {
                if let Err(e) = source.reset() {
                    warn!("Stopping detection before {}: {e}", format.name());
                    break;
                }
            }

            for listener in &self.listeners {
                listener.reading(format);
            }
            let state = context.state();

            match format.read(&mut source, context) {
                Ok(()) => {
                    let found = context.routes().len() - state.0;
                    if found > 0 {
                        debug!("{} recognized {found} route(s)", format.name());
                        context.record_format(format, state);
                        for listener in &self.listeners {
                            listener.recognized(format, found);
                        }
                        return Some(format);
                    }
                    debug!("{} read the source but found no routes", format.name());
                    first_empty.get_or_insert(format);
                }
                Err(e) => {
                    context.rollback(state);
                    warn!("{} could not read the source: {e}", format.name());
                    for listener in &self.listeners {
                        listener.read_failed(format, &e);
                    }
                }
            }
        }

        first_empty
    }
}
