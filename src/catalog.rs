use crate::format::{FormatRef, same_format};
use crate::formats;

/// The ordered list of known formats. Order is detection priority: specific
/// formats first, recovery variants after their well-formed counterpart and
/// catch-alls last.
#[derive(Debug, Clone)]
pub struct FormatCatalog {
    formats: Vec<FormatRef>,
}

impl Default for FormatCatalog {
    fn default() -> Self {
        let formats: [FormatRef; 8] = [
            &formats::ZIP,
            &formats::GPX,
            &formats::GEOJSON,
            &formats::NMEA,
            &formats::ITN,
            &formats::GRID,
            &formats::BROKEN_NMEA,
            &formats::WAYPOINT_LIST,
        ];
        Self::new(formats.to_vec())
    }
}

impl FormatCatalog {
    pub fn new(formats: Vec<FormatRef>) -> Self {
        Self { formats }
    }

    pub fn formats(&self) -> &[FormatRef] {
        &self.formats
    }

    pub fn read_formats(&self) -> Vec<FormatRef> {
        self.formats
            .iter()
            .copied()
            .filter(|f| f.capabilities().reading)
            .collect()
    }

    pub fn write_formats(&self) -> Vec<FormatRef> {
        self.formats
            .iter()
            .copied()
            .filter(|f| f.capabilities().writing)
            .collect()
    }

    /// Find a format by its name or extension, ignoring case.
    pub fn find(&self, name_or_extension: &str) -> Option<FormatRef> {
        let wanted = name_or_extension.trim();
        let dotted = if wanted.starts_with('.') {
            wanted.to_string()
        } else {
            format!(".{wanted}")
        };
        self.formats
            .iter()
            .copied()
            .find(|f| f.name().eq_ignore_ascii_case(wanted))
            .or_else(|| {
                self.formats
                    .iter()
                    .copied()
                    .find(|f| f.extension().eq_ignore_ascii_case(&dotted))
            })
    }

    /// Move formats whose extension matches to the front, keeping the
    /// relative order of both groups.
    pub fn preferred_by_extension(&self, formats: &[FormatRef], extension: &str) -> Vec<FormatRef> {
        let (mut matching, rest): (Vec<FormatRef>, Vec<FormatRef>) = formats
            .iter()
            .copied()
            .partition(|f| f.extension().eq_ignore_ascii_case(extension));
        matching.extend(rest);
        matching
    }

    /// Pin `preferred` to the front, e.g. to retry a previously successful format.
    pub fn preferred_format(&self, formats: &[FormatRef], preferred: FormatRef) -> Vec<FormatRef> {
        let mut result = vec![preferred];
        result.extend(formats.iter().copied().filter(|f| !same_format(*f, preferred)));
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::NavigationFormat;

    fn names(formats: &[FormatRef]) -> Vec<&'static str> {
        formats.iter().map(|f| f.name()).collect()
    }

    fn position(catalog: &FormatCatalog, name: &str) -> usize {
        catalog.formats().iter().position(|f| f.name() == name).unwrap()
    }

    #[test]
    fn test_catch_all_is_last() {
        let catalog = FormatCatalog::default();
        let read = catalog.read_formats();
        assert_eq!(read.last().unwrap().name(), formats::WAYPOINT_LIST.name());
    }

    #[test]
    fn test_broken_after_well_formed() {
        let catalog = FormatCatalog::default();
        assert!(
            position(&catalog, formats::NMEA.name()) < position(&catalog, formats::BROKEN_NMEA.name())
        );
    }

    #[test]
    fn test_read_and_write_filters() {
        let catalog = FormatCatalog::default();
        let read = names(&catalog.read_formats());
        let write = names(&catalog.write_formats());
        assert!(read.contains(&"Zip archive"));
        assert!(!write.contains(&"Zip archive"));
        assert!(!write.contains(&"NMEA 0183 (broken)"));
        assert!(write.contains(&"GPX 1.1"));
    }

    #[test]
    fn test_preferred_by_extension_keeps_fallbacks() {
        let catalog = FormatCatalog::default();
        let read = catalog.read_formats();
        let preferred = catalog.preferred_by_extension(&read, ".nmea");
        assert_eq!(preferred.len(), read.len());
        assert_eq!(preferred[0].name(), formats::NMEA.name());
        assert_eq!(preferred[1].name(), formats::BROKEN_NMEA.name());
        assert_eq!(preferred[2].name(), formats::ZIP.name());
        assert_eq!(preferred.last().unwrap().name(), formats::WAYPOINT_LIST.name());
    }

    #[test]
    fn test_preferred_format_pins_front() {
        let catalog = FormatCatalog::default();
        let read = catalog.read_formats();
        let preferred = catalog.preferred_format(&read, &formats::ITN);
        assert_eq!(preferred.len(), read.len());
        assert_eq!(preferred[0].name(), formats::ITN.name());
        assert_eq!(
            preferred.iter().filter(|f| f.name() == formats::ITN.name()).count(),
            1
        );
    }

    #[test]
    fn test_find() {
        let catalog = FormatCatalog::default();
        assert_eq!(catalog.find("gpx").unwrap().name(), formats::GPX.name());
        assert_eq!(catalog.find(".ITN").unwrap().name(), formats::ITN.name());
        assert_eq!(catalog.find(formats::GEOJSON.name()).unwrap().name(), formats::GEOJSON.name());
        assert!(catalog.find("unknown").is_none());
    }
}
