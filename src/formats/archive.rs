//! ZIP archives of navigation files. Every member is run through detection
//! on its own, preferring formats that match the member's extension.

use std::io::{Cursor, Read};

use log::{debug, warn};
use zip::ZipArchive;

use crate::context::ParseContext;
use crate::error::{Result, RouteError};
use crate::format::{Capabilities, NavigationFormat, PositionFamily};

/// Members larger than this are skipped.
const MAX_MEMBER_SIZE: u64 = 256 * 1024 * 1024;

/// Local file header, or the end of central directory record of an empty archive.
const SIGNATURES: [[u8; 4]; 2] = [*b"PK\x03\x04", *b"PK\x05\x06"];

#[derive(Debug, Clone, Copy, Default)]
pub struct ZipFormat;

impl NavigationFormat for ZipFormat {
    fn name(&self) -> &'static str {
        "Zip archive"
    }

    fn extension(&self) -> &'static str {
        ".zip"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            multiple_routes: true,
            ..Capabilities::reader()
        }
    }

    fn family(&self) -> PositionFamily {
        PositionFamily::Wgs84
    }

    fn read(&self, source: &mut dyn Read, context: &mut ParseContext<'_>) -> Result<()> {
        // Only the signature is consumed from sources that are not archives.
        let mut bytes = Vec::new();
        (&mut *source).take(4).read_to_end(&mut bytes)?;
        if !SIGNATURES.iter().any(|signature| bytes == signature) {
            return Err(RouteError::format(self.name(), "no zip signature"));
        }
        source.read_to_end(&mut bytes)?;
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;

        for i in 0..archive.len() {
            if context.is_cancelled() {
                warn!("Reading of archive cancelled before member {}", i + 1);
                break;
            }

            let mut member = archive.by_index(i)?;
            if member.is_dir() {
                continue;
            }
            let name = member.name().to_string();
            if member.size() > MAX_MEMBER_SIZE {
                warn!("Skipping large member: {name} ({} bytes)", member.size());
                continue;
            }

            let mut contents = Vec::new();
            member.read_to_end(&mut contents)?;
            drop(member);

            if context.parse_nested(&contents, &name) {
                debug!("Read routes from archive member {name}");
            } else {
                debug!("No routes in archive member {name}");
            }
        }

        Ok(())
    }
}
