//! Version identification and the upgrade pipeline.
//!
//! Every persisted format opens with a 4-byte magic and a 32-bit version
//! integer. The magic is tested in both byte orders so byte-swapped files
//! are still recognized; their integers are then read big-endian. After
//! parsing under the matching legacy schema, ordered upgrade steps carry
//! the tree forward to the current layout.

mod upgrades;

use crate::codec::{self, CodecOptions};
use crate::error::{Error, ParseError};
use crate::formats;
use crate::node::Node;
use crate::schema::{Endian, Schema};

pub use upgrades::upgrade;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatKind {
    Config,
    Style,
}

/// What the file header claims to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatVersion {
    pub kind: FormatKind,
    pub version: u32,
    /// The file was written with swapped byte order; integers are
    /// big-endian and the magic may appear reversed.
    pub byte_swapped: bool,
}

pub fn current_version(kind: FormatKind) -> u32 {
    match kind {
        FormatKind::Config => formats::CONFIG_VERSION,
        FormatKind::Style => formats::STYLE_VERSION,
    }
}

pub fn current_schema(kind: FormatKind) -> &'static Schema {
    match kind {
        FormatKind::Config => formats::config_v2(),
        FormatKind::Style => formats::style_v2(),
    }
}

pub fn schema_for(kind: FormatKind, version: u32) -> Option<&'static Schema> {
    match (kind, version) {
        (FormatKind::Config, 1) => Some(formats::config_v1()),
        (FormatKind::Config, 2) => Some(formats::config_v2()),
        (FormatKind::Style, 1) => Some(formats::style_v1()),
        (FormatKind::Style, 2) => Some(formats::style_v2()),
        _ => None,
    }
}

fn known_version(kind: FormatKind, version: u32) -> bool {
    (1..=current_version(kind)).contains(&version)
}

fn reversed(magic: [u8; 4]) -> [u8; 4] {
    [magic[3], magic[2], magic[1], magic[0]]
}

/// Reads only the smallest possible prefix: magic plus version integer.
pub fn identify(bytes: &[u8]) -> Result<FormatVersion, ParseError> {
    if bytes.len() < 8 {
        return Err(ParseError::ShortBuffer {
            field: "version_info".to_string(),
            needed: 8,
            remaining: bytes.len(),
        });
    }
    let magic = [bytes[0], bytes[1], bytes[2], bytes[3]];
    let version_bytes = [bytes[4], bytes[5], bytes[6], bytes[7]];
    let v_le = u32::from_le_bytes(version_bytes);
    let v_be = u32::from_be_bytes(version_bytes);

    for (kind, expected) in [
        (FormatKind::Config, formats::CONFIG_MAGIC),
        (FormatKind::Style, formats::STYLE_MAGIC),
    ] {
        if magic == expected {
            // Straight magic with a nonsense little-endian version can
            // still be a byte-swapped writer that kept the magic bytes.
            if known_version(kind, v_le) {
                return Ok(FormatVersion {
                    kind,
                    version: v_le,
                    byte_swapped: false,
                });
            }
            if known_version(kind, v_be) {
                return Ok(FormatVersion {
                    kind,
                    version: v_be,
                    byte_swapped: true,
                });
            }
            return Err(ParseError::UnknownVersion { magic, version: v_le });
        }
        if magic == reversed(expected) {
            if known_version(kind, v_be) {
                return Ok(FormatVersion {
                    kind,
                    version: v_be,
                    byte_swapped: true,
                });
            }
            return Err(ParseError::UnknownVersion { magic, version: v_be });
        }
    }
    Err(ParseError::UnknownVersion { magic, version: v_le })
}

/// Identifies, parses under the version's own schema, and upgrades to the
/// current layout. The returned tree always conforms to
/// `current_schema(kind)`.
pub fn load(bytes: &[u8], opts: &CodecOptions) -> Result<(Node, FormatVersion), Error> {
    let fv = identify(bytes)?;
    let schema = schema_for(fv.kind, fv.version).ok_or(ParseError::UnknownVersion {
        magic: match fv.kind {
            FormatKind::Config => formats::CONFIG_MAGIC,
            FormatKind::Style => formats::STYLE_MAGIC,
        },
        version: fv.version,
    })?;
    let mut parse_opts = *opts;
    if fv.byte_swapped {
        parse_opts.default_endian = Endian::Big;
    }
    let tree = codec::parse(bytes, schema, &parse_opts)?;
    let tree = upgrade(tree, &fv)?;
    Ok((tree, fv))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifies_config_and_style() {
        let mut header = Vec::from(*b"alnB");
        header.extend_from_slice(&2u32.to_le_bytes());
        let fv = identify(&header).unwrap();
        assert_eq!(fv.kind, FormatKind::Config);
        assert_eq!(fv.version, 2);
        assert!(!fv.byte_swapped);

        let mut header = Vec::from(*b"lytS");
        header.extend_from_slice(&1u32.to_le_bytes());
        let fv = identify(&header).unwrap();
        assert_eq!(fv.kind, FormatKind::Style);
        assert_eq!(fv.version, 1);
    }

    #[test]
    fn identifies_byte_swapped_header() {
        // Magic reversed, version big-endian.
        let mut header = Vec::from(*b"Bnla");
        header.extend_from_slice(&2u32.to_be_bytes());
        let fv = identify(&header).unwrap();
        assert_eq!(fv.kind, FormatKind::Config);
        assert_eq!(fv.version, 2);
        assert!(fv.byte_swapped);
    }

    #[test]
    fn rejects_unknown_magic_and_version() {
        let mut header = Vec::from(*b"XXXX");
        header.extend_from_slice(&2u32.to_le_bytes());
        assert!(matches!(
            identify(&header).unwrap_err(),
            ParseError::UnknownVersion { .. }
        ));

        let mut header = Vec::from(*b"alnB");
        header.extend_from_slice(&99u32.to_le_bytes());
        assert!(matches!(
            identify(&header).unwrap_err(),
            ParseError::UnknownVersion { version: 99, .. }
        ));
    }

    #[test]
    fn short_header_is_short_buffer() {
        assert!(matches!(
            identify(b"aln").unwrap_err(),
            ParseError::ShortBuffer { .. }
        ));
    }
}
