// Checksum matching - recognizing frames against the color table
//
// Every plane is checksummed separately; a mapping keyed on any plane's
// checksum recognizes the frame. Unmasked candidates win over masked ones,
// low-order planes over high-order ones, because unmasked checksums are
// cheaper and cover the common case. The masked pass scans plane-major,
// mask-minor, in declaration order.

use crate::coloring::{ColorMapping, ColorTable};
use crate::frame::{checksum, mask_plane};

/// A recognized frame: the mapping, the checksum that hit, and whether a
/// mask was involved (for logging)
#[derive(Debug)]
pub struct Match<'a> {
    pub mapping: &'a ColorMapping,
    pub checksum: u32,
    pub masked: bool,
}

/// Find the first mapping that recognizes the given bitplanes
///
/// Returns `None` when neither the unmasked nor any masked checksum of any
/// plane is in the table.
pub fn recognize<'a>(planes: &[Vec<u8>], table: &'a ColorTable) -> Option<Match<'a>> {
    for plane in planes {
        let sum = checksum(plane);
        if let Some(mapping) = table.find_mapping(sum) {
            return Some(Match {
                mapping,
                checksum: sum,
                masked: false,
            });
        }
    }

    if table.masks().is_empty() {
        return None;
    }

    let mut masked = vec![0u8; planes.first().map_or(0, Vec::len)];
    for plane in planes {
        for mask in table.masks() {
            mask_plane(plane, mask, &mut masked);
            let sum = checksum(&masked);
            if let Some(mapping) = table.find_mapping(sum) {
                return Some(Match {
                    mapping,
                    checksum: sum,
                    masked: true,
                });
            }
        }
    }
    None
}
