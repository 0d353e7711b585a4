use gstreamer::prelude::*;

use crate::domain::errors::{DomainError, Result};
use crate::domain::ports::SourceCandidate;
use crate::domain::value_objects::{MediaKind, MimeEntry, MimeRegistry};

/// Unlinked output pad whose template caps name a supported encoding
#[derive(Debug, Clone)]
pub struct CandidateOutput {
    pub element: gstreamer::Element,
    pub pad: gstreamer::Pad,
    pub entry: &'static MimeEntry,
}

impl CandidateOutput {
    pub fn kind(&self) -> MediaKind {
        self.entry.kind()
    }

    pub fn to_source(&self) -> SourceCandidate {
        SourceCandidate::new(
            self.element.name().to_string(),
            self.pad.name().to_string(),
            self.entry,
        )
    }
}

pub struct ElementScanner;

impl ElementScanner {
    /// Walks the direct children of `bin` and returns every unlinked source
    /// pad with a supported encoding, in iteration order
    pub fn discover(bin: &impl IsA<gstreamer::Bin>) -> Result<Vec<CandidateOutput>> {
        let elements = bin
            .iterate_elements()
            .into_iter()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| DomainError::DiscoveryFailed(e.to_string()))?;

        let mut candidates = Vec::new();
        for element in elements {
            for pad in element.src_pads() {
                if let Some(entry) = Self::classify_pad(&pad) {
                    candidates.push(CandidateOutput {
                        element: element.clone(),
                        pad,
                        entry,
                    });
                }
            }
        }

        Ok(candidates)
    }

    /// Linked pads and pads without template caps yield nothing
    pub fn classify_pad(pad: &gstreamer::Pad) -> Option<&'static MimeEntry> {
        if pad.is_linked() {
            return None;
        }
        Self::classify_caps(&pad.pad_template_caps())
    }

    /// Only the first structure of the caps is considered
    pub fn classify_caps(caps: &gstreamer::CapsRef) -> Option<&'static MimeEntry> {
        let structure = caps.structure(0)?;
        MimeRegistry::lookup(structure.name().as_str())
    }
}
