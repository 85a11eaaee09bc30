//! Registry of the encodings known to the running application
//!
//! The host enumerates candidate encodings once at startup and feeds them to
//! a [`CatalogBuilder`]. The resulting [`EncodingCatalog`] is immutable: names
//! and families never change, only the descriptors' lazily built tables do.
//!
//! Lookups by name or id never fail. A miss resolves to the system default,
//! so an unknown encoding name in a config file or a file header degrades to
//! the locale's encoding instead of an error. The `lookup_*` methods are the
//! strict variants.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::converter::EncodingConverter;
use crate::descriptor::EncodingDescriptor;
use crate::probe::ConversionPrimitive;
use crate::{EncodingFamily, EncodingId, Error, Result};

/// Font suggested when the host has no better answer
pub const DEFAULT_FONT: &str = "Monospace";

/// One encoding reported by the host's enumeration
#[derive(Clone)]
pub struct CandidateEncoding {
    /// Stable identifier (code page number)
    pub id: EncodingId,
    /// Name; uppercased on registration
    pub name: String,
    /// Human-readable label
    pub description: String,
    /// Codec family
    pub family: EncodingFamily,
    /// Advisory display font
    pub suggested_font: String,
    /// Probe for single- and double-byte families
    pub primitive: Option<Arc<dyn ConversionPrimitive>>,
}

impl CandidateEncoding {
    /// Candidate for a Unicode transformation format
    pub fn unicode(
        id: EncodingId,
        name: impl Into<String>,
        description: impl Into<String>,
        family: EncodingFamily,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            description: description.into(),
            family,
            suggested_font: DEFAULT_FONT.to_string(),
            primitive: None,
        }
    }

    /// Candidate for a single- or double-byte code page
    pub fn legacy(
        id: EncodingId,
        name: impl Into<String>,
        description: impl Into<String>,
        family: EncodingFamily,
        primitive: Arc<dyn ConversionPrimitive>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            description: description.into(),
            family,
            suggested_font: DEFAULT_FONT.to_string(),
            primitive: Some(primitive),
        }
    }

    /// Replace the suggested font
    pub fn with_font(mut self, font: impl Into<String>) -> Self {
        self.suggested_font = font.into();
        self
    }
}

impl fmt::Debug for CandidateEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CandidateEncoding")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("family", &self.family)
            .field("has_primitive", &self.primitive.is_some())
            .finish()
    }
}

/// Outcome of registering a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// Added at this position in the catalog
    Registered(usize),
    /// Dropped because its name was already registered
    Ignored,
}

/// Collects candidates into an [`EncodingCatalog`]
#[derive(Debug)]
pub struct CatalogBuilder {
    system_id: EncodingId,
    descriptors: Vec<EncodingDescriptor>,
    names: HashSet<String>,
    system_index: Option<usize>,
}

impl CatalogBuilder {
    /// Start a catalog whose default is the encoding with `system_id`
    pub fn new(system_id: EncodingId) -> Self {
        Self {
            system_id,
            descriptors: Vec::new(),
            names: HashSet::new(),
            system_index: None,
        }
    }

    /// Register a candidate.
    ///
    /// The first candidate with a given (case-insensitive) name wins; later
    /// ones are ignored, which is how hosts exposing one code page under
    /// several ids are deduplicated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingPrimitive`] for a legacy candidate without a
    /// conversion primitive.
    pub fn register(&mut self, candidate: CandidateEncoding) -> Result<Registration> {
        let name = candidate.name.to_uppercase();
        if self.names.contains(&name) {
            tracing::debug!(encoding = %name, id = %candidate.id, "ignoring duplicate encoding");
            return Ok(Registration::Ignored);
        }

        let descriptor = EncodingDescriptor::new(candidate)?;
        let index = self.descriptors.len();
        if self.system_index.is_none() && descriptor.id() == self.system_id {
            self.system_index = Some(index);
        }

        self.names.insert(name);
        self.descriptors.push(descriptor);
        Ok(Registration::Registered(index))
    }

    /// Register every candidate, returning how many were added
    ///
    /// # Errors
    ///
    /// Stops at the first candidate [`Self::register`] rejects.
    pub fn register_all(
        &mut self,
        candidates: impl IntoIterator<Item = CandidateEncoding>,
    ) -> Result<usize> {
        let mut added = 0;
        for candidate in candidates {
            if let Registration::Registered(_) = self.register(candidate)? {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Finish the catalog.
    ///
    /// If no registered encoding carries the system id, the first one
    /// registered becomes the default.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyCatalog`] if nothing was registered.
    pub fn build(self) -> Result<EncodingCatalog> {
        if self.descriptors.is_empty() {
            return Err(Error::EmptyCatalog);
        }

        let system_index = self.system_index.unwrap_or_else(|| {
            tracing::warn!(
                system_id = %self.system_id,
                "system encoding not registered, defaulting to first encoding"
            );
            0
        });

        tracing::debug!(
            encodings = self.descriptors.len(),
            default = %self.descriptors[system_index].name(),
            "encoding catalog built"
        );

        Ok(EncodingCatalog {
            descriptors: self.descriptors,
            system_index,
        })
    }
}

/// Summary of one catalog entry, for listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncodingInfo {
    /// Stable identifier
    pub id: EncodingId,
    /// Canonical name
    pub name: String,
    /// Human-readable label
    pub description: String,
    /// Codec family
    pub family: EncodingFamily,
    /// Advisory display font
    pub font: String,
}

impl From<&EncodingDescriptor> for EncodingInfo {
    fn from(descriptor: &EncodingDescriptor) -> Self {
        Self {
            id: descriptor.id(),
            name: descriptor.name().to_string(),
            description: descriptor.description().to_string(),
            family: descriptor.family(),
            font: descriptor.suggested_font().to_string(),
        }
    }
}

/// All encodings available to the application, in registration order
#[derive(Debug)]
pub struct EncodingCatalog {
    descriptors: Vec<EncodingDescriptor>,
    system_index: usize,
}

impl EncodingCatalog {
    /// Start building a catalog
    pub fn builder(system_id: EncodingId) -> CatalogBuilder {
        CatalogBuilder::new(system_id)
    }

    /// Number of registered encodings
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Always false; a built catalog holds at least the default encoding
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Descriptors in registration order
    pub fn iter(&self) -> impl Iterator<Item = &EncodingDescriptor> {
        self.descriptors.iter()
    }

    /// All descriptors in registration order
    pub fn descriptors(&self) -> &[EncodingDescriptor] {
        &self.descriptors
    }

    /// Descriptor at a registration index
    pub fn get(&self, index: usize) -> Option<&EncodingDescriptor> {
        self.descriptors.get(index)
    }

    /// Canonical names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.descriptors.iter().map(EncodingDescriptor::name)
    }

    /// Summaries of every entry
    pub fn infos(&self) -> Vec<EncodingInfo> {
        self.descriptors.iter().map(EncodingInfo::from).collect()
    }

    /// The encoding matching the host locale
    pub fn system_default(&self) -> &EncodingDescriptor {
        &self.descriptors[self.system_index]
    }

    /// Find by canonical name (case-insensitive)
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownEncodingName`] when nothing matches.
    pub fn lookup_by_name(&self, name: &str) -> Result<&EncodingDescriptor> {
        let wanted = name.to_uppercase();
        self.descriptors
            .iter()
            .find(|d| d.name() == wanted)
            .ok_or_else(|| Error::UnknownEncodingName(name.to_string()))
    }

    /// Find by id
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownEncodingId`] when nothing matches.
    pub fn lookup_by_id(&self, id: EncodingId) -> Result<&EncodingDescriptor> {
        self.descriptors
            .iter()
            .find(|d| d.id() == id)
            .ok_or(Error::UnknownEncodingId(id))
    }

    /// Find by canonical name, falling back to the system default
    pub fn find_by_name(&self, name: &str) -> &EncodingDescriptor {
        self.lookup_by_name(name).unwrap_or_else(|_| {
            tracing::debug!(encoding = %name, "unknown encoding name, using system default");
            self.system_default()
        })
    }

    /// Find by id, falling back to the system default
    pub fn find_by_id(&self, id: EncodingId) -> &EncodingDescriptor {
        self.lookup_by_id(id).unwrap_or_else(|_| {
            tracing::debug!(%id, "unknown encoding id, using system default");
            self.system_default()
        })
    }

    /// Create a converter bound to `descriptor`. Tables are built on first use.
    pub fn create_converter<'a>(
        &'a self,
        descriptor: &'a EncodingDescriptor,
    ) -> EncodingConverter<'a> {
        EncodingConverter::new(descriptor)
    }

    /// Converter for a name, falling back to the system default
    pub fn converter_by_name(&self, name: &str) -> EncodingConverter<'_> {
        self.create_converter(self.find_by_name(name))
    }

    /// Converter for an id, falling back to the system default
    pub fn converter_by_id(&self, id: EncodingId) -> EncodingConverter<'_> {
        self.create_converter(self.find_by_id(id))
    }
}

impl<'a> IntoIterator for &'a EncodingCatalog {
    type Item = &'a EncodingDescriptor;
    type IntoIter = std::slice::Iter<'a, EncodingDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.descriptors.iter()
    }
}
