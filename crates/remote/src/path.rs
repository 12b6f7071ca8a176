use std::fmt;

/// Slash-separated hierarchical path into the document or blob store,
/// e.g. `users/u1/weekly-snippets/2024-W10`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocPath {
    segments: Vec<String>,
}

impl DocPath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Split a rendered path back into segments.
    pub fn parse(raw: &str) -> Self {
        Self::new(raw.split('/').filter(|s| !s.is_empty()))
    }

    pub fn join(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.segments.split_last()?;
        Some(Self {
            segments: rest.to_vec(),
        })
    }

    pub fn starts_with(&self, prefix: &DocPath) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// No empty, `.`/`..` or slash-bearing segments.  Backends that map paths
    /// onto a filesystem refuse anything else.
    pub fn is_well_formed(&self) -> bool {
        !self.segments.is_empty()
            && self.segments.iter().all(|segment| {
                !segment.is_empty()
                    && segment != "."
                    && segment != ".."
                    && !segment.contains(['/', '\\', '\0'])
            })
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}
