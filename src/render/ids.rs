//! Render ids: short random identifiers, unique within one render tree

use std::collections::HashSet;
use std::fmt;

use rand::distributions::Alphanumeric;
use rand::Rng;

/// First character of every render id
pub const RENDER_ID_PREFIX: char = 'c';

/// Default number of random characters after the prefix
pub const DEFAULT_RENDER_ID_WIDTH: usize = 6;

/// Identifier of one component invocation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderId(String);

impl RenderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Accept a string that has the shape of a render id
    pub fn parse(s: &str) -> Option<RenderId> {
        let rest = s.strip_prefix(RENDER_ID_PREFIX)?;
        (!rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphanumeric()))
            .then(|| RenderId(s.to_string()))
    }
}

impl fmt::Display for RenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Issues ids that have not been issued before in this tree
///
/// Once half of the id space at the current width is used up, the width grows by
/// one so that generation never spins on collisions.
#[derive(Debug)]
pub(crate) struct RenderIdGenerator {
    width: usize,
    issued: HashSet<RenderId>,
}

impl RenderIdGenerator {
    pub fn new(width: usize) -> Self {
        Self {
            width: width.max(1),
            issued: HashSet::new(),
        }
    }

    pub fn next_id(&mut self) -> RenderId {
        if self.issued.len().saturating_mul(2) >= capacity(self.width) {
            self.width += 1;
            tracing::debug!(width = self.width, "render id space widened");
        }
        let mut rng = rand::thread_rng();
        loop {
            let id: String = std::iter::once(RENDER_ID_PREFIX)
                .chain(
                    (&mut rng)
                        .sample_iter(&Alphanumeric)
                        .take(self.width)
                        .map(char::from),
                )
                .collect();
            let id = RenderId(id);
            if self.issued.insert(id.clone()) {
                return id;
            }
            tracing::trace!(render_id = %id, "render id collision, regenerating");
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }
}

/// Number of distinct ids of the given width
fn capacity(width: usize) -> usize {
    let mut total: usize = 1;
    for _ in 0..width {
        total = total.saturating_mul(62);
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_shape() {
        let mut ids = RenderIdGenerator::new(DEFAULT_RENDER_ID_WIDTH);
        let id = ids.next_id();
        assert_eq!(id.as_str().len(), 1 + DEFAULT_RENDER_ID_WIDTH);
        assert!(id.as_str().starts_with(RENDER_ID_PREFIX));
        assert!(RenderId::parse(id.as_str()).is_some());
    }

    #[test]
    fn test_ids_unique() {
        let mut ids = RenderIdGenerator::new(DEFAULT_RENDER_ID_WIDTH);
        let issued: HashSet<_> = (0..5000).map(|_| ids.next_id()).collect();
        assert_eq!(issued.len(), 5000);
    }

    #[test]
    fn test_narrow_width_grows_instead_of_spinning() {
        let mut ids = RenderIdGenerator::new(1);
        let issued: HashSet<_> = (0..200).map(|_| ids.next_id()).collect();
        assert_eq!(issued.len(), 200);
        assert!(ids.width() > 1);
    }

    #[test]
    fn test_parse_rejects_other_shapes() {
        assert!(RenderId::parse("x123").is_none());
        assert!(RenderId::parse("c").is_none());
        assert!(RenderId::parse("c12-4").is_none());
    }
}
