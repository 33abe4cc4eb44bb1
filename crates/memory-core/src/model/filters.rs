use super::{MemoryType, Scope, Visibility};

/// Filters applied by `list` and `search`. Scalar fields map straight
/// onto the store's keyword payload indexes (`type`, `scope`,
/// `visibility`, `project`, `source`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilters {
    pub memory_type: Option<MemoryType>,
    pub scope: Option<Scope>,
    /// `None` means "default visibility policy": sensitive records are
    /// excluded unless this is explicitly `Some(Visibility::Sensitive)`.
    pub visibility: Option<Visibility>,
    pub project: Option<String>,
    pub source: Option<String>,
    pub tag: Option<String>,
}

impl SearchFilters {
    pub fn with_project(project: impl Into<String>) -> Self {
        Self {
            project: Some(project.into()),
            ..Default::default()
        }
    }

    /// Whether this filter set explicitly opts into sensitive records.
    pub fn wants_sensitive(&self) -> bool {
        self.visibility == Some(Visibility::Sensitive)
    }

    pub fn matches(&self, record: &super::MemoryRecord) -> bool {
        if !self.wants_sensitive() && record.visibility == Visibility::Sensitive {
            return false;
        }
        if let Some(mt) = self.memory_type {
            if record.memory_type != mt {
                return false;
            }
        }
        if let Some(scope) = self.scope {
            if record.scope != scope {
                return false;
            }
        }
        if let Some(vis) = self.visibility {
            if record.visibility != vis {
                return false;
            }
        }
        if let Some(ref project) = self.project {
            if &record.project != project {
                return false;
            }
        }
        if let Some(ref source) = self.source {
            if &record.source != source {
                return false;
            }
        }
        if let Some(ref tag) = self.tag {
            if !record.tags.iter().any(|t| t == tag) {
                return false;
            }
        }
        true
    }
}
