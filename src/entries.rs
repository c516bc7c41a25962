use crate::{
    pathops,
    project::{MediaRecords, ModelRecord, ProjectRecords},
};

// Explicit "deliberately omitted" marker, distinct from an undecided empty
// field. Written back as an empty reference.
pub const CLEARED: &str = "none";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Models,
    Accessories,
    Media,
}

impl Category {
    pub fn all() -> [Category; 3] {
        [Category::Models, Category::Accessories, Category::Media]
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Models => "Models",
            Category::Accessories => "Accessories",
            Category::Media => "Media",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
    Image,
}

impl MediaKind {
    pub fn label(self) -> &'static str {
        match self {
            MediaKind::Audio => "Audio file",
            MediaKind::Video => "Background AVI",
            MediaKind::Image => "Background image",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PathEntry {
    pub display_name: String,
    pub original_resolved: String,
    pub current: String,
    pub media_kind: Option<MediaKind>,
}

impl PathEntry {
    fn from_stored(
        display_name: String,
        stored_path: String,
        source_root: &str,
        media_kind: Option<MediaKind>,
    ) -> Self {
        let original_resolved = pathops::resolve(&stored_path, source_root);
        let current = original_resolved.clone();
        Self {
            display_name,
            original_resolved,
            current,
            media_kind,
        }
    }

    pub fn is_cleared(&self) -> bool {
        self.current == CLEARED
    }

    pub fn level_up(&mut self) -> bool {
        if self.current.trim().is_empty() || self.is_cleared() {
            return false;
        }
        match pathops::level_up(&self.current) {
            Some(parent) if parent != self.current => {
                self.current = parent;
                true
            }
            _ => false,
        }
    }

    pub fn level_down(&mut self) -> bool {
        if self.is_cleared() {
            return false;
        }
        match pathops::level_down(&self.current, &self.original_resolved) {
            Some(next) => {
                self.current = next;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) -> bool {
        if self.is_cleared() {
            return false;
        }
        self.current = CLEARED.to_string();
        true
    }

    pub fn reset(&mut self) -> bool {
        if self.current == self.original_resolved {
            return false;
        }
        self.current = self.original_resolved.clone();
        true
    }

    pub fn replace_all(&mut self, search: &str, replacement: &str) -> bool {
        if search.is_empty() {
            return false;
        }
        let replaced = self.current.replace(search, replacement);
        if replaced == self.current {
            return false;
        }
        self.current = replaced;
        true
    }

    pub fn replace_first(&mut self, search: &str, replacement: &str) -> bool {
        if search.is_empty() {
            return false;
        }
        let replaced = self.current.replacen(search, replacement, 1);
        if replaced == self.current {
            return false;
        }
        self.current = replaced;
        true
    }

    // Stored form is derived only here, at write time. Empty output for a
    // non-cleared entry with a non-empty current path means the rebase failed.
    pub fn derive_stored(&self, dest_root: &str) -> String {
        if self.is_cleared() || self.current.trim().is_empty() {
            return String::new();
        }
        pathops::rebase(&self.original_resolved, &self.current, dest_root)
    }
}

#[derive(Debug, Clone, Default)]
pub struct EntrySet {
    pub models: Vec<PathEntry>,
    pub accessories: Vec<PathEntry>,
    pub media: Vec<PathEntry>,
    media_present: bool,
}

impl EntrySet {
    pub fn from_records(records: &ProjectRecords, source_root: &str) -> Self {
        let models = records
            .models
            .iter()
            .map(|record| {
                PathEntry::from_stored(
                    record.name.clone().unwrap_or_default(),
                    record.path.clone().unwrap_or_default(),
                    source_root,
                    None,
                )
            })
            .collect();
        let accessories = records
            .accessories
            .iter()
            .map(|record| {
                PathEntry::from_stored(
                    record.name.clone().unwrap_or_default(),
                    record.path.clone().unwrap_or_default(),
                    source_root,
                    None,
                )
            })
            .collect();

        let mut media = Vec::new();
        if let Some(records) = &records.media {
            for (kind, stored) in [
                (MediaKind::Audio, records.audio.clone()),
                (MediaKind::Video, records.video.clone()),
                (MediaKind::Image, records.image.clone()),
            ] {
                media.push(PathEntry::from_stored(
                    kind.label().to_string(),
                    stored.unwrap_or_default(),
                    source_root,
                    Some(kind),
                ));
            }
        }

        Self {
            models,
            accessories,
            media,
            media_present: records.media.is_some(),
        }
    }

    pub fn rows(&self, category: Category) -> &[PathEntry] {
        match category {
            Category::Models => &self.models,
            Category::Accessories => &self.accessories,
            Category::Media => &self.media,
        }
    }

    pub fn rows_mut(&mut self, category: Category) -> &mut [PathEntry] {
        match category {
            Category::Models => &mut self.models,
            Category::Accessories => &mut self.accessories,
            Category::Media => &mut self.media,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty() && self.accessories.is_empty() && self.media.is_empty()
    }

    pub fn apply_rows<F>(&mut self, category: Category, rows: &[usize], mut op: F) -> usize
    where
        F: FnMut(&mut PathEntry) -> bool,
    {
        let entries = self.rows_mut(category);
        let mut modified = 0;
        for &row in rows {
            if let Some(entry) = entries.get_mut(row) {
                if op(entry) {
                    modified += 1;
                }
            }
        }
        modified
    }

    pub fn to_records<W>(&self, dest_root: &str, mut warn: W) -> ProjectRecords
    where
        W: FnMut(String),
    {
        let mut derive = |entry: &PathEntry| {
            let stored = entry.derive_stored(dest_root);
            if stored.is_empty() && !entry.is_cleared() && !entry.current.trim().is_empty() {
                warn(format!(
                    "could not rebase {:?}; writing empty reference",
                    entry.current
                ));
            }
            stored
        };

        let models = self
            .models
            .iter()
            .map(|entry| ModelRecord {
                name: Some(entry.display_name.clone()),
                path: Some(derive(entry)),
            })
            .collect();
        let accessories = self
            .accessories
            .iter()
            .map(|entry| ModelRecord {
                name: Some(entry.display_name.clone()),
                path: Some(derive(entry)),
            })
            .collect();

        let media = if self.media_present {
            let mut records = MediaRecords::default();
            for entry in &self.media {
                let stored = Some(derive(entry));
                match entry.media_kind {
                    Some(MediaKind::Audio) => records.audio = stored,
                    Some(MediaKind::Video) => records.video = stored,
                    Some(MediaKind::Image) => records.image = stored,
                    None => {}
                }
            }
            Some(records)
        } else {
            None
        };

        ProjectRecords {
            models,
            accessories,
            media,
        }
    }
}
