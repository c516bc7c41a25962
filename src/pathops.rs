// Pure string path algebra. PMM files carry Windows-style paths, so both
// separator families are accepted and nothing here touches the filesystem.

#[derive(Debug, Clone, PartialEq, Eq)]
enum Root {
    None,
    Slash,
    Drive(String),
    Unc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Parsed {
    root: Root,
    segs: Vec<String>,
}

impl Parsed {
    fn is_absolute(&self) -> bool {
        self.root != Root::None
    }

    fn root_parts(&self) -> usize {
        match self.root {
            Root::None => 0,
            _ => 1,
        }
    }

    fn part_count(&self) -> usize {
        self.root_parts() + self.segs.len()
    }

    fn parent(&self) -> Option<Parsed> {
        if self.segs.is_empty() {
            return None;
        }
        let mut out = self.clone();
        out.segs.pop();
        Some(out)
    }

    fn render(&self) -> String {
        match &self.root {
            Root::None => {
                if self.segs.is_empty() {
                    ".".to_string()
                } else {
                    self.segs.join("/")
                }
            }
            Root::Slash => format!("/{}", self.segs.join("/")),
            Root::Drive(drive) => {
                if self.segs.is_empty() {
                    format!("{drive}\\")
                } else {
                    format!("{drive}\\{}", self.segs.join("\\"))
                }
            }
            Root::Unc => format!("\\\\{}", self.segs.join("\\")),
        }
    }
}

fn is_separator(ch: char) -> bool {
    ch == '/' || ch == '\\'
}

fn parse(raw: &str) -> Parsed {
    let raw = raw.trim();
    let bytes = raw.as_bytes();

    let (root, rest) = if raw.starts_with("\\\\") || raw.starts_with("//") {
        (Root::Unc, &raw[2..])
    } else if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        let drive = format!("{}:", raw[..1].to_ascii_uppercase());
        (Root::Drive(drive), &raw[2..])
    } else if raw.starts_with(|ch| is_separator(ch)) {
        (Root::Slash, raw)
    } else {
        (Root::None, raw)
    };

    let mut segs: Vec<String> = Vec::new();
    for seg in rest.split(is_separator) {
        match seg {
            "" | "." => {}
            ".." => {
                let poppable = segs.last().map(|last| last != "..").unwrap_or(false);
                if poppable {
                    segs.pop();
                } else if root == Root::None {
                    segs.push("..".to_string());
                }
                // rooted paths cannot climb above their root
            }
            other => segs.push(other.to_string()),
        }
    }

    Parsed { root, segs }
}

fn same_root(a: &Parsed, b: &Parsed) -> bool {
    a.root == b.root
}

fn is_prefix(root: &Parsed, path: &Parsed) -> bool {
    root.segs.len() <= path.segs.len()
        && root
            .segs
            .iter()
            .zip(path.segs.iter())
            .all(|(a, b)| a == b)
}

pub fn resolve(stored: &str, source_root: &str) -> String {
    if source_root.trim().is_empty() {
        return stored.to_string();
    }
    let trimmed = stored.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let stored_path = parse(trimmed);
    if stored_path.is_absolute() {
        return trimmed.to_string();
    }
    let mut resolved = parse(source_root);
    for seg in stored_path.segs {
        if seg == ".." {
            resolved.segs.pop();
        } else {
            resolved.segs.push(seg);
        }
    }
    resolved.render()
}

pub fn base_data(original_abs: &str, user_chosen: &str) -> String {
    if original_abs.trim().is_empty() || user_chosen.trim().is_empty() {
        return String::new();
    }
    let original = parse(original_abs);
    let parent = match parse(user_chosen).parent() {
        Some(parent) => parent,
        None => return String::new(),
    };
    if !same_root(&parent, &original) || !is_prefix(&parent, &original) {
        return String::new();
    }
    original.segs[parent.segs.len()..].join("/")
}

pub fn is_under(path: &str, root: &str) -> bool {
    if root.trim().is_empty() || path.trim().is_empty() {
        return false;
    }
    let path = parse(path);
    let root = parse(root);
    path.is_absolute() && root.is_absolute() && same_root(&root, &path) && is_prefix(&root, &path)
}

fn relative_segments(path: &Parsed, root: &Parsed) -> Option<Vec<String>> {
    if !same_root(path, root) || !is_prefix(root, path) {
        return None;
    }
    Some(path.segs[root.segs.len()..].to_vec())
}

pub fn rebase(original_abs: &str, user_chosen: &str, dest_root: &str) -> String {
    let chosen_raw = user_chosen.trim();
    if chosen_raw.is_empty() {
        return String::new();
    }
    let chosen = parse(chosen_raw);
    let base = base_data(original_abs, chosen_raw);

    // With a preserved tail the chosen path's parent is the cut point in the
    // original; without one the chosen path itself is the new location.
    let anchor = if base.is_empty() {
        chosen
    } else {
        match chosen.parent() {
            Some(parent) => parent,
            None => return String::new(),
        }
    };

    if !dest_root.trim().is_empty() && is_under(chosen_raw, dest_root) {
        let root = parse(dest_root);
        let mut segs = match relative_segments(&anchor, &root) {
            Some(segs) => segs,
            None => return String::new(),
        };
        segs.extend(base.split('/').filter(|seg| !seg.is_empty()).map(String::from));
        segs.join("/")
    } else {
        let mut out = anchor;
        out.segs
            .extend(base.split('/').filter(|seg| !seg.is_empty()).map(String::from));
        out.render()
    }
}

pub fn level_up(current: &str) -> Option<String> {
    let current = parse(current);
    let parent = current.parent()?;
    Some(parent.render())
}

pub fn level_down(current: &str, reference: &str) -> Option<String> {
    if current.trim().is_empty() || reference.trim().is_empty() {
        return None;
    }
    let cur = parse(current);
    let reference = parse(reference);
    if reference.part_count() <= cur.part_count() {
        return None;
    }
    let index = cur.part_count().checked_sub(reference.root_parts())?;
    let next = reference.segs.get(index)?.clone();
    let mut out = cur;
    out.segs.push(next);
    Some(out.render())
}
