/// Strip `base_path` from the front of a request path.
///
/// Returns `None` when the request lies outside the base path. The result
/// always starts with `/`.
pub fn strip_base_path<'a>(path: &'a str, base_path: &str) -> Option<&'a str> {
    let base = base_path.trim_end_matches('/');
    if base.is_empty() {
        return Some(path);
    }
    let rest = path.strip_prefix(base)?;
    if rest.is_empty() {
        Some("/")
    } else if rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// `{name}`, optionally surrounded by literal text, e.g. `{id}.json`.
    Param { prefix: String, suffix: String },
}

impl Segment {
    fn parse(raw: &str) -> Self {
        if let (Some(open), Some(close)) = (raw.find('{'), raw.rfind('}')) {
            if open < close {
                return Segment::Param {
                    prefix: raw[..open].to_string(),
                    suffix: raw[close + 1..].to_string(),
                };
            }
        }
        Segment::Literal(raw.to_string())
    }

    fn matches(&self, value: &str) -> bool {
        match self {
            Segment::Literal(lit) => lit == value,
            Segment::Param { prefix, suffix } => {
                value.len() > prefix.len() + suffix.len()
                    && value.starts_with(prefix.as_str())
                    && value.ends_with(suffix.as_str())
            }
        }
    }
}

/// An OpenAPI path template such as `/pets/{petId}`.
#[derive(Debug, Clone)]
pub struct RouteTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl RouteTemplate {
    pub fn parse(template: &str) -> Self {
        Self {
            raw: template.to_string(),
            segments: split_path(template).into_iter().map(Segment::parse).collect(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, path: &str) -> bool {
        let parts = split_path(path);
        parts.len() == self.segments.len()
            && self
                .segments
                .iter()
                .zip(parts)
                .all(|(seg, part)| seg.matches(part))
    }

    fn literal_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count()
    }
}

/// All path templates of a document, searched most-specific first.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    templates: Vec<RouteTemplate>,
}

impl RouteTable {
    pub fn new(templates: impl IntoIterator<Item = RouteTemplate>) -> Self {
        let mut templates: Vec<RouteTemplate> = templates.into_iter().collect();
        // Stable sort keeps document order among equally specific templates.
        templates.sort_by_key(|t| std::cmp::Reverse(t.literal_count()));
        Self { templates }
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Every template matching `path`, most specific first.
    pub fn find_all<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a RouteTemplate> + 'a {
        self.templates.iter().filter(move |t| t.matches(path))
    }

    /// Suggest a template close to `path` (Levenshtein <= 3), if unambiguous.
    pub fn closest(&self, path: &str) -> Option<&str> {
        let mut best_dist = usize::MAX;
        let mut best: Option<&str> = None;
        let mut ambiguous = false;

        for t in &self.templates {
            let dist = strsim::levenshtein(path, t.as_str());
            if dist < best_dist {
                best_dist = dist;
                best = Some(t.as_str());
                ambiguous = false;
            } else if dist == best_dist {
                ambiguous = true;
            }
        }

        if best_dist <= 3 && !ambiguous {
            best
        } else {
            None
        }
    }
}
