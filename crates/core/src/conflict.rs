//! Conflict marker parsing for merged file content.
//!
//! Recognizes the standard `<<<<<<<` / `=======` / `>>>>>>>` markers and the
//! diff3 `|||||||` base section.

use std::sync::OnceLock;

use regex_lite::Regex;
use tracing::debug;

use crate::models::ConflictRegion;

fn marker_regex() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| {
        Regex::new(r"^(<{7}|\|{7}|={7}|>{7})(?:\s.*)?$").expect("valid conflict marker regex")
    })
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Marker {
    Start,
    Base,
    Separator,
    End,
}

fn classify(line: &str) -> Option<Marker> {
    let caps = marker_regex().captures(line.trim_end_matches('\r'))?;
    match caps.get(1)?.as_str().as_bytes()[0] {
        b'<' => Some(Marker::Start),
        b'|' => Some(Marker::Base),
        b'=' => Some(Marker::Separator),
        _ => Some(Marker::End),
    }
}

enum Section {
    Outside,
    Ours,
    Base,
    Theirs,
}

/// Extract every complete conflict region from `text`. Regions missing a
/// separator or end marker are ignored.
pub fn parse_conflict_markers(text: &str) -> Vec<ConflictRegion> {
    let mut regions = Vec::new();
    let mut section = Section::Outside;
    let mut start_line = 0;
    let (mut ours, mut base, mut theirs) = (String::new(), None::<String>, String::new());

    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        let marker = classify(line);

        if marker == Some(Marker::Start) {
            section = Section::Ours;
            start_line = line_no;
            ours.clear();
            theirs.clear();
            base = None;
            continue;
        }

        section = match (section, marker) {
            (Section::Outside, _) => Section::Outside,
            (Section::Ours, Some(Marker::Base)) => {
                base = Some(String::new());
                Section::Base
            }
            (Section::Ours | Section::Base, Some(Marker::Separator)) => Section::Theirs,
            (Section::Theirs, Some(Marker::End)) => {
                regions.push(ConflictRegion {
                    ours: std::mem::take(&mut ours),
                    theirs: std::mem::take(&mut theirs),
                    base: base.take(),
                    start_line,
                    end_line: line_no,
                });
                Section::Outside
            }
            (Section::Ours, _) => {
                push_line(&mut ours, line);
                Section::Ours
            }
            (Section::Base, _) => {
                if let Some(b) = base.as_mut() {
                    push_line(b, line);
                }
                Section::Base
            }
            (Section::Theirs, _) => {
                push_line(&mut theirs, line);
                Section::Theirs
            }
        };
    }

    debug!(regions = regions.len(), "parsed conflict markers");
    regions
}

fn push_line(buf: &mut String, line: &str) {
    buf.push_str(line);
    buf.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_way_markers() {
        let text = "a\n<<<<<<< ours\nx = 1\n=======\nx = 2\n>>>>>>> theirs\nb\n";
        let regions = parse_conflict_markers(text);
        assert_eq!(regions.len(), 1);
        let r = &regions[0];
        assert_eq!(r.ours, "x = 1\n");
        assert_eq!(r.theirs, "x = 2\n");
        assert_eq!(r.base, None);
        assert_eq!((r.start_line, r.end_line), (2, 6));
    }

    #[test]
    fn test_diff3_markers() {
        let text = "<<<<<<<\nours\n||||||| base\norig\n=======\ntheirs\n>>>>>>>\n";
        let regions = parse_conflict_markers(text);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].base.as_deref(), Some("orig\n"));
        assert_eq!(regions[0].theirs, "theirs\n");
    }

    #[test]
    fn test_multiple_regions() {
        let text = "<<<<<<<\na\n=======\nb\n>>>>>>>\nmid\n<<<<<<<\nc\n=======\n>>>>>>>\n";
        let regions = parse_conflict_markers(text);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[1].theirs, "");
        assert_eq!(regions[1].start_line, 7);
    }

    #[test]
    fn test_unterminated_region_ignored() {
        let text = "<<<<<<<\na\n=======\nb\n";
        assert!(parse_conflict_markers(text).is_empty());
    }

    #[test]
    fn test_lookalike_lines_are_content() {
        let text = "========\n<<<<<<<<\nplain\n";
        assert!(parse_conflict_markers(text).is_empty());
    }
}
