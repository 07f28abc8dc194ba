//! Minimal markdown-plan parsing: headings level 1-6, with any leading
//! content (before the first heading) attributed to a synthetic "Content"
//! section (SPEC_FULL §4.J).

const SYNTHETIC_SECTION_TITLE: &str = "Content";

#[derive(Debug, Clone, PartialEq)]
pub struct MarkdownSection {
    pub level: u8,
    pub heading: String,
    pub body: String,
}

pub fn parse_sections(markdown: &str) -> Vec<MarkdownSection> {
    let mut sections = Vec::new();
    let mut current_heading = SYNTHETIC_SECTION_TITLE.to_string();
    let mut current_level: u8 = 0;
    let mut current_body = String::new();

    for line in markdown.lines() {
        if let Some((level, heading)) = parse_heading(line) {
            if !current_body.trim().is_empty() || current_level > 0 {
                sections.push(MarkdownSection {
                    level: current_level,
                    heading: current_heading.clone(),
                    body: current_body.trim().to_string(),
                });
            }
            current_heading = heading;
            current_level = level;
            current_body = String::new();
        } else {
            current_body.push_str(line);
            current_body.push('\n');
        }
    }
    if !current_body.trim().is_empty() || current_level > 0 {
        sections.push(MarkdownSection {
            level: current_level,
            heading: current_heading,
            body: current_body.trim().to_string(),
        });
    }
    sections
}

fn parse_heading(line: &str) -> Option<(u8, String)> {
    let trimmed = line.trim_start();
    let hashes = trimmed.chars().take_while(|c| *c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = trimmed[hashes..].trim();
    if rest.is_empty() {
        return None;
    }
    Some((hashes as u8, rest.to_string()))
}

/// Find sections whose heading contains any of `keywords` (case-insensitive).
pub fn sections_matching<'a>(sections: &'a [MarkdownSection], keywords: &[&str]) -> Vec<&'a MarkdownSection> {
    sections
        .iter()
        .filter(|s| {
            let heading_lower = s.heading.to_lowercase();
            keywords.iter().any(|k| heading_lower.contains(&k.to_lowercase()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_content_before_first_heading_becomes_synthetic_section() {
        let sections = parse_sections("intro text\n\n# Plan\nbody");
        assert_eq!(sections[0].heading, SYNTHETIC_SECTION_TITLE);
        assert_eq!(sections[0].body, "intro text");
        assert_eq!(sections[1].heading, "Plan");
        assert_eq!(sections[1].body, "body");
    }

    #[test]
    fn recognizes_all_six_heading_levels() {
        let md = "# a\nx\n###### f\ny";
        let sections = parse_sections(md);
        assert_eq!(sections.iter().map(|s| s.level).collect::<Vec<_>>(), vec![1, 6]);
    }

    #[test]
    fn sections_matching_is_case_insensitive() {
        let sections = parse_sections("# Implementation Steps\ndo the thing\n# Other\nskip");
        let found = sections_matching(&sections, &["implementation steps"]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].heading, "Implementation Steps");
    }
}
