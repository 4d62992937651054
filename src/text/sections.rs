/// One titled section of a section-tagged document. A section produced from
/// text preceding the first header has an empty title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub body: String,
}

impl Section {
    /// Render the section back to section-tagged markdown.
    pub fn to_markdown(&self) -> String {
        if self.title.is_empty() {
            self.body.clone()
        } else {
            format!("## {}\n\n{}", self.title, self.body)
        }
    }
}

/// Parse text into an ordered sequence of sections delimited by second-level
/// markdown headers (`## Title`).
///
/// Text before the first header is kept as an implicit untitled leading
/// section rather than discarded, so no input content is ever lost. Text with
/// no header at all comes back as a single untitled section, letting callers
/// degrade gracefully to whole-document processing.
pub fn split_sections(text: &str) -> Vec<Section> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let mut sections: Vec<Section> = Vec::new();
    let mut current_title: Option<String> = None;
    let mut current_body = String::new();

    let mut flush = |title: &mut Option<String>, body: &mut String, out: &mut Vec<Section>| {
        let body_text = body.trim().to_string();
        match title.take() {
            Some(t) => out.push(Section { title: t, body: body_text }),
            // Leading untitled text is kept only when it has content.
            None if !body_text.is_empty() => out.push(Section { title: String::new(), body: body_text }),
            None => {}
        }
        body.clear();
    };

    for line in text.lines() {
        if let Some(title) = header_title(line) {
            flush(&mut current_title, &mut current_body, &mut sections);
            current_title = Some(title.to_string());
        } else {
            current_body.push_str(line);
            current_body.push('\n');
        }
    }
    flush(&mut current_title, &mut current_body, &mut sections);

    sections
}

/// Match a second-level markdown header line and return its title. Deeper
/// headers (`###`) belong to a section's body.
fn header_title(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    let rest = trimmed.strip_prefix("##")?;
    if rest.starts_with('#') {
        return None;
    }
    Some(rest.trim())
}
