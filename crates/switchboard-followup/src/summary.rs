use crate::FollowupItem;

pub const SUMMARY_PREVIEW_CHARS: usize = 140;
const ELLIPSIS: char = '…';

/// Messages evicted under the `summarize` drop policy, awaiting a summary turn.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DropSummary {
    pub dropped_count: usize,
    pub lines: Vec<String>,
}

impl DropSummary {
    pub fn is_empty(&self) -> bool {
        self.dropped_count == 0
    }

    pub(crate) fn record(&mut self, item: &FollowupItem, line_limit: Option<usize>) {
        self.dropped_count += 1;
        let source = item.summary_line.as_deref().unwrap_or(&item.prompt);
        self.lines.push(preview(source));
        self.bound_lines(line_limit);
    }

    /// Puts `earlier` (taken before `self` accumulated) back in front.
    pub(crate) fn merge_earlier(&mut self, earlier: DropSummary, line_limit: Option<usize>) {
        self.dropped_count += earlier.dropped_count;
        let later = std::mem::take(&mut self.lines);
        self.lines = earlier.lines;
        self.lines.extend(later);
        self.bound_lines(line_limit);
    }

    fn bound_lines(&mut self, line_limit: Option<usize>) {
        if let Some(limit) = line_limit {
            if self.lines.len() > limit {
                let excess = self.lines.len() - limit;
                self.lines.drain(..excess);
            }
        }
    }
}

/// Single-line preview of at most [`SUMMARY_PREVIEW_CHARS`] characters.
pub fn preview(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= SUMMARY_PREVIEW_CHARS {
        return collapsed;
    }
    let mut clipped: String = collapsed.chars().take(SUMMARY_PREVIEW_CHARS - 1).collect();
    let trimmed_len = clipped.trim_end().len();
    clipped.truncate(trimmed_len);
    clipped.push(ELLIPSIS);
    clipped
}

pub fn render_summary(summary: &DropSummary) -> String {
    let noun = if summary.dropped_count == 1 {
        "message"
    } else {
        "messages"
    };
    let mut out = format!(
        "[Queue overflow] Dropped {} {noun} due to cap.",
        summary.dropped_count
    );
    if !summary.lines.is_empty() {
        out.push_str("\nSummary:");
        for line in &summary.lines {
            out.push_str("\n- ");
            out.push_str(line);
        }
    }
    out
}

pub fn render_collected(items: &[FollowupItem], summary: &DropSummary) -> String {
    let mut sections = Vec::new();
    if !summary.is_empty() {
        sections.push(render_summary(summary));
    }
    if !items.is_empty() {
        let mut block = String::from("[Queued messages while agent was busy]");
        for (index, item) in items.iter().enumerate() {
            block.push_str(&format!("\n\n---\nQueued #{}\n{}", index + 1, item.prompt));
        }
        sections.push(block);
    }
    sections.join("\n\n")
}
