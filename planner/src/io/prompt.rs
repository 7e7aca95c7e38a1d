//! Prompt rendering for every backend call site.
//!
//! Templates live in `io/prompts/` and mark their sections with
//! `<!-- section:KEY required|droppable -->`. When a rendered prompt exceeds the
//! byte budget, droppable sections are removed in [`DROP_ORDER`] and, as a last
//! resort, the final section is truncated. A droppable section that still fits
//! partially is trimmed to the remaining budget rather than removed.

use std::sync::LazyLock;

use anyhow::Result;
use minijinja::{Environment, context};
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::io::backend::CallKind;
use crate::task::{Task, TaskId};

const CLASSIFY_TEMPLATE: &str = include_str!("prompts/classify.md");
const EVALUATE_TEMPLATE: &str = include_str!("prompts/evaluate.md");
const RELEVANCE_TEMPLATE: &str = include_str!("prompts/relevance.md");
const SAVE_LOCATION_TEMPLATE: &str = include_str!("prompts/save_location.md");
const GENERATE_TEMPLATE: &str = include_str!("prompts/generate.md");

/// Droppable sections, least important first.
const DROP_ORDER: [&str; 5] = ["children", "paths", "context", "prior", "ledger"];

const TRUNCATION_MARKER: &str = "\n[truncated]";

/// A droppable section is trimmed instead of dropped when at least this many
/// bytes of it still fit.
const MIN_TRIMMED_SECTION_BYTES: usize = 256;

static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<!--\s*section:(\w+)\s+(required|droppable)\s*-->")
        .expect("section marker regex is valid")
});

#[derive(Debug, Clone, Serialize)]
struct TaskView {
    id: TaskId,
    priority: &'static str,
    description: String,
    requirements: String,
    ledger: Option<String>,
}

impl TaskView {
    fn from_task(task: &Task) -> Self {
        let ledger = task.ledger_text();
        Self {
            id: task.id,
            priority: task.priority.as_str(),
            description: task.description.trim().to_string(),
            requirements: task.requirements_for_success.trim().to_string(),
            ledger: (!ledger.trim().is_empty()).then_some(ledger),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChildView {
    id: TaskId,
    description: String,
    completed: bool,
}

struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template(CallKind::Classify.as_str(), CLASSIFY_TEMPLATE)?;
        env.add_template(CallKind::Evaluate.as_str(), EVALUATE_TEMPLATE)?;
        env.add_template(CallKind::Relevance.as_str(), RELEVANCE_TEMPLATE)?;
        env.add_template(CallKind::SaveLocation.as_str(), SAVE_LOCATION_TEMPLATE)?;
        env.add_template(CallKind::Generate.as_str(), GENERATE_TEMPLATE)?;
        Ok(Self { env })
    }

    fn render<S: Serialize>(&self, kind: CallKind, ctx: S) -> Result<String> {
        let template = self.env.get_template(kind.as_str())?;
        Ok(template.render(ctx)?)
    }
}

#[derive(Debug, Clone)]
struct Section {
    key: String,
    required: bool,
    content: String,
}

fn parse_sections(rendered: &str) -> Vec<Section> {
    let markers: Vec<_> = SECTION_RE.captures_iter(rendered).collect();
    let mut sections = Vec::with_capacity(markers.len());
    for (i, caps) in markers.iter().enumerate() {
        let (Some(whole), Some(key), Some(mode)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let end = markers
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(rendered.len(), |next| next.start());
        let content = rendered[whole.end()..end].trim().to_string();
        let required = mode.as_str() == "required";
        if !content.is_empty() || required {
            sections.push(Section {
                key: key.as_str().to_string(),
                required,
                content,
            });
        }
    }
    sections
}

fn total_len(sections: &[Section]) -> usize {
    sections.iter().map(|s| s.content.len()).sum()
}

fn apply_budget(sections: &mut Vec<Section>, budget: usize) {
    for key in DROP_ORDER {
        let total = total_len(sections);
        if total <= budget {
            return;
        }
        let Some(idx) = sections.iter().position(|s| s.key == key && !s.required) else {
            continue;
        };
        let room = budget.saturating_sub(total - sections[idx].content.len());
        if room >= MIN_TRIMMED_SECTION_BYTES {
            trim_section(&mut sections[idx], room);
            return;
        }
        let dropped = sections.remove(idx);
        debug!(
            section = key,
            bytes_dropped = dropped.content.len(),
            "dropped section for budget"
        );
    }

    let over = total_len(sections).saturating_sub(budget);
    if over == 0 {
        return;
    }
    if let Some(last) = sections.last_mut() {
        let room = last.content.len().saturating_sub(over);
        trim_section(last, room);
    }
}

/// Cut `section` to at most `room` bytes, marker included.
fn trim_section(section: &mut Section, room: usize) {
    let before_len = section.content.len();
    let keep = room.saturating_sub(TRUNCATION_MARKER.len());
    truncate_at_char_boundary(&mut section.content, keep);
    section.content.push_str(TRUNCATION_MARKER);
    debug!(
        section = %section.key,
        before_len,
        after_len = section.content.len(),
        "truncated section for budget"
    );
}

fn truncate_at_char_boundary(text: &mut String, max_len: usize) {
    if text.len() <= max_len {
        return;
    }
    let mut cut = max_len;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
}

/// A rendered prompt ready to send to the backend.
#[derive(Debug, Clone)]
pub struct PromptPack {
    content: String,
}

impl PromptPack {
    pub fn render(&self) -> String {
        self.content.clone()
    }
}

/// Builds prompt packs within a byte budget.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    budget_bytes: usize,
}

impl PromptBuilder {
    pub fn new(budget_bytes: usize) -> Self {
        Self { budget_bytes }
    }

    /// Classifier prompt: the task, its ledger, and its current children.
    pub fn build_classifier(&self, task: &Task, children: &[&Task]) -> Result<PromptPack> {
        let children: Vec<ChildView> = children
            .iter()
            .map(|child| ChildView {
                id: child.id,
                description: child.description.trim().to_string(),
                completed: child.completed,
            })
            .collect();
        let rendered = PromptEngine::new()?.render(
            CallKind::Classify,
            context! {
                task => TaskView::from_task(task),
                children => children,
            },
        )?;
        Ok(self.finish(&rendered))
    }

    pub fn build_evaluator(&self, task: &Task) -> Result<PromptPack> {
        let rendered = PromptEngine::new()?.render(
            CallKind::Evaluate,
            context! { task => TaskView::from_task(task) },
        )?;
        Ok(self.finish(&rendered))
    }

    pub fn build_relevance(&self, prompt: &str, paths: &[String]) -> Result<PromptPack> {
        let rendered = PromptEngine::new()?.render(
            CallKind::Relevance,
            context! { prompt => prompt.trim(), paths => paths },
        )?;
        Ok(self.finish(&rendered))
    }

    pub fn build_save_location(&self, prompt: &str, paths: &[String]) -> Result<PromptPack> {
        let rendered = PromptEngine::new()?.render(
            CallKind::SaveLocation,
            context! { prompt => prompt.trim(), paths => paths },
        )?;
        Ok(self.finish(&rendered))
    }

    pub fn build_generator(&self, context: &str, prior: &str, prompt: &str) -> Result<PromptPack> {
        let rendered = PromptEngine::new()?.render(
            CallKind::Generate,
            context! {
                prompt => prompt.trim(),
                prior => (!prior.trim().is_empty()).then_some(prior.trim()),
                context => (!context.trim().is_empty()).then_some(context.trim()),
            },
        )?;
        Ok(self.finish(&rendered))
    }

    fn finish(&self, rendered: &str) -> PromptPack {
        let mut sections = parse_sections(rendered);
        apply_budget(&mut sections, self.budget_bytes);
        PromptPack {
            content: sections
                .iter()
                .map(|s| s.content.as_str())
                .collect::<Vec<_>>()
                .join("\n\n"),
        }
    }
}
