//! Per-module-kind rules for reading host items.
//!
//! Each host activity type answers the same few questions differently: who
//! authored the work, whether it belongs to a group, whether it is still a
//! draft and when it is due. The adapter for a kind is picked with a plain
//! `match`, so adding a kind is a compile error until it is handled.

use chrono::{DateTime, Utc};
use db::models::course_module::{self, ModuleKind};
use serde::Deserialize;

/// Host-side facts about the item a submission came from.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ItemContext {
    pub submitter_id: i64,
    /// User the work belongs to when someone submits on their behalf.
    #[serde(default)]
    pub owner_id: Option<i64>,
    #[serde(default)]
    pub group_id: Option<i64>,
    #[serde(default)]
    pub team_submission: bool,
    /// Host workflow state (`draft`, `submitted`, `inprogress`, `finished`, ...).
    #[serde(default)]
    pub state: Option<String>,
    /// Item-level deadline overriding the module one (quiz close time).
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
}

impl ItemContext {
    fn state_is(&self, expected: &str) -> bool {
        self.state
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case(expected))
    }
}

pub trait ModuleAdapter: Send + Sync {
    fn kind(&self) -> ModuleKind;

    fn author(&self, item: &ItemContext) -> i64 {
        item.owner_id.unwrap_or(item.submitter_id)
    }

    fn group_id(&self, item: &ItemContext) -> Option<i64>;

    fn is_draft(&self, item: &ItemContext) -> bool;

    fn due_date(
        &self,
        module: &course_module::Model,
        _item: &ItemContext,
    ) -> Option<DateTime<Utc>> {
        module.due_date
    }

    /// Whether the status view links to other participants' posts.
    fn show_other_posts_links(&self) -> bool {
        false
    }
}

pub struct AssignAdapter;
pub struct ForumAdapter;
pub struct WorkshopAdapter;
pub struct QuizAdapter;

impl ModuleAdapter for AssignAdapter {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Assign
    }

    fn group_id(&self, item: &ItemContext) -> Option<i64> {
        item.group_id.filter(|_| item.team_submission)
    }

    fn is_draft(&self, item: &ItemContext) -> bool {
        item.state_is("draft") || item.state_is("new")
    }
}

impl ModuleAdapter for ForumAdapter {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Forum
    }

    // Forum posts are always by the poster.
    fn author(&self, item: &ItemContext) -> i64 {
        item.submitter_id
    }

    fn group_id(&self, item: &ItemContext) -> Option<i64> {
        item.group_id
    }

    fn is_draft(&self, _item: &ItemContext) -> bool {
        false
    }

    fn show_other_posts_links(&self) -> bool {
        true
    }
}

impl ModuleAdapter for WorkshopAdapter {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Workshop
    }

    fn group_id(&self, _item: &ItemContext) -> Option<i64> {
        None
    }

    fn is_draft(&self, _item: &ItemContext) -> bool {
        false
    }
}

impl ModuleAdapter for QuizAdapter {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Quiz
    }

    fn group_id(&self, _item: &ItemContext) -> Option<i64> {
        None
    }

    /// Only finished attempts are checked.
    fn is_draft(&self, item: &ItemContext) -> bool {
        item.state.is_some() && !item.state_is("finished")
    }

    fn due_date(
        &self,
        module: &course_module::Model,
        item: &ItemContext,
    ) -> Option<DateTime<Utc>> {
        item.due_date.or(module.due_date)
    }
}

static ASSIGN: AssignAdapter = AssignAdapter;
static FORUM: ForumAdapter = ForumAdapter;
static WORKSHOP: WorkshopAdapter = WorkshopAdapter;
static QUIZ: QuizAdapter = QuizAdapter;

pub fn adapter_for(kind: ModuleKind) -> &'static dyn ModuleAdapter {
    match kind {
        ModuleKind::Assign => &ASSIGN,
        ModuleKind::Forum => &FORUM,
        ModuleKind::Workshop => &WORKSHOP,
        ModuleKind::Quiz => &QUIZ,
    }
}
