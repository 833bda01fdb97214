use std::cell::RefCell;
use std::rc::Rc;

use colored::Colorize;

/// Category of a diagnostic line. Each maps onto a short tag prefix; the
/// tag is part of the behavioral contract, the message text is not.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Category {
    /// Core events: load summary, control-flow transfers, halts.
    Core,
    /// Recoverable problems: unknown names, OOB or misaligned access.
    Warning,
    /// Malformed input: bad immediates, bad registers, bad operands.
    Error,
    /// Label bindings during loading.
    Label,
    /// Per-instruction execution trace.
    Exec,
}

impl Category {
    pub fn tag(self) -> &'static str {
        match self {
            Category::Core => "[RISC-V]",
            Category::Warning => "[Warning]",
            Category::Error => "[Error]",
            Category::Label => "[Label]",
            Category::Exec => "[Exec]",
        }
    }
}

/// Sink for one-line diagnostics. Provided by the embedder; never awaited,
/// never consulted for control flow.
pub trait DiagSink {
    fn emit(&mut self, category: Category, message: &str);
}

/// Writes tagged lines to stderr with ANSI colors. The default sink.
#[derive(Default)]
pub struct StderrSink;

impl DiagSink for StderrSink {
    fn emit(&mut self, category: Category, message: &str) {
        let tag = match category {
            Category::Core => category.tag().cyan(),
            Category::Warning => category.tag().yellow(),
            Category::Error => category.tag().red(),
            Category::Label => category.tag().green(),
            Category::Exec => category.tag().dimmed(),
        };
        eprintln!("{} {}", tag, message);
    }
}

/// Discards everything.
#[derive(Default)]
pub struct NullSink;

impl DiagSink for NullSink {
    fn emit(&mut self, _category: Category, _message: &str) {}
}

/// Collects lines in memory behind a shared handle, so an embedder (or a
/// test) can keep a clone and read back what the core emitted.
#[derive(Clone, Default)]
pub struct BufferSink {
    lines: Rc<RefCell<Vec<(Category, String)>>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All lines emitted so far, rendered with their tag prefix.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .borrow()
            .iter()
            .map(|(cat, msg)| format!("{} {}", cat.tag(), msg))
            .collect()
    }

    /// Messages of a single category, without the tag.
    pub fn messages(&self, category: Category) -> Vec<String> {
        self.lines
            .borrow()
            .iter()
            .filter(|(cat, _)| *cat == category)
            .map(|(_, msg)| msg.clone())
            .collect()
    }

    pub fn contains(&self, category: Category, needle: &str) -> bool {
        self.lines
            .borrow()
            .iter()
            .any(|(cat, msg)| *cat == category && msg.contains(needle))
    }

    pub fn clear(&self) {
        self.lines.borrow_mut().clear();
    }
}

impl DiagSink for BufferSink {
    fn emit(&mut self, category: Category, message: &str) {
        self.lines
            .borrow_mut()
            .push((category, message.to_string()));
    }
}
