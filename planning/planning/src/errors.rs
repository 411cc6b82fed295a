use std::{
    fmt::{Debug, Display},
    ops::Range,
    sync::Arc,
};

use crate::pddl::input::Input;
use annotate_snippets::*;
use thiserror::Error;

pub type Res<T> = Result<T, Message>;

/// A slice of some parsed input, kept alive so that diagnostics can quote it.
#[derive(Clone)]
pub struct Span {
    input: Arc<Input>,
    span: Range<usize>,
}
pub type OSpan = Option<Span>;

impl Span {
    pub(crate) fn new(input: Arc<Input>, span: Range<usize>) -> Span {
        Span { input, span }
    }

    /// Text covered by this span, as written in the source.
    pub fn str(&self) -> &str {
        &self.input.text[self.span.clone()]
    }

    pub fn annotate(&self, lvl: Level, message: impl ToString) -> Annot {
        let message = message.to_string();
        Annot {
            level: lvl,
            span: self.clone(),
            message,
        }
    }

    pub fn error(&self, message: impl ToString) -> Annot {
        self.annotate(Level::Error, message)
    }

    pub fn info(&self, message: impl ToString) -> Annot {
        self.annotate(Level::Info, message)
    }
}

impl Debug for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[span]")
    }
}

pub trait Spanned: Display {
    fn span(&self) -> Option<&Span>;

    fn span_or_default(&self) -> Span {
        self.span().cloned().unwrap_or_else(|| {
            let text = self.to_string();
            let span = 0..text.len();
            Span {
                input: Arc::new(Input::from_string(text)),
                span,
            }
        })
    }

    fn error(&self, message: impl ToString) -> Annot {
        self.annotate(Level::Error, message)
    }

    fn info(&self, message: impl ToString) -> Annot {
        self.annotate(Level::Info, message)
    }

    fn annotate(&self, lvl: Level, message: impl ToString) -> Annot {
        let message = message.to_string();
        Annot {
            level: lvl,
            span: self.span_or_default(),
            message,
        }
    }

    /// Shorthand for an error message pointing at this element.
    fn invalid(&self, message: impl ToString) -> Message {
        let message = message.to_string();
        Message::error(&message).snippet(self.annotate(Level::Error, message))
    }
}

/// A single annotation: a message attached to a span of the input.
pub struct Annot {
    level: Level,
    span: Span,
    message: String,
}

impl Annot {
    pub fn build(&self) -> Snippet<'_> {
        let annotation = self.level.span(self.span.span.clone()).label(&self.message);
        let snippet = Snippet::source(&self.span.input.text)
            .line_start(1)
            .fold(true)
            .annotation(annotation);
        if let Some(file) = self.span.input.source.as_ref() {
            snippet.origin(file.as_str())
        } else {
            snippet
        }
    }
}

impl Spanned for &crate::Sym {
    fn span(&self) -> Option<&Span> {
        self.span.as_ref()
    }
}

/// An error (or other diagnostic) with a title and source-anchored snippets,
/// rendered in the style of compiler diagnostics.
#[derive(Error)]
pub struct Message {
    level: Level,
    title: String,
    snippets: Vec<Annot>,
}

impl Message {
    pub fn new(level: Level, title: impl ToString) -> Self {
        Self {
            level,
            title: title.to_string(),
            snippets: Vec::new(),
        }
    }

    pub fn error(title: impl ToString) -> Self {
        Self::new(Level::Error, title)
    }

    pub fn snippet(mut self, snippet: Annot) -> Self {
        self.snippets.push(snippet);
        self
    }

    pub fn info(self, s: impl Spanned, msg: &str) -> Message {
        let annot = s.annotate(Level::Info, msg);
        self.snippet(annot)
    }

    /// Prefixes the title of this message with broader context.
    pub fn titled(mut self, title: impl Display) -> Message {
        if self.title.is_empty() {
            self.title = title.to_string();
        } else {
            self.title = format!("{}: {}", title, self.title);
        }
        self
    }
}

impl Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let renderer = Renderer::styled();
        let disp = self
            .level
            .title(&self.title)
            .snippets(self.snippets.iter().map(|s| s.build()));
        let disp = format!("{}", renderer.render(disp));
        f.write_str(&disp)
    }
}
impl Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

impl From<std::io::Error> for Message {
    fn from(value: std::io::Error) -> Self {
        Message::error(value)
    }
}

/// Conversion of typed semantic errors into a rendered [`Message`].
pub trait ToMessage {
    fn to_message(self) -> Message;
}

pub trait IntoMessageResult<T> {
    fn msg(self) -> Res<T>;
}

impl<T, E: ToMessage> IntoMessageResult<T> for Result<T, E> {
    fn msg(self) -> Res<T> {
        self.map_err(|e| e.to_message())
    }
}

pub trait ErrorMessageExt<T> {
    /// Adds a contextualizing title to the error, keeping its snippets.
    fn title(self, title: impl Display) -> Res<T>;
    /// Adds an info snippet naming the enclosing element (e.g. the action being parsed).
    fn tag(self, subject: &crate::Sym, context: &str, span: Option<&Span>) -> Res<T>;
}

impl<T> ErrorMessageExt<T> for Res<T> {
    fn title(self, title: impl Display) -> Res<T> {
        self.map_err(|m| m.titled(title))
    }

    fn tag(self, subject: &crate::Sym, context: &str, span: Option<&Span>) -> Res<T> {
        self.map_err(|m| {
            // diagnostics quote the name as the user wrote it
            let label = format!("{context} `{}`", subject.as_written());
            let annot = match span {
                Some(span) => span.info(label),
                None => (&subject).info(label),
            };
            m.snippet(annot)
        })
    }
}
