use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One message of a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InlineNode {
    Text {
        text: String,
    },
    Emphasis {
        children: Vec<InlineNode>,
    },
    Strong {
        children: Vec<InlineNode>,
    },
    /// Inline code. `executable` marks spans that look like a shell command
    /// line rather than a single literal token.
    Code {
        children: Vec<InlineNode>,
        executable: bool,
    },
}

impl InlineNode {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Concatenated literal text of this node and its descendants.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        self.push_plain_text(&mut out);
        out
    }

    fn push_plain_text(&self, out: &mut String) {
        match self {
            Self::Text { text } => out.push_str(text),
            Self::Emphasis { children }
            | Self::Strong { children }
            | Self::Code { children, .. } => {
                for child in children {
                    child.push_plain_text(out);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodeLine {
    pub text: String,
    pub executable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockNode {
    /// One entry per non-blank source line.
    Paragraph { lines: Vec<Vec<InlineNode>> },
    OrderedList { items: Vec<Vec<InlineNode>> },
    UnorderedList { items: Vec<Vec<InlineNode>> },
    CodeBlock {
        language: Option<String>,
        lines: Vec<CodeLine>,
    },
}

impl BlockNode {
    /// Command lines a caller may offer to run, in document order.
    pub fn executable_lines(&self) -> Vec<String> {
        fn collect_spans(nodes: &[InlineNode], out: &mut Vec<String>) {
            for node in nodes {
                match node {
                    InlineNode::Code {
                        children,
                        executable: true,
                    } => {
                        let text: String = children.iter().map(InlineNode::plain_text).collect();
                        out.push(crate::markup::command_text(&text).to_string());
                    }
                    InlineNode::Emphasis { children } | InlineNode::Strong { children } => {
                        collect_spans(children, out)
                    }
                    InlineNode::Text { .. } | InlineNode::Code { .. } => {}
                }
            }
        }

        let mut out = Vec::new();
        match self {
            Self::CodeBlock { lines, .. } => {
                out.extend(
                    lines
                        .iter()
                        .filter(|line| line.executable)
                        .map(|line| crate::markup::command_text(&line.text).to_string()),
                );
            }
            Self::Paragraph { lines: rows }
            | Self::OrderedList { items: rows }
            | Self::UnorderedList { items: rows } => {
                for row in rows {
                    collect_spans(row, &mut out);
                }
            }
        }
        out
    }
}

/// A decoded turn together with its parsed document tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RenderedTurn {
    pub role: Role,
    pub blocks: Vec<BlockNode>,
}
