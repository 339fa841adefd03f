use codespan_reporting::diagnostic::{Label, LabelStyle};

/// A byte range `start..end` into a single line of input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    pub fn single_character(position: usize, character: char) -> Self {
        Span {
            start: position,
            end: position + character.len_utf8(),
        }
    }

    pub fn extend(&self, other: &Span) -> Span {
        Span {
            start: std::cmp::min(self.start, other.start),
            end: std::cmp::max(self.end, other.end),
        }
    }

    pub fn diagnostic_label(&self, style: LabelStyle) -> Label<()> {
        Label::new(style, (), self.start..self.end)
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[test]
fn extend_covers_both_spans() {
    let a = Span::new(3, 5);
    let b = Span::new(0, 1);
    assert_eq!(a.extend(&b), Span::new(0, 5));
    assert_eq!(b.extend(&a), Span::new(0, 5));
    assert_eq!(Span::single_character(4, 'Ω'), Span::new(4, 6));
}
