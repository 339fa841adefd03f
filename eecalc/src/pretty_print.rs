/// Renders a value tree in a fully parenthesized form, e.g. `x = ((2 × y) + 1V)`.
pub trait PrettyPrint {
    fn pretty_print(&self) -> String;
}
