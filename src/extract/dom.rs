//! Shared ancestor-walk and text helpers for the row extractor.
//!
//! Both the "nearest common container" and the "nearest table row" searches
//! are the same upward walk with a different stop predicate, so there is one
//! walk implemented here and parameterized.

use scraper::ElementRef;

/// Walk `el`'s ancestors nearest-first, visiting at most `limit` nodes, and
/// return the first element accepted by `stop`.
pub fn nearest_ancestor<'a>(
    el: ElementRef<'a>,
    limit: usize,
    stop: impl Fn(ElementRef<'a>) -> bool,
) -> Option<ElementRef<'a>> {
    el.ancestors()
        .take(limit)
        .filter_map(ElementRef::wrap)
        .find(|anc| stop(*anc))
}

/// Smallest subtree containing both `a` and `b`: the first ancestor of `a`
/// that has `b` among its descendants.
pub fn nearest_common_container<'a>(
    a: ElementRef<'a>,
    b: ElementRef<'a>,
) -> Option<ElementRef<'a>> {
    let b_id = b.id();
    nearest_ancestor(a, usize::MAX, |anc| {
        anc.descendants().any(|d| d.id() == b_id)
    })
}

/// Nearest enclosing `<tr>`, with a short upward bound so a stray input
/// outside any table does not walk to the document root.
pub fn nearest_tr(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    nearest_ancestor(el, 8, |anc| anc.value().name().eq_ignore_ascii_case("tr"))
}

/// All non-empty, whitespace-trimmed text fragments under `el`, in document
/// order.
pub fn stripped_strings<'a>(el: ElementRef<'a>) -> impl Iterator<Item = &'a str> {
    el.text().map(str::trim).filter(|t| !t.is_empty())
}

/// The concatenated visible text of a subtree, fragments joined by a space.
pub fn visible_text(el: ElementRef<'_>) -> String {
    stripped_strings(el).collect::<Vec<_>>().join(" ")
}
