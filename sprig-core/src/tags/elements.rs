//! Element factories, one per HTML element.

use std::collections::HashMap;
use std::sync::OnceLock;

use super::Tag;

/// A constructor for one element.
pub type TagFactory = fn() -> Tag;

macro_rules! elements {
    ($($name:ident),* $(,)?) => {
        $(
            #[doc = concat!("Create a `<", stringify!($name), ">` element.")]
            pub fn $name() -> Tag {
                Tag::new(stringify!($name))
            }
        )*

        const FACTORIES: &[(&str, TagFactory)] = &[$((stringify!($name), $name as TagFactory)),*];
    };
}

elements! {
    a, abbr, address, area, article, aside, audio, b, base, bdi, bdo, blockquote, body, br,
    button, canvas, caption, cite, code, col, colgroup, data, datalist, dd, del, details, dfn,
    dialog, div, dl, dt, em, embed, fieldset, figcaption, figure, footer, form, h1, h2, h3, h4,
    h5, h6, head, header, hgroup, hr, html, i, iframe, img, input, ins, kbd, label, legend, li,
    link, main, map, mark, menu, meta, meter, nav, noscript, object, ol, optgroup, option,
    output, p, picture, pre, progress, q, rp, rt, ruby, s, samp, script, search, section,
    select, slot, small, source, span, strong, style, sub, summary, sup, table, tbody, td,
    template, textarea, tfoot, th, thead, time, title, tr, track, u, ul, var, video, wbr,
}

/// Create an element with an arbitrary name, such as a custom element.
pub fn tag(name: &str) -> Tag {
    Tag::new(name)
}

/// Look up the factory for a standard element name.
pub fn factory(name: &str) -> Option<TagFactory> {
    static TABLE: OnceLock<HashMap<&'static str, TagFactory>> = OnceLock::new();
    TABLE
        .get_or_init(|| FACTORIES.iter().copied().collect())
        .get(name)
        .copied()
}
