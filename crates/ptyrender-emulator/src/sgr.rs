//! SGR (Select Graphic Rendition) resolution.
//!
//! Parameters are applied left to right on top of the prior style. Both the
//! semicolon form (`38;5;N`, `38;2;R;G;B`) and the colon sub-parameter form
//! (`38:5:N`, `38:2::R:G:B`) of extended colors are accepted. Unknown codes
//! and truncated extended colors are skipped without touching other fields.

use ptyrender_core::{Color, Style};

/// Apply a flat SGR parameter list (semicolon-separated form) to `style`.
///
/// An empty list is equivalent to `0` (reset).
pub fn apply_sgr(style: Style, params: &[u16]) -> Style {
    let groups: Vec<&[u16]> = params.chunks(1).collect();
    apply_sgr_groups(style, &groups)
}

/// Apply SGR parameters grouped by colon sub-parameters, as produced by `vte`.
pub fn apply_sgr_groups(mut style: Style, groups: &[&[u16]]) -> Style {
    if groups.is_empty() {
        return Style::default();
    }

    let mut i = 0;
    while i < groups.len() {
        let group = groups[i];
        i += 1;
        let Some(&code) = group.first() else {
            continue;
        };

        match code {
            0 => style = Style::default(),
            1 => style.bold = true,
            2 => style.dim = true,
            3 => style.italic = true,
            4 => {
                // 4:0 turns underline off; 4:n for any other style turns it on
                style.underline = group.get(1).map_or(true, |&kind| kind != 0);
            }
            7 => style.inverse = true,
            9 => style.strikethrough = true,
            21 => style.underline = true,
            22 => {
                style.bold = false;
                style.dim = false;
            }
            23 => style.italic = false,
            24 => style.underline = false,
            27 => style.inverse = false,
            29 => style.strikethrough = false,
            30..=37 => style.foreground = Color::Palette((code - 30) as u8),
            39 => style.foreground = Color::Default,
            40..=47 => style.background = Color::Palette((code - 40) as u8),
            49 => style.background = Color::Default,
            90..=97 => style.foreground = Color::Palette((code - 90 + 8) as u8),
            100..=107 => style.background = Color::Palette((code - 100 + 8) as u8),
            38 | 48 => {
                let color = if group.len() > 1 {
                    extended_color_from_subparams(&group[1..])
                } else {
                    let (color, consumed) = extended_color_from_params(&groups[i..]);
                    i += consumed;
                    color
                };
                if let Some(color) = color {
                    if code == 38 {
                        style.foreground = color;
                    } else {
                        style.background = color;
                    }
                }
            }
            _ => {}
        }
    }

    style
}

fn component(value: u16) -> Option<u8> {
    u8::try_from(value).ok()
}

/// Parse `5;N` or `2;R;G;B` from the groups following a 38/48 code.
///
/// Returns the color, if valid, and how many groups were consumed.
fn extended_color_from_params(rest: &[&[u16]]) -> (Option<Color>, usize) {
    let value = |idx: usize| rest.get(idx).and_then(|group| group.first().copied());

    match value(0) {
        Some(5) => match value(1) {
            Some(index) => (component(index).map(Color::Palette), 2),
            None => (None, rest.len()),
        },
        Some(2) => match (value(1), value(2), value(3)) {
            (Some(r), Some(g), Some(b)) => (rgb(r, g, b), 4),
            _ => (None, rest.len()),
        },
        Some(_) => (None, 1),
        None => (None, 0),
    }
}

/// Parse `5:N`, `2:R:G:B` or `2:CS:R:G:B` from colon sub-parameters.
fn extended_color_from_subparams(sub: &[u16]) -> Option<Color> {
    match sub {
        [5, index, ..] => component(*index).map(Color::Palette),
        [2, _colorspace, r, g, b, ..] => rgb(*r, *g, *b),
        [2, r, g, b] => rgb(*r, *g, *b),
        _ => None,
    }
}

fn rgb(r: u16, g: u16, b: u16) -> Option<Color> {
    Some(Color::Rgb {
        r: component(r)?,
        g: component(g)?,
        b: component(b)?,
    })
}
